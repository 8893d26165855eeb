use std::collections::HashMap;
use std::time::Duration;

/// Accumulated execution time of the queries created at one source location.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryStatistics {
    pub duration: Duration,
    pub calls: u64,
    /// SQL text of the most recent query stored for this location.
    pub sql: String,
}

/// Per-location statistics, keyed by `file:line`.
pub type StatisticsMap = HashMap<String, QueryStatistics>;

pub(crate) fn add_statistics(
    map: &mut StatisticsMap,
    location: String,
    duration: Duration,
    calls: u64,
    sql: &str,
) {
    let entry = map.entry(location).or_default();
    entry.duration += duration;
    entry.calls += calls;
    entry.sql = sql.to_string();
}
