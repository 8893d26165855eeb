use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike};

use crate::error::SqlBridgeError;

use super::codec::{ByteReader, ByteWriter};

/// Day number (counted from 0001-01-01 as day 1) of the 2000-01-01 wire epoch.
pub const EPOCH_DAYS_FROM_CE: i32 = 730_120;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// How a backend sends timestamps: integer microseconds or float seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    #[default]
    Integer,
    Float,
}

impl TimestampFormat {
    /// Map the `integer_datetimes` server parameter.
    #[must_use]
    pub fn from_integer_datetimes(setting: &str) -> Self {
        if setting.eq_ignore_ascii_case("off") {
            TimestampFormat::Float
        } else {
            TimestampFormat::Integer
        }
    }
}

fn epoch() -> Result<NaiveDateTime, SqlBridgeError> {
    date_from_days(0)?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| SqlBridgeError::DecodeError("invalid epoch".into()))
}

#[must_use]
pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// # Errors
/// Returns `SqlBridgeError::DecodeError` when the day count is outside chrono's range.
pub fn date_from_days(days: i32) -> Result<NaiveDate, SqlBridgeError> {
    days.checked_add(EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| SqlBridgeError::DecodeError(format!("date out of range: {days} days")))
}

/// Microseconds since 2000-01-01, saturating at the `i64` bounds.
#[must_use]
pub fn datetime_to_micros(dt: NaiveDateTime) -> i64 {
    let delta = dt.date().num_days_from_ce() - EPOCH_DAYS_FROM_CE;
    let day_micros = i64::from(delta).saturating_mul(86_400_000_000);
    let time_micros = i64::from(dt.num_seconds_from_midnight()) * 1_000_000
        + i64::from(dt.nanosecond() / 1_000);
    day_micros.saturating_add(time_micros)
}

/// # Errors
/// Returns `SqlBridgeError::DecodeError` for infinite or out-of-range timestamps.
pub fn datetime_from_micros(micros: i64) -> Result<NaiveDateTime, SqlBridgeError> {
    if micros == i64::MAX || micros == i64::MIN {
        return Err(SqlBridgeError::DecodeError("infinite timestamp".into()));
    }
    epoch()?
        .checked_add_signed(TimeDelta::microseconds(micros))
        .ok_or_else(|| SqlBridgeError::DecodeError(format!("timestamp out of range: {micros}us")))
}

/// Decode an 8-byte big-endian timestamp in the connection's format.
///
/// # Errors
/// Returns `SqlBridgeError::DecodeError` for short payloads, infinities, or out-of-range values.
pub fn decode_timestamp(
    raw: &[u8],
    format: TimestampFormat,
) -> Result<NaiveDateTime, SqlBridgeError> {
    let mut reader = ByteReader::new(raw);
    let micros = match format {
        TimestampFormat::Integer => reader.read_i64()?,
        TimestampFormat::Float => {
            let seconds = reader.read_f64()?;
            if !seconds.is_finite() {
                return Err(SqlBridgeError::DecodeError("infinite timestamp".into()));
            }
            (seconds * MICROS_PER_SECOND).round() as i64
        }
    };
    reader.finish()?;
    datetime_from_micros(micros)
}

#[must_use]
pub fn encode_timestamp(dt: NaiveDateTime, format: TimestampFormat) -> Vec<u8> {
    let micros = datetime_to_micros(dt);
    let mut w = ByteWriter::with_capacity(8);
    match format {
        TimestampFormat::Integer => w.put_i64(micros),
        TimestampFormat::Float => w.put_f64(micros as f64 / MICROS_PER_SECOND),
    }
    w.into_inner()
}

/// Decode a 4-byte big-endian day count.
///
/// # Errors
/// Returns `SqlBridgeError::DecodeError` for short payloads or out-of-range dates.
pub fn decode_date(raw: &[u8]) -> Result<NaiveDate, SqlBridgeError> {
    let mut reader = ByteReader::new(raw);
    let days = reader.read_i32()?;
    reader.finish()?;
    date_from_days(days)
}

#[must_use]
pub fn encode_date(date: NaiveDate) -> Vec<u8> {
    let mut w = ByteWriter::with_capacity(4);
    w.put_i32(date_to_days(date));
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn epoch_constant_is_2000_01_01() {
        assert_eq!(ymd(2000, 1, 1).num_days_from_ce(), EPOCH_DAYS_FROM_CE);
    }

    #[test]
    fn dates_count_days_from_epoch() -> Result<(), SqlBridgeError> {
        assert_eq!(decode_date(&0i32.to_be_bytes())?, ymd(2000, 1, 1));
        assert_eq!(decode_date(&(-1i32).to_be_bytes())?, ymd(1999, 12, 31));
        assert_eq!(decode_date(&encode_date(ymd(2024, 2, 29)))?, ymd(2024, 2, 29));
        Ok(())
    }

    #[test]
    fn integer_and_float_timestamps_agree() -> Result<(), SqlBridgeError> {
        let dt = ymd(2021, 7, 4)
            .and_hms_micro_opt(12, 30, 15, 250_000)
            .expect("valid time");
        for format in [TimestampFormat::Integer, TimestampFormat::Float] {
            assert_eq!(decode_timestamp(&encode_timestamp(dt, format), format)?, dt);
        }
        Ok(())
    }

    #[test]
    fn integer_timestamp_is_micros_since_epoch() -> Result<(), SqlBridgeError> {
        let one_day = 86_400_000_000i64.to_be_bytes();
        let dt = decode_timestamp(&one_day, TimestampFormat::Integer)?;
        assert_eq!(dt, ymd(2000, 1, 2).and_hms_opt(0, 0, 0).expect("midnight"));
        Ok(())
    }

    #[test]
    fn infinity_is_rejected() {
        let raw = i64::MAX.to_be_bytes();
        assert!(decode_timestamp(&raw, TimestampFormat::Integer).is_err());
        let raw = f64::INFINITY.to_be_bytes();
        assert!(decode_timestamp(&raw, TimestampFormat::Float).is_err());
    }

    #[test]
    fn integer_datetimes_setting() {
        assert_eq!(TimestampFormat::from_integer_datetimes("on"), TimestampFormat::Integer);
        assert_eq!(TimestampFormat::from_integer_datetimes("off"), TimestampFormat::Float);
    }
}
