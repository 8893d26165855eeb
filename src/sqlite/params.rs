use rusqlite::types::Value;

use crate::error::SqlBridgeError;
use crate::types::Variant;

/// Text layout used for timestamps stored in `SQLite`.
pub const TIMESTAMP_FORMAT: &str = "%F %T%.f";
pub const DATE_FORMAT: &str = "%F";

/// Convert one parameter value to a rusqlite `Value`.
///
/// `SQLite` has no decimal, date or timestamp storage class: money is stored as REAL and
/// dates as ISO-8601 text.
///
/// # Errors
/// Returns `SqlBridgeError::UnsupportedParameterType` for values that cannot be stored.
pub fn variant_to_sqlite_value(name: &str, value: &Variant) -> Result<Value, SqlBridgeError> {
    Ok(match value {
        Variant::Null => Value::Null,
        Variant::Bool(b) => Value::Integer(i64::from(*b)),
        Variant::Int(i) => Value::Integer(i64::from(*i)),
        Variant::Int64(i) => Value::Integer(*i),
        Variant::Float(f) => Value::Real(*f),
        Variant::Money(m) => Value::Real(m.to_f64()),
        Variant::String(s) | Variant::Text(s) => Value::Text(s.clone()),
        Variant::Buffer(b) => Value::Blob(b.clone()),
        Variant::Date(d) => Value::Text(d.format(DATE_FORMAT).to_string()),
        Variant::DateTime(dt) => Value::Text(dt.format(TIMESTAMP_FORMAT).to_string()),
        Variant::ImageRef(_) => {
            return Err(SqlBridgeError::UnsupportedParameterType {
                name: name.to_string(),
                type_name: value.variant_type().to_string(),
            });
        }
    })
}
