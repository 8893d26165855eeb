use std::borrow::Cow;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::wire::datetime::{date_to_days, datetime_to_micros};

/// Exact fixed-point decimal: `value / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Money {
    pub value: i64,
    pub scale: u8,
}

impl Money {
    #[must_use]
    pub fn new(value: i64, scale: u8) -> Self {
        Self { value, scale }
    }

    /// Lossy conversion for display and for backends without an exact decimal type.
    #[must_use]
    pub fn to_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(i32::from(self.scale))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.value);
        }
        let sign = if self.value < 0 { "-" } else { "" };
        let digits = self.value.unsigned_abs().to_string();
        let scale = usize::from(self.scale);
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

/// Values used both as query parameters and as fetched field values.
///
/// ```rust
/// use sqlbridge::prelude::*;
///
/// let params = vec![
///     Variant::Int(1),
///     Variant::from("alice"),
///     Variant::Money(Money::new(12345, 2)),
/// ];
/// # let _ = params;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    Null,
    Bool(bool),
    Int(i32),
    Int64(i64),
    Float(f64),
    /// Fixed-point decimal
    Money(Money),
    /// Short string (VARCHAR-like)
    String(String),
    /// Large string (TEXT/CLOB-like)
    Text(String),
    /// Binary blob
    Buffer(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Opaque pointer to an application-side image; never sent to a backend.
    ImageRef(u64),
}

/// Discriminant of a `Variant`, used for field metadata and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariantType {
    #[default]
    Null,
    Bool,
    Int,
    Int64,
    Float,
    Money,
    String,
    Text,
    Buffer,
    Date,
    DateTime,
    ImageRef,
}

impl VariantType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            VariantType::Null => "null",
            VariantType::Bool => "bool",
            VariantType::Int => "int",
            VariantType::Int64 => "int64",
            VariantType::Float => "float",
            VariantType::Money => "money",
            VariantType::String => "string",
            VariantType::Text => "text",
            VariantType::Buffer => "buffer",
            VariantType::Date => "date",
            VariantType::DateTime => "datetime",
            VariantType::ImageRef => "image",
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Variant {
    #[must_use]
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Null => VariantType::Null,
            Variant::Bool(_) => VariantType::Bool,
            Variant::Int(_) => VariantType::Int,
            Variant::Int64(_) => VariantType::Int64,
            Variant::Float(_) => VariantType::Float,
            Variant::Money(_) => VariantType::Money,
            Variant::String(_) => VariantType::String,
            Variant::Text(_) => VariantType::Text,
            Variant::Buffer(_) => VariantType::Buffer,
            Variant::Date(_) => VariantType::Date,
            Variant::DateTime(_) => VariantType::DateTime,
            Variant::ImageRef(_) => VariantType::ImageRef,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Variant::Null)
    }

    /// Size in bytes of the value's raw representation.
    #[must_use]
    pub fn data_size(&self) -> usize {
        match self {
            Variant::Null => 0,
            Variant::Bool(_) => 1,
            Variant::Int(_) | Variant::Date(_) => 4,
            Variant::Int64(_)
            | Variant::Float(_)
            | Variant::Money(_)
            | Variant::DateTime(_)
            | Variant::ImageRef(_) => 8,
            Variant::String(s) | Variant::Text(s) => s.len(),
            Variant::Buffer(b) => b.len(),
        }
    }

    /// Raw bytes of the value: string/blob payloads as-is, scalars little-endian.
    ///
    /// Dates and timestamps are counted from 2000-01-01 (days and microseconds).
    #[must_use]
    pub fn raw_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Variant::Null => Cow::Borrowed(&[]),
            Variant::Bool(b) => Cow::Owned(vec![u8::from(*b)]),
            Variant::Int(i) => Cow::Owned(i.to_le_bytes().to_vec()),
            Variant::Int64(i) => Cow::Owned(i.to_le_bytes().to_vec()),
            Variant::Float(f) => Cow::Owned(f.to_le_bytes().to_vec()),
            Variant::Money(m) => Cow::Owned(m.value.to_le_bytes().to_vec()),
            Variant::String(s) | Variant::Text(s) => Cow::Borrowed(s.as_bytes()),
            Variant::Buffer(b) => Cow::Borrowed(b),
            Variant::Date(d) => Cow::Owned(date_to_days(*d).to_le_bytes().to_vec()),
            Variant::DateTime(dt) => Cow::Owned(datetime_to_micros(*dt).to_le_bytes().to_vec()),
            Variant::ImageRef(p) => Cow::Owned(p.to_le_bytes().to_vec()),
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            Variant::Int(i) => Some(*i != 0),
            Variant::Int64(i) => Some(*i != 0),
            Variant::String(s) | Variant::Text(s) => match s.as_str() {
                "t" | "true" | "1" | "y" | "Y" => Some(true),
                "f" | "false" | "0" | "n" | "N" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::Bool(b) => Some(i64::from(*b)),
            Variant::Int(i) => Some(i64::from(*i)),
            Variant::Int64(i) => Some(*i),
            Variant::Money(m) if m.scale == 0 => Some(m.value),
            Variant::String(s) | Variant::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Variant::Int(i) => Some(f64::from(*i)),
            Variant::Int64(i) => Some(*i as f64),
            Variant::Float(f) => Some(*f),
            Variant::Money(m) => Some(m.to_f64()),
            Variant::String(s) | Variant::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) | Variant::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::Buffer(b) => Some(b),
            Variant::String(s) | Variant::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Variant::Date(d) => Some(*d),
            Variant::DateTime(dt) => Some(dt.date()),
            Variant::String(s) | Variant::Text(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Variant::DateTime(dt) => Some(*dt),
            Variant::Date(d) => d.and_hms_opt(0, 0, 0),
            Variant::String(s) | Variant::Text(s) => {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
            }
            _ => None,
        }
    }

    /// Text rendering; `None` only for NULL.
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Null => Ok(()),
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Int(i) => write!(f, "{i}"),
            Variant::Int64(i) => write!(f, "{i}"),
            Variant::Float(v) => write!(f, "{v}"),
            Variant::Money(m) => write!(f, "{m}"),
            Variant::String(s) | Variant::Text(s) => f.write_str(s),
            Variant::Buffer(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            Variant::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Variant::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Variant::ImageRef(p) => write!(f, "image@{p:#x}"),
        }
    }
}

macro_rules! variant_from {
    ($($ty:ty => $arm:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$arm(value)
                }
            }
        )*
    };
}

variant_from!(
    bool => Bool,
    i32 => Int,
    i64 => Int64,
    f64 => Float,
    Money => Money,
    String => String,
    Vec<u8> => Buffer,
    NaiveDate => Date,
    NaiveDateTime => DateTime,
);

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<&[u8]> for Variant {
    fn from(value: &[u8]) -> Self {
        Variant::Buffer(value.to_vec())
    }
}

impl<T: Into<Variant>> From<Option<T>> for Variant {
    fn from(value: Option<T>) -> Self {
        value.map_or(Variant::Null, Into::into)
    }
}

/// Database dialects known to this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum ConnectionType {
    /// `PostgreSQL`
    Postgres,
    /// `SQLite` 3
    Sqlite,
    /// `MySQL` / `MariaDB`
    #[value(name = "mysql")]
    MySql,
    /// Oracle
    Oracle,
    /// SQL Server (through ODBC)
    Mssql,
}

impl ConnectionType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ConnectionType::Postgres => "PostgreSQL",
            ConnectionType::Sqlite => "SQLite3",
            ConnectionType::MySql => "MySQL",
            ConnectionType::Oracle => "Oracle",
            ConnectionType::Mssql => "MSSQL",
        }
    }
}

impl fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Catalog object kinds for `Connection::object_list`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum ObjectType {
    Tables,
    Views,
    Procedures,
    Functions,
    Databases,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_keeps_scale() {
        assert_eq!(Money::new(12345, 4).to_string(), "1.2345");
        assert_eq!(Money::new(-5, 2).to_string(), "-0.05");
        assert_eq!(Money::new(100, 0).to_string(), "100");
    }

    #[test]
    fn data_size_matches_raw_bytes() {
        let values = [
            Variant::Null,
            Variant::Bool(true),
            Variant::Int(-7),
            Variant::Int64(1 << 40),
            Variant::Float(2.5),
            Variant::Money(Money::new(1, 2)),
            Variant::from("héllo"),
            Variant::Buffer(vec![1, 2, 3]),
            Variant::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap_or_default()),
        ];
        for value in values {
            assert_eq!(value.data_size(), value.raw_bytes().len(), "{value:?}");
        }
    }

    #[test]
    fn option_converts_to_null() {
        let none: Option<i32> = None;
        assert!(Variant::from(none).is_null());
        assert_eq!(Variant::from(Some(5)), Variant::Int(5));
    }

    #[test]
    fn conversions_cross_types() {
        assert_eq!(Variant::from("42").as_i64(), Some(42));
        assert_eq!(Variant::Int(1).as_bool(), Some(true));
        assert_eq!(Variant::Money(Money::new(250, 2)).as_f64(), Some(2.5));
        assert_eq!(Variant::Null.as_string(), None);
    }
}
