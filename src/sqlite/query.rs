use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Value;

use crate::types::{Variant, VariantType};

use super::params::{DATE_FORMAT, TIMESTAMP_FORMAT};

/// Map a declared column type to the variant it is read as, following `SQLite`'s affinity
/// rules. Expression columns have no declared type and are read dynamically.
#[must_use]
pub fn declared_variant_type(decltype: Option<&str>) -> VariantType {
    let Some(decl) = decltype else {
        return VariantType::Null;
    };
    let decl = decl.to_ascii_uppercase();
    if decl.starts_with("BOOL") {
        VariantType::Bool
    } else if decl.contains("INT") {
        VariantType::Int64
    } else if decl.contains("TIMESTAMP") || decl.contains("DATETIME") {
        VariantType::DateTime
    } else if decl.contains("DATE") {
        VariantType::Date
    } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
        VariantType::String
    } else if decl.contains("BLOB") {
        VariantType::Buffer
    } else if decl.contains("REAL")
        || decl.contains("FLOA")
        || decl.contains("DOUB")
        || decl.contains("NUMERIC")
        || decl.contains("DECIMAL")
    {
        VariantType::Float
    } else {
        VariantType::Null
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%FT%T%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Convert a fetched `SQLite` value into a `Variant`, guided by the column's declared type.
///
/// Text that does not parse as the declared date type is returned as a string.
#[must_use]
pub fn sqlite_value_to_variant(value: Value, declared: VariantType) -> Variant {
    match value {
        Value::Null => Variant::Null,
        Value::Integer(i) => match declared {
            VariantType::Bool => Variant::Bool(i != 0),
            VariantType::Int => i32::try_from(i).map_or(Variant::Int64(i), Variant::Int),
            VariantType::Float => Variant::Float(i as f64),
            _ => Variant::Int64(i),
        },
        Value::Real(f) => Variant::Float(f),
        Value::Text(s) => match declared {
            VariantType::DateTime => parse_datetime(&s).map_or(Variant::String(s), Variant::DateTime),
            VariantType::Date => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map_or(Variant::String(s), Variant::Date),
            VariantType::Text => Variant::Text(s),
            _ => Variant::String(s),
        },
        Value::Blob(b) => Variant::Buffer(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_types_follow_affinity() {
        assert_eq!(declared_variant_type(Some("INTEGER")), VariantType::Int64);
        assert_eq!(declared_variant_type(Some("varchar(20)")), VariantType::String);
        assert_eq!(declared_variant_type(Some("DATETIME")), VariantType::DateTime);
        assert_eq!(declared_variant_type(Some("date")), VariantType::Date);
        assert_eq!(declared_variant_type(Some("boolean")), VariantType::Bool);
        assert_eq!(declared_variant_type(None), VariantType::Null);
    }

    #[test]
    fn text_dates_parse_when_declared() {
        let v = sqlite_value_to_variant(
            Value::Text("2023-11-05 08:30:00".into()),
            VariantType::DateTime,
        );
        assert_eq!(v.to_string(), "2023-11-05 08:30:00");

        let v = sqlite_value_to_variant(Value::Text("not a date".into()), VariantType::Date);
        assert_eq!(v, Variant::String("not a date".into()));
    }

    #[test]
    fn integers_honour_bool_columns() {
        assert_eq!(
            sqlite_value_to_variant(Value::Integer(1), VariantType::Bool),
            Variant::Bool(true)
        );
        assert_eq!(
            sqlite_value_to_variant(Value::Integer(7), VariantType::Null),
            Variant::Int64(7)
        );
    }
}
