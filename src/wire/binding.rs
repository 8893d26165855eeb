use crate::error::SqlBridgeError;
use crate::types::Variant;

use super::datetime::{TimestampFormat, encode_date, encode_timestamp};
use super::numeric::encode_numeric;
use super::oid;

/// Wire format code of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamFormat {
    Text,
    Binary,
}

/// One parameter resolved to its wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireParam {
    pub type_oid: u32,
    pub format: ParamFormat,
    /// `None` is the zero-length null marker.
    pub data: Option<Vec<u8>>,
}

impl WireParam {
    #[must_use]
    pub fn null() -> Self {
        Self {
            type_oid: oid::UNKNOWN,
            format: ParamFormat::Binary,
            data: None,
        }
    }

    #[must_use]
    pub fn byte_length(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }
}

fn binary(type_oid: u32, data: Vec<u8>) -> WireParam {
    WireParam {
        type_oid,
        format: ParamFormat::Binary,
        data: Some(data),
    }
}

/// Resolve a parameter value to `{type, format, bytes}`.
///
/// NULL always binds as the null marker whatever the declared type; strings travel in text
/// format, everything else in the binary layout of its wire type.
///
/// # Errors
/// Returns `SqlBridgeError::UnsupportedParameterType` naming the parameter for values that
/// have no wire representation.
pub fn bind_value(
    name: &str,
    value: &Variant,
    timestamps: TimestampFormat,
) -> Result<WireParam, SqlBridgeError> {
    let param = match value {
        Variant::Null => WireParam::null(),
        Variant::Bool(b) => binary(oid::BOOL, vec![u8::from(*b)]),
        Variant::Int(i) => binary(oid::INT4, i.to_be_bytes().to_vec()),
        Variant::Int64(i) => binary(oid::INT8, i.to_be_bytes().to_vec()),
        Variant::Float(f) => binary(oid::FLOAT8, f.to_be_bytes().to_vec()),
        Variant::Money(m) => binary(oid::NUMERIC, encode_numeric(*m)),
        Variant::String(s) => WireParam {
            type_oid: oid::VARCHAR,
            format: ParamFormat::Text,
            data: Some(s.as_bytes().to_vec()),
        },
        Variant::Text(s) => WireParam {
            type_oid: oid::TEXT,
            format: ParamFormat::Text,
            data: Some(s.as_bytes().to_vec()),
        },
        Variant::Buffer(b) => binary(oid::BYTEA, b.clone()),
        Variant::Date(d) => binary(oid::DATE, encode_date(*d)),
        Variant::DateTime(dt) => binary(oid::TIMESTAMP, encode_timestamp(*dt, timestamps)),
        Variant::ImageRef(_) => {
            return Err(SqlBridgeError::UnsupportedParameterType {
                name: name.to_string(),
                type_name: value.variant_type().to_string(),
            });
        }
    };
    Ok(param)
}
