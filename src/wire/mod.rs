//! Binary wire codecs shared by the drivers.
//!
//! Every decoder works on a plain byte slice through [`codec::ByteReader`], so field widths and
//! endianness are explicit and testable without a live backend.

pub mod array;
pub mod binding;
pub mod codec;
pub mod datetime;
pub mod numeric;

use crate::error::SqlBridgeError;
use crate::types::{Variant, VariantType};

pub use array::decode_array;
pub use binding::{ParamFormat, WireParam, bind_value};
pub use datetime::TimestampFormat;
pub use numeric::{decode_numeric, encode_numeric};

use codec::ByteReader;

/// Type OIDs of the binary protocol.
pub mod oid {
    pub const BOOL: u32 = 16;
    pub const BYTEA: u32 = 17;
    pub const CHAR: u32 = 18;
    pub const NAME: u32 = 19;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const OID: u32 = 26;
    pub const JSON: u32 = 114;
    pub const FLOAT4: u32 = 700;
    pub const FLOAT8: u32 = 701;
    pub const UNKNOWN: u32 = 705;
    pub const BPCHAR: u32 = 1042;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const TIMESTAMPTZ: u32 = 1184;
    pub const NUMERIC: u32 = 1700;
    pub const UUID: u32 = 2950;
    pub const JSONB: u32 = 3802;

    pub const BOOL_ARRAY: u32 = 1000;
    pub const NAME_ARRAY: u32 = 1003;
    pub const INT2_ARRAY: u32 = 1005;
    pub const INT4_ARRAY: u32 = 1007;
    pub const TEXT_ARRAY: u32 = 1009;
    pub const BPCHAR_ARRAY: u32 = 1014;
    pub const VARCHAR_ARRAY: u32 = 1015;
    pub const INT8_ARRAY: u32 = 1016;
    pub const FLOAT4_ARRAY: u32 = 1021;
    pub const FLOAT8_ARRAY: u32 = 1022;
    pub const TIMESTAMP_ARRAY: u32 = 1115;
    pub const DATE_ARRAY: u32 = 1182;
    pub const TIMESTAMPTZ_ARRAY: u32 = 1185;
    pub const NUMERIC_ARRAY: u32 = 1231;

    #[must_use]
    pub fn is_array(oid: u32) -> bool {
        matches!(
            oid,
            BOOL_ARRAY
                | NAME_ARRAY
                | INT2_ARRAY
                | INT4_ARRAY
                | TEXT_ARRAY
                | BPCHAR_ARRAY
                | VARCHAR_ARRAY
                | INT8_ARRAY
                | FLOAT4_ARRAY
                | FLOAT8_ARRAY
                | TIMESTAMP_ARRAY
                | DATE_ARRAY
                | TIMESTAMPTZ_ARRAY
                | NUMERIC_ARRAY
        )
    }
}

fn utf8(raw: &[u8]) -> Result<String, SqlBridgeError> {
    String::from_utf8(raw.to_vec())
        .map_err(|e| SqlBridgeError::DecodeError(format!("invalid UTF-8 in text column: {e}")))
}

fn exact<'a, T>(
    raw: &'a [u8],
    read: impl FnOnce(&mut ByteReader<'a>) -> Result<T, SqlBridgeError>,
) -> Result<T, SqlBridgeError> {
    let mut reader = ByteReader::new(raw);
    let value = read(&mut reader)?;
    reader.finish()?;
    Ok(value)
}

/// Decode one binary column value by its type OID.
///
/// Types without a dedicated decoder are surfaced as raw `Variant::Buffer` bytes.
///
/// # Errors
/// Returns `SqlBridgeError::DecodeError` if the payload does not match the type's layout.
pub fn decode_value(
    type_oid: u32,
    raw: &[u8],
    timestamps: TimestampFormat,
) -> Result<Variant, SqlBridgeError> {
    let value = match type_oid {
        oid::BOOL => Variant::Bool(exact(raw, ByteReader::read_u8)? != 0),
        oid::INT2 => Variant::Int(i32::from(exact(raw, ByteReader::read_i16)?)),
        oid::INT4 => Variant::Int(exact(raw, ByteReader::read_i32)?),
        oid::INT8 => Variant::Int64(exact(raw, ByteReader::read_i64)?),
        oid::OID => Variant::Int64(i64::from(exact(raw, ByteReader::read_u32)?)),
        oid::FLOAT4 => Variant::Float(f64::from(exact(raw, ByteReader::read_f32)?)),
        oid::FLOAT8 => Variant::Float(exact(raw, ByteReader::read_f64)?),
        oid::NUMERIC => Variant::Money(decode_numeric(raw)?),
        oid::TEXT => Variant::Text(utf8(raw)?),
        oid::VARCHAR | oid::BPCHAR | oid::NAME | oid::CHAR | oid::JSON | oid::UNKNOWN => {
            Variant::String(utf8(raw)?)
        }
        // jsonb carries a one-byte format version in front of the text
        oid::JSONB => match raw.split_first() {
            Some((&1, text)) => Variant::String(utf8(text)?),
            _ => {
                return Err(SqlBridgeError::DecodeError(
                    "unsupported jsonb format version".into(),
                ));
            }
        },
        oid::BYTEA => Variant::Buffer(raw.to_vec()),
        oid::DATE => Variant::Date(datetime::decode_date(raw)?),
        oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            Variant::DateTime(datetime::decode_timestamp(raw, timestamps)?)
        }
        oid::UUID => Variant::String(format_uuid(raw)?),
        other if oid::is_array(other) => Variant::String(decode_array(raw, timestamps)?),
        _ => Variant::Buffer(raw.to_vec()),
    };
    Ok(value)
}

/// Decode a column that may be SQL NULL; a missing payload is always `Variant::Null`.
///
/// # Errors
/// See [`decode_value`].
pub fn decode_column(
    type_oid: u32,
    raw: Option<&[u8]>,
    timestamps: TimestampFormat,
) -> Result<Variant, SqlBridgeError> {
    match raw {
        None => Ok(Variant::Null),
        Some(bytes) => decode_value(type_oid, bytes, timestamps),
    }
}

/// Variant type a column of `type_oid` decodes to.
#[must_use]
pub fn variant_type_for_oid(type_oid: u32) -> VariantType {
    match type_oid {
        oid::BOOL => VariantType::Bool,
        oid::INT2 | oid::INT4 => VariantType::Int,
        oid::INT8 | oid::OID => VariantType::Int64,
        oid::FLOAT4 | oid::FLOAT8 => VariantType::Float,
        oid::NUMERIC => VariantType::Money,
        oid::TEXT => VariantType::Text,
        oid::VARCHAR | oid::BPCHAR | oid::NAME | oid::CHAR | oid::JSON | oid::JSONB
        | oid::UNKNOWN | oid::UUID => VariantType::String,
        oid::DATE => VariantType::Date,
        oid::TIMESTAMP | oid::TIMESTAMPTZ => VariantType::DateTime,
        other if oid::is_array(other) => VariantType::String,
        _ => VariantType::Buffer,
    }
}

fn format_uuid(raw: &[u8]) -> Result<String, SqlBridgeError> {
    if raw.len() != 16 {
        return Err(SqlBridgeError::DecodeError(format!(
            "uuid must be 16 bytes, got {}",
            raw.len()
        )));
    }
    let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
    Ok(format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    ))
}
