use crate::error::SqlBridgeError;
use crate::types::Variant;

use super::codec::ByteReader;
use super::{TimestampFormat, decode_value};

/// Deepest array the backend can produce.
const MAX_DIMENSIONS: i32 = 6;

/// Render a binary N-dimensional array as brace-delimited text, e.g. `{{1,2},{3,4}}`.
///
/// Layout: `ndim:i32, flags:i32, element_oid:u32`, then `ndim` pairs of
/// `count:i32, lower_bound:i32`, then each element as `len:i32` (`-1` for NULL) and payload.
///
/// # Errors
/// Returns `SqlBridgeError::DecodeError` on malformed headers, short payloads, or element
/// payloads that fail to decode.
pub fn decode_array(raw: &[u8], timestamps: TimestampFormat) -> Result<String, SqlBridgeError> {
    let mut reader = ByteReader::new(raw);
    let ndim = reader.read_i32()?;
    let _has_nulls = reader.read_i32()?;
    let element_oid = reader.read_u32()?;

    if !(0..=MAX_DIMENSIONS).contains(&ndim) {
        return Err(SqlBridgeError::DecodeError(format!(
            "invalid array dimension count {ndim}"
        )));
    }
    if ndim == 0 {
        reader.finish()?;
        return Ok("{}".to_string());
    }

    let mut dims = Vec::with_capacity(ndim as usize);
    for _ in 0..ndim {
        let count = reader.read_i32()?;
        let _lower_bound = reader.read_i32()?;
        let count = usize::try_from(count).map_err(|_| {
            SqlBridgeError::DecodeError(format!("negative array dimension {count}"))
        })?;
        dims.push(count);
    }

    let mut out = String::new();
    render_dimension(&mut reader, &dims, element_oid, timestamps, &mut out)?;
    reader.finish()?;
    Ok(out)
}

fn render_dimension(
    reader: &mut ByteReader<'_>,
    dims: &[usize],
    element_oid: u32,
    timestamps: TimestampFormat,
    out: &mut String,
) -> Result<(), SqlBridgeError> {
    out.push('{');
    for i in 0..dims[0] {
        if i > 0 {
            out.push(',');
        }
        if dims.len() > 1 {
            render_dimension(reader, &dims[1..], element_oid, timestamps, out)?;
        } else {
            render_element(reader, element_oid, timestamps, out)?;
        }
    }
    out.push('}');
    Ok(())
}

fn render_element(
    reader: &mut ByteReader<'_>,
    element_oid: u32,
    timestamps: TimestampFormat,
    out: &mut String,
) -> Result<(), SqlBridgeError> {
    let len = reader.read_i32()?;
    if len == -1 {
        out.push_str("NULL");
        return Ok(());
    }
    let len = usize::try_from(len)
        .map_err(|_| SqlBridgeError::DecodeError(format!("invalid element length {len}")))?;
    let payload = reader.take(len)?;
    match decode_value(element_oid, payload, timestamps)? {
        Variant::Bool(b) => out.push(if b { 't' } else { 'f' }),
        Variant::String(s) | Variant::Text(s) => push_quoted(&s, out),
        Variant::DateTime(dt) => push_quoted(&dt.format("%Y-%m-%d %H:%M:%S%.f").to_string(), out),
        Variant::Buffer(b) => {
            out.push_str("\"\\\\x");
            for byte in b {
                out.push_str(&format!("{byte:02x}"));
            }
            out.push('"');
        }
        other => out.push_str(&other.to_string()),
    }
    Ok(())
}

/// Quote an element the way the backend's text output does when it would be ambiguous.
fn push_quoted(text: &str, out: &mut String) {
    let needs_quotes = text.is_empty()
        || text.eq_ignore_ascii_case("NULL")
        || text
            .chars()
            .any(|c| matches!(c, '{' | '}' | ',' | '"' | '\\') || c.is_whitespace());
    if !needs_quotes {
        out.push_str(text);
        return;
    }
    out.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::oid;

    fn array_payload(element_oid: u32, dims: &[i32], elements: &[Option<Vec<u8>>]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(dims.len() as i32).to_be_bytes());
        let has_null = i32::from(elements.iter().any(Option::is_none));
        raw.extend_from_slice(&has_null.to_be_bytes());
        raw.extend_from_slice(&element_oid.to_be_bytes());
        for count in dims {
            raw.extend_from_slice(&count.to_be_bytes());
            raw.extend_from_slice(&1i32.to_be_bytes());
        }
        for element in elements {
            match element {
                Some(bytes) => {
                    raw.extend_from_slice(&(bytes.len() as i32).to_be_bytes());
                    raw.extend_from_slice(bytes);
                }
                None => raw.extend_from_slice(&(-1i32).to_be_bytes()),
            }
        }
        raw
    }

    fn int4(v: i32) -> Option<Vec<u8>> {
        Some(v.to_be_bytes().to_vec())
    }

    #[test]
    fn one_dimensional_int_array() -> Result<(), SqlBridgeError> {
        let raw = array_payload(oid::INT4, &[3], &[int4(1), int4(2), int4(3)]);
        assert_eq!(decode_array(&raw, TimestampFormat::Integer)?, "{1,2,3}");
        Ok(())
    }

    #[test]
    fn two_dimensional_array_nests_braces() -> Result<(), SqlBridgeError> {
        let raw = array_payload(oid::INT4, &[2, 2], &[int4(1), int4(2), int4(3), int4(4)]);
        assert_eq!(decode_array(&raw, TimestampFormat::Integer)?, "{{1,2},{3,4}}");
        Ok(())
    }

    #[test]
    fn nulls_and_quoted_text() -> Result<(), SqlBridgeError> {
        let raw = array_payload(
            oid::TEXT,
            &[3],
            &[Some(b"plain".to_vec()), None, Some(b"a,b".to_vec())],
        );
        assert_eq!(
            decode_array(&raw, TimestampFormat::Integer)?,
            "{plain,NULL,\"a,b\"}"
        );
        Ok(())
    }

    #[test]
    fn empty_array() -> Result<(), SqlBridgeError> {
        let raw = array_payload(oid::INT4, &[], &[]);
        assert_eq!(decode_array(&raw, TimestampFormat::Integer)?, "{}");
        Ok(())
    }

    #[test]
    fn truncated_element_fails() {
        let mut raw = array_payload(oid::INT4, &[2], &[int4(1), int4(2)]);
        raw.pop();
        assert!(decode_array(&raw, TimestampFormat::Integer).is_err());
    }
}
