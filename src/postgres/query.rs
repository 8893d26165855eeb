use std::error::Error;

use postgres::Row;
use postgres::types::{FromSql, Type};

use crate::error::SqlBridgeError;
use crate::field::{ColumnInfo, Field};
use crate::types::Variant;
use crate::wire::{TimestampFormat, decode_column, variant_type_for_oid};

/// Undecoded binary column bytes; `None` for SQL NULL.
struct RawColumn<'a>(Option<&'a [u8]>);

impl<'a> FromSql<'a> for RawColumn<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawColumn(Some(raw)))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, Box<dyn Error + Sync + Send>> {
        Ok(RawColumn(None))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Column metadata of a prepared statement.
#[must_use]
pub fn describe_columns(columns: &[postgres::Column]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| {
            let oid = col.type_().oid();
            ColumnInfo {
                name: col.name().to_string(),
                native_type: i32::try_from(oid).unwrap_or(i32::MAX),
                variant_type: variant_type_for_oid(oid),
                byte_size: 0,
                scale: 0,
            }
        })
        .collect()
}

/// Decode column `idx` of a row through the binary wire decoders.
///
/// # Errors
/// Returns `SqlBridgeError` if the column is missing or its payload is malformed.
pub fn postgres_extract_value(
    row: &Row,
    idx: usize,
    timestamps: TimestampFormat,
) -> Result<Variant, SqlBridgeError> {
    let oid = row
        .columns()
        .get(idx)
        .map(|c| c.type_().oid())
        .ok_or_else(|| SqlBridgeError::DecodeError(format!("row has no column {idx}")))?;
    let raw: RawColumn<'_> = row.try_get(idx)?;
    decode_column(oid, raw.0, timestamps)
}

/// Load one row into the query's fields.
///
/// # Errors
/// See [`postgres_extract_value`].
pub fn fill_fields(
    row: &Row,
    fields: &mut [Field],
    timestamps: TimestampFormat,
) -> Result<(), SqlBridgeError> {
    for (idx, field) in fields.iter_mut().enumerate() {
        field.set_value(postgres_extract_value(row, idx, timestamps)?);
    }
    Ok(())
}
