use std::error::Error;

use bytes::BytesMut;
use postgres::types::{IsNull, ToSql, Type, to_sql_checked};

use crate::driver::BindSlot;
use crate::error::SqlBridgeError;
use crate::wire::{TimestampFormat, WireParam, bind_value};

/// A parameter already encoded in the server's binary format.
#[derive(Debug, Clone)]
pub struct WireValue {
    data: Option<Vec<u8>>,
}

impl From<WireParam> for WireValue {
    fn from(param: WireParam) -> Self {
        Self { data: param.data }
    }
}

impl ToSql for WireValue {
    fn to_sql(
        &self,
        _ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match &self.data {
            Some(bytes) => {
                out.extend_from_slice(bytes);
                Ok(IsNull::No)
            }
            None => Ok(IsNull::Yes),
        }
    }

    // The declared statement type already comes from the encoded parameter.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

/// Parameter types and encoded values for one execution, in bind-position order.
#[derive(Debug, Default)]
pub struct Params {
    pub types: Vec<Type>,
    pub values: Vec<WireValue>,
}

impl Params {
    /// Encode every bind slot.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::UnsupportedParameterType` for values with no wire encoding.
    pub fn convert(
        slots: &[BindSlot<'_>],
        timestamps: TimestampFormat,
    ) -> Result<Self, SqlBridgeError> {
        let mut params = Params {
            types: Vec::with_capacity(slots.len()),
            values: Vec::with_capacity(slots.len()),
        };
        for slot in slots {
            let wire = bind_value(slot.name, slot.value, timestamps)?;
            params
                .types
                .push(Type::from_oid(wire.type_oid).unwrap_or(Type::UNKNOWN));
            params.values.push(wire.into());
        }
        Ok(params)
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values
            .iter()
            .map(|v| v as &(dyn ToSql + Sync))
            .collect()
    }
}
