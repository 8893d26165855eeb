use crate::types::{Variant, VariantType};

/// Horizontal alignment hint for presenting a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Column description reported by a driver after execute.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ColumnInfo {
    pub name: String,
    /// Backend type code (a type OID for `PostgreSQL`, a storage class for `SQLite`).
    pub native_type: i32,
    pub variant_type: VariantType,
    pub byte_size: usize,
    pub scale: u8,
}

/// One result column: metadata plus the value of the current row.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    column_index: usize,
    native_type: i32,
    data_type: VariantType,
    byte_size: usize,
    scale: u8,
    display_format: String,
    alignment: Alignment,
    value: Variant,
}

impl Field {
    #[must_use]
    pub fn from_column(column_index: usize, info: ColumnInfo) -> Self {
        let alignment = match info.variant_type {
            VariantType::Int
            | VariantType::Int64
            | VariantType::Float
            | VariantType::Money => Alignment::Right,
            VariantType::Bool => Alignment::Center,
            _ => Alignment::Left,
        };
        Self {
            name: info.name,
            column_index,
            native_type: info.native_type,
            data_type: info.variant_type,
            byte_size: info.byte_size,
            scale: info.scale,
            display_format: String::new(),
            alignment,
            value: Variant::Null,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn column_index(&self) -> usize {
        self.column_index
    }

    #[must_use]
    pub fn native_type(&self) -> i32 {
        self.native_type
    }

    /// Declared type of the column; the current value may be NULL.
    #[must_use]
    pub fn data_type(&self) -> VariantType {
        self.data_type
    }

    #[must_use]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    #[must_use]
    pub fn scale(&self) -> u8 {
        self.scale
    }

    #[must_use]
    pub fn display_format(&self) -> &str {
        &self.display_format
    }

    pub fn set_display_format(&mut self, format: &str) {
        self.display_format = format.to_string();
    }

    #[must_use]
    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        self.alignment = alignment;
    }

    #[must_use]
    pub fn value(&self) -> &Variant {
        &self.value
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn set_value(&mut self, value: Variant) {
        self.value = value;
    }

    /// Value rendered through `display_format` when the column is a date or timestamp.
    #[must_use]
    pub fn to_display_string(&self) -> String {
        if !self.display_format.is_empty() {
            match &self.value {
                Variant::Date(d) => return d.format(&self.display_format).to_string(),
                Variant::DateTime(dt) => return dt.format(&self.display_format).to_string(),
                _ => {}
            }
        }
        self.value.to_string()
    }
}
