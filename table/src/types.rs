//! Logical field types of the table format and their Arrow mapping.

use std::collections::HashMap;
use std::fmt;

use arrow::datatypes::{DataType as ArrowDataType, Field as ArrowField};
use serde::{Deserialize, Serialize};

/// Arrow field metadata key carrying the table-format field id.
pub const FIELD_ID_META_KEY: &str = "PARQUET:field_id";

/// Primitive data types a table field can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// 64-bit signed integer
    Long,
    /// 32-bit signed integer
    Int,
    /// Calendar date, stored as days since 1970-01-01
    Date,
}

impl PrimitiveType {
    pub fn to_arrow(self) -> ArrowDataType {
        match self {
            PrimitiveType::Long => ArrowDataType::Int64,
            PrimitiveType::Int => ArrowDataType::Int32,
            PrimitiveType::Date => ArrowDataType::Date32,
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::Long => "long",
            PrimitiveType::Int => "int",
            PrimitiveType::Date => "date",
        };
        f.write_str(name)
    }
}

/// A single schema field: id, name, type and nullability.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestedField {
    pub id: i32,
    pub name: String,
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: PrimitiveType,
}

impl NestedField {
    pub fn new(id: i32, name: impl Into<String>, field_type: PrimitiveType, required: bool) -> Self {
        Self {
            id,
            name: name.into(),
            required,
            field_type,
        }
    }

    /// Arrow field with the id recorded under [`FIELD_ID_META_KEY`].
    pub fn to_arrow(&self) -> ArrowField {
        ArrowField::new(&self.name, self.field_type.to_arrow(), !self.required).with_metadata(
            HashMap::from([(FIELD_ID_META_KEY.to_string(), self.id.to_string())]),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrow_mapping() {
        let field = NestedField::new(4, "date", PrimitiveType::Date, true);
        let arrow = field.to_arrow();
        assert_eq!(arrow.name(), "date");
        assert_eq!(arrow.data_type(), &ArrowDataType::Date32);
        assert!(!arrow.is_nullable());
        assert_eq!(
            arrow.metadata().get(FIELD_ID_META_KEY).map(String::as_str),
            Some("4")
        );

        let optional = NestedField::new(5, "amount", PrimitiveType::Int, false);
        assert!(optional.to_arrow().is_nullable());
        assert_eq!(PrimitiveType::Long.to_arrow(), ArrowDataType::Int64);
    }

    #[test]
    fn test_serde_names() {
        let field = NestedField::new(1, "id", PrimitiveType::Long, true);
        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["type"], "long");
        assert_eq!(json["required"], true);
        let back: NestedField = serde_json::from_value(json).unwrap();
        assert_eq!(back, field);
    }
}
