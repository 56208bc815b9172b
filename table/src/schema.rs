//! Table schemas and the builder that assembles them.

use std::sync::Arc;

use arrow::datatypes::{Schema as ArrowSchema, SchemaRef as ArrowSchemaRef};
use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};
use crate::types::{NestedField, PrimitiveType};

/// An ordered, immutable list of uniquely identified fields.
///
/// Field order is the default column order of the table. Schemas are only
/// produced by [`SchemaBuilder::build`], which guarantees that ids and names
/// are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "SchemaDocument")]
pub struct Schema {
    schema_id: i32,
    fields: Vec<NestedField>,
}

/// A schema as stored, before its fields have been checked.
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SchemaDocument {
    schema_id: i32,
    fields: Vec<NestedField>,
}

impl TryFrom<SchemaDocument> for Schema {
    type Error = TableError;

    fn try_from(document: SchemaDocument) -> TableResult<Self> {
        let mut builder = SchemaBuilder::new();
        for field in document.fields {
            builder.add_field(field.id, field.name, field.field_type, field.required)?;
        }
        Ok(Schema {
            schema_id: document.schema_id,
            ..builder.build()
        })
    }
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    pub fn fields(&self) -> &[NestedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_by_id(&self, id: i32) -> Option<&NestedField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_by_name(&self, name: &str) -> Option<&NestedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Highest field id in use, or 0 for an empty schema.
    pub fn highest_field_id(&self) -> i32 {
        self.fields.iter().map(|f| f.id).max().unwrap_or(0)
    }

    /// Arrow schema with the same columns, in the same order.
    pub fn to_arrow_schema(&self) -> ArrowSchemaRef {
        Arc::new(ArrowSchema::new(
            self.fields.iter().map(NestedField::to_arrow).collect::<Vec<_>>(),
        ))
    }
}

/// Append-only accumulator of schema fields.
///
/// A rejected field leaves the builder exactly as it was. Calling
/// [`SchemaBuilder::build`] consumes the builder, so no field can be added
/// once the schema has been handed to a table.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    fields: Vec<NestedField>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field. Fails on a negative id, an empty name, or an id or
    /// name that is already present.
    pub fn add_field(
        &mut self,
        id: i32,
        name: impl Into<String>,
        field_type: PrimitiveType,
        required: bool,
    ) -> TableResult<()> {
        let name = name.into();
        if id < 0 {
            return Err(TableError::NegativeFieldId(id));
        }
        if name.is_empty() {
            return Err(TableError::InvalidIdentifier {
                kind: "field",
                value: name,
                reason: "must not be empty",
            });
        }
        if self.fields.iter().any(|f| f.id == id) {
            return Err(TableError::DuplicateFieldId(id));
        }
        if self.fields.iter().any(|f| f.name == name) {
            return Err(TableError::DuplicateFieldName(name));
        }

        self.fields
            .push(NestedField::new(id, name, field_type, required));
        Ok(())
    }

    pub fn add_long_field(&mut self, id: i32, name: impl Into<String>, required: bool) -> TableResult<()> {
        self.add_field(id, name, PrimitiveType::Long, required)
    }

    pub fn add_int_field(&mut self, id: i32, name: impl Into<String>, required: bool) -> TableResult<()> {
        self.add_field(id, name, PrimitiveType::Int, required)
    }

    pub fn add_date_field(&mut self, id: i32, name: impl Into<String>, required: bool) -> TableResult<()> {
        self.add_field(id, name, PrimitiveType::Date, required)
    }

    pub fn fields(&self) -> &[NestedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn build(self) -> Schema {
        Schema {
            schema_id: 0,
            fields: self.fields,
        }
    }
}
