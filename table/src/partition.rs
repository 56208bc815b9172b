//! Partition transforms, partition specs and the spec builder.
//!
//! A partition spec is built without a schema in hand. Whether each
//! partition field's source id exists in the schema, and whether its
//! transform accepts that field's type, is only checked when a table is
//! created from both (see [`crate::metadata::TableMetadata::try_new`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{TableError, TableResult};
use crate::types::PrimitiveType;

/// Partition field ids of a fresh table start after this value.
pub const UNPARTITIONED_LAST_ASSIGNED_ID: i32 = 999;

/// Function deriving a partition value from a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Transform {
    /// Source value, unmodified
    Identity,
    /// Years since 1970
    Year,
    /// Months since 1970-01
    Month,
    /// Days since 1970-01-01
    Day,
    /// Hash of the value modulo N
    Bucket(u32),
    /// Value truncated to a multiple of W
    Truncate(u32),
}

impl Transform {
    /// Type of the partition value produced from a `source` column, or
    /// `None` when the transform does not apply to that type.
    pub fn result_type(&self, source: PrimitiveType) -> Option<PrimitiveType> {
        match (self, source) {
            (Transform::Identity, source) => Some(source),
            (Transform::Year | Transform::Month | Transform::Day, PrimitiveType::Date) => {
                Some(PrimitiveType::Int)
            }
            (Transform::Year | Transform::Month | Transform::Day, _) => None,
            (Transform::Bucket(_), _) => Some(PrimitiveType::Int),
            (Transform::Truncate(_), PrimitiveType::Long | PrimitiveType::Int) => Some(source),
            (Transform::Truncate(_), PrimitiveType::Date) => None,
        }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => f.write_str("identity"),
            Transform::Year => f.write_str("year"),
            Transform::Month => f.write_str("month"),
            Transform::Day => f.write_str("day"),
            Transform::Bucket(n) => write!(f, "bucket[{}]", n),
            Transform::Truncate(w) => write!(f, "truncate[{}]", w),
        }
    }
}

impl FromStr for Transform {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parametrized = |prefix: &str| -> Option<TableResult<u32>> {
            let arg = s.strip_prefix(prefix)?.strip_prefix('[')?.strip_suffix(']')?;
            Some(
                arg.parse::<u32>()
                    .map_err(|_| TableError::InvalidTransform(s.to_string())),
            )
        };

        match s {
            "identity" => Ok(Transform::Identity),
            "year" => Ok(Transform::Year),
            "month" => Ok(Transform::Month),
            "day" => Ok(Transform::Day),
            _ => {
                if let Some(n) = parametrized("bucket") {
                    Ok(Transform::Bucket(n?))
                } else if let Some(w) = parametrized("truncate") {
                    Ok(Transform::Truncate(w?))
                } else {
                    Err(TableError::InvalidTransform(s.to_string()))
                }
            }
        }
    }
}

impl From<Transform> for String {
    fn from(transform: Transform) -> Self {
        transform.to_string()
    }
}

impl TryFrom<String> for Transform {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PartitionField {
    /// Schema field the partition value is derived from
    pub source_id: i32,
    /// Id of the partition field itself
    pub field_id: i32,
    pub name: String,
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "PartitionSpecDocument")]
pub struct PartitionSpec {
    spec_id: i32,
    fields: Vec<PartitionField>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartitionSpecDocument {
    spec_id: i32,
    fields: Vec<PartitionField>,
}

impl TryFrom<PartitionSpecDocument> for PartitionSpec {
    type Error = TableError;

    fn try_from(document: PartitionSpecDocument) -> TableResult<Self> {
        let mut builder = PartitionSpecBuilder::new();
        for field in document.fields {
            builder.add_field(field.source_id, field.field_id, field.transform, field.name)?;
        }
        Ok(PartitionSpec {
            spec_id: document.spec_id,
            ..builder.build()
        })
    }
}

impl PartitionSpec {
    pub fn builder() -> PartitionSpecBuilder {
        PartitionSpecBuilder::new()
    }

    /// The spec of a table that is not partitioned.
    pub fn unpartitioned() -> Self {
        Self {
            spec_id: 0,
            fields: Vec::new(),
        }
    }

    pub fn spec_id(&self) -> i32 {
        self.spec_id
    }

    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn highest_field_id(&self) -> Option<i32> {
        self.fields.iter().map(|f| f.field_id).max()
    }
}

impl Default for PartitionSpec {
    fn default() -> Self {
        Self::unpartitioned()
    }
}

/// Accumulates partition fields. Ids and names must be unique within the
/// spec; source ids are taken on trust until table creation.
#[derive(Debug, Clone, Default)]
pub struct PartitionSpecBuilder {
    fields: Vec<PartitionField>,
}

impl PartitionSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        transform: Transform,
        name: impl Into<String>,
    ) -> TableResult<()> {
        let name = name.into();
        if source_id < 0 {
            return Err(TableError::NegativeFieldId(source_id));
        }
        if field_id < 0 {
            return Err(TableError::NegativeFieldId(field_id));
        }
        if name.is_empty() {
            return Err(TableError::InvalidIdentifier {
                kind: "partition field",
                value: name,
                reason: "must not be empty",
            });
        }
        if let Transform::Bucket(0) | Transform::Truncate(0) = transform {
            return Err(TableError::InvalidTransform(transform.to_string()));
        }
        if self.fields.iter().any(|f| f.field_id == field_id) {
            return Err(TableError::DuplicatePartitionFieldId(field_id));
        }
        if self.fields.iter().any(|f| f.name == name) {
            return Err(TableError::DuplicatePartitionName(name));
        }

        self.fields.push(PartitionField {
            source_id,
            field_id,
            name,
            transform,
        });
        Ok(())
    }

    pub fn add_identity_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Identity, name)
    }

    pub fn add_year_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Year, name)
    }

    pub fn add_month_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Month, name)
    }

    pub fn add_day_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Day, name)
    }

    pub fn add_bucket_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        num_buckets: u32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Bucket(num_buckets), name)
    }

    pub fn add_truncate_field(
        &mut self,
        source_id: i32,
        field_id: i32,
        width: u32,
        name: impl Into<String>,
    ) -> TableResult<()> {
        self.add_field(source_id, field_id, Transform::Truncate(width), name)
    }

    pub fn fields(&self) -> &[PartitionField] {
        &self.fields
    }

    pub fn build(self) -> PartitionSpec {
        PartitionSpec {
            spec_id: 0,
            fields: self.fields,
        }
    }
}
