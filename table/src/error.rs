//! Error types for table-format operations.

use skiff_kvstore::KVStoreError;
use thiserror::Error;

use crate::catalog::TableIdent;
use crate::types::PrimitiveType;

/// Errors raised while building schemas and partition specs, and while
/// creating or loading tables through a catalog.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Invalid {kind} identifier '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Field id {0} is negative")]
    NegativeFieldId(i32),

    #[error("Field id {0} is already used in the schema")]
    DuplicateFieldId(i32),

    #[error("Field name '{0}' is already used in the schema")]
    DuplicateFieldName(String),

    #[error("Partition field id {0} is already used in the partition spec")]
    DuplicatePartitionFieldId(i32),

    #[error("Partition field name '{0}' is already used in the partition spec")]
    DuplicatePartitionName(String),

    #[error("Invalid transform: {0}")]
    InvalidTransform(String),

    #[error("Partition field '{partition}' references unknown source field id {source_id}")]
    UnknownSourceField { partition: String, source_id: i32 },

    #[error("Transform {transform} cannot be applied to field '{field}' of type {field_type}")]
    IncompatibleTransform {
        transform: String,
        field: String,
        field_type: PrimitiveType,
    },

    #[error("Partition field id {0} collides with a schema field id")]
    PartitionFieldIdConflict(i32),

    #[error("Table location must not be empty")]
    EmptyLocation,

    #[error("Table {0} already exists")]
    TableAlreadyExists(TableIdent),

    #[error("Table {0} does not exist")]
    TableNotFound(TableIdent),

    #[error("Namespace '{0}' already exists")]
    NamespaceAlreadyExists(String),

    #[error("Namespace '{0}' does not exist")]
    NamespaceNotFound(String),

    #[error("Cannot resolve catalog descriptor '{descriptor}': {reason}")]
    UnresolvableDescriptor { descriptor: String, reason: String },

    #[error("Catalog '{0}' has been closed")]
    CatalogClosed(String),

    #[error("Catalog store error: {0}")]
    Store(#[from] KVStoreError),

    #[error("Table metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for table-format operations
pub type TableResult<T> = Result<T, TableError>;

/// Check that a namespace, table or catalog name is usable as a key component.
pub(crate) fn validate_identifier(kind: &'static str, value: &str) -> TableResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value.trim() != value {
        Some("must not start or end with whitespace")
    } else if value.contains('/') {
        Some("must not contain '/'")
    } else if value.chars().any(char::is_control) {
        Some("must not contain control characters")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(TableError::InvalidIdentifier {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
