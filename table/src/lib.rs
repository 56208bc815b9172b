//! Table-format layer for Skiff
//!
//! Schemas, partition specs, table metadata and the catalog that stores
//! them. Tables created here are what the SQL engine registers as
//! structured sources.

pub mod catalog;
pub mod error;
pub mod metadata;
pub mod partition;
pub mod schema;
pub mod snapshot;
pub mod table;
pub mod types;

pub use catalog::{Catalog, CatalogDescriptor, TableCreation, TableIdent};
pub use error::{TableError, TableResult};
pub use metadata::TableMetadata;
pub use partition::{PartitionField, PartitionSpec, PartitionSpecBuilder, Transform};
pub use schema::{Schema, SchemaBuilder};
pub use snapshot::Snapshot;
pub use table::Table;
pub use types::{NestedField, PrimitiveType};
