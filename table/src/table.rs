//! Table handles handed out by a [`Catalog`](crate::catalog::Catalog).

use std::sync::{Arc, Weak};

use tracing::debug;

use crate::catalog::{CatalogState, TableIdent};
use crate::error::{TableError, TableResult};
use crate::metadata::TableMetadata;
use crate::partition::PartitionSpec;
use crate::schema::Schema;
use crate::snapshot::Snapshot;

/// In-memory view of one catalog entry.
///
/// The handle keeps working after its catalog is closed, but anything that
/// has to go back to the catalog then fails with
/// [`TableError::CatalogClosed`].
#[derive(Debug, Clone)]
pub struct Table {
    ident: TableIdent,
    catalog_name: String,
    metadata: Arc<TableMetadata>,
    catalog: Weak<CatalogState>,
}

impl Table {
    pub(crate) fn new(ident: TableIdent, metadata: TableMetadata, catalog: &Arc<CatalogState>) -> Self {
        Self {
            ident,
            catalog_name: catalog.name().to_string(),
            metadata: Arc::new(metadata),
            catalog: Arc::downgrade(catalog),
        }
    }

    pub fn identifier(&self) -> &TableIdent {
        &self.ident
    }

    pub fn name(&self) -> &str {
        &self.ident.name
    }

    pub fn namespace(&self) -> &str {
        &self.ident.namespace
    }

    pub fn catalog_name(&self) -> &str {
        &self.catalog_name
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &Schema {
        &self.metadata.schema
    }

    pub fn partition_spec(&self) -> &PartitionSpec {
        &self.metadata.partition_spec
    }

    pub fn location(&self) -> &str {
        &self.metadata.location
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        self.metadata.current_snapshot()
    }

    pub fn is_catalog_open(&self) -> bool {
        self.catalog.strong_count() > 0
    }

    /// Reload the metadata from the catalog.
    pub async fn refresh(&mut self) -> TableResult<()> {
        let catalog = self
            .catalog
            .upgrade()
            .ok_or_else(|| TableError::CatalogClosed(self.catalog_name.clone()))?;
        let metadata = catalog.load_metadata(&self.ident).await?;
        debug!("Refreshed table {}", self.ident);
        self.metadata = Arc::new(metadata);
        Ok(())
    }
}
