//! Catalog tables exposed as DataFusion tables.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::catalog::{Session, TableProvider};
use datafusion::datasource::TableType;
use datafusion::logical_expr::Expr;
use datafusion::physical_plan::ExecutionPlan;
use datafusion::physical_plan::empty::EmptyExec;
use skiff_common::StorageLocation;
use skiff_table::{Table, TableIdent};

/// A structured table registered from a catalog.
///
/// The provider captures the table as it was at registration. Its columns
/// are the schema fields in order. Snapshots of tables created here carry no
/// data files, so every scan produces zero rows of the right shape.
///
/// The resolved location and snapshot id are not read by scans yet. They
/// are what a scan over the snapshot's data files will start from.
#[derive(Debug)]
pub struct CatalogTableProvider {
    ident: TableIdent,
    location: StorageLocation,
    schema: SchemaRef,
    snapshot_id: Option<i64>,
}

impl CatalogTableProvider {
    pub fn new(table: &Table, location: StorageLocation) -> Self {
        Self {
            ident: table.identifier().clone(),
            location,
            schema: table.schema().to_arrow_schema(),
            snapshot_id: table.current_snapshot().map(|s| s.snapshot_id),
        }
    }

    pub fn identifier(&self) -> &TableIdent {
        &self.ident
    }

    pub fn location(&self) -> &StorageLocation {
        &self.location
    }

    pub fn snapshot_id(&self) -> Option<i64> {
        self.snapshot_id
    }
}

#[async_trait]
impl TableProvider for CatalogTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        _limit: Option<usize>,
    ) -> datafusion::error::Result<Arc<dyn ExecutionPlan>> {
        let schema = match projection {
            Some(indices) => Arc::new(self.schema.project(indices)?),
            None => self.schema.clone(),
        };
        Ok(Arc::new(EmptyExec::new(schema)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skiff_table::{Catalog, PartitionSpec, Schema, TableCreation};

    #[tokio::test]
    async fn test_provider_mirrors_table_schema() {
        let catalog = Catalog::open("memory://", "test").await.unwrap();
        let mut schema = Schema::builder();
        schema.add_long_field(1, "id", true).unwrap();
        schema.add_date_field(2, "date", true).unwrap();
        let mut spec = PartitionSpec::builder();
        spec.add_day_field(2, 1000, "day").unwrap();
        let table = catalog
            .create_table(
                TableCreation::new("test", "events", "/test/events", schema.build())
                    .with_partition_spec(spec.build()),
            )
            .await
            .unwrap();

        let location = StorageLocation::parse(table.location()).unwrap();
        let provider = CatalogTableProvider::new(&table, location);
        assert_eq!(provider.schema().fields().len(), 2);
        assert_eq!(provider.schema().field(1).name(), "date");
        assert_eq!(provider.identifier().to_string(), "test.events");
        assert_eq!(
            provider.snapshot_id(),
            table.current_snapshot().map(|s| s.snapshot_id)
        );
        assert_eq!(provider.location().as_str(), "/test/events");
    }
}
