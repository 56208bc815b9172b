//! Persisted table metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TableError, TableResult};
use crate::partition::{PartitionSpec, UNPARTITIONED_LAST_ASSIGNED_ID};
use crate::schema::Schema;
use crate::snapshot::{Snapshot, now_ms};

pub const FORMAT_VERSION: u8 = 2;

/// Everything a catalog records about one table.
///
/// Construction through [`TableMetadata::try_new`] is the only place where
/// a partition spec is checked against the schema it will partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TableMetadata {
    pub format_version: u8,
    pub table_uuid: Uuid,
    pub location: String,
    pub last_updated_ms: i64,
    pub last_column_id: i32,
    pub schema: Schema,
    pub partition_spec: PartitionSpec,
    pub last_partition_id: i32,
    pub current_snapshot_id: Option<i64>,
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl TableMetadata {
    /// Validate `partition_spec` against `schema` and produce the metadata
    /// of a new table holding a single empty snapshot.
    pub fn try_new(
        location: impl Into<String>,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: BTreeMap<String, String>,
    ) -> TableResult<Self> {
        let location = location.into();
        if location.trim().is_empty() {
            return Err(TableError::EmptyLocation);
        }
        validate_partition_spec(&schema, &partition_spec)?;

        let snapshot = Snapshot::initial();
        Ok(Self {
            format_version: FORMAT_VERSION,
            table_uuid: Uuid::new_v4(),
            location,
            last_updated_ms: snapshot.timestamp_ms.max(now_ms()),
            last_column_id: schema.highest_field_id(),
            last_partition_id: partition_spec
                .highest_field_id()
                .unwrap_or(UNPARTITIONED_LAST_ASSIGNED_ID),
            schema,
            partition_spec,
            current_snapshot_id: Some(snapshot.snapshot_id),
            snapshots: vec![snapshot],
            properties,
        })
    }

    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        let id = self.current_snapshot_id?;
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }

    pub fn snapshot_by_id(&self, id: i64) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.snapshot_id == id)
    }
}

fn validate_partition_spec(schema: &Schema, spec: &PartitionSpec) -> TableResult<()> {
    for field in spec.fields() {
        let source = schema
            .field_by_id(field.source_id)
            .ok_or_else(|| TableError::UnknownSourceField {
                partition: field.name.clone(),
                source_id: field.source_id,
            })?;

        if field.transform.result_type(source.field_type).is_none() {
            return Err(TableError::IncompatibleTransform {
                transform: field.transform.to_string(),
                field: source.name.clone(),
                field_type: source.field_type,
            });
        }

        if schema.field_by_id(field.field_id).is_some() {
            return Err(TableError::PartitionFieldIdConflict(field.field_id));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_long_field(1, "id", true).unwrap();
        builder.add_long_field(2, "customer_id", true).unwrap();
        builder.add_long_field(3, "product_id", true).unwrap();
        builder.add_date_field(4, "date", true).unwrap();
        builder.add_int_field(5, "amount", true).unwrap();
        builder.build()
    }

    #[test]
    fn test_new_metadata() {
        let mut spec = PartitionSpec::builder();
        spec.add_day_field(4, 1000, "day").unwrap();

        let metadata =
            TableMetadata::try_new("/test/orders", orders_schema(), spec.build(), BTreeMap::new())
                .unwrap();
        assert_eq!(metadata.format_version, 2);
        assert_eq!(metadata.last_column_id, 5);
        assert_eq!(metadata.last_partition_id, 1000);
        assert_eq!(metadata.snapshots.len(), 1);
        let current = metadata.current_snapshot().unwrap();
        assert_eq!(current.total_records(), 0);
        assert_eq!(current.total_data_files(), 0);
    }

    #[test]
    fn test_unpartitioned_metadata() {
        let metadata = TableMetadata::try_new(
            "/test/orders",
            orders_schema(),
            PartitionSpec::unpartitioned(),
            BTreeMap::new(),
        )
        .unwrap();
        assert_eq!(metadata.last_partition_id, UNPARTITIONED_LAST_ASSIGNED_ID);
    }

    #[test]
    fn test_dangling_source_id() {
        let mut spec = PartitionSpec::builder();
        spec.add_day_field(42, 1000, "day").unwrap();
        let err = TableMetadata::try_new("/t", orders_schema(), spec.build(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, TableError::UnknownSourceField { source_id: 42, .. }));
    }

    #[test]
    fn test_incompatible_transform() {
        let mut spec = PartitionSpec::builder();
        spec.add_day_field(1, 1000, "day").unwrap();
        let err = TableMetadata::try_new("/t", orders_schema(), spec.build(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, TableError::IncompatibleTransform { .. }));
    }

    #[test]
    fn test_partition_id_conflict_and_empty_location() {
        let mut spec = PartitionSpec::builder();
        spec.add_identity_field(1, 3, "id").unwrap();
        let err = TableMetadata::try_new("/t", orders_schema(), spec.build(), BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, TableError::PartitionFieldIdConflict(3)));

        let err = TableMetadata::try_new(
            "  ",
            orders_schema(),
            PartitionSpec::unpartitioned(),
            BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, TableError::EmptyLocation));
    }

    #[test]
    fn test_metadata_json_round_trip() {
        let mut spec = PartitionSpec::builder();
        spec.add_day_field(4, 1000, "day").unwrap();
        let metadata =
            TableMetadata::try_new("/test/orders", orders_schema(), spec.build(), BTreeMap::new())
                .unwrap();

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains("\"format-version\":2"));
        assert!(json.contains("\"transform\":\"day\""));
        let back: TableMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
    }
}
