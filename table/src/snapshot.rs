//! Table snapshots.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of change that produced a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Summary {
    pub operation: Operation,
    pub total_records: u64,
    pub total_data_files: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, String>,
}

/// State of a table at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Snapshot {
    pub snapshot_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_snapshot_id: Option<i64>,
    pub sequence_number: i64,
    pub timestamp_ms: i64,
    pub summary: Summary,
}

impl Snapshot {
    /// The snapshot every table starts with: no data files, no records.
    pub fn initial() -> Self {
        Self {
            snapshot_id: generate_snapshot_id(),
            parent_snapshot_id: None,
            sequence_number: 0,
            timestamp_ms: now_ms(),
            summary: Summary {
                operation: Operation::Create,
                total_records: 0,
                total_data_files: 0,
                additional: BTreeMap::new(),
            },
        }
    }

    pub fn total_records(&self) -> u64 {
        self.summary.total_records
    }

    pub fn total_data_files(&self) -> u64 {
        self.summary.total_data_files
    }
}

/// Positive random id taken from the low bits of a v4 uuid.
pub(crate) fn generate_snapshot_id() -> i64 {
    let (high, low) = Uuid::new_v4().as_u64_pair();
    let id = ((high ^ low) & (i64::MAX as u64)) as i64;
    // zero is reserved
    id.max(1)
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
