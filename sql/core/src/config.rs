//! Configuration for SQL execution.

use std::env;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_BATCH_SIZE: usize = 8192;
pub const DEFAULT_SCHEMA_INFER_MAX_RECORDS: usize = 1000;
pub const DEFAULT_DIALECT: &str = "generic";

/// Configuration for SQL execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlConfig {
    /// Target rows per result batch
    pub batch_size: usize,
    /// Degree of parallelism inside a single query
    pub target_partitions: usize,
    /// Memory pool size in bytes; unbounded when `None`
    pub memory_limit: Option<usize>,
    /// Rows sampled when inferring the schema of a CSV source
    pub schema_infer_max_records: usize,
    pub csv_delimiter: u8,
    /// SQL dialect name understood by the parser, e.g. `generic`, `postgresql`
    pub dialect: String,
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            target_partitions: num_cpus::get(),
            memory_limit: None,
            schema_infer_max_records: DEFAULT_SCHEMA_INFER_MAX_RECORDS,
            csv_delimiter: b',',
            dialect: DEFAULT_DIALECT.to_string(),
        }
    }
}

impl SqlConfig {
    /// Defaults overridden by `SKIFF_*` environment variables. Values that
    /// do not parse, or are zero, keep the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: positive_from_env("SKIFF_BATCH_SIZE").unwrap_or(defaults.batch_size),
            target_partitions: positive_from_env("SKIFF_TARGET_PARTITIONS")
                .unwrap_or(defaults.target_partitions),
            memory_limit: positive_from_env("SKIFF_MEMORY_LIMIT").or(defaults.memory_limit),
            schema_infer_max_records: positive_from_env("SKIFF_SCHEMA_INFER_MAX_RECORDS")
                .unwrap_or(defaults.schema_infer_max_records),
            csv_delimiter: defaults.csv_delimiter,
            dialect: env::var("SKIFF_SQL_DIALECT")
                .ok()
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .unwrap_or(defaults.dialect),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_target_partitions(mut self, target_partitions: usize) -> Self {
        self.target_partitions = target_partitions;
        self
    }

    pub fn with_memory_limit(mut self, memory_limit: usize) -> Self {
        self.memory_limit = Some(memory_limit);
        self
    }

    pub fn with_csv_delimiter(mut self, delimiter: u8) -> Self {
        self.csv_delimiter = delimiter;
        self
    }

    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }
}

fn positive_from_env<T>(key: &str) -> Option<T>
where
    T: FromStr + Default + PartialEq,
{
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) if value != T::default() => Some(value),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive integer", key, raw);
            None
        }
    }
}
