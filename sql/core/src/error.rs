//! Error types for the SQL engine.

use datafusion::arrow::error::ArrowError;
use datafusion::error::DataFusionError;
use skiff_common::CommonError;
use skiff_table::TableError;
use thiserror::Error;

/// Error types for SQL operations. Each query stage fails with its own
/// variant so callers can tell a typo from a missing table.
#[derive(Error, Debug, Clone)]
pub enum SqlError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Table(s) not found: {}", .0.join(", "))]
    UnresolvedTables(Vec<String>),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Query planning error: {0}")]
    Planning(String),

    #[error("Query execution error: {0}")]
    Execution(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl SqlError {
    /// Classify an error raised while turning a statement into a plan.
    pub(crate) fn planning(err: DataFusionError) -> Self {
        match err.find_root() {
            DataFusionError::SchemaError(..) => SqlError::Resolution(err.to_string()),
            DataFusionError::SQL(..) => SqlError::Parse(err.to_string()),
            _ => SqlError::Planning(err.to_string()),
        }
    }

    /// Classify an error raised while running a physical plan.
    pub(crate) fn execution(err: DataFusionError) -> Self {
        SqlError::Execution(err.to_string())
    }
}

impl From<DataFusionError> for SqlError {
    fn from(err: DataFusionError) -> Self {
        match err.find_root() {
            DataFusionError::SchemaError(..) => SqlError::Resolution(err.to_string()),
            DataFusionError::SQL(..) => SqlError::Parse(err.to_string()),
            DataFusionError::Plan(_) | DataFusionError::NotImplemented(_) => {
                SqlError::Planning(err.to_string())
            }
            DataFusionError::Configuration(_) => SqlError::Configuration(err.to_string()),
            DataFusionError::IoError(_) | DataFusionError::ObjectStore(_) => {
                SqlError::DataSource(err.to_string())
            }
            _ => SqlError::Execution(err.to_string()),
        }
    }
}

impl From<ArrowError> for SqlError {
    fn from(err: ArrowError) -> Self {
        match err {
            ArrowError::IoError(..) | ArrowError::CsvError(_) | ArrowError::ParseError(_) => {
                SqlError::DataSource(err.to_string())
            }
            other => SqlError::Execution(other.to_string()),
        }
    }
}

impl From<TableError> for SqlError {
    fn from(err: TableError) -> Self {
        SqlError::Catalog(err.to_string())
    }
}

impl From<CommonError> for SqlError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::ConfigurationError { .. } => SqlError::Configuration(err.to_string()),
            other => SqlError::Storage(other.to_string()),
        }
    }
}

impl From<SqlError> for DataFusionError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::Planning(msg) => DataFusionError::Plan(msg),
            SqlError::Execution(msg) => DataFusionError::Execution(msg),
            SqlError::Configuration(msg) => DataFusionError::Configuration(msg),
            other => DataFusionError::External(Box::new(other)),
        }
    }
}

/// Result type for SQL operations
pub type SqlResult<T> = Result<T, SqlError>;
