//! Skiff SQL Core module
//!
//! This module provides the query context, the staged SQL planner and
//! executor, and the table providers that expose CSV files and catalog
//! tables to DataFusion.

pub mod config;
pub mod context;
pub mod error;
pub mod planner;
pub mod providers;
pub mod result;


pub use config::SqlConfig;
pub use context::QueryContext;
pub use error::{SqlError, SqlResult};
pub use providers::{CatalogTableProvider, CsvTableProvider};
pub use result::QueryResult;
