//! Table providers bridging Skiff sources into DataFusion.

pub mod csv;
pub mod table;

pub use csv::{CsvOptions, CsvScanExec, CsvTableProvider};
pub use table::CatalogTableProvider;
