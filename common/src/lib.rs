//! Common utilities and abstractions for the Skiff project.
//!
//! This module provides the shared error type and the resolution of table
//! storage locations onto object store backends.

pub mod error;
pub mod storage;

pub use error::{CommonError, ErrorContext, Result};
pub use storage::{StorageBackend, StorageLocation};
