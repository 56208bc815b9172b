//! Key-Value Store module for Skiff
//!
//! This module provides the key-value storage abstractions that back
//! the table catalog, together with an in-memory and a file-backed
//! implementation.

pub mod store;
pub mod traits;

pub use store::*;
pub use traits::*;
