//! Storage location resolution for table data.
//!
//! A table records its location as a plain string. Before the query engine
//! can read anything under it, the location has to be bridged to an
//! `object_store` backend plus the object path inside that backend. This
//! module owns that translation.

use object_store::{ObjectStore, local::LocalFileSystem, memory::InMemory, path::Path as ObjectPath};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{CommonError, ErrorContext, Result};

/// Schemes that name remote object stores. Skiff carries no transport for them.
const REMOTE_SCHEMES: &[&str] = &["s3", "s3a", "gs", "gcs", "az", "abfs", "abfss", "http", "https"];

/// Storage backend a location resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// In-memory storage for testing and development.
    Memory { bucket: String },
    /// Local filesystem storage.
    LocalFileSystem,
}

impl StorageBackend {
    /// The `scheme://authority` URL identifying this backend, suitable for
    /// object store registration.
    pub fn object_store_url(&self) -> String {
        match self {
            Self::Memory { bucket } => format!("memory://{}", bucket),
            Self::LocalFileSystem => "file://".to_string(),
        }
    }

    /// Build the object store instance for this backend.
    pub fn build(&self) -> Arc<dyn ObjectStore> {
        match self {
            Self::Memory { .. } => Arc::new(InMemory::new()),
            Self::LocalFileSystem => Arc::new(LocalFileSystem::new()),
        }
    }
}

/// A table location resolved to a backend and an object path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLocation {
    raw: String,
    backend: StorageBackend,
    path: ObjectPath,
}

impl StorageLocation {
    /// Resolve `location` into a backend and path.
    ///
    /// Accepted forms are absolute or relative filesystem paths,
    /// `file:///abs/path` and `memory://bucket/path`. Remote schemes and
    /// unknown schemes are rejected, as is a filesystem location that
    /// names an existing regular file.
    pub fn parse(location: &str) -> Result<Self> {
        let trimmed = location.trim();
        if trimmed.is_empty() {
            return Err(CommonError::configuration_error(
                "storage location must not be empty",
            ));
        }

        let (backend, path) = match trimmed.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "file" => {
                    if !rest.starts_with('/') {
                        return Err(CommonError::configuration_error(format!(
                            "file location '{}' must hold an absolute path",
                            location
                        )));
                    }
                    Self::local(PathBuf::from(rest))?
                }
                "memory" => {
                    let (bucket, path) = rest.split_once('/').unwrap_or((rest, ""));
                    (
                        StorageBackend::Memory {
                            bucket: bucket.to_string(),
                        },
                        ObjectPath::from(path),
                    )
                }
                scheme if REMOTE_SCHEMES.contains(&scheme) => {
                    return Err(CommonError::storage_error(format!(
                        "no transport is configured for '{}' locations",
                        scheme
                    )));
                }
                scheme => {
                    return Err(CommonError::configuration_error(format!(
                        "unsupported storage scheme '{}' in location '{}'",
                        scheme, location
                    )));
                }
            },
            None => {
                let path = PathBuf::from(trimmed);
                let path = if path.is_absolute() {
                    path
                } else {
                    std::env::current_dir()
                        .with_io_context(|| "resolving the current directory".to_string())?
                        .join(path)
                };
                Self::local(path)?
            }
        };

        Ok(Self {
            raw: trimmed.to_string(),
            backend,
            path,
        })
    }

    fn local(path: PathBuf) -> Result<(StorageBackend, ObjectPath)> {
        if path.is_file() {
            return Err(CommonError::storage_error(format!(
                "location {} is a regular file, not a table directory",
                path.display()
            )));
        }
        let path = ObjectPath::from(path.to_string_lossy().as_ref());
        Ok((StorageBackend::LocalFileSystem, path))
    }

    /// The location as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Object path of the location inside its backend.
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Shorthand for `self.backend().object_store_url()`.
    pub fn object_store_url(&self) -> String {
        self.backend.object_store_url()
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_resolves_to_local_filesystem() {
        let location = StorageLocation::parse("/test/orders").unwrap();
        assert_eq!(location.backend(), &StorageBackend::LocalFileSystem);
        assert_eq!(location.path().as_ref(), "test/orders");
        assert_eq!(location.object_store_url(), "file://");
        assert_eq!(location.to_string(), "/test/orders");
    }

    #[test]
    fn test_file_url() {
        let location = StorageLocation::parse("file:///warehouse/db/orders").unwrap();
        assert_eq!(location.backend(), &StorageBackend::LocalFileSystem);
        assert_eq!(location.path().as_ref(), "warehouse/db/orders");

        assert!(StorageLocation::parse("file://relative/path").is_err());
    }

    #[test]
    fn test_memory_url() {
        let location = StorageLocation::parse("memory://warehouse/db/orders").unwrap();
        assert_eq!(
            location.backend(),
            &StorageBackend::Memory {
                bucket: "warehouse".to_string()
            }
        );
        assert_eq!(location.path().as_ref(), "db/orders");
        assert_eq!(location.object_store_url(), "memory://warehouse");
    }

    #[test]
    fn test_rejected_locations() {
        assert!(matches!(
            StorageLocation::parse("   "),
            Err(CommonError::ConfigurationError { .. })
        ));
        assert!(matches!(
            StorageLocation::parse("s3://bucket/orders"),
            Err(CommonError::StorageError { .. })
        ));
        assert!(matches!(
            StorageLocation::parse("ftp://host/orders"),
            Err(CommonError::ConfigurationError { .. })
        ));
    }

    #[test]
    fn test_regular_file_is_not_a_table_location() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let result = StorageLocation::parse(file.path().to_str().unwrap());
        assert!(matches!(result, Err(CommonError::StorageError { .. })));
    }
}
