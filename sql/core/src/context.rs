//! Query contexts: the registry of named sources that queries run against.

use std::path::Path;
use std::sync::Arc;

use datafusion::arrow::datatypes::SchemaRef;
use datafusion::catalog::TableProvider;
use datafusion::execution::context::{SessionConfig, SessionContext};
use datafusion::execution::object_store::ObjectStoreUrl;
use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use skiff_common::StorageLocation;
use skiff_table::Table;
use tracing::{debug, info};

use crate::config::SqlConfig;
use crate::error::{SqlError, SqlResult};
use crate::providers::{CatalogTableProvider, CsvOptions, CsvTableProvider};

/// An isolated query session.
///
/// A context starts out empty. Registering sources is the only way to
/// change it; running queries never does. Registering a name that is
/// already taken replaces the previous source.
pub struct QueryContext {
    ctx: SessionContext,
    config: SqlConfig,
}

impl QueryContext {
    /// Create a context with the default configuration.
    pub fn new() -> Self {
        let config = SqlConfig::default();
        let ctx = SessionContext::new_with_config(session_config(&config));
        Self { ctx, config }
    }

    pub fn with_config(config: SqlConfig) -> SqlResult<Self> {
        if config.batch_size == 0 {
            return Err(SqlError::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }

        let mut runtime = RuntimeEnvBuilder::new();
        if let Some(limit) = config.memory_limit {
            runtime = runtime.with_memory_limit(limit, 1.0);
        }
        let runtime = runtime.build_arc().map_err(|e| {
            SqlError::Configuration(format!("Failed to build runtime environment: {}", e))
        })?;

        let ctx = SessionContext::new_with_config_rt(session_config(&config), runtime);
        debug!(
            "Created query context: batch_size={}, target_partitions={}, dialect={}",
            config.batch_size, config.target_partitions, config.dialect
        );
        Ok(Self { ctx, config })
    }

    pub fn config(&self) -> &SqlConfig {
        &self.config
    }

    /// Get the underlying DataFusion session context
    pub fn session_context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Register a CSV file with a header row under `name`.
    pub async fn register_source(&self, name: &str, path: impl AsRef<Path>) -> SqlResult<()> {
        validate_name(name)?;
        let path = path.as_ref();
        let provider = CsvTableProvider::try_new(
            path,
            CsvOptions {
                delimiter: self.config.csv_delimiter,
                batch_size: self.config.batch_size,
                schema_infer_max_records: self.config.schema_infer_max_records,
            },
        )?;
        self.insert(name, Arc::new(provider))?;
        info!("Registered CSV source '{}' from {}", name, path.display());
        Ok(())
    }

    /// Alias of [`QueryContext::register_source`].
    pub async fn register_csv(&self, name: &str, path: impl AsRef<Path>) -> SqlResult<()> {
        self.register_source(name, path).await
    }

    /// Register a catalog table under `name`.
    pub async fn register_table(&self, name: &str, table: &Table) -> SqlResult<()> {
        validate_name(name)?;
        let location = StorageLocation::parse(table.location())?;

        // Scans produce no rows until snapshots track data files, but the
        // location is resolved and its store made available up front so an
        // unreachable location fails at registration.
        let url = ObjectStoreUrl::parse(location.object_store_url())?;
        if self.ctx.runtime_env().object_store(&url).is_err() {
            self.ctx
                .register_object_store(url.as_ref(), location.backend().build());
            debug!("Registered object store {}", url.as_str());
        }

        let provider = CatalogTableProvider::new(table, location);
        self.insert(name, Arc::new(provider))?;
        info!("Registered table {} as '{}'", table.identifier(), name);
        Ok(())
    }

    /// Remove `name`; returns whether it was registered.
    pub fn deregister(&self, name: &str) -> SqlResult<bool> {
        let removed = self.ctx.deregister_table(name)?.is_some();
        if removed {
            debug!("Deregistered '{}'", name);
        }
        Ok(removed)
    }

    /// Names of every registered source, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let options = self.ctx.state().config().options().catalog.clone();
        let mut names = self
            .ctx
            .catalog(&options.default_catalog)
            .and_then(|catalog| catalog.schema(&options.default_schema))
            .map(|schema| schema.table_names())
            .unwrap_or_default();
        names.sort();
        names
    }

    pub async fn table_schema(&self, name: &str) -> SqlResult<SchemaRef> {
        match self.ctx.table_provider(name).await {
            Ok(provider) => Ok(provider.schema()),
            Err(_) => Err(SqlError::UnresolvedTables(vec![name.to_string()])),
        }
    }

    fn insert(&self, name: &str, provider: Arc<dyn TableProvider>) -> SqlResult<()> {
        // The default schema refuses to overwrite, so replace explicitly
        if self.ctx.deregister_table(name)?.is_some() {
            debug!("Replacing existing source '{}'", name);
        }
        self.ctx.register_table(name, provider)?;
        Ok(())
    }
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

fn session_config(config: &SqlConfig) -> SessionConfig {
    // Sources scan as a single partition; round-robin repartitioning would
    // let filters reorder rows.
    let mut session_config = SessionConfig::new()
        .with_batch_size(config.batch_size)
        .with_target_partitions(config.target_partitions)
        .with_round_robin_repartition(false);
    session_config.options_mut().sql_parser.dialect = config.dialect.clone();
    session_config
}

fn validate_name(name: &str) -> SqlResult<()> {
    if name.trim().is_empty() {
        return Err(SqlError::InvalidArgument(
            "table name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_context_starts_empty() {
        let ctx = QueryContext::new();
        assert!(ctx.table_names().is_empty());
        assert!(ctx.session_context().catalog("datafusion").is_some());
    }

    #[tokio::test]
    async fn test_register_and_replace() {
        let ctx = QueryContext::new();
        let first = csv_file("a,b\n1,2\n");
        let second = csv_file("x,y,z\n1,2,3\n");

        ctx.register_source("t", first.path()).await.unwrap();
        assert_eq!(ctx.table_schema("t").await.unwrap().fields().len(), 2);

        ctx.register_csv("t", second.path()).await.unwrap();
        assert_eq!(ctx.table_schema("t").await.unwrap().fields().len(), 3);
        assert_eq!(ctx.table_names(), ["t"]);
    }

    #[tokio::test]
    async fn test_failed_registration_keeps_previous_source() {
        let ctx = QueryContext::new();
        let file = csv_file("a,b\n1,2\n");
        ctx.register_source("t", file.path()).await.unwrap();

        assert!(ctx.register_source("t", "/nonexistent.csv").await.is_err());
        assert_eq!(ctx.table_schema("t").await.unwrap().fields().len(), 2);
    }

    #[tokio::test]
    async fn test_deregister() {
        let ctx = QueryContext::new();
        let file = csv_file("a\n1\n");
        ctx.register_source("t", file.path()).await.unwrap();

        assert!(ctx.deregister("t").unwrap());
        assert!(!ctx.deregister("t").unwrap());
        assert!(matches!(
            ctx.table_schema("t").await,
            Err(SqlError::UnresolvedTables(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let ctx = QueryContext::new();
        let file = csv_file("a\n1\n");
        assert!(matches!(
            ctx.register_source(" ", file.path()).await,
            Err(SqlError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_with_config() {
        let ctx = QueryContext::with_config(SqlConfig::default().with_memory_limit(64 << 20))
            .unwrap();
        assert_eq!(ctx.config().memory_limit, Some(64 << 20));

        assert!(matches!(
            QueryContext::with_config(SqlConfig::default().with_batch_size(0)),
            Err(SqlError::Configuration(_))
        ));
    }
}
