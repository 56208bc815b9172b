//! Catalog: a namespaced registry of table metadata kept in a [`KVStore`].
//!
//! Every entry is a JSON document under a key of the form
//! `{catalog}/tables/{namespace}/{table}`; explicitly created namespaces
//! live under `{catalog}/namespaces/{namespace}`. Namespaces are also
//! implied by the tables inside them, so creating a table never needs a
//! second write.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skiff_kvstore::{FileKVStore, KVStore, MemoryKVStore};
use tracing::{debug, info, warn};

use crate::error::{TableError, TableResult, validate_identifier};
use crate::metadata::TableMetadata;
use crate::partition::PartitionSpec;
use crate::schema::Schema;
use crate::table::Table;

pub(crate) type MetadataStore = dyn KVStore<Value = String>;

/// Fully qualified name of a table inside a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdent {
    pub namespace: String,
    pub name: String,
}

impl TableIdent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    fn validate(&self) -> TableResult<()> {
        validate_identifier("namespace", &self.namespace)?;
        validate_identifier("table", &self.name)
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Where the catalog keeps its entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogDescriptor {
    /// Entries live as long as the catalog handle
    Memory,
    /// Entries are persisted to a single file
    File(PathBuf),
}

impl CatalogDescriptor {
    /// Accepts `memory://`, `file://<path>` and bare filesystem paths.
    /// SQL-style `sqlite://` descriptors map onto the same stores: no path
    /// (or `:memory:`) is an in-memory catalog, anything else a file.
    pub fn parse(descriptor: &str) -> TableResult<Self> {
        let unresolvable = |reason: &str| TableError::UnresolvableDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = descriptor.trim();
        if trimmed.is_empty() {
            return Err(unresolvable("descriptor is empty"));
        }

        match trimmed.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "memory" if rest.is_empty() => Ok(Self::Memory),
                "memory" => Err(unresolvable("memory catalogs take no path")),
                "file" if rest.is_empty() => Err(unresolvable("file catalogs need a path")),
                "file" => Ok(Self::File(PathBuf::from(rest))),
                "sqlite" if rest.is_empty() || rest == ":memory:" => Ok(Self::Memory),
                "sqlite" => Ok(Self::File(PathBuf::from(rest))),
                other => Err(unresolvable(&format!("unsupported scheme '{}'", other))),
            },
            None => Ok(Self::File(PathBuf::from(trimmed))),
        }
    }

    async fn open_store(&self) -> TableResult<Arc<MetadataStore>> {
        Ok(match self {
            Self::Memory => Arc::new(MemoryKVStore::<String>::new()),
            Self::File(path) => Arc::new(FileKVStore::<String>::open(path).await?),
        })
    }
}

impl fmt::Display for CatalogDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("memory://"),
            Self::File(path) => write!(f, "file://{}", path.display()),
        }
    }
}

/// Shared by a catalog and, weakly, by the tables it handed out.
pub(crate) struct CatalogState {
    name: String,
    descriptor: CatalogDescriptor,
    store: Arc<MetadataStore>,
}

impl CatalogState {
    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    fn table_key(&self, ident: &TableIdent) -> String {
        format!("{}/tables/{}/{}", self.name, ident.namespace, ident.name)
    }

    fn namespace_key(&self, namespace: &str) -> String {
        format!("{}/namespaces/{}", self.name, namespace)
    }

    fn tables_prefix(&self) -> String {
        format!("{}/tables/", self.name)
    }

    pub(crate) async fn load_metadata(&self, ident: &TableIdent) -> TableResult<TableMetadata> {
        let raw = self
            .store
            .get(&self.table_key(ident))
            .await?
            .ok_or_else(|| TableError::TableNotFound(ident.clone()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn table_idents(&self) -> TableResult<Vec<TableIdent>> {
        let prefix = self.tables_prefix();
        let mut idents: Vec<TableIdent> = self
            .store
            .scan_prefix(&prefix)
            .await?
            .into_iter()
            .filter_map(|(key, _)| {
                let (namespace, name) = key.strip_prefix(&prefix)?.split_once('/')?;
                Some(TableIdent::new(namespace, name))
            })
            .collect();
        idents.sort();
        Ok(idents)
    }

    async fn namespaces(&self) -> TableResult<BTreeSet<String>> {
        let prefix = format!("{}/namespaces/", self.name);
        let mut namespaces: BTreeSet<String> = self
            .store
            .scan_prefix(&prefix)
            .await?
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .collect();
        namespaces.extend(
            self.table_idents()
                .await?
                .into_iter()
                .map(|ident| ident.namespace),
        );
        Ok(namespaces)
    }
}

/// Everything needed to create a table.
#[derive(Debug, Clone)]
pub struct TableCreation {
    pub namespace: String,
    pub name: String,
    pub location: String,
    pub schema: Schema,
    pub partition_spec: PartitionSpec,
    pub properties: BTreeMap<String, String>,
}

impl TableCreation {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        location: impl Into<String>,
        schema: Schema,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            location: location.into(),
            schema,
            partition_spec: PartitionSpec::unpartitioned(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_partition_spec(mut self, partition_spec: PartitionSpec) -> Self {
        self.partition_spec = partition_spec;
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Handle to an open catalog.
///
/// Callers serialize mutating calls; the store underneath is internally
/// locked. Dropping the handle or calling [`Catalog::close`] invalidates
/// catalog-level operations on every [`Table`] created from it.
pub struct Catalog {
    state: Arc<CatalogState>,
}

impl Catalog {
    pub async fn open(descriptor: &str, catalog_name: &str) -> TableResult<Self> {
        validate_identifier("catalog", catalog_name)?;
        let descriptor = CatalogDescriptor::parse(descriptor)?;
        let store = descriptor.open_store().await?;

        info!("Opened catalog '{}' at {}", catalog_name, descriptor);
        Ok(Self {
            state: Arc::new(CatalogState {
                name: catalog_name.to_string(),
                descriptor,
                store,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn descriptor(&self) -> &CatalogDescriptor {
        &self.state.descriptor
    }

    /// Flush pending writes and release the store.
    pub async fn close(self) -> TableResult<()> {
        self.state.store.flush().await?;
        info!("Closed catalog '{}'", self.state.name);
        Ok(())
    }

    pub async fn create_namespace(&self, namespace: &str) -> TableResult<()> {
        validate_identifier("namespace", namespace)?;
        if self.namespace_exists(namespace).await? {
            return Err(TableError::NamespaceAlreadyExists(namespace.to_string()));
        }
        let key = self.state.namespace_key(namespace);
        self.state.store.put(key.clone(), String::new()).await?;
        if let Err(e) = self.state.store.flush().await {
            self.state.store.remove(&key).await?;
            return Err(e.into());
        }
        debug!("Created namespace '{}' in catalog '{}'", namespace, self.state.name);
        Ok(())
    }

    pub async fn namespace_exists(&self, namespace: &str) -> TableResult<bool> {
        Ok(self.state.namespaces().await?.contains(namespace))
    }

    pub async fn list_namespaces(&self) -> TableResult<Vec<String>> {
        Ok(self.state.namespaces().await?.into_iter().collect())
    }

    pub async fn list_tables(&self, namespace: &str) -> TableResult<Vec<TableIdent>> {
        if !self.namespace_exists(namespace).await? {
            return Err(TableError::NamespaceNotFound(namespace.to_string()));
        }
        Ok(self
            .state
            .table_idents()
            .await?
            .into_iter()
            .filter(|ident| ident.namespace == namespace)
            .collect())
    }

    pub async fn table_exists(&self, ident: &TableIdent) -> TableResult<bool> {
        Ok(self.state.store.contains_key(&self.state.table_key(ident)).await?)
    }

    /// Create a table. Every check runs before the single write, so a
    /// rejected creation leaves no entry behind.
    pub async fn create_table(&self, creation: TableCreation) -> TableResult<Table> {
        let ident = TableIdent::new(creation.namespace, creation.name);
        ident.validate()?;

        let metadata = TableMetadata::try_new(
            creation.location,
            creation.schema,
            creation.partition_spec,
            creation.properties,
        )?;

        if self.table_exists(&ident).await? {
            return Err(TableError::TableAlreadyExists(ident));
        }

        let key = self.state.table_key(&ident);
        let document = serde_json::to_string(&metadata)?;
        self.state.store.put(key.clone(), document).await?;
        if let Err(e) = self.state.store.flush().await {
            warn!("Failed to persist table {}: {}", ident, e);
            self.state.store.remove(&key).await?;
            return Err(e.into());
        }

        info!(
            "Created table {} in catalog '{}' at {}",
            ident, self.state.name, metadata.location
        );
        Ok(Table::new(ident, metadata, &self.state))
    }

    pub async fn load_table(&self, ident: &TableIdent) -> TableResult<Table> {
        let metadata = self.state.load_metadata(ident).await?;
        debug!("Loaded table {} from catalog '{}'", ident, self.state.name);
        Ok(Table::new(ident.clone(), metadata, &self.state))
    }

    pub async fn drop_table(&self, ident: &TableIdent) -> TableResult<()> {
        let key = self.state.table_key(ident);
        let Some(document) = self.state.store.remove(&key).await? else {
            return Err(TableError::TableNotFound(ident.clone()));
        };
        if let Err(e) = self.state.store.flush().await {
            warn!("Failed to persist drop of table {}: {}", ident, e);
            self.state.store.put(key, document).await?;
            return Err(e.into());
        }
        info!("Dropped table {} from catalog '{}'", ident, self.state.name);
        Ok(())
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("name", &self.state.name)
            .field("descriptor", &self.state.descriptor)
            .finish()
    }
}
