//! Catalogs, schemas, partition specs and tables.

use std::ffi::{c_char, c_int};
use std::ptr;

use skiff_table::{
    Catalog, PartitionSpecBuilder, PrimitiveType, Schema, SchemaBuilder, Table, TableCreation,
};
use tokio::runtime::{Builder, Runtime};
use tracing::warn;

use crate::error::capture;
use crate::{init_logging, status, str_arg};

/// An open catalog together with the runtime its calls block on.
pub struct SkiffCatalog {
    runtime: Runtime,
    inner: Option<Catalog>,
}

/// A schema under construction, or one already handed to a table.
pub struct SkiffSchema {
    state: SchemaState,
}

enum SchemaState {
    Building(SchemaBuilder),
    Attached(Schema),
}

pub struct SkiffPartitionSpec {
    builder: PartitionSpecBuilder,
}

pub struct SkiffTable {
    inner: Table,
}

impl SkiffTable {
    pub(crate) fn table(&self) -> &Table {
        &self.inner
    }
}

impl SkiffSchema {
    fn add_field(
        &mut self,
        id: c_int,
        name: &str,
        field_type: PrimitiveType,
        required: bool,
    ) -> Result<(), String> {
        match &mut self.state {
            SchemaState::Building(builder) => builder
                .add_field(id, name, field_type, required)
                .map_err(|e| e.to_string()),
            SchemaState::Attached(_) => {
                Err("Schema is attached to a table and can no longer change".to_string())
            }
        }
    }

    /// Freeze the schema once a table uses it.
    fn attach(&mut self) {
        if let SchemaState::Building(builder) = &mut self.state {
            let schema = std::mem::take(builder).build();
            self.state = SchemaState::Attached(schema);
        }
    }

    fn snapshot(&self) -> Schema {
        match &self.state {
            SchemaState::Building(builder) => builder.clone().build(),
            SchemaState::Attached(schema) => schema.clone(),
        }
    }
}

/// Open the catalog `catalog_name` at `descriptor` (`memory://`,
/// `sqlite://[path]`, `file://<path>` or a bare path). Returns null on
/// failure.
///
/// # Safety
/// Both arguments must be NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_catalog_open(
    descriptor: *const c_char,
    catalog_name: *const c_char,
) -> *mut SkiffCatalog {
    init_logging();
    let catalog = capture(|| {
        let descriptor = unsafe { str_arg(descriptor, "descriptor") }?;
        let name = unsafe { str_arg(catalog_name, "catalog name") }?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start runtime: {}", e))?;
        let inner = runtime
            .block_on(Catalog::open(descriptor, name))
            .map_err(|e| e.to_string())?;
        Ok::<_, String>(SkiffCatalog {
            runtime,
            inner: Some(inner),
        })
    });
    match catalog {
        Some(catalog) => Box::into_raw(Box::new(catalog)),
        None => ptr::null_mut(),
    }
}

/// Close and free a catalog. Tables created from it stay readable but can
/// no longer reach it.
///
/// # Safety
/// `catalog` must be null or a pointer returned by [`skiff_catalog_open`]
/// that has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_catalog_free(catalog: *mut SkiffCatalog) {
    if catalog.is_null() {
        return;
    }
    let mut catalog = unsafe { Box::from_raw(catalog) };
    if let Some(inner) = catalog.inner.take() {
        let name = inner.name().to_string();
        if let Err(e) = catalog.runtime.block_on(inner.close()) {
            warn!("Failed to close catalog '{}': {}", name, e);
        }
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn skiff_schema_new() -> *mut SkiffSchema {
    Box::into_raw(Box::new(SkiffSchema {
        state: SchemaState::Building(SchemaBuilder::new()),
    }))
}

unsafe fn add_schema_field(
    schema: *mut SkiffSchema,
    id: c_int,
    name: *const c_char,
    field_type: PrimitiveType,
    required: bool,
) -> c_int {
    status(capture(|| {
        let schema = unsafe { schema.as_mut() }.ok_or("Invalid argument: schema is null")?;
        let name = unsafe { str_arg(name, "field name") }?;
        schema.add_field(id, name, field_type, required)
    }))
}

/// Append a 64-bit integer field.
///
/// # Safety
/// `schema` must be a live schema and `name` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_schema_add_long_field(
    schema: *mut SkiffSchema,
    id: c_int,
    name: *const c_char,
    required: bool,
) -> c_int {
    unsafe { add_schema_field(schema, id, name, PrimitiveType::Long, required) }
}

/// Append a 32-bit integer field.
///
/// # Safety
/// `schema` must be a live schema and `name` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_schema_add_int_field(
    schema: *mut SkiffSchema,
    id: c_int,
    name: *const c_char,
    required: bool,
) -> c_int {
    unsafe { add_schema_field(schema, id, name, PrimitiveType::Int, required) }
}

/// Append a date field.
///
/// # Safety
/// `schema` must be a live schema and `name` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_schema_add_date_field(
    schema: *mut SkiffSchema,
    id: c_int,
    name: *const c_char,
    required: bool,
) -> c_int {
    unsafe { add_schema_field(schema, id, name, PrimitiveType::Date, required) }
}

/// # Safety
/// `schema` must be null or a pointer returned by [`skiff_schema_new`] that
/// has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_schema_free(schema: *mut SkiffSchema) {
    if !schema.is_null() {
        drop(unsafe { Box::from_raw(schema) });
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn skiff_partition_spec_new() -> *mut SkiffPartitionSpec {
    Box::into_raw(Box::new(SkiffPartitionSpec {
        builder: PartitionSpecBuilder::new(),
    }))
}

/// Partition by the day of the date field `source_id`. The source is only
/// checked against a schema when a table is created.
///
/// # Safety
/// `spec` must be a live partition spec and `name` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_partition_spec_add_day_field(
    spec: *mut SkiffPartitionSpec,
    source_id: c_int,
    partition_id: c_int,
    name: *const c_char,
) -> c_int {
    status(capture(|| {
        let spec = unsafe { spec.as_mut() }.ok_or("Invalid argument: partition spec is null")?;
        let name = unsafe { str_arg(name, "partition field name") }?;
        spec.builder
            .add_day_field(source_id, partition_id, name)
            .map_err(|e| e.to_string())
    }))
}

/// # Safety
/// `spec` must be null or a pointer returned by
/// [`skiff_partition_spec_new`] that has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_partition_spec_free(spec: *mut SkiffPartitionSpec) {
    if !spec.is_null() {
        drop(unsafe { Box::from_raw(spec) });
    }
}

/// Create table `namespace.name` at `location` in `catalog`. On success
/// the schema becomes read-only; the schema and spec handles still have to
/// be freed by the caller. Returns null on failure.
///
/// # Safety
/// `schema`, `spec` and `catalog` must be live handles; the strings must be
/// NUL-terminated.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_table_create(
    name: *const c_char,
    location: *const c_char,
    schema: *mut SkiffSchema,
    spec: *const SkiffPartitionSpec,
    catalog: *const SkiffCatalog,
    namespace: *const c_char,
) -> *mut SkiffTable {
    let table = capture(|| {
        let name = unsafe { str_arg(name, "table name") }?;
        let location = unsafe { str_arg(location, "location") }?;
        let namespace = unsafe { str_arg(namespace, "namespace") }?;
        let schema = unsafe { schema.as_mut() }.ok_or("Invalid argument: schema is null")?;
        let spec = unsafe { spec.as_ref() }.ok_or("Invalid argument: partition spec is null")?;
        let catalog = unsafe { catalog.as_ref() }.ok_or("Invalid argument: catalog is null")?;
        let inner = catalog
            .inner
            .as_ref()
            .ok_or("Catalog has been closed")?;

        let creation = TableCreation::new(namespace, name, location, schema.snapshot())
            .with_partition_spec(spec.builder.clone().build());
        let table = catalog
            .runtime
            .block_on(inner.create_table(creation))
            .map_err(|e| e.to_string())?;
        schema.attach();
        Ok::<_, String>(SkiffTable { inner: table })
    });
    match table {
        Some(table) => Box::into_raw(Box::new(table)),
        None => ptr::null_mut(),
    }
}

/// # Safety
/// `table` must be null or a pointer returned by [`skiff_table_create`]
/// that has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_table_free(table: *mut SkiffTable) {
    if !table.is_null() {
        drop(unsafe { Box::from_raw(table) });
    }
}
