//! Query contexts and results.

use std::ffi::{c_char, c_int};
use std::ptr;

use skiff_sql::{QueryContext, QueryResult, SqlConfig};
use tokio::runtime::{Builder, Runtime};

use crate::catalog::SkiffTable;
use crate::error::capture;
use crate::{SKIFF_ERROR, init_logging, status, str_arg};

/// A query context together with the runtime its calls block on.
pub struct SkiffContext {
    runtime: Runtime,
    inner: QueryContext,
}

/// The batches of one query.
pub struct SkiffResult {
    inner: QueryResult,
}

impl SkiffContext {
    fn try_new() -> Result<Self, String> {
        let config = SqlConfig::from_env();
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.target_partitions.max(1))
            .thread_name("skiff-worker")
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to start runtime: {}", e))?;
        let inner = QueryContext::with_config(config).map_err(|e| e.to_string())?;
        Ok(Self { runtime, inner })
    }
}

/// Create a new, empty query context, configured from `SKIFF_*` env vars.
/// Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn skiff_context_new() -> *mut SkiffContext {
    init_logging();
    match capture(SkiffContext::try_new) {
        Some(ctx) => Box::into_raw(Box::new(ctx)),
        None => ptr::null_mut(),
    }
}

/// Free a query context and every source registered in it.
///
/// # Safety
/// `ctx` must be null or a pointer returned by [`skiff_context_new`] that
/// has not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_context_free(ctx: *mut SkiffContext) {
    if !ctx.is_null() {
        drop(unsafe { Box::from_raw(ctx) });
    }
}

/// Register a CSV file with a header row as `table_name`.
///
/// # Safety
/// `ctx` must be a live context; `table_name` and `file_path` must be
/// NUL-terminated strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_register_csv(
    ctx: *mut SkiffContext,
    table_name: *const c_char,
    file_path: *const c_char,
) -> c_int {
    status(capture(|| {
        let ctx = unsafe { ctx.as_ref() }.ok_or("Invalid argument: context is null")?;
        let name = unsafe { str_arg(table_name, "table name") }?;
        let path = unsafe { str_arg(file_path, "file path") }?;
        ctx.runtime
            .block_on(ctx.inner.register_csv(name, path))
            .map_err(|e| e.to_string())
    }))
}

/// Register a catalog table as `table_name`.
///
/// # Safety
/// `ctx` and `table` must be live handles; `table_name` must be a
/// NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_register_table(
    ctx: *mut SkiffContext,
    table_name: *const c_char,
    table: *const SkiffTable,
) -> c_int {
    status(capture(|| {
        let ctx = unsafe { ctx.as_ref() }.ok_or("Invalid argument: context is null")?;
        let name = unsafe { str_arg(table_name, "table name") }?;
        let table = unsafe { table.as_ref() }.ok_or("Invalid argument: table is null")?;
        ctx.runtime
            .block_on(ctx.inner.register_table(name, table.table()))
            .map_err(|e| e.to_string())
    }))
}

/// Run a query. Returns null on failure.
///
/// # Safety
/// `ctx` must be a live context and `sql` a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_sql(ctx: *mut SkiffContext, sql: *const c_char) -> *mut SkiffResult {
    let result = capture(|| {
        let ctx = unsafe { ctx.as_ref() }.ok_or("Invalid argument: context is null")?;
        let sql = unsafe { str_arg(sql, "sql") }?;
        ctx.runtime
            .block_on(ctx.inner.execute(sql))
            .map_err(|e| e.to_string())
    });
    match result {
        Some(inner) => Box::into_raw(Box::new(SkiffResult { inner })),
        None => ptr::null_mut(),
    }
}

/// Number of batches in `result`, or -1 when `result` is null.
///
/// # Safety
/// `result` must be null or a live result.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_result_batch_count(result: *const SkiffResult) -> c_int {
    match unsafe { result.as_ref() } {
        Some(result) => to_c_int(Some(result.inner.batch_count())),
        None => SKIFF_ERROR,
    }
}

/// Rows in batch `batch_index`, or -1 when the index is out of range.
///
/// # Safety
/// `result` must be null or a live result.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_result_batch_num_rows(
    result: *const SkiffResult,
    batch_index: c_int,
) -> c_int {
    let result = unsafe { result.as_ref() };
    to_c_int(batch_at(result, batch_index).and_then(|(r, i)| r.inner.batch_num_rows(i)))
}

/// Columns in batch `batch_index`, or -1 when the index is out of range.
///
/// # Safety
/// `result` must be null or a live result.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_result_batch_num_columns(
    result: *const SkiffResult,
    batch_index: c_int,
) -> c_int {
    let result = unsafe { result.as_ref() };
    to_c_int(batch_at(result, batch_index).and_then(|(r, i)| r.inner.batch_num_columns(i)))
}

/// Print `result` to stdout as a table.
///
/// # Safety
/// `result` must be null or a live result.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_result_print(result: *const SkiffResult) -> c_int {
    status(capture(|| {
        let result = unsafe { result.as_ref() }.ok_or("Invalid argument: result is null")?;
        result.inner.print().map_err(|e| e.to_string())
    }))
}

/// Free a result.
///
/// # Safety
/// `result` must be null or a pointer returned by [`skiff_sql`] that has
/// not been freed yet.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn skiff_result_free(result: *mut SkiffResult) {
    if !result.is_null() {
        drop(unsafe { Box::from_raw(result) });
    }
}

fn batch_at(result: Option<&SkiffResult>, index: c_int) -> Option<(&SkiffResult, usize)> {
    let index = usize::try_from(index).ok()?;
    result.map(|r| (r, index))
}

fn to_c_int(value: Option<usize>) -> c_int {
    value
        .and_then(|v| c_int::try_from(v).ok())
        .unwrap_or(SKIFF_ERROR)
}
