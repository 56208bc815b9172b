//! Drives the exported C functions the way a C host would.

use std::ffi::{CStr, CString};
use std::io::Write;
use std::ptr;

use skiff::*;
use tempfile::NamedTempFile;

fn employees_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "id,name,age,department,salary").unwrap();
    writeln!(file, "1,Alice,25,Engineering,75000").unwrap();
    writeln!(file, "2,Bob,30,Sales,65000").unwrap();
    writeln!(file, "3,Carol,35,Engineering,85000").unwrap();
    writeln!(file, "4,David,28,Marketing,60000").unwrap();
    writeln!(file, "5,Eve,32,Sales,70000").unwrap();
    file.flush().unwrap();
    file
}

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn last_error() -> String {
    unsafe { CStr::from_ptr(skiff_get_last_error()) }
        .to_string_lossy()
        .into_owned()
}

/// Total rows over every batch of `result`.
unsafe fn total_rows(result: *const SkiffResult) -> i32 {
    let batches = unsafe { skiff_result_batch_count(result) };
    (0..batches)
        .map(|i| unsafe { skiff_result_batch_num_rows(result, i) })
        .sum()
}

/// A context with the employees fixture registered as `employees`.
fn employees_context(file: &NamedTempFile) -> *mut SkiffContext {
    let ctx = skiff_context_new();
    assert!(!ctx.is_null());
    let path = c(file.path().to_str().unwrap());
    let rc = unsafe { skiff_register_csv(ctx, c("employees").as_ptr(), path.as_ptr()) };
    assert_eq!(rc, SKIFF_OK, "{}", last_error());
    ctx
}

#[test]
fn test_select_all() {
    let file = employees_csv();
    let ctx = employees_context(&file);
    unsafe {
        let result = skiff_sql(ctx, c("SELECT * FROM employees").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(total_rows(result), 5);
        for i in 0..skiff_result_batch_count(result) {
            assert_eq!(skiff_result_batch_num_columns(result, i), 5);
        }
        skiff_result_free(result);
        skiff_context_free(ctx);
    }
}

#[test]
fn test_filter_and_count() {
    let file = employees_csv();
    let ctx = employees_context(&file);
    unsafe {
        let result = skiff_sql(ctx, c("SELECT * FROM employees WHERE age > 30").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(total_rows(result), 2);
        skiff_result_free(result);

        let result = skiff_sql(ctx, c("SELECT COUNT(*) FROM employees").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(skiff_result_batch_count(result), 1);
        assert_eq!(skiff_result_batch_num_rows(result, 0), 1);
        assert_eq!(skiff_result_batch_num_columns(result, 0), 1);
        skiff_result_free(result);
        skiff_context_free(ctx);
    }
}

#[test]
fn test_order_by_and_print() {
    let file = employees_csv();
    let ctx = employees_context(&file);
    unsafe {
        let result = skiff_sql(
            ctx,
            c("SELECT name, salary FROM employees ORDER BY salary DESC").as_ptr(),
        );
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(total_rows(result), 5);
        assert_eq!(skiff_result_print(result), SKIFF_OK);
        skiff_result_free(result);
        skiff_context_free(ctx);
    }
}

#[test]
fn test_unknown_table_sets_last_error() {
    let file = employees_csv();
    let ctx = employees_context(&file);
    unsafe {
        skiff_clear_last_error();
        let result = skiff_sql(ctx, c("SELECT * FROM nonexistent_table").as_ptr());
        assert!(result.is_null());
        assert!(last_error().contains("nonexistent_table"));

        skiff_clear_last_error();
        assert_eq!(last_error(), "");
        skiff_context_free(ctx);
    }
}

#[test]
fn test_missing_csv_fails() {
    let ctx = skiff_context_new();
    unsafe {
        let rc = skiff_register_csv(
            ctx,
            c("employees").as_ptr(),
            c("/nonexistent/file.csv").as_ptr(),
        );
        assert_eq!(rc, SKIFF_ERROR);
        assert!(!last_error().is_empty());

        let result = skiff_sql(ctx, c("SELECT * FROM employees").as_ptr());
        assert!(result.is_null());
        skiff_context_free(ctx);
    }
}

#[test]
fn test_out_of_range_batch_index() {
    let file = employees_csv();
    let ctx = employees_context(&file);
    unsafe {
        let result = skiff_sql(ctx, c("SELECT COUNT(*) FROM employees").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(skiff_result_batch_num_rows(result, 1), SKIFF_ERROR);
        assert_eq!(skiff_result_batch_num_rows(result, -1), SKIFF_ERROR);
        assert_eq!(skiff_result_batch_num_columns(result, 7), SKIFF_ERROR);
        skiff_result_free(result);
        skiff_context_free(ctx);
    }
}

#[test]
fn test_null_arguments() {
    unsafe {
        assert_eq!(skiff_result_batch_count(ptr::null()), SKIFF_ERROR);
        assert_eq!(skiff_result_batch_num_rows(ptr::null(), 0), SKIFF_ERROR);
        assert_eq!(skiff_result_print(ptr::null()), SKIFF_ERROR);

        let rc = skiff_register_csv(ptr::null_mut(), c("t").as_ptr(), c("/tmp/t.csv").as_ptr());
        assert_eq!(rc, SKIFF_ERROR);
        assert!(last_error().contains("context is null"));

        let ctx = skiff_context_new();
        assert!(skiff_sql(ctx, ptr::null()).is_null());
        assert!(last_error().contains("sql is null"));
        assert_eq!(
            skiff_register_table(ctx, c("t").as_ptr(), ptr::null()),
            SKIFF_ERROR
        );

        // Freeing null is a no-op
        skiff_result_free(ptr::null_mut());
        skiff_context_free(ptr::null_mut());
        skiff_catalog_free(ptr::null_mut());
        skiff_schema_free(ptr::null_mut());
        skiff_partition_spec_free(ptr::null_mut());
        skiff_table_free(ptr::null_mut());
        skiff_context_free(ctx);
    }
}

#[test]
fn test_repeated_lifecycle() {
    let file = employees_csv();
    let path = c(file.path().to_str().unwrap());
    let name = c("employees");
    let sql = c("SELECT * FROM employees WHERE age > 30");
    for _ in 0..1000 {
        unsafe {
            let ctx = skiff_context_new();
            assert!(!ctx.is_null());
            assert_eq!(skiff_register_csv(ctx, name.as_ptr(), path.as_ptr()), SKIFF_OK);
            let result = skiff_sql(ctx, sql.as_ptr());
            assert!(!result.is_null());
            assert_eq!(total_rows(result), 2);
            skiff_result_free(result);
            skiff_context_free(ctx);
        }
    }
}

/// The orders schema: id, customer_id, product_id, date, amount.
unsafe fn orders_schema() -> *mut SkiffSchema {
    let schema = skiff_schema_new();
    unsafe {
        assert_eq!(skiff_schema_add_long_field(schema, 1, c("id").as_ptr(), true), SKIFF_OK);
        assert_eq!(
            skiff_schema_add_long_field(schema, 2, c("customer_id").as_ptr(), true),
            SKIFF_OK
        );
        assert_eq!(
            skiff_schema_add_long_field(schema, 3, c("product_id").as_ptr(), true),
            SKIFF_OK
        );
        assert_eq!(skiff_schema_add_date_field(schema, 4, c("date").as_ptr(), true), SKIFF_OK);
        assert_eq!(skiff_schema_add_int_field(schema, 5, c("amount").as_ptr(), true), SKIFF_OK);
    }
    schema
}

#[test]
fn test_catalog_table_flow() {
    unsafe {
        let catalog = skiff_catalog_open(c("memory://").as_ptr(), c("test").as_ptr());
        assert!(!catalog.is_null(), "{}", last_error());

        let schema = orders_schema();
        let spec = skiff_partition_spec_new();
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 4, 1000, c("day").as_ptr()),
            SKIFF_OK
        );

        let table = skiff_table_create(
            c("orders").as_ptr(),
            c("/test/orders").as_ptr(),
            schema,
            spec,
            catalog,
            c("test").as_ptr(),
        );
        assert!(!table.is_null(), "{}", last_error());
        skiff_schema_free(schema);
        skiff_partition_spec_free(spec);

        let ctx = skiff_context_new();
        assert_eq!(
            skiff_register_table(ctx, c("orders").as_ptr(), table),
            SKIFF_OK,
            "{}",
            last_error()
        );
        let result = skiff_sql(ctx, c("SELECT COUNT(*) FROM orders").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(skiff_result_batch_num_rows(result, 0), 1);
        skiff_result_free(result);

        // The table outlives its catalog
        skiff_catalog_free(catalog);
        let result = skiff_sql(ctx, c("SELECT * FROM orders").as_ptr());
        assert!(!result.is_null(), "{}", last_error());
        assert_eq!(skiff_result_batch_count(result), 0);
        skiff_result_free(result);

        skiff_context_free(ctx);
        skiff_table_free(table);
    }
}

#[test]
fn test_duplicate_table_fails() {
    unsafe {
        let catalog = skiff_catalog_open(c("memory://").as_ptr(), c("test").as_ptr());
        let schema = orders_schema();
        let spec = skiff_partition_spec_new();
        let create = || {
            skiff_table_create(
                c("orders").as_ptr(),
                c("/test/orders").as_ptr(),
                schema,
                spec,
                catalog,
                c("test").as_ptr(),
            )
        };

        let first = create();
        assert!(!first.is_null(), "{}", last_error());
        let second = create();
        assert!(second.is_null());
        assert!(last_error().contains("already exists"), "{}", last_error());

        skiff_table_free(first);
        skiff_schema_free(schema);
        skiff_partition_spec_free(spec);
        skiff_catalog_free(catalog);
    }
}

#[test]
fn test_dangling_partition_source_fails() {
    unsafe {
        let catalog = skiff_catalog_open(c("memory://").as_ptr(), c("test").as_ptr());
        let schema = orders_schema();
        let spec = skiff_partition_spec_new();
        // Accepted here, rejected once a schema is known
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 99, 1000, c("day").as_ptr()),
            SKIFF_OK
        );

        let table = skiff_table_create(
            c("orders").as_ptr(),
            c("/test/orders").as_ptr(),
            schema,
            spec,
            catalog,
            c("test").as_ptr(),
        );
        assert!(table.is_null());
        assert!(!last_error().is_empty());

        // A failed creation leaves the schema open for changes
        assert_eq!(skiff_schema_add_long_field(schema, 6, c("extra").as_ptr(), false), SKIFF_OK);

        skiff_schema_free(schema);
        skiff_partition_spec_free(spec);
        skiff_catalog_free(catalog);
    }
}

#[test]
fn test_schema_rules() {
    unsafe {
        let schema = skiff_schema_new();
        assert_eq!(skiff_schema_add_long_field(schema, 1, c("id").as_ptr(), true), SKIFF_OK);
        assert_eq!(
            skiff_schema_add_long_field(schema, 1, c("other").as_ptr(), true),
            SKIFF_ERROR
        );
        assert_eq!(skiff_schema_add_int_field(schema, 2, c("id").as_ptr(), true), SKIFF_ERROR);

        let catalog = skiff_catalog_open(c("memory://").as_ptr(), c("test").as_ptr());
        let spec = skiff_partition_spec_new();
        let table = skiff_table_create(
            c("items").as_ptr(),
            c("/test/items").as_ptr(),
            schema,
            spec,
            catalog,
            c("test").as_ptr(),
        );
        assert!(!table.is_null(), "{}", last_error());

        assert_eq!(skiff_schema_add_int_field(schema, 2, c("qty").as_ptr(), true), SKIFF_ERROR);
        assert!(last_error().contains("attached"));

        skiff_table_free(table);
        skiff_schema_free(schema);
        skiff_partition_spec_free(spec);
        skiff_catalog_free(catalog);
    }
}

#[test]
fn test_partition_spec_rules() {
    unsafe {
        let spec = skiff_partition_spec_new();
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 4, 1000, c("day").as_ptr()),
            SKIFF_OK
        );
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 4, 1000, c("day2").as_ptr()),
            SKIFF_ERROR
        );
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 4, 1001, c("day").as_ptr()),
            SKIFF_ERROR
        );
        skiff_partition_spec_free(spec);
    }
}

#[test]
fn test_catalog_descriptors() {
    unsafe {
        let catalog = skiff_catalog_open(c("sqlite://").as_ptr(), c("test").as_ptr());
        assert!(!catalog.is_null(), "{}", last_error());

        let schema = orders_schema();
        let spec = skiff_partition_spec_new();
        assert_eq!(
            skiff_partition_spec_add_day_field(spec, 4, 1000, c("day").as_ptr()),
            SKIFF_OK
        );
        let table = skiff_table_create(
            c("orders").as_ptr(),
            c("/test/orders").as_ptr(),
            schema,
            spec,
            catalog,
            c("test").as_ptr(),
        );
        assert!(!table.is_null(), "{}", last_error());
        skiff_table_free(table);
        skiff_schema_free(schema);
        skiff_partition_spec_free(spec);
        skiff_catalog_free(catalog);

        let catalog = skiff_catalog_open(c("redis://host").as_ptr(), c("test").as_ptr());
        assert!(catalog.is_null());
        assert!(last_error().contains("redis"), "{}", last_error());
    }
}
