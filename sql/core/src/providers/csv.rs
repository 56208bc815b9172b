//! CSV files exposed as DataFusion tables.
//!
//! The schema is inferred once, at registration, from a bounded sample of
//! rows. The file itself is only read when a plan scanning it executes, so
//! every query sees the file as it is at that moment.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use datafusion::arrow::csv::ReaderBuilder;
use datafusion::arrow::csv::reader::Format;
use datafusion::arrow::datatypes::{Schema, SchemaRef};
use datafusion::arrow::record_batch::{RecordBatch, RecordBatchOptions};
use datafusion::catalog::{Session, TableProvider};
use datafusion::datasource::TableType;
use datafusion::error::DataFusionError;
use datafusion::execution::TaskContext;
use datafusion::logical_expr::{Expr, TableProviderFilterPushDown};
use datafusion::physical_expr::EquivalenceProperties;
use datafusion::physical_plan::execution_plan::{Boundedness, EmissionType};
use datafusion::physical_plan::stream::RecordBatchReceiverStream;
use datafusion::physical_plan::{
    DisplayAs, DisplayFormatType, ExecutionPlan, Partitioning, PlanProperties,
    SendableRecordBatchStream,
};
use tracing::debug;

use crate::error::{SqlError, SqlResult};

/// Parsing options shared by inference and scanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub batch_size: usize,
    pub schema_infer_max_records: usize,
}

/// A CSV file with a header row.
#[derive(Debug)]
pub struct CsvTableProvider {
    path: PathBuf,
    schema: SchemaRef,
    options: CsvOptions,
}

impl CsvTableProvider {
    /// Open `path` and infer its schema. Fails when the file is missing or
    /// unreadable, has no header, or its header names a column twice or
    /// leaves a name empty.
    pub fn try_new(path: impl AsRef<Path>, options: CsvOptions) -> SqlResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            SqlError::DataSource(format!("Cannot open CSV file {}: {}", path.display(), e))
        })?;

        let (schema, sampled) = Format::default()
            .with_header(true)
            .with_delimiter(options.delimiter)
            .infer_schema(BufReader::new(file), Some(options.schema_infer_max_records))
            .map_err(|e| {
                SqlError::DataSource(format!(
                    "Cannot infer schema of CSV file {}: {}",
                    path.display(),
                    e
                ))
            })?;

        validate_header(&path, &schema)?;
        debug!(
            "Inferred {} columns for {} from {} rows",
            schema.fields().len(),
            path.display(),
            sampled
        );

        Ok(Self {
            path,
            schema: Arc::new(schema),
            options,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn validate_header(path: &Path, schema: &Schema) -> SqlResult<()> {
    if schema.fields().is_empty() {
        return Err(SqlError::DataSource(format!(
            "CSV file {} has no header row",
            path.display()
        )));
    }

    let mut seen = HashSet::new();
    for field in schema.fields() {
        let name = field.name();
        if name.trim().is_empty() {
            return Err(SqlError::DataSource(format!(
                "CSV file {} has an empty column name",
                path.display()
            )));
        }
        if !seen.insert(name.as_str()) {
            return Err(SqlError::DataSource(format!(
                "CSV file {} names column '{}' more than once",
                path.display(),
                name
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TableProvider for CsvTableProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn table_type(&self) -> TableType {
        TableType::Base
    }

    async fn scan(
        &self,
        _state: &dyn Session,
        projection: Option<&Vec<usize>>,
        _filters: &[Expr],
        _limit: Option<usize>,
    ) -> datafusion::error::Result<Arc<dyn ExecutionPlan>> {
        let exec = CsvScanExec::try_new(
            self.path.clone(),
            self.schema.clone(),
            projection.cloned(),
            self.options,
        )?;
        Ok(Arc::new(exec))
    }

    fn supports_filters_pushdown(
        &self,
        filters: &[&Expr],
    ) -> datafusion::error::Result<Vec<TableProviderFilterPushDown>> {
        Ok(vec![TableProviderFilterPushDown::Unsupported; filters.len()])
    }
}

/// Reads a CSV file front to back as a single partition.
#[derive(Debug)]
pub struct CsvScanExec {
    path: PathBuf,
    file_schema: SchemaRef,
    projection: Option<Vec<usize>>,
    projected_schema: SchemaRef,
    options: CsvOptions,
    properties: PlanProperties,
}

impl CsvScanExec {
    pub fn try_new(
        path: PathBuf,
        file_schema: SchemaRef,
        projection: Option<Vec<usize>>,
        options: CsvOptions,
    ) -> datafusion::error::Result<Self> {
        let projected_schema = match &projection {
            Some(indices) => Arc::new(file_schema.project(indices)?),
            None => file_schema.clone(),
        };
        let properties = PlanProperties::new(
            EquivalenceProperties::new(projected_schema.clone()),
            Partitioning::UnknownPartitioning(1),
            EmissionType::Incremental,
            Boundedness::Bounded,
        );
        Ok(Self {
            path,
            file_schema,
            projection,
            projected_schema,
            options,
            properties,
        })
    }
}

impl ExecutionPlan for CsvScanExec {
    fn name(&self) -> &str {
        "CsvScanExec"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn schema(&self) -> SchemaRef {
        self.projected_schema.clone()
    }

    fn properties(&self) -> &PlanProperties {
        &self.properties
    }

    fn children(&self) -> Vec<&Arc<dyn ExecutionPlan>> {
        vec![]
    }

    fn with_new_children(
        self: Arc<Self>,
        _children: Vec<Arc<dyn ExecutionPlan>>,
    ) -> datafusion::error::Result<Arc<dyn ExecutionPlan>> {
        Ok(self)
    }

    fn execute(
        &self,
        partition: usize,
        _context: Arc<TaskContext>,
    ) -> datafusion::error::Result<SendableRecordBatchStream> {
        if partition != 0 {
            return Err(DataFusionError::Internal(format!(
                "CsvScanExec has a single partition, got partition {}",
                partition
            )));
        }

        // Zero-column projections (e.g. COUNT(*)) still need row counts, so
        // read the narrowest column and drop it afterwards.
        let count_only = matches!(&self.projection, Some(p) if p.is_empty());
        let read_projection = if count_only {
            Some(vec![0])
        } else {
            self.projection.clone()
        };

        let mut builder = ReaderBuilder::new(self.file_schema.clone())
            .with_header(true)
            .with_delimiter(self.options.delimiter)
            .with_batch_size(self.options.batch_size);
        if let Some(indices) = read_projection {
            builder = builder.with_projection(indices);
        }

        let path = self.path.clone();
        let output_schema = self.projected_schema.clone();
        let mut stream = RecordBatchReceiverStream::builder(self.projected_schema.clone(), 2);
        let tx = stream.tx();
        // The arrow reader is synchronous; keep it off the async workers.
        stream.spawn_blocking(move || {
            let reader = builder.build(File::open(&path)?)?;
            for batch in reader {
                let batch = batch.map_err(DataFusionError::from).and_then(|batch| {
                    if !count_only {
                        return Ok(batch);
                    }
                    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
                    RecordBatch::try_new_with_options(output_schema.clone(), vec![], &options)
                        .map_err(DataFusionError::from)
                });
                let failed = batch.is_err();
                // A closed channel means the consumer stopped early
                if tx.blocking_send(batch).is_err() || failed {
                    break;
                }
            }
            Ok(())
        });
        debug!("Scanning {}", self.path.display());

        Ok(stream.build())
    }
}

impl DisplayAs for CsvScanExec {
    fn fmt_as(&self, _t: DisplayFormatType, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CsvScanExec: path={}", self.path.display())?;
        if let Some(projection) = &self.projection {
            write!(f, ", projection={:?}", projection)?;
        }
        Ok(())
    }
}
