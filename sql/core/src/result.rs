//! Query results.

use datafusion::arrow::compute::concat_batches;
use datafusion::arrow::datatypes::SchemaRef;
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::arrow::util::pretty::pretty_format_batches;

use crate::error::SqlResult;

/// The batches produced by one query, in emission order.
///
/// Empty batches never appear here, so a query that matched no rows has a
/// `batch_count()` of zero.
#[derive(Debug, Clone)]
pub struct QueryResult {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl QueryResult {
    /// Drop empty batches and merge neighbours up to `batch_size` rows.
    /// Batches already larger than `batch_size` are kept whole.
    pub(crate) fn try_new(
        schema: SchemaRef,
        batches: Vec<RecordBatch>,
        batch_size: usize,
    ) -> SqlResult<Self> {
        let mut coalesced = Vec::with_capacity(batches.len());
        let mut pending: Vec<RecordBatch> = Vec::new();
        let mut pending_rows = 0;

        for batch in batches.into_iter().filter(|b| b.num_rows() > 0) {
            if !pending.is_empty() && pending_rows + batch.num_rows() > batch_size {
                coalesced.push(merge(&schema, &mut pending)?);
                pending_rows = 0;
            }
            pending_rows += batch.num_rows();
            pending.push(batch);
        }
        if !pending.is_empty() {
            coalesced.push(merge(&schema, &mut pending)?);
        }

        Ok(Self {
            schema,
            batches: coalesced,
        })
    }

    pub fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    pub fn batches(&self) -> &[RecordBatch] {
        &self.batches
    }

    pub fn into_batches(self) -> Vec<RecordBatch> {
        self.batches
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn batch(&self, index: usize) -> Option<&RecordBatch> {
        self.batches.get(index)
    }

    /// Rows in batch `index`, or `None` when out of range.
    pub fn batch_num_rows(&self, index: usize) -> Option<usize> {
        self.batch(index).map(RecordBatch::num_rows)
    }

    /// Columns in batch `index`, or `None` when out of range.
    pub fn batch_num_columns(&self, index: usize) -> Option<usize> {
        self.batch(index).map(RecordBatch::num_columns)
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }

    pub fn num_columns(&self) -> usize {
        self.schema.fields().len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Render all rows as an ASCII table. A result without rows still
    /// shows its header.
    pub fn pretty_format(&self) -> SqlResult<String> {
        let table = if self.batches.is_empty() {
            pretty_format_batches(&[RecordBatch::new_empty(self.schema.clone())])?
        } else {
            pretty_format_batches(&self.batches)?
        };
        Ok(table.to_string())
    }

    /// Write [`QueryResult::pretty_format`] to stdout.
    pub fn print(&self) -> SqlResult<()> {
        println!("{}", self.pretty_format()?);
        Ok(())
    }
}

fn merge(schema: &SchemaRef, pending: &mut Vec<RecordBatch>) -> SqlResult<RecordBatch> {
    let batch = if pending.len() == 1 {
        pending.remove(0)
    } else {
        concat_batches(schema, pending.iter())?
    };
    pending.clear();
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use datafusion::arrow::array::{Int32Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int32, false),
            Field::new("name", DataType::Utf8, false),
        ]))
    }

    fn batch(ids: &[i32]) -> RecordBatch {
        let names: Vec<String> = ids.iter().map(|i| format!("n{}", i)).collect();
        RecordBatch::try_new(
            schema(),
            vec![
                Arc::new(Int32Array::from(ids.to_vec())),
                Arc::new(StringArray::from(names)),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_batches_are_dropped() {
        let result =
            QueryResult::try_new(schema(), vec![batch(&[]), batch(&[1, 2]), batch(&[])], 8192)
                .unwrap();
        assert_eq!(result.batch_count(), 1);
        assert_eq!(result.num_rows(), 2);

        let empty = QueryResult::try_new(schema(), vec![batch(&[])], 8192).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.batch_count(), 0);
        assert_eq!(empty.num_columns(), 2);
    }

    #[test]
    fn test_coalescing_keeps_order() {
        let result = QueryResult::try_new(
            schema(),
            vec![batch(&[1]), batch(&[2, 3]), batch(&[4]), batch(&[5, 6, 7])],
            3,
        )
        .unwrap();
        let sizes: Vec<_> = (0..result.batch_count())
            .map(|i| result.batch_num_rows(i).unwrap())
            .collect();
        assert_eq!(sizes, [3, 1, 3]);

        let ids: Vec<i32> = result
            .batches()
            .iter()
            .flat_map(|b| {
                b.column(0)
                    .as_any()
                    .downcast_ref::<Int32Array>()
                    .unwrap()
                    .values()
                    .to_vec()
            })
            .collect();
        assert_eq!(ids, [1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_out_of_range_batch() {
        let result = QueryResult::try_new(schema(), vec![batch(&[1])], 8192).unwrap();
        assert_eq!(result.batch_num_rows(0), Some(1));
        assert_eq!(result.batch_num_columns(0), Some(2));
        assert_eq!(result.batch_num_rows(1), None);
        assert_eq!(result.batch_num_columns(7), None);
    }

    #[test]
    fn test_pretty_format() {
        let result = QueryResult::try_new(schema(), vec![batch(&[1, 2])], 8192).unwrap();
        let text = result.pretty_format().unwrap();
        assert!(text.contains("| id | name |"));
        assert!(text.contains("| 2  | n2   |"));

        let empty = QueryResult::try_new(schema(), vec![], 8192).unwrap();
        assert!(empty.pretty_format().unwrap().contains("name"));
    }
}
