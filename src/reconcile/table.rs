//! Arrow-backed rectangular table

use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef, StringArray};
use arrow::compute::concat_batches;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Schema whose columns are all nullable text
pub fn text_schema(columns: &[String]) -> SchemaRef {
    let fields: Vec<Field> = columns
        .iter()
        .map(|name| Field::new(name, DataType::Utf8, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Rows of nullable text under a fixed column order
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledTable {
    batch: RecordBatch,
}

impl ReconciledTable {
    /// Build from row-major values. Every row must match the schema width.
    pub fn from_rows(schema: SchemaRef, rows: &[Vec<Option<String>>]) -> Result<Self> {
        let width = schema.fields().len();
        if let Some(bad) = rows.iter().find(|row| row.len() != width) {
            return Err(Error::Other(format!(
                "row has {} values, schema has {width} columns",
                bad.len()
            )));
        }

        let columns: Vec<ArrayRef> = (0..width)
            .map(|col| {
                let array: StringArray = rows.iter().map(|row| row[col].as_deref()).collect();
                Arc::new(array) as ArrayRef
            })
            .collect();

        Ok(Self {
            batch: RecordBatch::try_new(schema, columns)?,
        })
    }

    /// Stack tables that share a schema, keeping their order
    pub fn concat(schema: &SchemaRef, tables: &[ReconciledTable]) -> Result<Self> {
        let batches: Vec<&RecordBatch> = tables.iter().map(|t| &t.batch).collect();
        Ok(Self {
            batch: concat_batches(schema, batches)?,
        })
    }

    /// Underlying Arrow batch
    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Column names in output order
    pub fn column_names(&self) -> Vec<&str> {
        self.batch
            .schema_ref()
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Value at `row` in the named column; `None` for null or unknown column
    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let array = self
            .batch
            .column_by_name(column)?
            .as_any()
            .downcast_ref::<StringArray>()?;
        if row >= array.len() || array.is_null(row) {
            None
        } else {
            Some(array.value(row))
        }
    }

    /// Row-major copy of the values
    pub fn rows(&self) -> Vec<Vec<Option<String>>> {
        let columns: Vec<Option<&StringArray>> = self
            .batch
            .columns()
            .iter()
            .map(|c| c.as_any().downcast_ref::<StringArray>())
            .collect();

        (0..self.num_rows())
            .map(|row| {
                columns
                    .iter()
                    .map(|col| match col {
                        Some(array) if !array.is_null(row) => Some(array.value(row).to_string()),
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }
}
