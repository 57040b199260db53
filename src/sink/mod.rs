//! Relational sink
//!
//! The pipeline only needs three things from a database: does the table
//! exist, create it, append rows. `DuckDbSink` provides them for DuckDB and
//! the engines DuckDB can attach.

mod engine;

pub use engine::DuckDbSink;

use crate::error::Result;
use arrow::record_batch::RecordBatch;
use tracing::info;

/// Destination for reconciled tables
pub trait TableSink {
    /// Whether `name` exists
    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Create `name` with the given text columns
    fn create_table(&mut self, name: &str, columns: &[String]) -> Result<()>;

    /// Append every row of `batch`; returns the number of rows written
    fn append(&mut self, name: &str, batch: &RecordBatch) -> Result<usize>;
}

/// Create `name` if it is missing, then append `batch`
pub fn load_table(sink: &mut dyn TableSink, name: &str, batch: &RecordBatch) -> Result<usize> {
    if sink.table_exists(name)? {
        info!("Table {name} exists, appending");
    } else {
        let columns: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        info!("Creating table {name} with {} column(s)", columns.len());
        sink.create_table(name, &columns)?;
    }

    let rows = sink.append(name, batch)?;
    info!("Loaded {rows} row(s) into {name}");
    Ok(rows)
}
