//! DuckDB-backed sink
//!
//! Writes natively to a DuckDB file, or to PostgreSQL, MySQL and SQLite
//! through DuckDB extensions attached read-write.

use super::TableSink;
use crate::config::{SinkConfig, SinkEngine};
use crate::error::{Error, Result};
use arrow::array::Array;
use arrow::record_batch::RecordBatch;
use arrow::util::display::array_value_to_string;
use duckdb::{params, params_from_iter, Connection};
use tracing::{debug, info};

/// Catalog name the target database is attached under
const SINK_CATALOG: &str = "sink_db";

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quote a `key=value` connection parameter so spaces and quotes survive
fn quote_param(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Table sink over a DuckDB connection
pub struct DuckDbSink {
    /// DuckDB connection
    conn: Connection,
    /// Engine type
    engine: SinkEngine,
}

impl DuckDbSink {
    /// Connect according to `config`
    pub fn connect(config: &SinkConfig) -> Result<Self> {
        let conn = match config.engine {
            SinkEngine::Duckdb if config.database != ":memory:" => Connection::open(&config.database)
                .map_err(|e| {
                    Error::database(format!("Failed to open DuckDB at {}: {e}", config.database))
                })?,
            _ => Connection::open_in_memory().map_err(|e| {
                Error::database(format!("Failed to create DuckDB connection: {e}"))
            })?,
        };

        let sink = Self {
            conn,
            engine: config.engine,
        };
        if config.engine != SinkEngine::Duckdb {
            sink.attach(&Self::build_connection_string(config))?;
        }

        info!(engine = ?config.engine, "Connected to sink");
        Ok(sink)
    }

    /// In-memory DuckDB sink
    pub fn in_memory() -> Result<Self> {
        Self::connect(&SinkConfig {
            database: ":memory:".to_string(),
            ..SinkConfig::default()
        })
    }

    /// Engine this sink writes to
    pub fn engine(&self) -> SinkEngine {
        self.engine
    }

    /// Build the attach string for network and file engines
    pub(crate) fn build_connection_string(config: &SinkConfig) -> String {
        let (port, db_key) = match config.engine {
            SinkEngine::Postgres => (config.port.unwrap_or(5432), "dbname"),
            SinkEngine::Mysql => (config.port.unwrap_or(3306), "database"),
            SinkEngine::Sqlite | SinkEngine::Duckdb => return config.database.clone(),
        };
        format!(
            "host={} port={port} {db_key}={} user={} password={}",
            quote_param(&config.host),
            quote_param(&config.database),
            quote_param(&config.user),
            quote_param(&config.password)
        )
    }

    /// Attach the external database and make it the default catalog
    fn attach(&self, connection_string: &str) -> Result<()> {
        let (extension, db_type) = match self.engine {
            SinkEngine::Postgres => ("postgres", "POSTGRES"),
            SinkEngine::Mysql => ("mysql", "MYSQL"),
            SinkEngine::Sqlite => ("sqlite", "SQLITE"),
            SinkEngine::Duckdb => return Ok(()),
        };

        self.conn
            .execute_batch(&format!("INSTALL {extension}; LOAD {extension};"))
            .map_err(|e| Error::database(format!("Failed to load {extension} extension: {e}")))?;

        let attach_sql = format!(
            "ATTACH {} AS {SINK_CATALOG} (TYPE {db_type}); USE {SINK_CATALOG};",
            quote_literal(connection_string)
        );
        self.conn
            .execute_batch(&attach_sql)
            .map_err(|e| Error::database(format!("Failed to attach {db_type} sink: {e}")))
    }

    /// Number of rows currently in `name`
    pub fn row_count(&self, name: &str) -> Result<usize> {
        let sql = format!("SELECT count(*) FROM {}", quote_ident(name));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::database(format!("Failed to count rows in {name}: {e}")))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    #[cfg(test)]
    pub(crate) fn conn_for_tests(&self) -> &Connection {
        &self.conn
    }
}

impl TableSink for DuckDbSink {
    fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT count(*) FROM information_schema.tables \
                 WHERE table_name = ? AND table_catalog = current_database()",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(format!("Failed to check table {name}: {e}")))?;
        Ok(count > 0)
    }

    fn create_table(&mut self, name: &str, columns: &[String]) -> Result<()> {
        let column_defs: Vec<String> = columns
            .iter()
            .map(|c| format!("{} VARCHAR", quote_ident(c)))
            .collect();
        let sql = format!(
            "CREATE TABLE {} ({})",
            quote_ident(name),
            column_defs.join(", ")
        );
        debug!("{sql}");

        self.conn
            .execute_batch(&sql)
            .map_err(|e| Error::database(format!("Failed to create table {name}: {e}")))
    }

    fn append(&mut self, name: &str, batch: &RecordBatch) -> Result<usize> {
        let schema = batch.schema();
        let columns: Vec<String> = schema
            .fields()
            .iter()
            .map(|f| quote_ident(f.name()))
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_ident(name),
            columns.join(", ")
        );

        let tx = self
            .conn
            .transaction()
            .map_err(|e| Error::database(format!("Failed to begin transaction: {e}")))?;
        {
            let mut stmt = tx
                .prepare(&sql)
                .map_err(|e| Error::database(format!("Failed to prepare insert: {e}")))?;

            for row in 0..batch.num_rows() {
                let mut values: Vec<Option<String>> = Vec::with_capacity(batch.num_columns());
                for column in batch.columns() {
                    if column.is_null(row) {
                        values.push(None);
                    } else {
                        values.push(Some(array_value_to_string(column, row)?));
                    }
                }
                stmt.execute(params_from_iter(values))
                    .map_err(|e| Error::database(format!("Failed to insert row {row}: {e}")))?;
            }
        }
        tx.commit()
            .map_err(|e| Error::database(format!("Failed to commit insert: {e}")))?;

        Ok(batch.num_rows())
    }
}
