//! "Ordens filhas" batch file
//!
//! Windows-1252, pipe separated, no header and no quoting. Columns are
//! named by position.

use crate::config::EXPECTED_COLUMNS;
use crate::error::{Error, Result};
use crate::reconcile::DelimitedReader;
use arrow::array::{ArrayRef, StringArray, TimestampSecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{NaiveDate, NaiveDateTime};
use encoding_rs::WINDOWS_1252;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Default location of the downloaded file
pub const DEFAULT_INPUT: &str = "archives/COELCE_elaazisysd00_ordemfilhas.txt";

/// Label written to the `BASE` column
pub const BASE_LABEL: &str = "ORDENS FILHAS";

/// Status codes whose rows are dropped
pub const EXCLUDED_STATUSES: [&str; 2] = ["04", "09"];

const STATUS_COLUMN: &str = "estado";
const DATE_COLUMNS: [&str; 2] = ["data_ingresso", "data_estado"];

/// Columns after the 21 shared ones, in file order
const TRAILING_COLUMNS: [&str; 3] = [STATUS_COLUMN, "data_ingresso", "data_estado"];

const DATETIME_FORMATS: [&str; 5] = [
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
];

const DATE_FORMATS: [&str; 5] = ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y%m%d"];

/// Name for the column at `index` (zero based)
pub fn column_name(index: usize) -> String {
    EXPECTED_COLUMNS
        .iter()
        .chain(TRAILING_COLUMNS.iter())
        .nth(index)
        .map_or_else(|| format!("Column{}", index + 1), ToString::to_string)
}

/// Parse a date or date-time, reading ambiguous dates day first
pub fn parse_day_first(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Decode Windows-1252 bytes
pub fn decode_cp1252(bytes: &[u8]) -> String {
    let (text, _, had_errors) = WINDOWS_1252.decode(bytes);
    if had_errors {
        debug!("Replaced undecodable bytes while reading Windows-1252 text");
    }
    text.into_owned()
}

/// Read and clean the file at `path`
pub fn process_ordens_filhas(path: &Path) -> Result<RecordBatch> {
    info!("Processing {}", path.display());
    let bytes = std::fs::read(path)?;
    process_text(&decode_cp1252(&bytes), path)
}

/// Clean already decoded text; `path` is used in errors only
pub fn process_text(text: &str, path: &Path) -> Result<RecordBatch> {
    let parsed = DelimitedReader::with_options('|', false, false)
        .parse(text)
        .map_err(|e| Error::parse(path, e.to_string()))?;

    let names: Vec<String> = (0..parsed.columns.len()).map(column_name).collect();
    let position = |name: &str| {
        names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::parse(path, format!("missing column '{name}'")))
    };
    let status = position(STATUS_COLUMN)?;
    let dates = [position(DATE_COLUMNS[0])?, position(DATE_COLUMNS[1])?];

    let rows: Vec<&Vec<Option<String>>> = parsed
        .rows
        .iter()
        .filter(|row| {
            !row[status]
                .as_deref()
                .is_some_and(|code| EXCLUDED_STATUSES.contains(&code.trim()))
        })
        .collect();
    info!(
        "Kept {} of {} row(s) after status filter",
        rows.len(),
        parsed.rows.len()
    );

    let mut fields = Vec::with_capacity(names.len() + 1);
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len() + 1);
    for (index, name) in names.iter().enumerate() {
        if dates.contains(&index) {
            let array: TimestampSecondArray = rows
                .iter()
                .map(|row| {
                    row[index]
                        .as_deref()
                        .and_then(parse_day_first)
                        .map(|dt| dt.and_utc().timestamp())
                })
                .collect();
            fields.push(Field::new(
                name,
                DataType::Timestamp(TimeUnit::Second, None),
                true,
            ));
            columns.push(Arc::new(array));
        } else {
            let array: StringArray = rows.iter().map(|row| row[index].as_deref()).collect();
            fields.push(Field::new(name, DataType::Utf8, true));
            columns.push(Arc::new(array));
        }
    }

    fields.push(Field::new("BASE", DataType::Utf8, false));
    columns.push(Arc::new(StringArray::from(vec![BASE_LABEL; rows.len()])));

    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}
