//! Delimited text reader
//!
//! Every value is kept as raw text; empty fields read as null.

use std::fmt;

/// Parsed delimited text: column names plus rows of the same width
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delimited {
    /// Column names, from the header row or generated positionally
    pub columns: Vec<String>,
    /// Data rows, each exactly `columns.len()` wide
    pub rows: Vec<Vec<Option<String>>>,
}

/// Why a text body could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelimitedError {
    /// Nothing but blank lines
    Empty,
    /// A row with more fields than there are columns
    TooManyFields {
        line: usize,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for DelimitedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "no columns to parse"),
            Self::TooManyFields {
                line,
                expected,
                found,
            } => write!(
                f,
                "expected {expected} fields in line {line}, saw {found}"
            ),
        }
    }
}

/// Reader with configurable delimiter, header and quote handling
#[derive(Debug, Clone)]
pub struct DelimitedReader {
    /// Field delimiter
    delimiter: char,
    /// Whether the first row is a header
    has_header: bool,
    /// Whether `"` quotes fields
    quoting: bool,
}

impl Default for DelimitedReader {
    fn default() -> Self {
        Self {
            delimiter: '|',
            has_header: true,
            quoting: true,
        }
    }
}

impl DelimitedReader {
    /// Pipe-delimited reader with a header row
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader with custom settings
    pub fn with_options(delimiter: char, has_header: bool, quoting: bool) -> Self {
        Self {
            delimiter,
            has_header,
            quoting,
        }
    }

    /// Parse a whole text body.
    ///
    /// Blank lines are skipped. Without a header, columns are named
    /// `Column1..ColumnN` after the first row's width.
    pub fn parse(&self, body: &str) -> Result<Delimited, DelimitedError> {
        let body = body.strip_prefix('\u{feff}').unwrap_or(body);
        let mut lines = body
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());

        let (columns, mut rows) = match lines.next() {
            None => return Err(DelimitedError::Empty),
            Some((_, first)) if self.has_header => {
                let columns: Vec<String> = self
                    .split(first)
                    .into_iter()
                    .map(|name| name.trim().to_string())
                    .collect();
                (columns, Vec::new())
            }
            Some((index, first)) => {
                let width = self.split(first).len();
                let columns: Vec<String> = (1..=width).map(|i| format!("Column{i}")).collect();
                (columns, vec![self.row(first, width, index + 1)?])
            }
        };

        let width = columns.len();
        for (index, line) in lines {
            rows.push(self.row(line, width, index + 1)?);
        }
        Ok(Delimited { columns, rows })
    }

    fn row(
        &self,
        line: &str,
        width: usize,
        line_number: usize,
    ) -> Result<Vec<Option<String>>, DelimitedError> {
        let fields = self.split(line);
        if fields.len() > width {
            return Err(DelimitedError::TooManyFields {
                line: line_number,
                expected: width,
                found: fields.len(),
            });
        }

        let mut row: Vec<Option<String>> = fields
            .into_iter()
            .map(|f| if f.is_empty() { None } else { Some(f) })
            .collect();
        row.resize(width, None);
        Ok(row)
    }

    /// Split one line into raw fields
    pub fn split(&self, line: &str) -> Vec<String> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '"' && self.quoting {
                if in_quotes {
                    // Escaped quote
                    if chars.peek() == Some(&'"') {
                        current.push('"');
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            } else if c == self.delimiter && !in_quotes {
                fields.push(std::mem::take(&mut current));
            } else {
                current.push(c);
            }
        }

        fields.push(current);
        fields
    }
}
