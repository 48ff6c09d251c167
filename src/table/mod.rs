//! Flat tabular files
//!
//! Every input of an experiment (label sources, lexicon outputs, encoded
//! sentences) is a CSV file with a header row. `Table` keeps those files
//! column-oriented: a column whose non-empty cells all parse as numbers is
//! stored as `f64` (empty cells become NaN), anything else stays text.
//!
//! Column names are plain strings here. Structured feature keys only exist
//! after a table has been handed to the feature loader.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use thiserror::Error;

/// Errors raised while reading, reshaping or writing tables
#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Column '{0}' appears more than once")]
    DuplicateColumn(String),

    #[error("Column '{column}' is not numeric")]
    NotNumeric { column: String },

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot stack tables with different headers: {left:?} vs {right:?}")]
    HeaderMismatch {
        left: Vec<String>,
        right: Vec<String>,
    },

    #[error("{path} has {found} columns, at least {required} are required")]
    TooFewColumns {
        path: PathBuf,
        found: usize,
        required: usize,
    },
}

pub type TableResult<T> = Result<T, TableError>;

/// A single table column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Render one cell the way it would appear in a CSV file.
    pub fn cell(&self, row: usize) -> String {
        match self {
            Column::Numeric(v) => format_number(v[row]),
            Column::Text(v) => v[row].clone(),
        }
    }

    /// Build a column from raw cells, choosing numeric storage when possible.
    fn from_cells(cells: Vec<String>) -> Self {
        let mut values = Vec::with_capacity(cells.len());
        for cell in &cells {
            let trimmed = cell.trim();
            if trimmed.is_empty() {
                values.push(f64::NAN);
                continue;
            }
            match trimmed.parse::<f64>() {
                Ok(v) => values.push(v),
                Err(_) => return Column::Text(cells),
            }
        }
        Column::Numeric(values)
    }

    fn into_text(self) -> Vec<String> {
        match self {
            Column::Numeric(v) => v.into_iter().map(format_number).collect(),
            Column::Text(v) => v,
        }
    }

    fn append(self, other: Column) -> Column {
        match (self, other) {
            (Column::Numeric(mut a), Column::Numeric(b)) => {
                a.extend(b);
                Column::Numeric(a)
            }
            (a, b) => {
                let mut text = a.into_text();
                text.extend(b.into_text());
                Column::Text(text)
            }
        }
    }

    fn permute(&self, order: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(order.iter().map(|&i| v[i]).collect()),
            Column::Text(v) => Column::Text(order.iter().map(|&i| v[i].clone()).collect()),
        }
    }
}

/// Integral values print without a fractional part so ids and counts
/// survive a write/read cycle unchanged.
fn format_number(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Column-oriented table with a header row
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table from named columns. All columns must have the same length.
    pub fn from_columns(headers: Vec<String>, columns: Vec<Column>) -> TableResult<Self> {
        if let Some(first) = columns.first() {
            let expected = first.len();
            for (name, col) in headers.iter().zip(&columns) {
                if col.len() != expected {
                    return Err(TableError::RaggedColumn {
                        column: name.clone(),
                        expected,
                        found: col.len(),
                    });
                }
            }
        }
        Ok(Self { headers, columns })
    }

    /// Read a CSV file with a header row.
    pub fn read_csv(path: &Path) -> TableResult<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| csv_error(path, e))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(|e| csv_error(path, e))?;
            for (col, value) in cells.iter_mut().zip(record.iter()) {
                col.push(value.to_string());
            }
        }

        let columns = cells.into_iter().map(Column::from_cells).collect();
        Ok(Self { headers, columns })
    }

    /// Write the table as CSV. With `with_index`, a leading unnamed column
    /// holds the row number.
    pub fn write_csv(&self, path: &Path, with_index: bool) -> TableResult<()> {
        let mut wtr = WriterBuilder::new()
            .from_path(path)
            .map_err(|e| csv_error(path, e))?;

        let mut header: Vec<&str> = Vec::with_capacity(self.headers.len() + 1);
        if with_index {
            header.push("");
        }
        header.extend(self.headers.iter().map(String::as_str));
        wtr.write_record(&header).map_err(|e| csv_error(path, e))?;

        for row in 0..self.n_rows() {
            let mut record: Vec<String> = Vec::with_capacity(header.len());
            if with_index {
                record.push(row.to_string());
            }
            record.extend(self.columns.iter().map(|c| c.cell(row)));
            wtr.write_record(&record).map_err(|e| csv_error(path, e))?;
        }

        wtr.flush().map_err(|source| TableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> TableResult<&Column> {
        self.position(name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> TableResult<&[f64]> {
        self.column(name)?
            .as_numeric()
            .ok_or_else(|| TableError::NotNumeric {
                column: name.to_string(),
            })
    }

    /// Column rendered as text, whatever its storage.
    pub fn text(&self, name: &str) -> TableResult<Vec<String>> {
        let col = self.column(name)?;
        Ok((0..col.len()).map(|row| col.cell(row)).collect())
    }

    /// Stack `other` below `self`. Headers must match exactly.
    pub fn vconcat(self, other: Table) -> TableResult<Table> {
        if self.headers != other.headers {
            return Err(TableError::HeaderMismatch {
                left: self.headers,
                right: other.headers,
            });
        }
        let columns = self
            .columns
            .into_iter()
            .zip(other.columns)
            .map(|(a, b)| a.append(b))
            .collect();
        Ok(Table {
            headers: self.headers,
            columns,
        })
    }

    /// Rename a column. Renaming a missing column is a no-op; renaming onto
    /// an existing name is an error.
    pub fn rename(&mut self, from: &str, to: &str) -> TableResult<()> {
        let Some(i) = self.position(from) else {
            return Ok(());
        };
        if from != to && self.position(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        self.headers[i] = to.to_string();
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> TableResult<Column> {
        let i = self
            .position(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))?;
        self.headers.remove(i);
        Ok(self.columns.remove(i))
    }

    /// Stable sort of all rows by one column.
    pub fn sort_by(&mut self, name: &str) -> TableResult<()> {
        let key = self.column(name)?;
        let mut order: Vec<usize> = (0..key.len()).collect();
        match key {
            Column::Numeric(v) => order.sort_by(|&a, &b| v[a].total_cmp(&v[b])),
            Column::Text(v) => order.sort_by(|&a, &b| v[a].cmp(&v[b])),
        }
        self.columns = self.columns.iter().map(|c| c.permute(&order)).collect();
        Ok(())
    }

    pub fn into_parts(self) -> (Vec<String>, Vec<Column>) {
        (self.headers, self.columns)
    }
}

fn csv_error(path: &Path, source: csv::Error) -> TableError {
    // Surface I/O failures separately so a missing file reads as one.
    if let csv::ErrorKind::Io(io) = source.kind() {
        return TableError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(io.kind(), io.to_string()),
        };
    }
    TableError::Csv {
        path: path.to_path_buf(),
        source,
    }
}
