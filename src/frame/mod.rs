//! The unified modeling frame
//!
//! One row per tweet, one column per extracted feature across all language
//! models and folds, plus the target label. Feature tables are joined by row
//! position, so the assembler checks alignment before it concatenates:
//! every table must have exactly as many rows as the label table, and
//! tables that carry a row identifier must agree with each other row by row.

use std::collections::HashMap;

use thiserror::Error;

use crate::features::{ColumnKey, FeatureTable};
use crate::table::Column;

#[derive(Error, Debug, PartialEq)]
pub enum FrameError {
    #[error("{model}: {found} rows, but the label table has {expected}")]
    RowCountMismatch {
        model: String,
        expected: usize,
        found: usize,
    },

    #[error("{model}: row {row} has id '{found}', expected '{expected}' (from {reference})")]
    RowIdMismatch {
        model: String,
        reference: String,
        row: usize,
        expected: String,
        found: String,
    },

    #[error("Column {0} is provided by more than one table")]
    DuplicateColumn(String),

    #[error("Column {0} is not in the modeling frame")]
    UnknownColumn(String),

    #[error("Column {0} is not numeric")]
    NonNumericColumn(String),

    #[error("Row {row} out of range ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },
}

pub type FrameResult<T> = Result<T, FrameError>;

/// Feature columns keyed by [`ColumnKey`], plus the target column
#[derive(Debug, Clone)]
pub struct Frame {
    n_rows: usize,
    keys: Vec<ColumnKey>,
    index: HashMap<ColumnKey, usize>,
    columns: Vec<Column>,
    target: Vec<String>,
}

impl Frame {
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Feature columns plus the target column.
    pub fn n_cols(&self) -> usize {
        self.columns.len() + 1
    }

    pub fn keys(&self) -> &[ColumnKey] {
        &self.keys
    }

    pub fn contains(&self, key: &ColumnKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn column(&self, key: &ColumnKey) -> FrameResult<&Column> {
        self.index
            .get(key)
            .map(|&i| &self.columns[i])
            .ok_or_else(|| FrameError::UnknownColumn(key.to_string()))
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }

    /// Row-major feature matrix for `rows` x `keys`.
    pub fn select(&self, keys: &[ColumnKey], rows: &[usize]) -> FrameResult<Vec<Vec<f64>>> {
        let cols: Vec<&[f64]> = keys
            .iter()
            .map(|k| {
                self.column(k)?
                    .as_numeric()
                    .ok_or_else(|| FrameError::NonNumericColumn(k.to_string()))
            })
            .collect::<FrameResult<_>>()?;

        rows.iter()
            .map(|&row| {
                if row >= self.n_rows {
                    return Err(FrameError::RowOutOfRange {
                        row,
                        rows: self.n_rows,
                    });
                }
                Ok(cols.iter().map(|c| c[row]).collect())
            })
            .collect()
    }

    /// Target labels of `rows`, in the given order.
    pub fn target_at(&self, rows: &[usize]) -> FrameResult<Vec<String>> {
        rows.iter()
            .map(|&row| {
                self.target
                    .get(row)
                    .cloned()
                    .ok_or(FrameError::RowOutOfRange {
                        row,
                        rows: self.n_rows,
                    })
            })
            .collect()
    }
}

/// Collects feature tables and joins them column-wise onto the labels
pub struct FrameAssembler {
    target: Vec<String>,
    tables: Vec<FeatureTable>,
    check_row_ids: bool,
}

impl FrameAssembler {
    pub fn new(target: Vec<String>) -> Self {
        Self {
            target,
            tables: Vec::new(),
            check_row_ids: true,
        }
    }

    /// Skip the row-identifier comparison (row counts are always checked).
    pub fn without_row_id_check(mut self) -> Self {
        self.check_row_ids = false;
        self
    }

    pub fn push(&mut self, table: FeatureTable) {
        self.tables.push(table);
    }

    pub fn extend(&mut self, tables: impl IntoIterator<Item = FeatureTable>) {
        self.tables.extend(tables);
    }

    pub fn assemble(self) -> FrameResult<Frame> {
        let n_rows = self.target.len();

        for table in &self.tables {
            if table.n_rows() != n_rows {
                return Err(FrameError::RowCountMismatch {
                    model: table_label(table),
                    expected: n_rows,
                    found: table.n_rows(),
                });
            }
        }

        if self.check_row_ids {
            check_row_ids(&self.tables)?;
        }

        let mut keys = Vec::new();
        let mut columns = Vec::new();
        let mut index = HashMap::new();
        for table in self.tables {
            let (table_keys, table_columns) = table.into_parts();
            for (key, column) in table_keys.into_iter().zip(table_columns) {
                if index.contains_key(&key) {
                    return Err(FrameError::DuplicateColumn(key.to_string()));
                }
                index.insert(key.clone(), keys.len());
                keys.push(key);
                columns.push(column);
            }
        }

        tracing::info!(
            "Assembled modeling frame: {} rows x {} columns",
            n_rows,
            columns.len() + 1
        );

        Ok(Frame {
            n_rows,
            keys,
            index,
            columns,
            target: self.target,
        })
    }
}

fn table_label(table: &FeatureTable) -> String {
    match table.fold {
        Some(fold) => format!("{} (fold {})", table.model, fold),
        None => table.model.clone(),
    }
}

/// Every table with a dummy-id column must list the same ids in the same
/// order as the first such table.
fn check_row_ids(tables: &[FeatureTable]) -> FrameResult<()> {
    let mut reference: Option<(String, Vec<String>)> = None;
    for table in tables {
        let Some(ids) = table.row_ids() else {
            continue;
        };
        match &reference {
            None => reference = Some((table_label(table), ids)),
            Some((ref_label, ref_ids)) => {
                if let Some(row) = (0..ids.len()).find(|&r| ids[r] != ref_ids[r]) {
                    return Err(FrameError::RowIdMismatch {
                        model: table_label(table),
                        reference: ref_label.clone(),
                        row,
                        expected: ref_ids[row].clone(),
                        found: ids[row].clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureName;

    fn numeric_table(model: &str, cols: usize, rows: usize) -> FeatureTable {
        let keys = (0..cols).map(|i| ColumnKey::indexed(model, None, i)).collect();
        let columns = (0..cols)
            .map(|c| Column::Numeric((0..rows).map(|r| (r * cols + c) as f64).collect()))
            .collect();
        FeatureTable::new(model, None, keys, columns)
    }

    fn with_ids(model: &str, ids: &[f64]) -> FeatureTable {
        FeatureTable::new(
            model,
            None,
            vec![
                ColumnKey::indexed(model, None, 0),
                ColumnKey::new(model, None, FeatureName::DummyId),
            ],
            vec![
                Column::Numeric(vec![0.0; ids.len()]),
                Column::Numeric(ids.to_vec()),
            ],
        )
    }

    fn labels(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| if i % 2 == 0 { "positive" } else { "negative" }.to_string())
            .collect()
    }

    #[test]
    fn test_assemble_two_tables() {
        let mut assembler = FrameAssembler::new(labels(8000));
        assembler.push(numeric_table("Pooled FastText", 4, 8000));
        assembler.push(numeric_table("Universal Sentence Encoder", 6, 8000));
        let frame = assembler.assemble().unwrap();

        assert_eq!(frame.n_rows(), 8000);
        assert_eq!(frame.n_cols(), 4 + 6 + 1);
        assert_eq!(frame.target().len(), 8000);
    }

    #[test]
    fn test_row_count_mismatch_is_fatal() {
        let mut assembler = FrameAssembler::new(labels(10));
        assembler.push(numeric_table("LIWC", 2, 10));
        assembler.push(numeric_table("SEANCE", 2, 9));
        assert_eq!(
            assembler.assemble().unwrap_err(),
            FrameError::RowCountMismatch {
                model: "SEANCE".into(),
                expected: 10,
                found: 9
            }
        );
    }

    #[test]
    fn test_columnless_table_counts_its_rows() {
        let mut assembler = FrameAssembler::new(labels(4));
        assembler.push(numeric_table("LIWC", 2, 4));
        assembler.push(FeatureTable::with_row_count(
            "Term Frequency",
            Some(0),
            4,
            Vec::new(),
            Vec::new(),
        ));
        let frame = assembler.assemble().unwrap();
        assert_eq!(frame.n_cols(), 2 + 1);
    }

    #[test]
    fn test_row_id_mismatch_detected() {
        let mut assembler = FrameAssembler::new(labels(3));
        assembler.push(with_ids("USE", &[1.0, 2.0, 3.0]));
        assembler.push(with_ids("Pooled RoBERTa", &[1.0, 3.0, 2.0]));
        match assembler.assemble().unwrap_err() {
            FrameError::RowIdMismatch { row, model, .. } => {
                assert_eq!(row, 1);
                assert_eq!(model, "Pooled RoBERTa");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let mut unchecked = FrameAssembler::new(labels(3)).without_row_id_check();
        unchecked.push(with_ids("USE", &[1.0, 2.0, 3.0]));
        unchecked.push(with_ids("Pooled RoBERTa", &[1.0, 3.0, 2.0]));
        assert!(unchecked.assemble().is_ok());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut assembler = FrameAssembler::new(labels(2));
        assembler.push(numeric_table("LIWC", 1, 2));
        assembler.push(numeric_table("LIWC", 1, 2));
        assert!(matches!(
            assembler.assemble(),
            Err(FrameError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn test_select_rows_and_columns() {
        let mut assembler = FrameAssembler::new(labels(5));
        assembler.push(numeric_table("m", 3, 5));
        let frame = assembler.assemble().unwrap();

        let keys = vec![ColumnKey::indexed("m", None, 2), ColumnKey::indexed("m", None, 0)];
        let x = frame.select(&keys, &[4, 1]).unwrap();
        assert_eq!(x, vec![vec![14.0, 12.0], vec![5.0, 3.0]]);
        assert_eq!(frame.target_at(&[4, 1]).unwrap(), vec!["positive", "negative"]);

        assert!(matches!(
            frame.select(&[ColumnKey::indexed("m", None, 9)], &[0]),
            Err(FrameError::UnknownColumn(_))
        ));
        assert!(matches!(
            frame.select(&keys, &[5]),
            Err(FrameError::RowOutOfRange { row: 5, rows: 5 })
        ));
    }
}
