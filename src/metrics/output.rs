//! predictions.csv / trues.csv

use std::path::Path;

use tracing::info;

use crate::experiment::PredictionRecord;
use crate::table::{Column, Table, TableError, TableResult};

fn create_parent(path: &Path) -> TableResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| TableError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write one column per record to each table, in record order, with a
/// leading index column.
pub fn write_records(
    records: &[PredictionRecord],
    predictions_path: &Path,
    trues_path: &Path,
) -> TableResult<()> {
    let headers: Vec<String> = records.iter().map(|r| r.key.to_string()).collect();

    let predictions = Table::from_columns(
        headers.clone(),
        records
            .iter()
            .map(|r| Column::Text(r.predictions.clone()))
            .collect(),
    )?;
    let truths = Table::from_columns(
        headers,
        records.iter().map(|r| Column::Text(r.truths.clone())).collect(),
    )?;

    create_parent(predictions_path)?;
    create_parent(trues_path)?;
    predictions.write_csv(predictions_path, true)?;
    truths.write_csv(trues_path, true)?;

    info!(
        "Wrote {} columns x {} rows to {} and {}",
        records.len(),
        predictions.n_rows(),
        predictions_path.display(),
        trues_path.display()
    );
    Ok(())
}

/// Read a predictions or trues table back as `(column, labels)` pairs,
/// skipping the unnamed index column.
pub fn read_records(path: &Path) -> TableResult<Vec<(String, Vec<String>)>> {
    let table = Table::read_csv(path)?;
    let n_rows = table.n_rows();
    let (headers, columns) = table.into_parts();
    Ok(headers
        .into_iter()
        .zip(columns)
        .filter(|(name, _)| !name.is_empty())
        .map(|(name, column)| {
            let labels = (0..n_rows).map(|row| column.cell(row)).collect();
            (name, labels)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::PairKey;

    #[test]
    fn test_written_tables_have_index_and_key_columns() {
        let dir = tempfile::tempdir().unwrap();
        let preds = dir.path().join("out/predictions.csv");
        let trues = dir.path().join("out/trues.csv");
        let records = vec![PredictionRecord {
            key: PairKey::new("Pooled FastText", "GbdtClassifier"),
            predictions: vec!["1".into(), "-1".into()],
            truths: vec!["1".into(), "0".into()],
        }];
        write_records(&records, &preds, &trues).unwrap();

        let text = std::fs::read_to_string(&preds).unwrap();
        assert_eq!(text, ",Pooled FastText_GbdtClassifier\n0,1\n1,-1\n");

        // Numeric-looking labels come back unchanged
        let back = read_records(&trues).unwrap();
        assert_eq!(
            back,
            vec![(
                "Pooled FastText_GbdtClassifier".to_string(),
                vec!["1".to_string(), "0".to_string()]
            )]
        );
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            PredictionRecord {
                key: PairKey::new("A", "X"),
                predictions: vec!["a".into()],
                truths: vec!["a".into()],
            },
            PredictionRecord {
                key: PairKey::new("B", "X"),
                predictions: vec![],
                truths: vec![],
            },
        ];
        assert!(matches!(
            write_records(&records, &dir.path().join("p.csv"), &dir.path().join("t.csv")),
            Err(TableError::RaggedColumn { .. })
        ));
    }
}
