//! Classification metrics over the persisted prediction tables
//!
//! Metrics are a batch post-pass: the sweep writes `predictions.csv` and
//! `trues.csv`, and [`compute_metrics`] reads them back, builds one
//! [`ClassificationReport`] per (language model, classifier) column, and
//! writes the lot to `metrics.json`.

mod output;

pub use output::{read_records, write_records};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::table::TableError;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("Column {column} is in {present} but not in {missing}")]
    MissingColumn {
        column: String,
        present: PathBuf,
        missing: PathBuf,
    },

    #[error("{column}: {predictions} predictions but {truths} true labels")]
    LengthMismatch {
        column: String,
        predictions: usize,
        truths: usize,
    },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize metrics: {0}")]
    Json(#[from] serde_json::Error),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

/// Precision, recall and F1 of one class (or an average over classes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class scores plus accuracy and macro/weighted averages.
/// Undefined ratios (no predictions, no support) count as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: BTreeMap<String, ClassScores>,
    pub accuracy: f64,
    pub macro_avg: ClassScores,
    pub weighted_avg: ClassScores,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    /// Compare aligned true and predicted labels. Both slices must have the
    /// same length; extra elements of the longer one are ignored.
    pub fn new(truths: &[String], predictions: &[String]) -> Self {
        let mut labels: Vec<&str> = truths
            .iter()
            .chain(predictions)
            .map(String::as_str)
            .collect();
        labels.sort_unstable();
        labels.dedup();

        let mut classes = BTreeMap::new();
        for label in &labels {
            let mut tp = 0;
            let mut predicted = 0;
            let mut support = 0;
            for (t, p) in truths.iter().zip(predictions) {
                let is_true = t == label;
                let is_pred = p == label;
                tp += usize::from(is_true && is_pred);
                predicted += usize::from(is_pred);
                support += usize::from(is_true);
            }
            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            classes.insert(
                label.to_string(),
                ClassScores {
                    precision,
                    recall,
                    f1: f1(precision, recall),
                    support,
                },
            );
        }

        let total: usize = classes.values().map(|c| c.support).sum();
        let correct = truths
            .iter()
            .zip(predictions)
            .filter(|(t, p)| t == p)
            .count();

        let n = classes.len().max(1) as f64;
        let macro_avg = ClassScores {
            precision: classes.values().map(|c| c.precision).sum::<f64>() / n,
            recall: classes.values().map(|c| c.recall).sum::<f64>() / n,
            f1: classes.values().map(|c| c.f1).sum::<f64>() / n,
            support: total,
        };

        let weight = |f: fn(&ClassScores) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .values()
                    .map(|c| f(c) * c.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassScores {
            precision: weight(|c| c.precision),
            recall: weight(|c| c.recall),
            f1: weight(|c| c.f1),
            support: total,
        };

        Self {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
        }
    }

    /// Plain-text table in the familiar precision/recall/f1/support layout.
    pub fn render(&self) -> String {
        let width = self
            .classes
            .keys()
            .map(String::len)
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(12);

        let row = |name: &str, s: &ClassScores| {
            format!(
                "{name:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                s.precision, s.recall, s.f1, s.support
            )
        };

        let mut out = format!(
            "{:>width$}  {:>9} {:>9} {:>9} {:>9}\n\n",
            "", "precision", "recall", "f1-score", "support"
        );
        for (label, scores) in &self.classes {
            out.push_str(&row(label, scores));
        }
        out.push('\n');
        out.push_str(&format!(
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        ));
        out.push_str(&row("macro avg", &self.macro_avg));
        out.push_str(&row("weighted avg", &self.weighted_avg));
        out
    }
}

/// Report for one output column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedReport {
    pub key: String,
    pub report: ClassificationReport,
}

/// Contents of `metrics.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub generated_at: DateTime<Utc>,
    pub predictions: PathBuf,
    pub trues: PathBuf,
    /// Reports in output column order
    pub reports: Vec<KeyedReport>,
}

/// Read both tables back, report every column, and write `metrics_path`.
pub fn compute_metrics(
    predictions_path: &Path,
    trues_path: &Path,
    metrics_path: &Path,
) -> MetricsResult<MetricsSummary> {
    let predictions = read_records(predictions_path)?;
    let truths = read_records(trues_path)?;

    let truth_lookup: BTreeMap<&str, &Vec<String>> =
        truths.iter().map(|(k, v)| (k.as_str(), v)).collect();
    if let Some((missing, _)) = truths
        .iter()
        .find(|(k, _)| !predictions.iter().any(|(p, _)| p == k))
    {
        return Err(MetricsError::MissingColumn {
            column: missing.clone(),
            present: trues_path.to_path_buf(),
            missing: predictions_path.to_path_buf(),
        });
    }

    let mut reports = Vec::with_capacity(predictions.len());
    for (column, preds) in &predictions {
        let trues = truth_lookup
            .get(column.as_str())
            .ok_or_else(|| MetricsError::MissingColumn {
                column: column.clone(),
                present: predictions_path.to_path_buf(),
                missing: trues_path.to_path_buf(),
            })?;
        if trues.len() != preds.len() {
            return Err(MetricsError::LengthMismatch {
                column: column.clone(),
                predictions: preds.len(),
                truths: trues.len(),
            });
        }
        reports.push(KeyedReport {
            key: column.clone(),
            report: ClassificationReport::new(trues, preds),
        });
    }

    let summary = MetricsSummary {
        generated_at: Utc::now(),
        predictions: predictions_path.to_path_buf(),
        trues: trues_path.to_path_buf(),
        reports,
    };

    let json = serde_json::to_string_pretty(&summary)?;
    std::fs::write(metrics_path, json).map_err(|source| MetricsError::Io {
        path: metrics_path.to_path_buf(),
        source,
    })?;
    info!(
        "Wrote {} metric reports to {}",
        summary.reports.len(),
        metrics_path.display()
    );

    Ok(summary)
}
