//! Feature attribution for one language model and fold
//!
//! The attribution of feature `f` on a sampled test row is how much the
//! probability of the row's predicted class drops when `f` is replaced by
//! its mean over a background sample of train rows. Features are ranked
//! by mean absolute attribution across the sampled rows.

mod plot;

pub use plot::{render_summary_plot, summary_plot_path, write_summary_plot};

use std::path::PathBuf;

use rand::seq::index;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::classifier::{argmax, Classifier, ClassifierError, ClassifierSpec};
use crate::experiment::{Experiment, ExperimentError};
use crate::features::ColumnKey;

#[derive(Error, Debug)]
pub enum ExplainError {
    #[error(transparent)]
    Experiment(#[from] ExperimentError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error("Fold {fold} of '{model}' has no test rows to explain")]
    NoTestRows { model: String, fold: usize },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ExplainResult<T> = Result<T, ExplainError>;

/// A classifier fitted on one fold plus the data it was fitted on
pub struct ExplainedModel {
    pub model: String,
    pub fold: usize,
    pub classifier: Box<dyn Classifier>,
    pub keys: Vec<ColumnKey>,
    pub train: Vec<Vec<f64>>,
    pub test: Vec<Vec<f64>>,
}

/// Fit `spec` on the train rows of `fold`, using `model`'s registered columns.
pub fn train_for_explanation(
    experiment: &Experiment,
    model: &str,
    fold: usize,
    spec: &ClassifierSpec,
) -> ExplainResult<ExplainedModel> {
    experiment.require_model(model)?;
    let rows = experiment
        .partition
        .get(fold)
        .map_err(ExperimentError::from)?;
    let keys = experiment
        .registry
        .columns(model, fold)
        .ok_or_else(|| ExperimentError::MissingFold {
            model: model.to_string(),
            fold,
        })?
        .to_vec();

    let frame = &experiment.frame;
    let train = frame.select(&keys, &rows.train).map_err(ExperimentError::from)?;
    let train_y = frame.target_at(&rows.train).map_err(ExperimentError::from)?;
    let test = frame.select(&keys, &rows.test).map_err(ExperimentError::from)?;

    let mut classifier = spec.build();
    classifier.fit(&train, &train_y)?;
    info!(
        "Trained {} on {} fold {} ({} features, {} rows)",
        classifier.name(),
        model,
        fold,
        keys.len(),
        train.len()
    );

    Ok(ExplainedModel {
        model: model.to_string(),
        fold,
        classifier,
        keys,
        train,
        test,
    })
}

/// Per-sample, per-feature attribution values
#[derive(Debug, Clone, Serialize)]
pub struct Attribution {
    pub features: Vec<String>,
    /// values[sample][feature]
    pub values: Vec<Vec<f64>>,
    /// Raw feature values of the sampled rows, for colouring the plot
    pub feature_values: Vec<Vec<f64>>,
}

impl Attribution {
    /// `(feature index, mean |attribution|)`, largest first.
    pub fn ranking(&self) -> Vec<(usize, f64)> {
        let n = self.values.len().max(1) as f64;
        let mut ranked: Vec<(usize, f64)> = (0..self.features.len())
            .map(|f| {
                let mean = self.values.iter().map(|row| row[f].abs()).sum::<f64>() / n;
                (f, mean)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked
    }
}

/// Pick `count` distinct indices below `len` (all of them when fewer),
/// ascending.
fn sample_rows(len: usize, count: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
    if count >= len {
        return (0..len).collect();
    }
    let mut picked = index::sample(rng, len, count).into_vec();
    picked.sort_unstable();
    picked
}

/// Attribute the explained classifier's predictions on `samples` test rows.
pub fn attribution(
    explained: &ExplainedModel,
    samples: usize,
    background: usize,
    seed: u64,
) -> ExplainResult<Attribution> {
    if explained.test.is_empty() {
        return Err(ExplainError::NoTestRows {
            model: explained.model.clone(),
            fold: explained.fold,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let width = explained.keys.len();

    let background_rows = sample_rows(explained.train.len(), background, &mut rng);
    let mut reference = vec![0.0; width];
    for &row in &background_rows {
        for (f, v) in explained.train[row].iter().enumerate() {
            reference[f] += v;
        }
    }
    let bg = background_rows.len().max(1) as f64;
    reference.iter_mut().for_each(|v| *v /= bg);

    let sample_idx = sample_rows(explained.test.len(), samples, &mut rng);
    let sampled: Vec<Vec<f64>> = sample_idx.iter().map(|&i| explained.test[i].clone()).collect();
    debug!(
        "Attributing {} rows x {} features against {} background rows",
        sampled.len(),
        width,
        background_rows.len()
    );

    let base = explained.classifier.predict_proba(&sampled)?;
    let mut values = Vec::with_capacity(sampled.len());
    for (row, probs) in sampled.iter().zip(&base) {
        let class = argmax(probs);
        let perturbed: Vec<Vec<f64>> = (0..width)
            .map(|f| {
                let mut masked = row.clone();
                masked[f] = reference[f];
                masked
            })
            .collect();
        let masked_probs = explained.classifier.predict_proba(&perturbed)?;
        values.push(
            masked_probs
                .iter()
                .map(|p| probs[class] - p[class])
                .collect(),
        );
    }

    Ok(Attribution {
        features: explained.keys.iter().map(ToString::to_string).collect(),
        values,
        feature_values: sampled,
    })
}
