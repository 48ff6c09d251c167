//! Gradient boosted trees via the `gbdt` crate
//!
//! The crate only does binary classification (`LogLikelyhood` loss with
//! labels +1/-1), so multi-class sentiment is handled one-vs-rest: one
//! boosted model per class, probabilities normalised across classes.
//!
//! Note: the gbdt crate internally uses `f32` (`ValueType`), while the
//! modeling frame stores `f64`. Conversions happen at the crate boundary.

use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use super::{
    check_features, check_training_input, distinct_classes, Classifier, ClassifierError,
    ClassifierResult,
};

/// Boosting hyper-parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtParams {
    /// Boosting iterations
    pub estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u32,
    /// Fraction of rows sampled per tree
    pub subsample: f64,
    /// Fraction of features sampled per tree
    pub colsample: f64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            estimators: 250,
            learning_rate: 0.03,
            max_depth: 10,
            subsample: 0.7,
            colsample: 0.6,
        }
    }
}

#[inline]
fn row_to_f32(row: &[f64]) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

/// Feature sample ratio handed to the gbdt crate.
///
/// The crate samples `floor(width * ratio)` features per split, which is
/// zero for narrow inputs. At least one feature is always kept.
fn feature_sample_ratio(colsample: f64, width: usize) -> f64 {
    if colsample >= 1.0 || width == 0 {
        return 1.0;
    }
    let keep = ((colsample * width as f64) as usize).max(1);
    if keep >= width {
        1.0
    } else {
        // Half a feature of headroom so flooring lands on `keep`
        (keep as f64 + 0.5) / width as f64
    }
}

/// Train one binary GBDT model.
///
/// - `features`: row-major feature vectors
/// - `labels`: 1.0 for the positive class, -1.0 otherwise (LogLikelyhood convention)
pub fn train_gbdt(
    features: &[Vec<f64>],
    labels: &[f64],
    params: &GbdtParams,
) -> ClassifierResult<GBDT> {
    if features.is_empty() {
        return Err(ClassifierError::EmptyTrainingSet);
    }
    if features.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            features: features.len(),
            labels: labels.len(),
        });
    }

    let width = features[0].len();
    let mut cfg = Config::new();
    cfg.set_feature_size(width);
    cfg.set_max_depth(params.max_depth);
    cfg.set_iterations(params.estimators);
    cfg.set_shrinkage(params.learning_rate as f32);
    cfg.set_data_sample_ratio(params.subsample);
    cfg.set_feature_sample_ratio(feature_sample_ratio(params.colsample, width));
    cfg.set_loss("LogLikelyhood");
    cfg.set_debug(false);
    cfg.set_training_optimization_level(2);
    cfg.set_min_leaf_size(1);

    let mut gbdt = GBDT::new(&cfg);

    let mut training_data: Vec<Data> = features
        .iter()
        .zip(labels)
        .map(|(row, &label)| Data::new_training_data(row_to_f32(row), 1.0_f32, label as f32, None))
        .collect();

    gbdt.fit(&mut training_data);

    Ok(gbdt)
}

/// One-vs-rest boosted trees
pub struct GbdtClassifier {
    params: GbdtParams,
    classes: Vec<String>,
    width: usize,
    /// One model per class; empty when training saw a single class.
    models: Vec<GBDT>,
}

impl GbdtClassifier {
    pub const NAME: &'static str = "GbdtClassifier";

    pub fn new(params: GbdtParams) -> Self {
        Self {
            params,
            classes: Vec::new(),
            width: 0,
            models: Vec::new(),
        }
    }

    pub fn params(&self) -> &GbdtParams {
        &self.params
    }
}

impl Classifier for GbdtClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> ClassifierResult<()> {
        self.width = check_training_input(features, labels)?;
        self.classes = distinct_classes(labels);
        self.models.clear();

        if self.classes.len() < 2 {
            tracing::debug!("Single class in training set, skipping boosting");
            return Ok(());
        }

        for class in &self.classes {
            let binary: Vec<f64> = labels
                .iter()
                .map(|l| if l == class { 1.0 } else { -1.0 })
                .collect();
            self.models.push(train_gbdt(features, &binary, &self.params)?);
        }
        tracing::debug!(
            "Trained {} one-vs-rest models on {} rows",
            self.models.len(),
            features.len()
        );
        Ok(())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> ClassifierResult<Vec<Vec<f64>>> {
        if self.classes.is_empty() {
            return Err(ClassifierError::NotFitted);
        }
        if features.is_empty() {
            return Ok(Vec::new());
        }
        check_features(features, self.width)?;

        if self.models.is_empty() {
            return Ok(vec![vec![1.0]; features.len()]);
        }

        let data: Vec<Data> = features
            .iter()
            .map(|row| Data::new_test_data(row_to_f32(row), None))
            .collect();

        // scores[class][row]
        let scores: Vec<Vec<f32>> = self.models.iter().map(|m| m.predict(&data)).collect();

        Ok((0..features.len())
            .map(|row| {
                let raw: Vec<f64> = scores.iter().map(|s| s[row] as f64).collect();
                let total: f64 = raw.iter().sum();
                if total > 0.0 {
                    raw.iter().map(|p| p / total).collect()
                } else {
                    vec![1.0 / raw.len() as f64; raw.len()]
                }
            })
            .collect())
    }
}
