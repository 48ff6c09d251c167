//! Classifiers trained on the modeling frame
//!
//! Every fold of every language model gets a fresh classifier, so the
//! factory ([`ClassifierSpec`]) is what the experiment holds on to, not a
//! fitted model.
//!
//! Available classifiers:
//! - `gbdt` - one-vs-rest gradient boosted trees (the workhorse)
//! - `gaussian_nb` - Gaussian naive Bayes baseline
//! - `majority` - always predicts the most frequent training label

pub mod gbdt_model;
pub mod majority;
pub mod naive_bayes;

pub use gbdt_model::{GbdtClassifier, GbdtParams};
pub use majority::MajorityClassifier;
pub use naive_bayes::GaussianNb;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while fitting or applying a classifier
#[derive(Error, Debug, PartialEq)]
pub enum ClassifierError {
    #[error("No training samples provided")]
    EmptyTrainingSet,

    #[error("Feature count ({features}) does not match label count ({labels})")]
    LengthMismatch { features: usize, labels: usize },

    #[error("Row {row} has {found} features, expected {expected}")]
    WidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row}, feature {feature} is not finite ({value})")]
    NonFiniteFeature { row: usize, feature: usize, value: f64 },

    #[error("Classifier used before fit")]
    NotFitted,

    #[error("Training failed: {0}")]
    Training(String),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// A supervised multi-class text-feature classifier
pub trait Classifier: Send {
    /// Name used to key predictions, e.g. `GbdtClassifier`
    fn name(&self) -> &'static str;

    /// Fit on row-major features and their labels.
    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> ClassifierResult<()>;

    /// Class labels known after fitting, in probability column order.
    fn classes(&self) -> &[String];

    /// Per-row class probabilities, columns ordered as [`Classifier::classes`].
    fn predict_proba(&self, features: &[Vec<f64>]) -> ClassifierResult<Vec<Vec<f64>>>;

    /// Most probable label per row.
    fn predict(&self, features: &[Vec<f64>]) -> ClassifierResult<Vec<String>> {
        let classes = self.classes();
        let proba = self.predict_proba(features)?;
        Ok(proba
            .iter()
            .map(|p| classes[argmax(p)].clone())
            .collect())
    }
}

/// Index of the largest value; the first one wins ties.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate() {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Sorted distinct labels.
pub fn distinct_classes(labels: &[String]) -> Vec<String> {
    let mut classes: Vec<String> = labels.to_vec();
    classes.sort();
    classes.dedup();
    classes
}

/// Validate a training set and return its feature width.
pub fn check_training_input(features: &[Vec<f64>], labels: &[String]) -> ClassifierResult<usize> {
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
    check_features(features, width)?;
    Ok(width)
}

/// Every row must have `width` finite values.
pub fn check_features(features: &[Vec<f64>], width: usize) -> ClassifierResult<()> {
    for (row, values) in features.iter().enumerate() {
        if values.len() != width {
            return Err(ClassifierError::WidthMismatch {
                row,
                expected: width,
                found: values.len(),
            });
        }
        if let Some((feature, &value)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ClassifierError::NonFiniteFeature {
                row,
                feature,
                value,
            });
        }
    }
    Ok(())
}

/// Classifier family selectable from config and CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    Gbdt,
    GaussianNb,
    Majority,
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gbdt" | "xgb" | "boosting" => Ok(ClassifierKind::Gbdt),
            "gaussian_nb" | "nb" | "naive_bayes" => Ok(ClassifierKind::GaussianNb),
            "majority" | "dummy" => Ok(ClassifierKind::Majority),
            _ => Err(format!(
                "Unknown classifier '{}'. Valid classifiers: gbdt, gaussian_nb, majority",
                s
            )),
        }
    }
}

/// Factory for fresh, unfitted classifiers
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierSpec {
    Gbdt(GbdtParams),
    GaussianNb,
    Majority,
}

impl ClassifierSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ClassifierSpec::Gbdt(_) => GbdtClassifier::NAME,
            ClassifierSpec::GaussianNb => GaussianNb::NAME,
            ClassifierSpec::Majority => MajorityClassifier::NAME,
        }
    }

    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            ClassifierSpec::Gbdt(params) => Box::new(GbdtClassifier::new(params.clone())),
            ClassifierSpec::GaussianNb => Box::new(GaussianNb::default()),
            ClassifierSpec::Majority => Box::new(MajorityClassifier::default()),
        }
    }
}
