//! Most-frequent-label baseline

use std::collections::HashMap;

use super::{
    check_features, check_training_input, distinct_classes, Classifier, ClassifierError,
    ClassifierResult,
};

/// Predicts the training set's most frequent label for every row.
/// Ties go to the label that sorts first.
#[derive(Debug, Default)]
pub struct MajorityClassifier {
    classes: Vec<String>,
    width: usize,
    priors: Vec<f64>,
}

impl MajorityClassifier {
    pub const NAME: &'static str = "MajorityClassifier";
}

impl Classifier for MajorityClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> ClassifierResult<()> {
        self.width = check_training_input(features, labels)?;
        self.classes = distinct_classes(labels);

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for label in labels {
            *counts.entry(label.as_str()).or_default() += 1;
        }
        let total = labels.len() as f64;
        self.priors = self
            .classes
            .iter()
            .map(|c| counts.get(c.as_str()).copied().unwrap_or(0) as f64 / total)
            .collect();
        Ok(())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> ClassifierResult<Vec<Vec<f64>>> {
        if self.classes.is_empty() {
            return Err(ClassifierError::NotFitted);
        }
        check_features(features, self.width)?;
        Ok(vec![self.priors.clone(); features.len()])
    }
}
