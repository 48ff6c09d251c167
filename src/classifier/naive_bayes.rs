//! Gaussian naive Bayes
//!
//! Per-class mean and variance for each feature. Variances get a small
//! smoothing term proportional to the largest feature variance so constant
//! features do not produce zero-width Gaussians.

use super::{
    check_features, check_training_input, distinct_classes, Classifier, ClassifierError,
    ClassifierResult,
};

const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Default)]
pub struct GaussianNb {
    classes: Vec<String>,
    log_priors: Vec<f64>,
    /// means[class][feature]
    means: Vec<Vec<f64>>,
    variances: Vec<Vec<f64>>,
}

impl GaussianNb {
    pub const NAME: &'static str = "GaussianNb";

    fn joint_log_likelihood(&self, row: &[f64]) -> Vec<f64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(c, _)| {
                let mut ll = self.log_priors[c];
                for (f, &x) in row.iter().enumerate() {
                    let var = self.variances[c][f];
                    let diff = x - self.means[c][f];
                    ll -= 0.5 * ((2.0 * std::f64::consts::PI * var).ln() + diff * diff / var);
                }
                ll
            })
            .collect()
    }
}

impl Classifier for GaussianNb {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn fit(&mut self, features: &[Vec<f64>], labels: &[String]) -> ClassifierResult<()> {
        let width = check_training_input(features, labels)?;
        self.classes = distinct_classes(labels);

        let n_classes = self.classes.len();
        let mut counts = vec![0usize; n_classes];
        let mut sums = vec![vec![0.0; width]; n_classes];
        let mut sq_sums = vec![vec![0.0; width]; n_classes];

        for (row, label) in features.iter().zip(labels) {
            // classes is sorted and contains every label
            let c = self
                .classes
                .binary_search(label)
                .map_err(|_| ClassifierError::Training(format!("unknown label {label}")))?;
            counts[c] += 1;
            for (f, &x) in row.iter().enumerate() {
                sums[c][f] += x;
                sq_sums[c][f] += x * x;
            }
        }

        // Smoothing scales with the overall feature spread
        let n = features.len() as f64;
        let max_var = (0..width)
            .map(|f| {
                let mean = features.iter().map(|r| r[f]).sum::<f64>() / n;
                features.iter().map(|r| (r[f] - mean).powi(2)).sum::<f64>() / n
            })
            .fold(0.0_f64, f64::max);
        let epsilon = VAR_SMOOTHING * max_var.max(1.0);

        self.means = Vec::with_capacity(n_classes);
        self.variances = Vec::with_capacity(n_classes);
        for c in 0..n_classes {
            let count = counts[c] as f64;
            let means: Vec<f64> = sums[c].iter().map(|s| s / count).collect();
            let vars = sq_sums[c]
                .iter()
                .zip(&means)
                .map(|(sq, m)| (sq / count - m * m).max(0.0) + epsilon)
                .collect();
            self.means.push(means);
            self.variances.push(vars);
        }
        self.log_priors = counts.iter().map(|&c| (c as f64 / n).ln()).collect();
        Ok(())
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn predict_proba(&self, features: &[Vec<f64>]) -> ClassifierResult<Vec<Vec<f64>>> {
        if self.classes.is_empty() {
            return Err(ClassifierError::NotFitted);
        }
        let width = self.means.first().map_or(0, Vec::len);
        check_features(features, width)?;

        Ok(features
            .iter()
            .map(|row| {
                // log-sum-exp normalisation
                let jll = self.joint_log_likelihood(row);
                let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let exp: Vec<f64> = jll.iter().map(|l| (l - max).exp()).collect();
                let total: f64 = exp.iter().sum();
                exp.iter().map(|e| e / total).collect()
            })
            .collect())
    }
}
