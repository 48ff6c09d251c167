//! Cross-validation driver and the (language model, classifier) sweep

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info};

use super::{Experiment, ExperimentError, ExperimentResult};
use crate::classifier::ClassifierSpec;
use crate::features::FeatureRegistry;
use crate::folds::FoldPartition;
use crate::frame::Frame;

/// Called after each finished pair with (pair, done, total)
pub type ProgressCallback = Box<dyn Fn(&str, usize, usize) + Send + Sync>;

/// Output column key of one (language model, classifier) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PairKey {
    pub language_model: String,
    pub classifier: String,
}

impl PairKey {
    pub fn new(language_model: impl Into<String>, classifier: impl Into<String>) -> Self {
        Self {
            language_model: language_model.into(),
            classifier: classifier.into(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.language_model, self.classifier)
    }
}

/// Predicted and true labels of one pair, concatenated over folds in fold
/// order and, within a fold, in test-row order.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub key: PairKey,
    pub predictions: Vec<String>,
    pub truths: Vec<String>,
}

/// Fit a fresh classifier per fold on the model's registered columns and
/// predict that fold's test rows.
pub fn cross_validate(
    registry: &FeatureRegistry,
    frame: &Frame,
    partition: &FoldPartition,
    spec: &ClassifierSpec,
    model: &str,
) -> ExperimentResult<PredictionRecord> {
    if !registry.contains(model) {
        return Err(ExperimentError::UnknownModel(model.to_string()));
    }

    let mut predictions = Vec::with_capacity(partition.test_rows());
    let mut truths = Vec::with_capacity(partition.test_rows());

    for fold in partition.iter() {
        let keys = registry
            .columns(model, fold.index)
            .ok_or_else(|| ExperimentError::MissingFold {
                model: model.to_string(),
                fold: fold.index,
            })?;

        let train_x = frame.select(keys, &fold.train)?;
        let train_y = frame.target_at(&fold.train)?;
        let test_x = frame.select(keys, &fold.test)?;
        let test_y = frame.target_at(&fold.test)?;

        let classifier_error = |source| ExperimentError::Classifier {
            model: model.to_string(),
            classifier: spec.name().to_string(),
            fold: fold.index,
            source,
        };

        let mut classifier = spec.build();
        classifier.fit(&train_x, &train_y).map_err(classifier_error)?;
        let fold_predictions = classifier.predict(&test_x).map_err(classifier_error)?;

        debug!(
            "{} / {} fold {}: {} features, {} train rows, {} test rows",
            model,
            spec.name(),
            fold.index,
            keys.len(),
            fold.train.len(),
            fold.test.len()
        );

        predictions.extend(fold_predictions);
        truths.extend(test_y);
    }

    Ok(PredictionRecord {
        key: PairKey::new(model, spec.name()),
        predictions,
        truths,
    })
}

/// Runs every (language model, classifier) pair of an experiment
pub struct Sweep<'a> {
    experiment: &'a Experiment,
    workers: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Sweep<'a> {
    pub fn new(experiment: &'a Experiment) -> Self {
        Self {
            experiment,
            workers: 1,
            progress_callback: None,
        }
    }

    /// Number of pairs trained concurrently (1 = serial).
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Cross-validate every pair. Records come back model-major, in the
    /// order of `models` then `specs`, whatever the worker count.
    pub fn run(
        &self,
        models: &[String],
        specs: &[ClassifierSpec],
    ) -> ExperimentResult<Vec<PredictionRecord>> {
        for model in models {
            self.experiment.require_model(model)?;
        }

        let pairs: Vec<(&str, &ClassifierSpec)> = models
            .iter()
            .flat_map(|m| specs.iter().map(move |s| (m.as_str(), s)))
            .collect();
        let total = pairs.len();
        let completed = AtomicUsize::new(0);

        info!("Cross-validating {} pairs on {} worker(s)", total, self.workers);

        let run_pair =
            |(model, spec): &(&str, &ClassifierSpec)| -> ExperimentResult<PredictionRecord> {
                let exp = self.experiment;
                let record =
                    cross_validate(&exp.registry, &exp.frame, &exp.partition, spec, model)?;

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref callback) = self.progress_callback {
                    callback(&record.key.to_string(), done, total);
                }
                info!("Finished {} ({}/{})", record.key, done, total);
                Ok(record)
            };

        if self.workers == 1 {
            return pairs.iter().map(run_pair).collect();
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        pool.install(|| pairs.par_iter().map(run_pair).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierSpec;
    use crate::features::registry::replicate_across_folds;
    use crate::features::{ColumnKey, FeatureTable};
    use crate::folds::FixedSplit;
    use crate::frame::FrameAssembler;
    use crate::table::Column;

    /// 10 rows, one feature per model, labels skewed towards "neutral".
    fn experiment(folds: usize) -> Experiment {
        let labels: Vec<String> = [
            "neutral", "positive", "neutral", "negative", "neutral", "neutral", "positive",
            "negative", "neutral", "positive",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut registry = FeatureRegistry::new();
        let mut assembler = FrameAssembler::new(labels);
        for model in ["LIWC", "SEANCE"] {
            let key = ColumnKey::indexed(model, None, 0);
            let values = (0..10).map(|r| r as f64).collect();
            assembler.push(FeatureTable::new(
                model,
                None,
                vec![key.clone()],
                vec![Column::Numeric(values)],
            ));
            registry
                .register(model, replicate_across_folds(&[key], folds))
                .unwrap();
        }
        let frame = assembler.assemble().unwrap();
        let partition = FixedSplit::new(6, folds).partition(10).unwrap();
        Experiment::from_parts(frame, registry, partition).unwrap()
    }

    #[test]
    fn test_majority_predicts_majority_for_every_test_row() {
        let exp = experiment(1);
        let record = cross_validate(
            &exp.registry,
            &exp.frame,
            &exp.partition,
            &ClassifierSpec::Majority,
            "LIWC",
        )
        .unwrap();

        assert_eq!(record.key.to_string(), "LIWC_MajorityClassifier");
        assert_eq!(record.predictions, vec!["neutral"; 4]);
        assert_eq!(record.truths, vec!["positive", "negative", "neutral", "positive"]);
    }

    #[test]
    fn test_records_span_all_folds() {
        let exp = experiment(3);
        let record = cross_validate(
            &exp.registry,
            &exp.frame,
            &exp.partition,
            &ClassifierSpec::Majority,
            "SEANCE",
        )
        .unwrap();
        assert_eq!(record.predictions.len(), 3 * 4);
        assert_eq!(record.truths.len(), record.predictions.len());
    }

    #[test]
    fn test_unknown_model_rejected() {
        let exp = experiment(1);
        assert!(matches!(
            cross_validate(
                &exp.registry,
                &exp.frame,
                &exp.partition,
                &ClassifierSpec::Majority,
                "USE"
            ),
            Err(ExperimentError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_sweep_order_is_deterministic() {
        let exp = experiment(2);
        let models = vec!["SEANCE".to_string(), "LIWC".to_string()];
        let specs = vec![ClassifierSpec::Majority, ClassifierSpec::GaussianNb];

        let serial = Sweep::new(&exp).run(&models, &specs).unwrap();
        let parallel = Sweep::new(&exp).workers(4).run(&models, &specs).unwrap();

        let keys: Vec<String> = serial.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "SEANCE_MajorityClassifier",
                "SEANCE_GaussianNb",
                "LIWC_MajorityClassifier",
                "LIWC_GaussianNb"
            ]
        );
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_progress_callback_counts_pairs() {
        use std::sync::{Arc, Mutex};

        let exp = experiment(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        Sweep::new(&exp)
            .with_progress_callback(Box::new(move |_: &str, done: usize, total: usize| {
                sink.lock().unwrap().push((done, total));
            }))
            .run(&["LIWC".to_string()], &[ClassifierSpec::Majority, ClassifierSpec::GaussianNb])
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }
}
