//! Experiment preparation and cross-validation
//!
//! [`Experiment::prepare`] loads the labels and every configured language
//! model once, registers their feature columns, and assembles the modeling
//! frame. Everything after that (the sweep, explanations) only reads it.

mod cross_validation;

pub use cross_validation::{cross_validate, PairKey, PredictionRecord, ProgressCallback, Sweep};

use thiserror::Error;
use tracing::{debug, info};

use crate::classifier::ClassifierError;
use crate::config::ExperimentConfig;
use crate::features::loader::LoadError;
use crate::features::registry::RegistryError;
use crate::features::{FeatureLoader, FeatureRegistry, LabelTable};
use crate::folds::{FoldPartition, SplitError};
use crate::frame::{Frame, FrameAssembler, FrameError};

#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("{model} / {classifier}, fold {fold}: {source}")]
    Classifier {
        model: String,
        classifier: String,
        fold: usize,
        #[source]
        source: ClassifierError,
    },

    #[error("Language model '{0}' is not registered")]
    UnknownModel(String),

    #[error("Language model '{model}' has no columns for fold {fold}")]
    MissingFold { model: String, fold: usize },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;

/// Read-only inputs shared by every (language model, classifier) run
#[derive(Debug, Clone)]
pub struct Experiment {
    pub frame: Frame,
    pub registry: FeatureRegistry,
    pub partition: FoldPartition,
    /// Language models in configured order
    pub models: Vec<String>,
}

impl Experiment {
    /// Load labels and features, partition rows, assemble the frame.
    pub fn prepare(config: &ExperimentConfig) -> ExperimentResult<Self> {
        let label_paths = config.dataset.label_paths();
        let labels = LabelTable::load(
            &label_paths,
            &config.dataset.label_column,
            &config.dataset.text_column,
        )?;

        let partition = config.folds.partition(labels.len())?;
        info!(
            "Fold plan: {} folds over {} rows ({} test rows in total)",
            partition.len(),
            labels.len(),
            partition.test_rows()
        );

        let loader = FeatureLoader::new(
            config.dataset.embeddings_path(),
            config.dataset.name.as_str(),
            partition.len(),
        );

        let mut registry = FeatureRegistry::new();
        let mut models = Vec::with_capacity(config.language_models.len());
        let mut tables = Vec::new();
        for lm in &config.language_models {
            let loaded = loader.load(lm, labels.texts.as_deref(), &partition)?;
            registry.register(&loaded.name, loaded.columns)?;
            tables.extend(loaded.tables);
            models.push(loaded.name);
        }

        let mut assembler = FrameAssembler::new(labels.labels);
        if !config.dataset.check_row_ids {
            assembler = assembler.without_row_id_check();
        }
        assembler.extend(tables);
        let frame = assembler.assemble()?;

        registry.validate_against(&frame)?;
        debug!("Registry validated against frame ({} models)", models.len());

        Ok(Self {
            frame,
            registry,
            partition,
            models,
        })
    }

    /// Assemble from already built parts, validating the registry.
    pub fn from_parts(
        frame: Frame,
        registry: FeatureRegistry,
        partition: FoldPartition,
    ) -> ExperimentResult<Self> {
        registry.validate_against(&frame)?;
        let models = registry.models().map(str::to_string).collect();
        Ok(Self {
            frame,
            registry,
            partition,
            models,
        })
    }

    /// Fail early on a model name the registry does not know.
    pub fn require_model(&self, model: &str) -> ExperimentResult<()> {
        if self.registry.contains(model) {
            Ok(())
        } else {
            Err(ExperimentError::UnknownModel(model.to_string()))
        }
    }
}
