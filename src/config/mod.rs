//! Configuration module for sentiment-lab
//!
//! This module handles:
//! - Experiment configuration (experiment.toml)
//! - Language model definitions and their source files
//! - Classifier hyperparameters
//! - Output locations

mod experiment_config;

pub use experiment_config::{
    default_config_toml,
    load_experiment_config,
    ClassifierConfig,
    ConfigError,
    DatasetConfig,
    ExperimentConfig,
    ExplainConfig,
    FoldsConfig,
    LanguageModelConfig,
    LanguageModelKind,
    OutputConfig,
    CONFIG_FILE_NAME,
};
