//! sentiment-lab: sentiment classification experiments
//!
//! Merges per-language-model feature tables into one modeling frame,
//! cross-validates classifiers on every (language model, classifier) pair,
//! and reports metrics and feature attributions.

pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod experiment;
pub mod explain;
pub mod features;
pub mod folds;
pub mod frame;
pub mod metrics;
pub mod table;
