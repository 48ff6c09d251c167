//! Which frame columns belong to which language model and fold
//!
//! The registry maps `model -> fold -> ordered column keys`. Sentinel
//! columns (row number, duplicated label, dummy id) are never registered.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use super::{ColumnKey, FeatureName};
use crate::frame::{Frame, FrameError, FrameResult};

/// Number of non-feature columns in an encoded-sentence file:
/// leading row number plus the trailing label and dummy id.
pub const ENCODED_METADATA_COLUMNS: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum RegistryError {
    #[error("Language model '{0}' is already registered")]
    DuplicateModel(String),

    #[error("Column {key} does not belong to language model '{model}'")]
    ForeignColumn { model: String, key: String },

    #[error("Sentinel column {0} cannot be used as a feature")]
    SentinelColumn(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Per-fold column lists of one language model
pub type FoldColumns = BTreeMap<usize, Vec<ColumnKey>>;

/// Feature columns per language model and fold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRegistry {
    models: BTreeMap<String, FoldColumns>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model's per-fold columns. Every key must carry the
    /// model's own name, which is what keeps models disjoint.
    pub fn register(&mut self, model: &str, columns: FoldColumns) -> RegistryResult<()> {
        if self.models.contains_key(model) {
            return Err(RegistryError::DuplicateModel(model.to_string()));
        }
        for key in columns.values().flatten() {
            if key.model != model {
                return Err(RegistryError::ForeignColumn {
                    model: model.to_string(),
                    key: key.to_string(),
                });
            }
            if key.feature.is_sentinel() {
                return Err(RegistryError::SentinelColumn(key.to_string()));
            }
        }
        tracing::debug!(
            "Registered {} ({} folds, {} columns in fold 0)",
            model,
            columns.len(),
            columns.values().next().map(Vec::len).unwrap_or(0)
        );
        self.models.insert(model.to_string(), columns);
        Ok(())
    }

    pub fn contains(&self, model: &str) -> bool {
        self.models.contains_key(model)
    }

    pub fn models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn folds(&self, model: &str) -> Option<&FoldColumns> {
        self.models.get(model)
    }

    /// Columns registered for `model` in `fold`.
    pub fn columns(&self, model: &str, fold: usize) -> Option<&[ColumnKey]> {
        self.models
            .get(model)
            .and_then(|folds| folds.get(&fold))
            .map(Vec::as_slice)
    }

    /// Every distinct key registered for `model`, across folds.
    pub fn all_columns(&self, model: &str) -> BTreeSet<&ColumnKey> {
        self.models
            .get(model)
            .map(|folds| folds.values().flatten().collect())
            .unwrap_or_default()
    }

    /// Fail when a registered column is missing from the frame.
    pub fn validate_against(&self, frame: &Frame) -> FrameResult<()> {
        for key in self.models.values().flat_map(|f| f.values()).flatten() {
            if !frame.contains(key) {
                return Err(FrameError::UnknownColumn(key.to_string()));
            }
        }
        Ok(())
    }
}

/// The same column list under every fold key, for features that do not
/// vary by fold (a fixed lexicon, pretrained pooled embeddings).
pub fn replicate_across_folds(keys: &[ColumnKey], folds: usize) -> FoldColumns {
    (0..folds).map(|fold| (fold, keys.to_vec())).collect()
}

/// Positional feature keys `0..raw_columns - 3` for an encoded-sentence
/// file with `raw_columns` columns.
pub fn indexed_feature_keys(
    model: &str,
    fold: Option<usize>,
    raw_columns: usize,
) -> Vec<ColumnKey> {
    (0..raw_columns.saturating_sub(ENCODED_METADATA_COLUMNS))
        .map(|i| ColumnKey::indexed(model, fold, i))
        .collect()
}

/// Keys for source-named features (lexicon categories).
pub fn named_feature_keys<S: AsRef<str>>(
    model: &str,
    fold: Option<usize>,
    names: &[S],
) -> Vec<ColumnKey> {
    names
        .iter()
        .map(|n| ColumnKey::new(model, fold, FeatureName::Named(n.as_ref().to_string())))
        .collect()
}
