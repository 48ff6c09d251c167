//! Feature families extracted per language model
//!
//! A "language model" here is any method that turns a tweet into numbers:
//! a lexicon (LIWC, SEANCE), term frequencies, pretrained pooled embeddings,
//! or encoders fine-tuned per fold by the external training run.
//!
//! Every feature column is identified by a [`ColumnKey`]
//! `(model, fold, feature)`. Keys from different models or folds can never
//! collide, and they only become strings when written out or logged.
//!
//! The rendered form is unambiguous among the feature keys of one model.
//! Across models it is not (`Roberta` fold 1 and `Roberta1` both render
//! `Roberta1#2`), so strings are never used to look a column up.

pub mod loader;
pub mod registry;
pub mod term_frequency;

pub use loader::{FeatureLoader, LabelTable, LoadedModel};
pub use registry::FeatureRegistry;
pub use term_frequency::TermFrequency;

use std::fmt;

use crate::table::Column;

/// Feature part of a column key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureName {
    /// Positional feature, e.g. embedding dimension `i`
    Index(usize),
    /// Feature named in the source file (lexicon category, vocabulary term)
    Named(String),
    /// Leading row-number column of encoded-sentence files
    RowNumber,
    /// Duplicate label column carried by every encoded-sentence file
    Sentiment,
    /// Duplicate row identifier carried by every encoded-sentence file
    DummyId,
}

impl FeatureName {
    /// Metadata columns that ride along with the features but are never
    /// fed to a classifier.
    pub fn is_sentinel(&self) -> bool {
        matches!(
            self,
            FeatureName::RowNumber | FeatureName::Sentiment | FeatureName::DummyId
        )
    }
}

/// Globally unique identifier of one column of the modeling frame
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub model: String,
    /// `None` for features that do not vary by fold
    pub fold: Option<usize>,
    pub feature: FeatureName,
}

impl ColumnKey {
    pub fn new(model: impl Into<String>, fold: Option<usize>, feature: FeatureName) -> Self {
        Self {
            model: model.into(),
            fold,
            feature,
        }
    }

    pub fn indexed(model: &str, fold: Option<usize>, index: usize) -> Self {
        Self::new(model, fold, FeatureName::Index(index))
    }

    pub fn named(model: &str, fold: Option<usize>, name: &str) -> Self {
        Self::new(model, fold, FeatureName::Named(name.to_string()))
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.model)?;
        if let Some(fold) = self.fold {
            write!(f, "{}", fold)?;
        }
        match &self.feature {
            // A separator keeps `model1` + `12` apart from `model11` + `2`
            FeatureName::Index(i) => write!(f, "#{}", i),
            FeatureName::Named(name) => write!(f, "_{}", name),
            FeatureName::RowNumber => write!(f, "row"),
            FeatureName::Sentiment => write!(f, "_sentiment_"),
            FeatureName::DummyId => write!(f, "_dummy_id_"),
        }
    }
}

/// Rows of one language model (one fold, or fold-independent), with every
/// column already renamed to its structured key.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    pub model: String,
    pub fold: Option<usize>,
    n_rows: usize,
    keys: Vec<ColumnKey>,
    columns: Vec<Column>,
}

impl FeatureTable {
    /// Pair keys with columns. The caller guarantees equal column lengths
    /// (tables come out of [`crate::table::Table`], which enforces it).
    pub fn new(
        model: impl Into<String>,
        fold: Option<usize>,
        keys: Vec<ColumnKey>,
        columns: Vec<Column>,
    ) -> Self {
        let n_rows = columns.first().map(Column::len).unwrap_or(0);
        Self::with_row_count(model, fold, n_rows, keys, columns)
    }

    /// Like [`FeatureTable::new`], with the row count stated up front so a
    /// table without columns still knows how many rows it covers.
    pub fn with_row_count(
        model: impl Into<String>,
        fold: Option<usize>,
        n_rows: usize,
        keys: Vec<ColumnKey>,
        columns: Vec<Column>,
    ) -> Self {
        debug_assert_eq!(keys.len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == n_rows));
        Self {
            model: model.into(),
            fold,
            n_rows,
            keys,
            columns,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn keys(&self) -> &[ColumnKey] {
        &self.keys
    }

    pub fn column(&self, key: &ColumnKey) -> Option<&Column> {
        self.keys
            .iter()
            .position(|k| k == key)
            .map(|i| &self.columns[i])
    }

    /// Row identifiers from the dummy-id sentinel, when the table has one.
    pub fn row_ids(&self) -> Option<Vec<String>> {
        let i = self
            .keys
            .iter()
            .position(|k| k.feature == FeatureName::DummyId)?;
        let col = &self.columns[i];
        Some((0..col.len()).map(|row| col.cell(row)).collect())
    }

    pub fn into_parts(self) -> (Vec<ColumnKey>, Vec<Column>) {
        (self.keys, self.columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_key_rendering() {
        assert_eq!(
            ColumnKey::indexed("Roberta_CLS", Some(3), 17).to_string(),
            "Roberta_CLS3#17"
        );
        assert_eq!(ColumnKey::named("LIWC", None, "posemo").to_string(), "LIWC_posemo");
        assert_eq!(
            ColumnKey::new("FastText_lstm", Some(0), FeatureName::Sentiment).to_string(),
            "FastText_lstm0_sentiment_"
        );
        assert_eq!(
            ColumnKey::new("Pooled RoBERTa", None, FeatureName::DummyId).to_string(),
            "Pooled RoBERTa_dummy_id_"
        );
    }

    #[test]
    fn test_rendering_never_collides_across_fold_and_index() {
        let a = ColumnKey::indexed("m", Some(1), 12);
        let b = ColumnKey::indexed("m", Some(11), 2);
        assert_ne!(a, b);
        assert_ne!(a.to_string(), b.to_string());

        let rendered: HashSet<String> = (0..12)
            .flat_map(|fold| (0..12).map(move |i| ColumnKey::indexed("m", Some(fold), i)))
            .map(|k| k.to_string())
            .collect();
        assert_eq!(rendered.len(), 144);
    }

    #[test]
    fn test_row_count_without_columns() {
        let table =
            FeatureTable::with_row_count("Term Frequency", Some(0), 4, Vec::new(), Vec::new());
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.n_cols(), 0);
    }

    #[test]
    fn test_rendering_unique_within_one_model() {
        let names = ["1", "1_a", "_a", "a", "12", "2"];
        let keys: Vec<ColumnKey> = [None, Some(1), Some(11)]
            .into_iter()
            .flat_map(|fold| {
                let indexed = (0..12).map(move |i| ColumnKey::indexed("m", fold, i));
                let named = names.iter().map(move |n| ColumnKey::named("m", fold, n));
                indexed.chain(named)
            })
            .collect();
        let rendered: HashSet<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(rendered.len(), keys.len());

        // Across models only the structured key is unique
        let a = ColumnKey::indexed("Roberta", Some(1), 2);
        let b = ColumnKey::indexed("Roberta1", None, 2);
        assert_ne!(a, b);
        assert_eq!(a.to_string(), b.to_string());
    }

    #[test]
    fn test_row_ids_from_dummy_id() {
        let table = FeatureTable::new(
            "USE",
            None,
            vec![
                ColumnKey::indexed("USE", None, 0),
                ColumnKey::new("USE", None, FeatureName::DummyId),
            ],
            vec![
                Column::Numeric(vec![0.1, 0.2]),
                Column::Numeric(vec![10.0, 11.0]),
            ],
        );
        assert_eq!(table.row_ids(), Some(vec!["10".to_string(), "11".to_string()]));
        assert!(FeatureName::DummyId.is_sentinel());
        assert!(!FeatureName::Index(0).is_sentinel());
    }
}
