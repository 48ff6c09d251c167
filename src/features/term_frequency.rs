//! Term-frequency features
//!
//! Bag-of-words counts over a vocabulary fitted on one fold's train rows.
//! Tokens are lowercase, whitespace separated, longer than two characters.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::registry::FoldColumns;
use super::{ColumnKey, FeatureName, FeatureTable};
use crate::folds::FoldPartition;
use crate::table::Column;

/// Vocabulary of the most frequent terms and their feature positions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermFrequency {
    /// Terms in feature order
    terms: Vec<String>,
    index: HashMap<String, usize>,
}

fn tokens(doc: &str) -> impl Iterator<Item = String> + '_ {
    doc.split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
}

impl TermFrequency {
    /// Keep the `max_features` terms with the highest document frequency.
    /// Ties are broken alphabetically so the vocabulary is deterministic.
    pub fn fit<'a>(documents: impl IntoIterator<Item = &'a str>, max_features: usize) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        for doc in documents {
            let unique: HashSet<String> = tokens(doc).collect();
            for word in unique {
                *doc_freq.entry(word).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = doc_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(max_features);

        let terms: Vec<String> = ranked.into_iter().map(|(w, _)| w).collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();
        Self { terms, index }
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Raw term counts of one document.
    pub fn transform(&self, document: &str) -> Vec<f64> {
        let mut counts = vec![0.0; self.terms.len()];
        for word in tokens(document) {
            if let Some(&i) = self.index.get(&word) {
                counts[i] += 1.0;
            }
        }
        counts
    }
}

/// Fit one vocabulary per fold on that fold's train rows and encode every
/// row with it. Returns one table per fold plus the registry entries.
pub fn build_term_frequency(
    model: &str,
    texts: &[String],
    partition: &FoldPartition,
    max_features: usize,
) -> (Vec<FeatureTable>, FoldColumns) {
    let mut tables = Vec::with_capacity(partition.len());
    let mut columns: FoldColumns = BTreeMap::new();

    for fold in partition.iter() {
        let vocab = TermFrequency::fit(fold.train.iter().map(|&i| texts[i].as_str()), max_features);
        tracing::debug!(
            "{} fold {}: vocabulary of {} terms from {} train rows",
            model,
            fold.index,
            vocab.len(),
            fold.train.len()
        );

        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(texts.len()); vocab.len()];
        for text in texts {
            for (col, count) in values.iter_mut().zip(vocab.transform(text)) {
                col.push(count);
            }
        }

        let keys: Vec<ColumnKey> = vocab
            .terms()
            .iter()
            .map(|t| ColumnKey::new(model, Some(fold.index), FeatureName::Named(t.clone())))
            .collect();
        columns.insert(fold.index, keys.clone());
        tables.push(FeatureTable::with_row_count(
            model,
            Some(fold.index),
            texts.len(),
            keys,
            values.into_iter().map(Column::Numeric).collect(),
        ));
    }

    (tables, columns)
}
