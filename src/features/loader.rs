//! Reading per-model feature files into keyed feature tables
//!
//! Every feature source is a pair of files, `<stem>train.csv` and
//! `<stem>test.csv`. They are stacked train rows first, then test rows, which
//! is the row order of the label table they are later joined against.
//!
//! Encoded-sentence files follow a fixed column convention:
//! `row, f0 .. fN-1, sentiment, dummy_id`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::registry::{
    indexed_feature_keys, named_feature_keys, replicate_across_folds, FoldColumns,
    ENCODED_METADATA_COLUMNS,
};
use super::term_frequency::build_term_frequency;
use super::{ColumnKey, FeatureName, FeatureTable};
use crate::config::{LanguageModelConfig, LanguageModelKind};
use crate::folds::FoldPartition;
use crate::table::{Column, Table, TableError};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Table(#[from] TableError),

    #[error("{model}: feature '{feature}' not found in {path}")]
    UnknownFeature {
        model: String,
        feature: String,
        path: PathBuf,
    },

    #[error("{model}: feature '{feature}' is not numeric")]
    NonNumericFeature { model: String, feature: String },

    #[error("{model}: sorted lexicon needs a sort_by column")]
    MissingSortKey { model: String },

    #[error("{model}: term-frequency features need the label table text column")]
    MissingText { model: String },

    #[error("{model}: fold {fold} train rows have no term longer than two characters")]
    EmptyVocabulary { model: String, fold: usize },
}

pub type LoadResult<T> = Result<T, LoadError>;

/// Feature tables of one language model plus its registry entry
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub name: String,
    pub tables: Vec<FeatureTable>,
    pub columns: FoldColumns,
}

/// Target labels (and optionally tweet text) for every row
#[derive(Debug, Clone)]
pub struct LabelTable {
    pub labels: Vec<String>,
    pub texts: Option<Vec<String>>,
}

impl LabelTable {
    /// Stack the label sources in order and pull out the target column.
    pub fn load(paths: &[PathBuf], label_column: &str, text_column: &str) -> LoadResult<Self> {
        let mut stacked: Option<Table> = None;
        for path in paths {
            let table = Table::read_csv(path)?;
            debug!("Read {} ({} rows)", path.display(), table.n_rows());
            stacked = Some(match stacked {
                None => table,
                Some(acc) => acc.vconcat(table)?,
            });
        }
        let Some(table) = stacked else {
            return Ok(Self {
                labels: Vec::new(),
                texts: None,
            });
        };

        let labels = table.text(label_column)?;
        let texts = table.text(text_column).ok();
        info!("Loaded {} labelled rows", labels.len());
        Ok(Self { labels, texts })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Locates and reads feature files under one directory
#[derive(Debug, Clone)]
pub struct FeatureLoader {
    dir: PathBuf,
    dataset: String,
    folds: usize,
}

impl FeatureLoader {
    pub fn new(dir: impl Into<PathBuf>, dataset: impl Into<String>, folds: usize) -> Self {
        Self {
            dir: dir.into(),
            dataset: dataset.into(),
            folds,
        }
    }

    /// `<dir>/<stem><part>.csv` with `{dataset}` and `{fold}` substituted.
    pub fn source_path(&self, template: &str, fold: Option<usize>, part: &str) -> PathBuf {
        let mut stem = template.replace("{dataset}", &self.dataset);
        if let Some(fold) = fold {
            stem = stem.replace("{fold}", &fold.to_string());
        }
        self.dir.join(format!("{stem}{part}.csv"))
    }

    /// Train rows followed by test rows of one source.
    pub fn read_split(&self, template: &str, fold: Option<usize>) -> LoadResult<Table> {
        let train_path = self.source_path(template, fold, "train");
        let test_path = self.source_path(template, fold, "test");
        let train = Table::read_csv(&train_path)?;
        let test = Table::read_csv(&test_path)?;
        debug!(
            "Read {} ({} rows) + {} ({} rows)",
            train_path.display(),
            train.n_rows(),
            test_path.display(),
            test.n_rows()
        );
        Ok(train.vconcat(test)?)
    }

    /// Load every table of one configured language model.
    pub fn load(
        &self,
        lm: &LanguageModelConfig,
        texts: Option<&[String]>,
        partition: &FoldPartition,
    ) -> LoadResult<LoadedModel> {
        let loaded = match lm.kind {
            LanguageModelKind::FoldEmbedding => {
                let mut tables = Vec::with_capacity(self.folds);
                let mut columns = BTreeMap::new();
                for fold in 0..self.folds {
                    let (table, keys) = self.load_encoded(&lm.name, &lm.source, Some(fold))?;
                    tables.push(table);
                    columns.insert(fold, keys);
                }
                LoadedModel {
                    name: lm.name.clone(),
                    tables,
                    columns,
                }
            }
            LanguageModelKind::PooledEmbedding => {
                let (table, keys) = self.load_encoded(&lm.name, &lm.source, None)?;
                LoadedModel {
                    name: lm.name.clone(),
                    tables: vec![table],
                    columns: replicate_across_folds(&keys, self.folds),
                }
            }
            LanguageModelKind::Lexicon => self.load_lexicon(lm)?,
            LanguageModelKind::SortedLexicon => self.load_sorted_lexicon(lm)?,
            LanguageModelKind::TermFrequency => {
                let texts = texts.ok_or_else(|| LoadError::MissingText {
                    model: lm.name.clone(),
                })?;
                let (tables, columns) =
                    build_term_frequency(&lm.name, texts, partition, lm.max_features);
                if let Some((&fold, _)) = columns.iter().find(|(_, keys)| keys.is_empty()) {
                    return Err(LoadError::EmptyVocabulary {
                        model: lm.name.clone(),
                        fold,
                    });
                }
                LoadedModel {
                    name: lm.name.clone(),
                    tables,
                    columns,
                }
            }
        };

        info!(
            "Loaded {}: {} table(s), {} feature columns per fold",
            loaded.name,
            loaded.tables.len(),
            loaded.columns.values().next().map(Vec::len).unwrap_or(0)
        );
        Ok(loaded)
    }

    /// Read one encoded-sentence source and key its columns.
    ///
    /// The leading column becomes the row-number sentinel, the two trailing
    /// columns the per-model `_sentiment_` / `_dummy_id_` sentinels, and
    /// everything in between positional features `0..columns - 3`.
    pub fn load_encoded(
        &self,
        model: &str,
        template: &str,
        fold: Option<usize>,
    ) -> LoadResult<(FeatureTable, Vec<ColumnKey>)> {
        let table = self.read_split(template, fold)?;
        let n = table.n_cols();
        if n < ENCODED_METADATA_COLUMNS {
            return Err(TableError::TooFewColumns {
                path: self.source_path(template, fold, "train"),
                found: n,
                required: ENCODED_METADATA_COLUMNS,
            }
            .into());
        }

        let features = indexed_feature_keys(model, fold, n);
        let mut keys = Vec::with_capacity(n);
        keys.push(ColumnKey::new(model, fold, FeatureName::RowNumber));
        keys.extend(features.iter().cloned());
        keys.push(ColumnKey::new(model, fold, FeatureName::Sentiment));
        keys.push(ColumnKey::new(model, fold, FeatureName::DummyId));

        let (_, columns) = table.into_parts();
        Ok((FeatureTable::new(model, fold, keys, columns), features))
    }

    fn load_lexicon(&self, lm: &LanguageModelConfig) -> LoadResult<LoadedModel> {
        let mut table = self.read_split(&lm.source, None)?;
        for (from, to) in &lm.rename {
            table.rename(from, to)?;
        }
        self.keyed_lexicon(lm, table)
    }

    fn load_sorted_lexicon(&self, lm: &LanguageModelConfig) -> LoadResult<LoadedModel> {
        let sort_by = lm.sort_by.as_deref().ok_or_else(|| LoadError::MissingSortKey {
            model: lm.name.clone(),
        })?;

        // Each half is sorted on its own; train rows still come first.
        let mut train = Table::read_csv(&self.source_path(&lm.source, None, "train"))?;
        let mut test = Table::read_csv(&self.source_path(&lm.source, None, "test"))?;
        train.sort_by(sort_by)?;
        test.sort_by(sort_by)?;
        let mut table = train.vconcat(test)?;
        table.drop_column(sort_by)?;
        for (from, to) in &lm.rename {
            table.rename(from, to)?;
        }
        self.keyed_lexicon(lm, table)
    }

    /// Key every lexicon column by name and register the feature subset.
    fn keyed_lexicon(&self, lm: &LanguageModelConfig, table: Table) -> LoadResult<LoadedModel> {
        let features: Vec<String> = if lm.features.is_empty() {
            table
                .headers()
                .iter()
                .zip(table.columns())
                .filter(|(_, col)| matches!(col, Column::Numeric(_)))
                .map(|(name, _)| name.clone())
                .collect()
        } else {
            for feature in &lm.features {
                match table.column(feature) {
                    Ok(Column::Numeric(_)) => {}
                    Ok(Column::Text(_)) => {
                        return Err(LoadError::NonNumericFeature {
                            model: lm.name.clone(),
                            feature: feature.clone(),
                        })
                    }
                    Err(_) => {
                        return Err(LoadError::UnknownFeature {
                            model: lm.name.clone(),
                            feature: feature.clone(),
                            path: self.source_path(&lm.source, None, "train"),
                        })
                    }
                }
            }
            lm.features.clone()
        };

        let (headers, columns) = table.into_parts();
        let keys = named_feature_keys(&lm.name, None, &headers);
        let registered = named_feature_keys(&lm.name, None, &features);

        Ok(LoadedModel {
            name: lm.name.clone(),
            tables: vec![FeatureTable::new(&lm.name, None, keys, columns)],
            columns: replicate_across_folds(&registered, self.folds),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::folds::FixedSplit;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn encoded_rows(start: usize, rows: usize, dims: usize) -> String {
        let mut body = String::from("row");
        for d in 0..dims {
            body.push_str(&format!(",{d}"));
        }
        body.push_str(",sentiment,dummy_id\n");
        for r in start..start + rows {
            body.push_str(&r.to_string());
            for d in 0..dims {
                body.push_str(&format!(",{}", (r * 10 + d) as f64 / 100.0));
            }
            body.push_str(&format!(",positive,{r}\n"));
        }
        body
    }

    fn partition(rows: usize) -> FoldPartition {
        FixedSplit::new(rows - 1, 2).partition(rows).unwrap()
    }

    #[test]
    fn test_fold_embedding_columns_and_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        for fold in 0..2 {
            write(
                dir.path(),
                &format!("fasttext_encoded_sentences_{fold}train.csv"),
                &encoded_rows(0, 3, 4),
            );
            write(
                dir.path(),
                &format!("fasttext_encoded_sentences_{fold}test.csv"),
                &encoded_rows(3, 2, 4),
            );
        }
        let loader = FeatureLoader::new(dir.path(), "semeval", 2);
        let lm = LanguageModelConfig::new(
            "FastText_lstm",
            LanguageModelKind::FoldEmbedding,
            "fasttext_encoded_sentences_{fold}",
        );
        let loaded = loader.load(&lm, None, &partition(5)).unwrap();

        assert_eq!(loaded.tables.len(), 2);
        let table = &loaded.tables[1];
        // train rows + test rows
        assert_eq!(table.n_rows(), 5);
        assert_eq!(table.n_cols(), 7);
        assert_eq!(
            table.keys()[5],
            ColumnKey::new("FastText_lstm", Some(1), FeatureName::Sentiment)
        );
        assert_eq!(table.keys()[5].to_string(), "FastText_lstm1_sentiment_");
        assert_eq!(
            table.row_ids().unwrap(),
            vec!["0", "1", "2", "3", "4"]
        );

        let fold1 = &loaded.columns[&1];
        assert_eq!(fold1.len(), 4);
        assert!(fold1.iter().all(|k| k.fold == Some(1) && !k.feature.is_sentinel()));
        // Registered columns select cleanly out of the table
        for key in fold1 {
            assert_eq!(table.column(key).unwrap().len(), 5);
        }
    }

    #[test]
    fn test_pooled_embedding_replicated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "USE_encoded_sentencestrain.csv", &encoded_rows(0, 2, 3));
        write(dir.path(), "USE_encoded_sentencestest.csv", &encoded_rows(2, 2, 3));
        let loader = FeatureLoader::new(dir.path(), "semeval", 3);
        let lm = LanguageModelConfig::new(
            "Universal Sentence Encoder",
            LanguageModelKind::PooledEmbedding,
            "USE_encoded_sentences",
        );
        let loaded = loader.load(&lm, None, &partition(4)).unwrap();
        assert_eq!(loaded.tables.len(), 1);
        assert_eq!(loaded.columns.len(), 3);
        assert_eq!(loaded.columns[&0], loaded.columns[&2]);
        assert_eq!(loaded.columns[&0][0].fold, None);
    }

    #[test]
    fn test_lexicon_rename_and_feature_check() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "LIWC2015_semeval_train.csv", "A,B,C,WC,posemo\n1,pos,good day,2,50\n");
        write(dir.path(), "LIWC2015_semeval_test.csv", "A,B,C,WC,posemo\n2,neg,bad day,2,0\n");
        let loader = FeatureLoader::new(dir.path(), "semeval", 2);

        let mut lm =
            LanguageModelConfig::new("LIWC", LanguageModelKind::Lexicon, "LIWC2015_{dataset}_");
        lm.rename.insert("C".into(), "text_liwc".into());
        lm.features = vec!["WC".into(), "posemo".into()];
        let loaded = loader.load(&lm, None, &partition(2)).unwrap();
        assert_eq!(
            loaded.columns[&1],
            vec![ColumnKey::named("LIWC", None, "WC"), ColumnKey::named("LIWC", None, "posemo")]
        );
        assert!(loaded.tables[0]
            .column(&ColumnKey::named("LIWC", None, "text_liwc"))
            .is_some());

        lm.features = vec!["missing".into()];
        assert!(matches!(
            loader.load(&lm, None, &partition(2)),
            Err(LoadError::UnknownFeature { .. })
        ));
        lm.features = vec!["text_liwc".into()];
        assert!(matches!(
            loader.load(&lm, None, &partition(2)),
            Err(LoadError::NonNumericFeature { .. })
        ));
    }

    #[test]
    fn test_sorted_lexicon_sorts_each_half() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "seance_semeval_train.csv", "filename,joy\nb.txt,2\na.txt,1\n");
        write(dir.path(), "seance_semeval_test.csv", "filename,joy\nd.txt,4\nc.txt,3\n");
        let loader = FeatureLoader::new(dir.path(), "semeval", 1);
        let mut lm = LanguageModelConfig::new(
            "SEANCE",
            LanguageModelKind::SortedLexicon,
            "seance_{dataset}_",
        );
        lm.sort_by = Some("filename".into());

        let loaded = loader.load(&lm, None, &partition(4)).unwrap();
        let joy = ColumnKey::named("SEANCE", None, "joy");
        assert_eq!(loaded.columns[&0], vec![joy.clone()]);
        assert_eq!(
            loaded.tables[0].column(&joy).unwrap(),
            &Column::Numeric(vec![1.0, 2.0, 3.0, 4.0])
        );
    }

    #[test]
    fn test_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FeatureLoader::new(dir.path(), "semeval", 1);
        let lm = LanguageModelConfig::new(
            "Pooled RoBERTa",
            LanguageModelKind::PooledEmbedding,
            "roberta_pooled",
        );
        let err = loader.load(&lm, None, &partition(2)).unwrap_err();
        assert!(matches!(err, LoadError::Table(TableError::Io { .. })), "got {err:?}");
    }

    #[test]
    fn test_term_frequency_requires_text() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FeatureLoader::new(dir.path(), "semeval", 2);
        let lm = LanguageModelConfig::new("Term Frequency", LanguageModelKind::TermFrequency, "");
        assert!(matches!(
            loader.load(&lm, None, &partition(3)),
            Err(LoadError::MissingText { .. })
        ));

        let texts: Vec<String> = vec!["good good".into(), "bad".into(), "good".into()];
        let loaded = loader.load(&lm, Some(texts.as_slice()), &partition(3)).unwrap();
        assert_eq!(loaded.tables.len(), 2);
    }

    #[test]
    fn test_term_frequency_empty_vocabulary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FeatureLoader::new(dir.path(), "semeval", 2);
        let lm = LanguageModelConfig::new("Term Frequency", LanguageModelKind::TermFrequency, "");
        let texts: Vec<String> = ["ok", "no", "a b", "hi"].iter().map(|t| t.to_string()).collect();
        let err = loader.load(&lm, Some(texts.as_slice()), &partition(4)).unwrap_err();
        match err {
            LoadError::EmptyVocabulary { model, fold } => {
                assert_eq!(model, "Term Frequency");
                assert_eq!(fold, 0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_label_table_stacks_sources() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "semtrain.csv", "id,text,sentiment\n1,nice,positive\n2,meh,neutral\n");
        write(dir.path(), "semtest.csv", "id,text,sentiment\n3,awful,negative\n");
        let labels = LabelTable::load(
            &[dir.path().join("semtrain.csv"), dir.path().join("semtest.csv")],
            "sentiment",
            "text",
        )
        .unwrap();
        assert_eq!(labels.labels, vec!["positive", "neutral", "negative"]);
        assert_eq!(labels.texts.unwrap(), vec!["nice", "meh", "awful"]);
    }
}
