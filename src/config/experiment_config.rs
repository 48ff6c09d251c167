//! Experiment configuration support
//!
//! Loads the experiment definition from `experiment.toml`. Every section and
//! field is optional; the defaults reproduce the SemEval tweet setup.
//!
//! # Configuration Format
//!
//! ```toml
//! # experiment.toml
//!
//! [dataset]
//! name = "semeval"
//! root = "./semeval_data"
//! label_files = ["source_data/semtrain.csv", "source_data/semtest.csv"]
//!
//! [folds]
//! count = 5
//! train_row_count = 6000
//!
//! [[language_models]]
//! name = "FastText_lstm"
//! kind = "fold_embedding"
//! source = "fasttext_encoded_sentences_{fold}"
//!
//! [classifier]
//! estimators = 250
//! kinds = ["gbdt"]
//! ```
//!
//! `{dataset}` and `{fold}` in a `source` are substituted; `train.csv` /
//! `test.csv` is appended to locate the two halves of a feature file.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::classifier::{ClassifierKind, ClassifierSpec, GbdtParams};
use crate::folds::{split_rows, FoldPartition, SplitResult, SplitStrategy};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "experiment.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Full experiment definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub dataset: DatasetConfig,
    pub folds: FoldsConfig,
    pub classifier: ClassifierConfig,
    pub output: OutputConfig,
    pub explain: ExplainConfig,
    /// Language models in sweep order
    pub language_models: Vec<LanguageModelConfig>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetConfig::default(),
            folds: FoldsConfig::default(),
            classifier: ClassifierConfig::default(),
            output: OutputConfig::default(),
            explain: ExplainConfig::default(),
            language_models: default_language_models(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Dataset name, used in file templates and plot names
    pub name: String,
    /// Directory holding the label sources and `embeddings/`
    pub root: PathBuf,
    /// Label sources, relative to `root`, concatenated in order
    pub label_files: Vec<PathBuf>,
    /// Target column in the label sources
    pub label_column: String,
    /// Tweet text column in the label sources (term-frequency features)
    pub text_column: String,
    /// Feature files directory, relative to `root`
    pub embeddings_dir: PathBuf,
    /// Compare dummy ids across encoded-sentence tables before joining
    pub check_row_ids: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "semeval".to_string(),
            root: PathBuf::from("./semeval_data"),
            label_files: vec![
                PathBuf::from("source_data/semtrain.csv"),
                PathBuf::from("source_data/semtest.csv"),
            ],
            label_column: "sentiment".to_string(),
            text_column: "text".to_string(),
            embeddings_dir: PathBuf::from("embeddings"),
            check_row_ids: true,
        }
    }
}

impl DatasetConfig {
    pub fn label_paths(&self) -> Vec<PathBuf> {
        self.label_files.iter().map(|f| self.root.join(f)).collect()
    }

    pub fn embeddings_path(&self) -> PathBuf {
        self.root.join(&self.embeddings_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FoldsConfig {
    pub count: usize,
    /// Rows below this index train, the rest test (fixed strategy)
    pub train_row_count: usize,
    pub strategy: SplitStrategy,
    /// Shuffle seed (kfold strategy)
    pub shuffle_seed: u64,
    /// Accept a split point beyond the last row, leaving test sets empty
    pub allow_empty_test: bool,
}

impl Default for FoldsConfig {
    fn default() -> Self {
        Self {
            count: 5,
            train_row_count: 6000,
            strategy: SplitStrategy::Fixed,
            shuffle_seed: 2020,
            allow_empty_test: false,
        }
    }
}

impl FoldsConfig {
    pub fn partition(&self, total_rows: usize) -> SplitResult<FoldPartition> {
        split_rows(
            self.strategy,
            self.count,
            self.train_row_count,
            self.shuffle_seed,
            self.allow_empty_test,
            total_rows,
        )
    }
}

/// How a language model's features are stored on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LanguageModelKind {
    /// Named categories in one train/test file pair (LIWC)
    Lexicon,
    /// Like `Lexicon`, but rows must be sorted by a key column first (SEANCE)
    SortedLexicon,
    /// Encoded sentences from an encoder trained separately per fold
    FoldEmbedding,
    /// Encoded sentences from a pretrained encoder, shared by all folds
    PooledEmbedding,
    /// Term counts over a vocabulary fitted per fold
    TermFrequency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageModelConfig {
    pub name: String,
    pub kind: LanguageModelKind,
    /// File stem template, without the `train.csv` / `test.csv` suffix
    #[serde(default)]
    pub source: String,
    /// Vocabulary size of term-frequency models
    #[serde(default = "default_max_features")]
    pub max_features: usize,
    /// Feature columns of a lexicon (empty = every numeric column)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
    /// Key column to sort a sorted lexicon by; dropped afterwards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    /// Source column renames applied after loading
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub rename: BTreeMap<String, String>,
}

fn default_max_features() -> usize {
    1000
}

impl LanguageModelConfig {
    pub fn new(name: &str, kind: LanguageModelKind, source: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            source: source.to_string(),
            features: Vec::new(),
            sort_by: None,
            rename: BTreeMap::new(),
            max_features: default_max_features(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Boosting rounds
    pub estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u32,
    /// Row sampling ratio per tree
    pub subsample: f64,
    /// Column sampling ratio per tree
    pub colsample: f64,
    /// Classifiers trained for every language model, in output order
    pub kinds: Vec<ClassifierKind>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            estimators: 250,
            learning_rate: 0.03,
            max_depth: 10,
            subsample: 0.7,
            colsample: 0.6,
            kinds: vec![ClassifierKind::Gbdt],
        }
    }
}

impl ClassifierConfig {
    pub fn gbdt_params(&self) -> GbdtParams {
        GbdtParams {
            estimators: self.estimators,
            learning_rate: self.learning_rate,
            max_depth: self.max_depth,
            subsample: self.subsample,
            colsample: self.colsample,
        }
    }

    pub fn spec(&self, kind: ClassifierKind) -> ClassifierSpec {
        match kind {
            ClassifierKind::Gbdt => ClassifierSpec::Gbdt(self.gbdt_params()),
            ClassifierKind::GaussianNb => ClassifierSpec::GaussianNb,
            ClassifierKind::Majority => ClassifierSpec::Majority,
        }
    }

    pub fn specs(&self) -> Vec<ClassifierSpec> {
        self.kinds.iter().map(|&k| self.spec(k)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Predictions table, relative to the dataset root
    pub predictions: PathBuf,
    /// Ground-truth table, relative to the dataset root
    pub trues: PathBuf,
    /// Metrics summary, relative to the dataset root
    pub metrics: PathBuf,
    /// Explanation plots directory
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            predictions: PathBuf::from("predictions.csv"),
            trues: PathBuf::from("trues.csv"),
            metrics: PathBuf::from("metrics.json"),
            results_dir: PathBuf::from("./results"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Test rows explained per run
    pub samples: usize,
    /// Train rows averaged into the background reference
    pub background: usize,
    pub seed: u64,
    /// Features shown in the summary plot
    pub top_features: usize,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            samples: 200,
            background: 100,
            seed: 2020,
            top_features: 20,
        }
    }
}

impl ExperimentConfig {
    pub fn predictions_path(&self) -> PathBuf {
        self.dataset.root.join(&self.output.predictions)
    }

    pub fn trues_path(&self) -> PathBuf {
        self.dataset.root.join(&self.output.trues)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.dataset.root.join(&self.output.metrics)
    }

    pub fn language_model(&self, name: &str) -> Option<&LanguageModelConfig> {
        self.language_models.iter().find(|lm| lm.name == name)
    }

    /// Reject configurations that cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.folds.count == 0 {
            return Err(ConfigError::Invalid("folds.count must be at least 1".into()));
        }
        if self.language_models.is_empty() {
            return Err(ConfigError::Invalid("no language models configured".into()));
        }
        if self.classifier.kinds.is_empty() {
            return Err(ConfigError::Invalid("classifier.kinds is empty".into()));
        }
        for (name, ratio) in [
            ("subsample", self.classifier.subsample),
            ("colsample", self.classifier.colsample),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(ConfigError::Invalid(format!(
                    "classifier.{name} must be in (0, 1], got {ratio}"
                )));
            }
        }
        if self.classifier.estimators == 0 {
            return Err(ConfigError::Invalid("classifier.estimators must be at least 1".into()));
        }

        let mut seen = HashSet::new();
        for lm in &self.language_models {
            if !seen.insert(lm.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "language model '{}' is defined twice",
                    lm.name
                )));
            }
            match lm.kind {
                LanguageModelKind::SortedLexicon if lm.sort_by.is_none() => {
                    return Err(ConfigError::Invalid(format!(
                        "sorted lexicon '{}' needs sort_by",
                        lm.name
                    )));
                }
                LanguageModelKind::TermFrequency if lm.max_features == 0 => {
                    return Err(ConfigError::Invalid(format!(
                        "term frequency '{}' needs max_features > 0",
                        lm.name
                    )));
                }
                LanguageModelKind::TermFrequency => {}
                _ if lm.source.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "language model '{}' has no source",
                        lm.name
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// LIWC 2015 output categories used as features
const LIWC_FEATURES: &[&str] = &[
    "WC", "Analytic", "Clout", "Authentic", "Tone", "WPS", "Sixltr", "Dic", "function",
    "pronoun", "ppron", "i", "we", "you", "shehe", "they", "ipron", "article", "prep",
    "auxverb", "adverb", "conj", "negate", "verb", "adj", "compare", "interrog", "number",
    "quant", "affect", "posemo", "negemo", "anx", "anger", "sad", "social", "family",
    "friend", "female", "male", "cogproc", "insight", "cause", "discrep", "tentat",
    "certain", "differ", "percept", "see", "hear", "feel", "bio", "body", "health",
    "sexual", "ingest", "drives", "affiliation", "achieve", "power", "reward", "risk",
    "focuspast", "focuspresent", "focusfuture", "relativ", "motion", "space", "time",
    "work", "leisure", "home", "money", "relig", "death", "informal", "swear", "netspeak",
    "assent", "nonflu", "filler", "AllPunc", "Period", "Comma", "Colon", "SemiC", "QMark",
    "Exclam", "Dash", "Quote", "Apostro", "Parenth", "OtherP",
];

fn default_language_models() -> Vec<LanguageModelConfig> {
    use LanguageModelKind::*;

    let term_frequency = LanguageModelConfig::new("Term Frequency", TermFrequency, "");

    let mut liwc = LanguageModelConfig::new("LIWC", Lexicon, "LIWC2015_{dataset}_");
    liwc.features = LIWC_FEATURES.iter().map(|s| s.to_string()).collect();
    liwc.rename.insert("B".into(), "liwc_sent".into());
    liwc.rename.insert("C".into(), "text_liwc".into());

    let mut seance = LanguageModelConfig::new("SEANCE", SortedLexicon, "seance_{dataset}_");
    seance.sort_by = Some("filename".into());

    vec![
        term_frequency,
        liwc,
        seance,
        LanguageModelConfig::new(
            "Pooled FastText",
            PooledEmbedding,
            "fasttext_encoded_sentences_pooled",
        ),
        LanguageModelConfig::new(
            "Pooled RoBERTa",
            PooledEmbedding,
            "roberta_encoded_sentences_pooled",
        ),
        LanguageModelConfig::new(
            "Universal Sentence Encoder",
            PooledEmbedding,
            "USE_encoded_sentences",
        ),
        LanguageModelConfig::new(
            "FastText_lstm",
            FoldEmbedding,
            "fasttext_encoded_sentences_{fold}",
        ),
        LanguageModelConfig::new(
            "Roberta_lstm",
            FoldEmbedding,
            "roberta_lstm_encoded_sentences_{fold}",
        ),
        LanguageModelConfig::new(
            "Roberta_CLS",
            FoldEmbedding,
            "roberta_ft_encoded_sentences_{fold}",
        ),
    ]
}

/// Load the experiment config.
///
/// An explicit path must exist. Without one, `experiment.toml` in the
/// working directory is used when present, defaults otherwise.
pub fn load_experiment_config(path: Option<&Path>) -> Result<ExperimentConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(CONFIG_FILE_NAME), false),
    };

    if !required && !path.exists() {
        debug!("No {} found, using defaults", CONFIG_FILE_NAME);
        return Ok(ExperimentConfig::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    let config: ExperimentConfig =
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
    debug!("Loaded experiment config from {}", path.display());
    Ok(config)
}

/// Default config rendered as TOML, for `sentiment-lab init`.
pub fn default_config_toml() -> String {
    let body = toml::to_string_pretty(&ExperimentConfig::default())
        .unwrap_or_else(|e| format!("# failed to render defaults: {e}\n"));
    format!(
        "# sentiment-lab experiment configuration\n\
         # Every field is optional; removing a line falls back to its default.\n\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_semeval_setup() {
        let config = ExperimentConfig::default();
        assert_eq!(config.dataset.name, "semeval");
        assert_eq!(config.folds.count, 5);
        assert_eq!(config.folds.train_row_count, 6000);
        assert_eq!(config.classifier.estimators, 250);
        let names: Vec<&str> = config.language_models.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Term Frequency",
                "LIWC",
                "SEANCE",
                "Pooled FastText",
                "Pooled RoBERTa",
                "Universal Sentence Encoder",
                "FastText_lstm",
                "Roberta_lstm",
                "Roberta_CLS"
            ]
        );
        assert_eq!(config.language_model("LIWC").unwrap().features.len(), 93);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config: ExperimentConfig = toml::from_str(
            r#"
[folds]
train_row_count = 40
strategy = "kfold"

[classifier]
kinds = ["majority", "gaussian_nb"]

[[language_models]]
name = "USE"
kind = "pooled_embedding"
source = "USE_encoded_sentences"
"#,
        )
        .unwrap();

        assert_eq!(config.folds.train_row_count, 40);
        assert_eq!(config.folds.count, 5);
        assert_eq!(config.folds.strategy, SplitStrategy::KFold);
        assert_eq!(
            config.classifier.kinds,
            vec![ClassifierKind::Majority, ClassifierKind::GaussianNb]
        );
        assert_eq!(config.classifier.max_depth, 10);
        assert_eq!(config.language_models.len(), 1);
        assert_eq!(config.language_models[0].max_features, 1000);
        assert_eq!(config.dataset.label_column, "sentiment");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ExperimentConfig::default();
        config.classifier.subsample = 0.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.language_models.push(config.language_models[0].clone());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = ExperimentConfig::default();
        config.language_models[2].sort_by = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_experiment_config(Some(&missing)),
            Err(ConfigError::Io { .. })
        ));

        let bad = dir.path().join("bad.toml");
        std::fs::write(&bad, "[folds\ncount = ").unwrap();
        assert!(matches!(
            load_experiment_config(Some(&bad)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_default_toml_round_trips() {
        let rendered = default_config_toml();
        let parsed: ExperimentConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.language_models.len(), 9);
        assert_eq!(parsed.folds.train_row_count, 6000);
    }
}
