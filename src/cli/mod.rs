//! CLI command definitions and handlers

mod artifacts;
mod explain;
mod init;
mod metrics;
mod run;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressStyle;
use std::path::PathBuf;

use sentiment_lab::classifier::ClassifierKind;
use sentiment_lab::config::{load_experiment_config, ExperimentConfig};

/// Parse and validate workers count (1-64)
fn parse_workers(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("workers must be at least 1".to_string())
    } else if n > 64 {
        Err("workers cannot exceed 64".to_string())
    } else {
        Ok(n)
    }
}

/// sentiment-lab - sentiment classification experiments
#[derive(Parser, Debug)]
#[command(name = "sentiment-lab")]
#[command(
    version,
    about = "Cross-validate classifiers over lexicon, term-frequency and embedding features of a sentiment dataset",
    long_about = "sentiment-lab merges the feature tables of every configured language model \
(LIWC, SEANCE, term frequency, pooled and fold-trained sentence encoders) into one \
modeling frame, cross-validates each (language model, classifier) pair, and writes \
predictions, ground truth and a metrics summary.\n\n\
Run without a subcommand to run the full sweep:\n  \
sentiment-lab --config experiment.toml",
    after_help = "\
Examples:
  sentiment-lab init                               Write a default experiment.toml
  sentiment-lab run --workers 4                    Full sweep, 4 pairs at a time
  sentiment-lab run --classifier gbdt --classifier majority
  sentiment-lab explain --model Roberta_CLS --fold 2 --samples 200
  sentiment-lab metrics                            Recompute metrics.json from saved tables
  sentiment-lab artifacts prepare --run fasttext --folds 5"
)]
pub struct Cli {
    /// Experiment config (default: ./experiment.toml when present)
    #[arg(long, short = 'c', global = true, env = "SENTIMENT_LAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the dataset root directory
    #[arg(long, global = true)]
    pub data_root: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        default_value = "info",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    /// Number of (language model, classifier) pairs trained in parallel (1-64)
    #[arg(long, global = true, default_value = "1", value_parser = parse_workers)]
    pub workers: usize,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Cross-validate every configured language model with every classifier
    #[command(after_help = "\
Examples:
  sentiment-lab run                                Classifiers from experiment.toml
  sentiment-lab run --estimators 500               More boosting rounds
  sentiment-lab run --classifier majority          Baseline only")]
    Run {
        /// Boosting iterations (overrides classifier.estimators)
        #[arg(long)]
        estimators: Option<usize>,

        /// Classifier to train: gbdt, gaussian_nb, majority (repeatable)
        #[arg(long)]
        classifier: Vec<ClassifierKind>,
    },

    /// Train one classifier on one language model and fold, plot feature attributions
    #[command(after_help = "\
Examples:
  sentiment-lab explain --model LIWC
  sentiment-lab explain --model \"Pooled RoBERTa\" --fold 3 --samples 100 --estimators 100")]
    Explain {
        /// Language model whose features are explained
        #[arg(long)]
        model: String,

        /// Fold to train on
        #[arg(long, default_value = "0")]
        fold: usize,

        /// Test rows to explain (overrides explain.samples)
        #[arg(long)]
        samples: Option<usize>,

        /// Boosting iterations (overrides classifier.estimators)
        #[arg(long)]
        estimators: Option<usize>,

        /// Classifier to explain
        #[arg(long, default_value = "gbdt")]
        classifier: ClassifierKind,
    },

    /// Recompute metrics from saved predictions and ground truth
    Metrics,

    /// Write a default experiment.toml
    Init {
        /// Where to write the config
        #[arg(default_value = "experiment.toml")]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Manage fold-trained encoder artifacts
    #[command(subcommand)]
    Artifacts(ArtifactsCommand),
}

#[derive(Subcommand, Debug)]
pub enum ArtifactsCommand {
    /// Create the run directory and per-fold training directories
    Prepare {
        #[command(flatten)]
        target: ArtifactTarget,
    },

    /// Rename each fold's best model after the run and drop the final model
    Collect {
        #[command(flatten)]
        target: ArtifactTarget,
    },

    /// Print the path of a collected model
    Locate {
        /// Training task
        #[arg(long, default_value = "sentiment")]
        task: String,

        /// Run name
        #[arg(long)]
        run: String,

        /// Fold index
        #[arg(long)]
        fold: usize,

        /// Artifact root directory
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
pub struct ArtifactTarget {
    /// Training task
    #[arg(long, default_value = "sentiment")]
    pub task: String,

    /// Run name
    #[arg(long)]
    pub run: String,

    /// Number of folds
    #[arg(long, default_value = "5")]
    pub folds: usize,

    /// Artifact root directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,
}

/// Bar style shared by long-running commands
pub(crate) fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|style| style.progress_chars("█▓▒░  "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

/// Load the config and apply global overrides
fn load_config(cli: &Cli) -> Result<ExperimentConfig> {
    let mut config =
        load_experiment_config(cli.config.as_deref()).context("Failed to load config")?;
    if let Some(root) = &cli.data_root {
        config.dataset.root = root.clone();
    }
    Ok(config)
}

/// Run the CLI
pub fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::Init { path, force }) => init::run(path, *force),

        Some(Commands::Artifacts(command)) => artifacts::run(command),

        Some(Commands::Metrics) => {
            let config = load_config(&cli)?;
            metrics::run(&config)
        }

        Some(Commands::Explain {
            model,
            fold,
            samples,
            estimators,
            classifier,
        }) => {
            let mut config = load_config(&cli)?;
            if let Some(n) = estimators {
                config.classifier.estimators = *n;
            }
            if let Some(n) = samples {
                config.explain.samples = *n;
            }
            explain::run(&config, model, *fold, *classifier)
        }

        Some(Commands::Run {
            estimators,
            classifier,
        }) => {
            let mut config = load_config(&cli)?;
            if let Some(n) = estimators {
                config.classifier.estimators = *n;
            }
            if !classifier.is_empty() {
                config.classifier.kinds = classifier.clone();
            }
            run::run(&config, cli.workers)
        }

        None => {
            let config = load_config(&cli)?;
            run::run(&config, cli.workers)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workers_bounds() {
        assert_eq!(parse_workers("4"), Ok(4));
        assert!(parse_workers("0").is_err());
        assert!(parse_workers("65").is_err());
        assert!(parse_workers("many").is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_classifier_flag() {
        let cli = Cli::try_parse_from([
            "sentiment-lab",
            "run",
            "--classifier",
            "gbdt",
            "--classifier",
            "majority",
            "--workers",
            "3",
        ])
        .unwrap();
        assert_eq!(cli.workers, 3);
        match cli.command {
            Some(Commands::Run { classifier, .. }) => {
                assert_eq!(classifier, vec![ClassifierKind::Gbdt, ClassifierKind::Majority])
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_data_root_override() {
        let cli =
            Cli::try_parse_from(["sentiment-lab", "--data-root", "/data/semeval", "metrics"])
                .unwrap();
        let config = load_config(&Cli {
            config: None,
            ..cli
        })
        .unwrap();
        assert_eq!(config.dataset.root, PathBuf::from("/data/semeval"));
    }
}
