//! Trained encoder artifacts
//!
//! Fold-trained text encoders live outside this crate. What it owns is the
//! directory layout they are trained into and the naming of the resulting
//! model files, so that the encoded-sentence features of a run can be traced
//! back to the model that produced them:
//!
//! ```text
//! <root>/data/model_<task>_<fold>/            per-fold training data and output
//! <root>/data/model_<task>_<fold>/<run>_best-model.pt
//! <root>/flair_training_time_results/<run>/   one directory per run
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

const BEST_MODEL: &str = "best-model.pt";
const FINAL_MODEL: &str = "final-model.pt";
const RESULTS_DIR: &str = "flair_training_time_results";

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("A run named '{run}' already exists at {path}. Try another name.")]
    RunExists { run: String, path: PathBuf },

    #[error("No trained model at {0}")]
    NotFound(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ArtifactError + '_ {
    move |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Artifact directories below one root
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn fold_dir(&self, task: &str, fold: usize) -> PathBuf {
        self.root.join("data").join(format!("model_{task}_{fold}"))
    }

    pub fn run_dir(&self, run: &str) -> PathBuf {
        self.root.join(RESULTS_DIR).join(run)
    }

    /// Path the best model of `run` is kept under once collected.
    pub fn model_path(&self, task: &str, run: &str, fold: usize) -> PathBuf {
        self.fold_dir(task, fold).join(format!("{run}_{BEST_MODEL}"))
    }

    /// Create the run directory and one training directory per fold.
    ///
    /// A run name can only be used once; fold directories are shared
    /// between runs of the same task and may already exist.
    pub fn prepare(&self, task: &str, run: &str, folds: usize) -> ArtifactResult<Vec<PathBuf>> {
        let run_dir = self.run_dir(run);
        if run_dir.exists() {
            return Err(ArtifactError::RunExists {
                run: run.to_string(),
                path: run_dir,
            });
        }
        std::fs::create_dir_all(&run_dir).map_err(io_error(&run_dir))?;

        let mut dirs = Vec::with_capacity(folds);
        for fold in 0..folds {
            let dir = self.fold_dir(task, fold);
            std::fs::create_dir_all(&dir).map_err(io_error(&dir))?;
            debug!("Prepared {}", dir.display());
            dirs.push(dir);
        }
        info!("Prepared run '{}' with {} fold directories", run, folds);
        Ok(dirs)
    }

    /// Rename each fold's `best-model.pt` after the run and drop
    /// `final-model.pt`. Returns the renamed model paths.
    pub fn collect(&self, task: &str, run: &str, folds: usize) -> ArtifactResult<Vec<PathBuf>> {
        let mut collected = Vec::with_capacity(folds);
        for fold in 0..folds {
            let dir = self.fold_dir(task, fold);
            let best = dir.join(BEST_MODEL);
            if !best.exists() {
                return Err(ArtifactError::NotFound(best));
            }
            let target = self.model_path(task, run, fold);
            std::fs::rename(&best, &target).map_err(io_error(&best))?;

            let last = dir.join(FINAL_MODEL);
            if last.exists() {
                std::fs::remove_file(&last).map_err(io_error(&last))?;
            }
            debug!("Collected {}", target.display());
            collected.push(target);
        }
        info!("Collected {} models for run '{}'", collected.len(), run);
        Ok(collected)
    }

    /// The collected model of `run` for `fold`.
    pub fn locate(&self, task: &str, run: &str, fold: usize) -> ArtifactResult<PathBuf> {
        let path = self.model_path(task, run, fold);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ArtifactError::NotFound(path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_prepare_creates_layout_once() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());

        let dirs = layout.prepare("sentiment", "fasttext", 3).unwrap();
        assert_eq!(dirs.len(), 3);
        assert!(dir.path().join("data/model_sentiment_2").is_dir());
        assert!(dir.path().join("flair_training_time_results/fasttext").is_dir());

        assert!(matches!(
            layout.prepare("sentiment", "fasttext", 3),
            Err(ArtifactError::RunExists { .. })
        ));
        // Another run reuses the fold directories
        assert!(layout.prepare("sentiment", "roberta_lstm", 3).is_ok());
    }

    #[test]
    fn test_collect_renames_and_cleans() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        layout.prepare("sentiment", "roberta_ft", 2).unwrap();
        for fold in 0..2 {
            let fold_dir = layout.fold_dir("sentiment", fold);
            std::fs::write(fold_dir.join("best-model.pt"), b"weights").unwrap();
            std::fs::write(fold_dir.join("final-model.pt"), b"weights").unwrap();
        }

        let models = layout.collect("sentiment", "roberta_ft", 2).unwrap();
        assert_eq!(models.len(), 2);
        for fold in 0..2 {
            let fold_dir = layout.fold_dir("sentiment", fold);
            assert!(fold_dir.join("roberta_ft_best-model.pt").is_file());
            assert!(!fold_dir.join("best-model.pt").exists());
            assert!(!fold_dir.join("final-model.pt").exists());
        }

        assert_eq!(
            layout.locate("sentiment", "roberta_ft", 1).unwrap(),
            models[1]
        );
    }

    #[test]
    fn test_missing_artifacts_reported() {
        let dir = tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        layout.prepare("sentiment", "fasttext", 1).unwrap();

        assert!(matches!(
            layout.collect("sentiment", "fasttext", 1),
            Err(ArtifactError::NotFound(_))
        ));
        assert!(matches!(
            layout.locate("sentiment", "fasttext", 0),
            Err(ArtifactError::NotFound(_))
        ));
    }
}
