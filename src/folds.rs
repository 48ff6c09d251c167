//! Train/test row partitions per fold
//!
//! The default policy is a fixed split point repeated for every fold: the
//! fold-to-fold variation of the dataset lives upstream, in encoders trained
//! separately per fold, so every fold here sees the same rows. A shuffled
//! k-fold is available for datasets without such upstream folds.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SplitError {
    #[error("At least one fold is required")]
    NoFolds,

    #[error("train_row_count ({train_rows}) must be smaller than the row count ({total_rows})")]
    Unsatisfiable { train_rows: usize, total_rows: usize },

    #[error("Cannot split {total_rows} rows into {folds} folds")]
    TooManyFolds { folds: usize, total_rows: usize },

    #[error("Fold {fold} out of range (0..{folds})")]
    FoldOutOfRange { fold: usize, folds: usize },
}

pub type SplitResult<T> = Result<T, SplitError>;

/// Row indices of one fold. Both lists are ascending and disjoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub index: usize,
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Train/test rows for every fold
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldPartition {
    folds: Vec<Fold>,
}

impl FoldPartition {
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fold> {
        self.folds.iter()
    }

    pub fn get(&self, fold: usize) -> SplitResult<&Fold> {
        self.folds.get(fold).ok_or(SplitError::FoldOutOfRange {
            fold,
            folds: self.folds.len(),
        })
    }

    /// Total number of test rows across folds.
    pub fn test_rows(&self) -> usize {
        self.folds.iter().map(|f| f.test.len()).sum()
    }
}

/// Rows `[0, train_row_count)` train, the rest test, for every fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSplit {
    pub train_row_count: usize,
    pub folds: usize,
}

impl FixedSplit {
    pub fn new(train_row_count: usize, folds: usize) -> Self {
        Self {
            train_row_count,
            folds,
        }
    }

    /// Partition `total_rows`, requiring a non-empty test side.
    pub fn partition(&self, total_rows: usize) -> SplitResult<FoldPartition> {
        if self.folds == 0 {
            return Err(SplitError::NoFolds);
        }
        if self.train_row_count >= total_rows {
            return Err(SplitError::Unsatisfiable {
                train_rows: self.train_row_count,
                total_rows,
            });
        }
        Ok(self.partition_lenient(total_rows))
    }

    /// Partition without validation. With fewer rows than the split point,
    /// every row trains and the test side is empty.
    pub fn partition_lenient(&self, total_rows: usize) -> FoldPartition {
        let split = self.train_row_count.min(total_rows);
        let folds = (0..self.folds)
            .map(|index| Fold {
                index,
                train: (0..split).collect(),
                test: (split..total_rows).collect(),
            })
            .collect();
        FoldPartition { folds }
    }
}

/// Shuffled contiguous k-fold: each row is tested exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KFoldSplit {
    pub folds: usize,
    pub seed: u64,
}

impl KFoldSplit {
    pub fn partition(&self, total_rows: usize) -> SplitResult<FoldPartition> {
        if self.folds == 0 {
            return Err(SplitError::NoFolds);
        }
        if self.folds > total_rows {
            return Err(SplitError::TooManyFolds {
                folds: self.folds,
                total_rows,
            });
        }

        let mut order: Vec<usize> = (0..total_rows).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        // First `total_rows % folds` folds get one extra row
        let base = total_rows / self.folds;
        let extra = total_rows % self.folds;
        let mut start = 0;
        let mut folds = Vec::with_capacity(self.folds);
        for index in 0..self.folds {
            let size = base + usize::from(index < extra);
            let mut test: Vec<usize> = order[start..start + size].to_vec();
            test.sort_unstable();
            let mut train: Vec<usize> = order[..start]
                .iter()
                .chain(&order[start + size..])
                .copied()
                .collect();
            train.sort_unstable();
            folds.push(Fold { index, train, test });
            start += size;
        }
        Ok(FoldPartition { folds })
    }
}

/// Fold policy selected in the experiment config
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    #[default]
    Fixed,
    KFold,
}

/// Build the partition for `total_rows` according to the config values.
pub fn split_rows(
    strategy: SplitStrategy,
    folds: usize,
    train_row_count: usize,
    seed: u64,
    allow_empty_test: bool,
    total_rows: usize,
) -> SplitResult<FoldPartition> {
    match strategy {
        SplitStrategy::Fixed => {
            let split = FixedSplit::new(train_row_count, folds);
            if allow_empty_test {
                if folds == 0 {
                    return Err(SplitError::NoFolds);
                }
                if train_row_count >= total_rows {
                    tracing::warn!(
                        "train_row_count {} >= {} rows: every test partition is empty",
                        train_row_count,
                        total_rows
                    );
                }
                Ok(split.partition_lenient(total_rows))
            } else {
                split.partition(total_rows)
            }
        }
        SplitStrategy::KFold => KFoldSplit { folds, seed }.partition(total_rows),
    }
}
