//! Oblivious decision trees.
//!
//! An oblivious (symmetric) tree asks one question per level: every node on
//! level `l` shares the same [`SplitCond`]. A row's leaf is therefore
//! addressed directly by folding the per-level outcome bits into an index
//! (`bit_l << l`), with no pointer chasing. Leaf payloads are flat `f64`
//! arrays of `2^depth × n_groups`, leaf-major, so a leaf's contribution to
//! every output group sits contiguously.

use thiserror::Error;

use super::split::{CategorySets, SplitCond};

/// Maximum tree depth accepted by the storage format.
pub const MAX_TREE_DEPTH: usize = 16;

// =============================================================================
// NumericRow
// =============================================================================

/// Read-only access to one row of numeric features.
///
/// Abstracts over the single-row slice and batch matrix-row cases so the
/// traversal below is written once.
pub trait NumericRow {
    /// Value of the numeric feature at `feature`.
    fn value(&self, feature: usize) -> f32;
}

impl NumericRow for &[f32] {
    #[inline]
    fn value(&self, feature: usize) -> f32 {
        self[feature]
    }
}

impl NumericRow for ndarray::ArrayView1<'_, f32> {
    #[inline]
    fn value(&self, feature: usize) -> f32 {
        self[feature]
    }
}

// =============================================================================
// TreeValidationError
// =============================================================================

/// Structural validation errors for [`ObliviousTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeValidationError {
    #[error("tree depth {depth} exceeds the format maximum {max}", max = MAX_TREE_DEPTH)]
    DepthTooLarge { depth: usize },

    #[error("tree of depth {depth} declares {actual} leaf values, expected {expected}")]
    LeafCountMismatch {
        depth: usize,
        expected: usize,
        actual: usize,
    },

    #[error("per-level array {array} has {len} entries for depth {depth}")]
    LevelArityMismatch {
        depth: usize,
        array: &'static str,
        len: usize,
    },

    #[error("unknown split kind {kind} at level {level}")]
    UnknownSplitKind { level: usize, kind: u8 },

    #[error("category set segment arrays disagree: {starts} starts, {lens} lens")]
    SetSegmentArraysMismatch { starts: usize, lens: usize },

    #[error("numeric split at level {level} references feature {feature}, model has {n_features}")]
    NumericFeatureOutOfRange {
        level: usize,
        feature: u32,
        n_features: usize,
    },

    #[error(
        "categorical split at level {level} references feature {feature}, model has {n_features}"
    )]
    CategoricalFeatureOutOfRange {
        level: usize,
        feature: u32,
        n_features: usize,
    },

    #[error("categorical split at level {level} references set {set}, tree stores {n_sets}")]
    SetOutOfRange { level: usize, set: u32, n_sets: usize },

    #[error("category set {set} segment ({start}+{len}) exceeds {n_words} stored words")]
    SetSegmentOutOfRange {
        set: usize,
        start: u32,
        len: u32,
        n_words: usize,
    },
}

// =============================================================================
// ObliviousTree
// =============================================================================

/// A symmetric decision tree: one condition per level, `2^depth` leaves.
#[derive(Debug, Clone, PartialEq)]
pub struct ObliviousTree {
    /// One condition per level; `splits[l]` contributes bit `l`.
    splits: Box<[SplitCond]>,
    /// `2^depth × n_groups` values, leaf-major.
    leaf_values: Box<[f64]>,
    /// Bitsets referenced by categorical conditions.
    sets: CategorySets,
}

impl ObliviousTree {
    /// Create a tree from its levels, leaf values, and category sets.
    ///
    /// Structural invariants are checked by [`validate`](Self::validate),
    /// which parsing always runs; hand-built trees should run it too.
    pub fn new(splits: Vec<SplitCond>, leaf_values: Vec<f64>, sets: CategorySets) -> Self {
        Self {
            splits: splits.into_boxed_slice(),
            leaf_values: leaf_values.into_boxed_slice(),
            sets,
        }
    }

    /// Tree depth (number of levels). Depth 0 is a single constant leaf.
    #[inline]
    pub fn depth(&self) -> usize {
        self.splits.len()
    }

    /// Number of leaves, `2^depth`.
    #[inline]
    pub fn n_leaves(&self) -> usize {
        1usize << self.depth()
    }

    /// Per-level split conditions.
    #[inline]
    pub fn splits(&self) -> &[SplitCond] {
        &self.splits
    }

    /// Category set storage.
    #[inline]
    pub fn sets(&self) -> &CategorySets {
        &self.sets
    }

    /// Flat leaf value array.
    #[inline]
    pub fn leaf_values(&self) -> &[f64] {
        &self.leaf_values
    }

    /// Fold split outcomes into the leaf index for one row.
    ///
    /// `cat_buckets` holds the resolved bucket per categorical feature
    /// (the unseen-value sentinel for hashes absent from the model's
    /// tables; it belongs to no set, so those splits take bit 0).
    #[inline]
    pub fn leaf_index<R: NumericRow>(&self, numeric: &R, cat_buckets: &[u32]) -> usize {
        let mut idx = 0usize;
        for (level, split) in self.splits.iter().enumerate() {
            let bit = match *split {
                SplitCond::Numeric { feature, threshold } => {
                    usize::from(numeric.value(feature as usize) > threshold)
                }
                SplitCond::Categorical { feature, set } => {
                    usize::from(self.sets.contains(set, cat_buckets[feature as usize]))
                }
            };
            idx |= bit << level;
        }
        idx
    }

    /// The `n_groups` output values stored at `leaf`.
    #[inline]
    pub fn leaf(&self, leaf: usize, n_groups: usize) -> &[f64] {
        &self.leaf_values[leaf * n_groups..(leaf + 1) * n_groups]
    }

    /// Validate structural invariants against the owning model's shape.
    pub fn validate(
        &self,
        n_numeric: usize,
        n_categorical: usize,
        n_groups: usize,
    ) -> Result<(), TreeValidationError> {
        let depth = self.depth();
        if depth > MAX_TREE_DEPTH {
            return Err(TreeValidationError::DepthTooLarge { depth });
        }

        let expected = self.n_leaves() * n_groups;
        if self.leaf_values.len() != expected {
            return Err(TreeValidationError::LeafCountMismatch {
                depth,
                expected,
                actual: self.leaf_values.len(),
            });
        }

        for (level, split) in self.splits.iter().enumerate() {
            match *split {
                SplitCond::Numeric { feature, .. } => {
                    if feature as usize >= n_numeric {
                        return Err(TreeValidationError::NumericFeatureOutOfRange {
                            level,
                            feature,
                            n_features: n_numeric,
                        });
                    }
                }
                SplitCond::Categorical { feature, set } => {
                    if feature as usize >= n_categorical {
                        return Err(TreeValidationError::CategoricalFeatureOutOfRange {
                            level,
                            feature,
                            n_features: n_categorical,
                        });
                    }
                    if set as usize >= self.sets.n_sets() {
                        return Err(TreeValidationError::SetOutOfRange {
                            level,
                            set,
                            n_sets: self.sets.n_sets(),
                        });
                    }
                }
            }
        }

        let n_words = self.sets.words().len();
        for (set, &(start, len)) in self.sets.segments().iter().enumerate() {
            let end = start as usize + len as usize;
            if end > n_words {
                return Err(TreeValidationError::SetSegmentOutOfRange {
                    set,
                    start,
                    len,
                    n_words,
                });
            }
        }

        Ok(())
    }
}
