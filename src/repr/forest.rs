//! The tree ensemble.

use thiserror::Error;

use super::tree::{ObliviousTree, TreeValidationError};

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForestValidationError {
    #[error("forest declares zero output groups")]
    NoGroups,

    #[error("base score has {len} values for {n_groups} output groups")]
    BaseScoreLenMismatch { n_groups: u32, len: usize },

    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Ordered ensemble of oblivious trees.
///
/// Every tree contributes to every output group; the per-group base score
/// is the additive starting value (zero unless the model says otherwise).
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    trees: Vec<ObliviousTree>,
    n_groups: u32,
    base_score: Vec<f64>,
}

impl Forest {
    /// Create an empty forest with the given number of output groups.
    pub fn new(n_groups: u32) -> Self {
        Self {
            trees: Vec::new(),
            n_groups,
            base_score: vec![0.0; n_groups as usize],
        }
    }

    /// Forest with a single output group.
    pub fn for_regression() -> Self {
        Self::new(1)
    }

    /// Set the per-group base score.
    ///
    /// Length must match the group count; [`validate`](Self::validate)
    /// enforces it (this is also reached from untrusted payloads).
    pub fn with_base_score(mut self, base_score: Vec<f64>) -> Self {
        self.base_score = base_score;
        self
    }

    /// Append a tree.
    pub fn push_tree(&mut self, tree: ObliviousTree) {
        self.trees.push(tree);
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Number of output groups.
    #[inline]
    pub fn n_groups(&self) -> u32 {
        self.n_groups
    }

    /// Per-group base score.
    #[inline]
    pub fn base_score(&self) -> &[f64] {
        &self.base_score
    }

    /// A specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &ObliviousTree {
        &self.trees[idx]
    }

    /// Iterate over trees.
    pub fn trees(&self) -> impl Iterator<Item = &ObliviousTree> {
        self.trees.iter()
    }

    /// Validate structural invariants for the whole ensemble.
    pub fn validate(&self, n_numeric: usize, n_categorical: usize) -> Result<(), ForestValidationError> {
        if self.n_groups == 0 {
            return Err(ForestValidationError::NoGroups);
        }
        if self.base_score.len() != self.n_groups as usize {
            return Err(ForestValidationError::BaseScoreLenMismatch {
                n_groups: self.n_groups,
                len: self.base_score.len(),
            });
        }
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate(n_numeric, n_categorical, self.n_groups as usize)
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;
        }
        Ok(())
    }
}
