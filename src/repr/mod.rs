//! Immutable ensemble representation.
//!
//! This module holds the in-memory form of a loaded model's trees:
//!
//! - [`SplitCond`]: one split condition (numeric threshold or categorical
//!   set membership)
//! - [`CategorySets`]: packed bitsets backing categorical splits
//! - [`ObliviousTree`]: a symmetric tree, one condition per level
//! - [`Forest`]: the ordered tree ensemble with its output groups
//!
//! Everything here is plain data plus structural validation; evaluation
//! lives in [`crate::inference`] and parsing in [`crate::io`].

pub mod forest;
pub mod split;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use split::{bucket_set_words, CategorySets, SplitCond};
pub use tree::{NumericRow, ObliviousTree, TreeValidationError, MAX_TREE_DEPTH};
