//! The loaded model: ensemble, categorical tables, and metadata.
//!
//! A [`Model`] is immutable after construction and safe to share across
//! threads. Its shape (feature counts, prediction dimension) is fixed at
//! load time and every prediction call is validated against it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repr::{Forest, ForestValidationError};

/// Bucket assigned to hashes absent from a [`CatValueTable`].
///
/// Category sets are validated to stay far below this index, so the
/// sentinel is never a member of any set and unseen values always take the
/// bit-0 branch.
pub const UNSEEN_BUCKET: u32 = u32::MAX;

/// Upper bound on per-feature bucket counts accepted by validation.
///
/// Keeps bitset segments bounded and the sentinel unreachable.
pub const MAX_CATEGORY_BUCKETS: u32 = 1 << 24;

// =============================================================================
// CatValueTable
// =============================================================================

/// Validation errors for a single categorical value table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatTableValidationError {
    #[error("table stores {hashes} hashes but {buckets} buckets")]
    LengthMismatch { hashes: usize, buckets: usize },

    #[error("hash values are not strictly ascending at index {index}")]
    NotSortedUnique { index: usize },

    #[error("entry {index} maps to bucket {bucket}, table declares {n_buckets}")]
    BucketOutOfRange {
        index: usize,
        bucket: u32,
        n_buckets: u32,
    },

    #[error("table declares {n_buckets} buckets, format maximum is {max}", max = MAX_CATEGORY_BUCKETS)]
    TooManyBuckets { n_buckets: u32 },
}

/// Per-feature mapping from hashed categorical values to dense buckets.
///
/// Built at load time from the training-time value statistics stored in the
/// model file. Lookups binary-search the sorted hash array; a miss means
/// the value was never seen in training.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatValueTable {
    /// Strictly ascending hash values.
    hashes: Box<[u32]>,
    /// Bucket per hash, parallel to `hashes`.
    buckets: Box<[u32]>,
    n_buckets: u32,
}

impl CatValueTable {
    /// Table for a feature with no stored values (every lookup misses).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create from parallel hash/bucket arrays. `hashes` must already be
    /// strictly ascending; [`validate`](Self::validate) enforces it.
    pub fn new(hashes: Vec<u32>, buckets: Vec<u32>, n_buckets: u32) -> Self {
        Self {
            hashes: hashes.into_boxed_slice(),
            buckets: buckets.into_boxed_slice(),
            n_buckets,
        }
    }

    /// Build a table from unordered `(hash, bucket)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (u32, u32)>, n_buckets: u32) -> Self {
        let mut pairs: Vec<(u32, u32)> = pairs.into_iter().collect();
        pairs.sort_unstable_by_key(|&(hash, _)| hash);
        let hashes = pairs.iter().map(|&(h, _)| h).collect();
        let buckets = pairs.iter().map(|&(_, b)| b).collect();
        Self::new(hashes, buckets, n_buckets)
    }

    /// Bucket for a hashed value, or `None` for values unseen in training.
    #[inline]
    pub fn bucket_for(&self, hash: u32) -> Option<u32> {
        self.hashes
            .binary_search(&hash)
            .ok()
            .map(|i| self.buckets[i])
    }

    /// Number of stored hash values.
    #[inline]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    /// Whether the table stores any values.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Number of distinct buckets the table maps into.
    #[inline]
    pub fn n_buckets(&self) -> u32 {
        self.n_buckets
    }

    /// Stored hashes (for serialization).
    #[inline]
    pub fn hashes(&self) -> &[u32] {
        &self.hashes
    }

    /// Stored buckets (for serialization).
    #[inline]
    pub fn buckets(&self) -> &[u32] {
        &self.buckets
    }

    /// Validate sortedness and bucket ranges.
    pub fn validate(&self) -> Result<(), CatTableValidationError> {
        if self.hashes.len() != self.buckets.len() {
            return Err(CatTableValidationError::LengthMismatch {
                hashes: self.hashes.len(),
                buckets: self.buckets.len(),
            });
        }
        if self.n_buckets > MAX_CATEGORY_BUCKETS {
            return Err(CatTableValidationError::TooManyBuckets {
                n_buckets: self.n_buckets,
            });
        }
        for (index, window) in self.hashes.windows(2).enumerate() {
            if window[0] >= window[1] {
                return Err(CatTableValidationError::NotSortedUnique { index: index + 1 });
            }
        }
        for (index, &bucket) in self.buckets.iter().enumerate() {
            if bucket >= self.n_buckets {
                return Err(CatTableValidationError::BucketOutOfRange {
                    index,
                    bucket,
                    n_buckets: self.n_buckets,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// How per-tree leaf contributions are combined into the output.
///
/// Carried in the model file; the default everywhere is plain summation.
/// No link function is applied either way - calibration is the caller's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Combine {
    /// Arithmetic sum of leaf values.
    #[default]
    Sum,
    /// Sum divided by the number of trees.
    Average,
}

/// Shape and evaluation metadata captured at parse time.
///
/// The accessor methods on [`Model`] read these fields; nothing is derived
/// from the tree structure at call time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelMeta {
    pub n_numeric_features: usize,
    pub n_categorical_features: usize,
    pub prediction_dimension: usize,
    pub combine: Combine,
}

// =============================================================================
// ModelValidationError
// =============================================================================

/// Cross-component validation errors raised when assembling a [`Model`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Forest(#[from] ForestValidationError),

    #[error("model declares {expected} categorical features but carries {actual} value tables")]
    CatTableCountMismatch { expected: usize, actual: usize },

    #[error("metadata declares prediction dimension {meta}, forest has {forest} groups")]
    GroupCountMismatch { meta: usize, forest: u32 },

    #[error("categorical feature {feature}: {error}")]
    InvalidTable {
        feature: usize,
        error: CatTableValidationError,
    },
}

// =============================================================================
// Model
// =============================================================================

/// A loaded tree-ensemble model, immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    forest: Forest,
    cat_tables: Vec<CatValueTable>,
    meta: ModelMeta,
}

impl Model {
    /// Assemble a model, running the same structural validation the parser
    /// applies to deserialized payloads. Fails closed: an invalid input
    /// yields no partially usable model.
    pub fn new(
        forest: Forest,
        cat_tables: Vec<CatValueTable>,
        meta: ModelMeta,
    ) -> Result<Self, ModelValidationError> {
        if meta.prediction_dimension != forest.n_groups() as usize {
            return Err(ModelValidationError::GroupCountMismatch {
                meta: meta.prediction_dimension,
                forest: forest.n_groups(),
            });
        }
        if cat_tables.len() != meta.n_categorical_features {
            return Err(ModelValidationError::CatTableCountMismatch {
                expected: meta.n_categorical_features,
                actual: cat_tables.len(),
            });
        }
        for (feature, table) in cat_tables.iter().enumerate() {
            table
                .validate()
                .map_err(|error| ModelValidationError::InvalidTable { feature, error })?;
        }
        forest.validate(meta.n_numeric_features, meta.n_categorical_features)?;

        Ok(Self {
            forest,
            cat_tables,
            meta,
        })
    }

    /// Number of values produced per input row.
    #[inline]
    pub fn prediction_dimension(&self) -> usize {
        self.meta.prediction_dimension
    }

    /// Number of trees in the ensemble.
    #[inline]
    pub fn tree_count(&self) -> usize {
        self.forest.n_trees()
    }

    /// Length every numeric feature row must have.
    #[inline]
    pub fn numeric_feature_count(&self) -> usize {
        self.meta.n_numeric_features
    }

    /// Length every categorical feature row must have.
    #[inline]
    pub fn categorical_feature_count(&self) -> usize {
        self.meta.n_categorical_features
    }

    /// The tree combination rule.
    #[inline]
    pub fn combine(&self) -> Combine {
        self.meta.combine
    }

    /// The underlying ensemble.
    #[inline]
    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    /// Value table for one categorical feature.
    #[inline]
    pub fn cat_table(&self, feature: usize) -> &CatValueTable {
        &self.cat_tables[feature]
    }

    /// All categorical value tables, indexed by feature.
    #[inline]
    pub fn cat_tables(&self) -> &[CatValueTable] {
        &self.cat_tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{CategorySets, ObliviousTree, SplitCond};

    #[test]
    fn bucket_lookup() {
        let table = CatValueTable::from_pairs([(900, 2), (15, 0), (400, 1)], 3);
        assert_eq!(table.bucket_for(15), Some(0));
        assert_eq!(table.bucket_for(400), Some(1));
        assert_eq!(table.bucket_for(900), Some(2));
        assert_eq!(table.bucket_for(16), None);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn table_validation() {
        assert!(CatValueTable::empty().validate().is_ok());

        let bad = CatValueTable::new(vec![5, 5], vec![0, 1], 2);
        assert_eq!(
            bad.validate(),
            Err(CatTableValidationError::NotSortedUnique { index: 1 })
        );

        let bad = CatValueTable::new(vec![1, 2], vec![0, 2], 2);
        assert_eq!(
            bad.validate(),
            Err(CatTableValidationError::BucketOutOfRange { index: 1, bucket: 2, n_buckets: 2 })
        );

        let bad = CatValueTable::new(vec![1], vec![0, 1], 2);
        assert!(matches!(
            bad.validate(),
            Err(CatTableValidationError::LengthMismatch { .. })
        ));

        let bad = CatValueTable::new(vec![], vec![], MAX_CATEGORY_BUCKETS + 1);
        assert!(matches!(
            bad.validate(),
            Err(CatTableValidationError::TooManyBuckets { .. })
        ));
    }

    fn stump_forest() -> Forest {
        let mut forest = Forest::for_regression();
        forest.push_tree(ObliviousTree::new(
            vec![SplitCond::Numeric { feature: 0, threshold: 0.5 }],
            vec![1.0, 2.0],
            CategorySets::empty(),
        ));
        forest
    }

    #[test]
    fn model_assembly_and_accessors() {
        let meta = ModelMeta {
            n_numeric_features: 2,
            n_categorical_features: 0,
            prediction_dimension: 1,
            combine: Combine::Sum,
        };
        let model = Model::new(stump_forest(), vec![], meta).unwrap();
        assert_eq!(model.prediction_dimension(), 1);
        assert_eq!(model.tree_count(), 1);
        assert_eq!(model.numeric_feature_count(), 2);
        assert_eq!(model.categorical_feature_count(), 0);
        assert_eq!(model.combine(), Combine::Sum);
    }

    #[test]
    fn model_is_send_and_sync() {
        // Loaded models are shared read-only across prediction threads.
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
    }

    #[test]
    fn model_assembly_rejects_mismatches() {
        let meta = ModelMeta {
            n_numeric_features: 2,
            n_categorical_features: 0,
            prediction_dimension: 2,
            combine: Combine::Sum,
        };
        assert!(matches!(
            Model::new(stump_forest(), vec![], meta),
            Err(ModelValidationError::GroupCountMismatch { meta: 2, .. })
        ));

        let meta = ModelMeta {
            n_numeric_features: 2,
            n_categorical_features: 1,
            prediction_dimension: 1,
            combine: Combine::Sum,
        };
        assert!(matches!(
            Model::new(stump_forest(), vec![], meta),
            Err(ModelValidationError::CatTableCountMismatch { expected: 1, actual: 0 })
        ));

        // Forest errors surface through Model::new.
        let meta = ModelMeta {
            n_numeric_features: 0,
            n_categorical_features: 0,
            prediction_dimension: 1,
            combine: Combine::Sum,
        };
        assert!(matches!(
            Model::new(stump_forest(), vec![], meta),
            Err(ModelValidationError::Forest(_))
        ));
    }
}
