//! Conversion between runtime types and storage payloads.
//!
//! This is the Model Store pipeline: bytes → header + payload → validated
//! [`Model`], and back. All structural validation runs here (directly or
//! through [`Model::new`]); any violation fails closed with no partially
//! usable model.
//!
//! # High-Level API
//!
//! ```ignore
//! use grove::Model;
//!
//! let model = Model::load("ranker.grove")?;
//! let bytes = model.to_bytes()?;
//! let same = Model::from_bytes(&bytes)?;
//! ```

use std::path::Path;

use crate::model::{CatValueTable, Model, ModelMeta, ModelValidationError};
use crate::repr::{CategorySets, ForestValidationError, Forest, ObliviousTree, SplitCond, TreeValidationError};

use super::format::{self, FormatError, FormatFlags, FormatHeader, LoadError, SerializeError};
use super::payload::{
    CatTablePayload, MetaPayload, Payload, PayloadV1, TreePayload, SPLIT_KIND_CATEGORICAL,
    SPLIT_KIND_NUMERIC,
};

// ============================================================================
// Model Serialization API
// ============================================================================

impl Model {
    /// Load a model from a `.grove` file.
    ///
    /// Fails with [`LoadError::Io`] if the path is unreadable and
    /// [`LoadError::Format`] for anything wrong with the bytes themselves.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_bytes(&bytes)?)
    }

    /// Parse a model from in-memory bytes.
    ///
    /// Runs the exact parsing and validation pipeline as [`Model::load`];
    /// the two produce identical models for identical bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let (header, payload): (FormatHeader, Payload) = format::decode(bytes)?;
        let Payload::V1(payload) = payload;

        check_header(&header, &payload)?;
        let model = model_from_payload(payload)?;

        tracing::debug!(
            n_trees = model.tree_count(),
            n_numeric = model.numeric_feature_count(),
            n_categorical = model.categorical_feature_count(),
            n_groups = model.prediction_dimension(),
            "parsed model"
        );
        Ok(model)
    }

    /// Serialize the model to `.grove` bytes, header included.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializeError> {
        let mut header = FormatHeader::new(
            self.numeric_feature_count() as u32,
            self.categorical_feature_count() as u32,
            self.prediction_dimension() as u32,
            self.tree_count() as u32,
        );
        if self.categorical_feature_count() > 0 {
            header.flags.set(FormatFlags::HAS_CATEGORICAL);
        }
        format::encode(header, &Payload::V1(model_to_payload(self)))
    }

    /// Write the model to a `.grove` file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SerializeError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| SerializeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Header / Payload Consistency
// ============================================================================

fn check_header(header: &FormatHeader, payload: &PayloadV1) -> Result<(), FormatError> {
    let checks: [(&'static str, u64, u64); 4] = [
        (
            "numeric feature count",
            u64::from(header.n_numeric_features),
            u64::from(payload.meta.n_numeric_features),
        ),
        (
            "categorical feature count",
            u64::from(header.n_categorical_features),
            u64::from(payload.meta.n_categorical_features),
        ),
        (
            "group count",
            u64::from(header.n_groups),
            u64::from(payload.meta.n_groups),
        ),
        (
            "tree count",
            u64::from(header.n_trees),
            payload.trees.len() as u64,
        ),
    ];
    for (field, header_value, payload_value) in checks {
        if header_value != payload_value {
            return Err(FormatError::HeaderPayloadMismatch {
                field,
                header: header_value,
                payload: payload_value,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Payload → Runtime
// ============================================================================

fn model_from_payload(payload: PayloadV1) -> Result<Model, FormatError> {
    let meta = ModelMeta {
        n_numeric_features: payload.meta.n_numeric_features as usize,
        n_categorical_features: payload.meta.n_categorical_features as usize,
        prediction_dimension: payload.meta.n_groups as usize,
        combine: payload.meta.combine,
    };

    let mut forest =
        Forest::new(payload.meta.n_groups).with_base_score(payload.meta.base_score);
    for (tree_idx, tree) in payload.trees.into_iter().enumerate() {
        forest.push_tree(tree_from_payload(tree_idx, tree)?);
    }

    let cat_tables = payload
        .cat_tables
        .into_iter()
        .map(|t| CatValueTable::new(t.hashes, t.buckets, t.n_buckets))
        .collect();

    Model::new(forest, cat_tables, meta).map_err(FormatError::Validation)
}

fn tree_from_payload(tree_idx: usize, tree: TreePayload) -> Result<ObliviousTree, FormatError> {
    let invalid = |error: TreeValidationError| {
        FormatError::Validation(ModelValidationError::Forest(
            ForestValidationError::InvalidTree { tree_idx, error },
        ))
    };

    let depth = tree.depth as usize;
    let level_arrays: [(&'static str, usize); 4] = [
        ("split_kinds", tree.split_kinds.len()),
        ("split_features", tree.split_features.len()),
        ("split_thresholds", tree.split_thresholds.len()),
        ("split_sets", tree.split_sets.len()),
    ];
    for (array, len) in level_arrays {
        if len != depth {
            return Err(invalid(TreeValidationError::LevelArityMismatch {
                depth,
                array,
                len,
            }));
        }
    }
    if tree.set_starts.len() != tree.set_lens.len() {
        return Err(invalid(TreeValidationError::SetSegmentArraysMismatch {
            starts: tree.set_starts.len(),
            lens: tree.set_lens.len(),
        }));
    }

    let mut splits = Vec::with_capacity(depth);
    for level in 0..depth {
        let split = match tree.split_kinds[level] {
            SPLIT_KIND_NUMERIC => SplitCond::Numeric {
                feature: tree.split_features[level],
                threshold: tree.split_thresholds[level],
            },
            SPLIT_KIND_CATEGORICAL => SplitCond::Categorical {
                feature: tree.split_features[level],
                set: tree.split_sets[level],
            },
            kind => return Err(invalid(TreeValidationError::UnknownSplitKind { level, kind })),
        };
        splits.push(split);
    }

    let segments = tree
        .set_starts
        .iter()
        .zip(&tree.set_lens)
        .map(|(&start, &len)| (start, len))
        .collect();
    let sets = CategorySets::new(tree.set_words, segments);

    Ok(ObliviousTree::new(splits, tree.leaf_values, sets))
}

// ============================================================================
// Runtime → Payload
// ============================================================================

fn model_to_payload(model: &Model) -> PayloadV1 {
    let forest = model.forest();

    let trees = forest.trees().map(tree_to_payload).collect();

    let cat_tables = model
        .cat_tables()
        .iter()
        .map(|t| CatTablePayload {
            hashes: t.hashes().to_vec(),
            buckets: t.buckets().to_vec(),
            n_buckets: t.n_buckets(),
        })
        .collect();

    PayloadV1 {
        meta: MetaPayload {
            n_numeric_features: model.numeric_feature_count() as u32,
            n_categorical_features: model.categorical_feature_count() as u32,
            n_groups: forest.n_groups(),
            combine: model.combine(),
            base_score: forest.base_score().to_vec(),
        },
        trees,
        cat_tables,
    }
}

fn tree_to_payload(tree: &ObliviousTree) -> TreePayload {
    let depth = tree.depth();
    let mut split_kinds = Vec::with_capacity(depth);
    let mut split_features = Vec::with_capacity(depth);
    let mut split_thresholds = Vec::with_capacity(depth);
    let mut split_sets = Vec::with_capacity(depth);

    for split in tree.splits() {
        match *split {
            SplitCond::Numeric { feature, threshold } => {
                split_kinds.push(SPLIT_KIND_NUMERIC);
                split_features.push(feature);
                split_thresholds.push(threshold);
                split_sets.push(0);
            }
            SplitCond::Categorical { feature, set } => {
                split_kinds.push(SPLIT_KIND_CATEGORICAL);
                split_features.push(feature);
                split_thresholds.push(0.0);
                split_sets.push(set);
            }
        }
    }

    let (set_starts, set_lens) = tree
        .sets()
        .segments()
        .iter()
        .map(|&(start, len)| (start, len))
        .unzip();

    TreePayload {
        depth: depth as u32,
        split_kinds,
        split_features,
        split_thresholds,
        split_sets,
        leaf_values: tree.leaf_values().to_vec(),
        set_words: tree.sets().words().to_vec(),
        set_starts,
        set_lens,
    }
}

// ============================================================================
// Tests
// ============================================================================
