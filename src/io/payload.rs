//! Payload structures for the `.grove` storage format.
//!
//! These structs are what Postcard actually encodes. They mirror the
//! runtime types but stay flat and versioned; conversion and validation
//! live in [`super::convert`].

use serde::{Deserialize, Serialize};

use crate::model::Combine;

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Version-tagged payload enum.
///
/// New format revisions add variants rather than changing existing ones,
/// so older readers fail with a decode error instead of misreading data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    /// Version 1 payload.
    V1(PayloadV1),
}

/// Version 1 payload structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadV1 {
    /// Model shape and evaluation metadata.
    pub meta: MetaPayload,
    /// Serialized trees, in evaluation order.
    pub trees: Vec<TreePayload>,
    /// One value table per categorical feature.
    pub cat_tables: Vec<CatTablePayload>,
}

// ============================================================================
// Metadata
// ============================================================================

/// Shape and evaluation metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaPayload {
    /// Number of numeric features.
    pub n_numeric_features: u32,
    /// Number of categorical features.
    pub n_categorical_features: u32,
    /// Output values per row.
    pub n_groups: u32,
    /// Tree combination rule.
    pub combine: Combine,
    /// Additive per-group starting value.
    pub base_score: Vec<f64>,
}

// ============================================================================
// Trees
// ============================================================================

/// One oblivious tree: parallel per-level arrays plus leaf values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreePayload {
    /// Number of levels; all per-level arrays must have this length.
    pub depth: u32,
    /// Split kinds (0 = numeric, 1 = categorical), one per level.
    pub split_kinds: Vec<u8>,
    /// Split feature indices, one per level, local to the split's kind.
    pub split_features: Vec<u32>,
    /// Numeric thresholds, one per level (0.0 on categorical levels).
    pub split_thresholds: Vec<f32>,
    /// Category set ids, one per level (0 on numeric levels).
    pub split_sets: Vec<u32>,
    /// `2^depth × n_groups` leaf values, leaf-major.
    pub leaf_values: Vec<f64>,
    /// Packed bitset words for all category sets of this tree.
    pub set_words: Vec<u32>,
    /// Start offset in `set_words` per set.
    pub set_starts: Vec<u32>,
    /// Word count per set.
    pub set_lens: Vec<u32>,
}

/// Split kind byte for numeric levels.
pub const SPLIT_KIND_NUMERIC: u8 = 0;
/// Split kind byte for categorical levels.
pub const SPLIT_KIND_CATEGORICAL: u8 = 1;

// ============================================================================
// Categorical Tables
// ============================================================================

/// Hash-to-bucket table for one categorical feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatTablePayload {
    /// Strictly ascending hashed values.
    pub hashes: Vec<u32>,
    /// Bucket per hash, parallel to `hashes`.
    pub buckets: Vec<u32>,
    /// Number of distinct buckets.
    pub n_buckets: u32,
}

// ============================================================================
// Tests
// ============================================================================
