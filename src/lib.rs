//! grove: an inference engine for gradient-boosted oblivious decision trees.
//!
//! grove loads a serialized tree ensemble and evaluates it over feature rows
//! holding numeric values and hashed categorical values. Training is out of
//! scope; models are produced offline and shipped as `.grove` files.
//!
//! # Key Types
//!
//! - [`Model`] - A loaded, immutable ensemble with its categorical tables
//! - [`Predictor`] - Single-row and batched evaluation over a model
//! - [`ModelRegistry`] / [`ModelHandle`] - Handle-based model lifecycle
//! - [`cat_feature_hash`] - The categorical feature hash baked into models
//!
//! # Quick Start
//!
//! ```ignore
//! use grove::{CatValues, Model};
//!
//! let model = Model::load("ranker.grove")?;
//! let scores = model.predict(Some(&[0.3, 1.7]), CatValues::Raw(&["de", "mobile"]))?;
//! ```
//!
//! # Handles
//!
//! Embedders that cannot hold a `Model` directly (FFI bindings, script
//! runtimes) register models in a [`ModelRegistry`] and refer to them by
//! [`ModelHandle`]. Handles are generation-checked: using a released handle
//! is an error, never undefined behavior.

pub mod handle;
pub mod hash;
pub mod inference;
pub mod io;
pub mod model;
pub mod repr;
pub mod testing;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

// Handle-based lifecycle
pub use handle::{HandleError, ModelHandle, ModelRegistry, RegistryError};

// Categorical hashing
pub use hash::{cat_feature_hash, cat_feature_hashes};

// Inference
pub use inference::{CatBatch, CatValues, PredictError, Predictor};

// Storage format
pub use io::{FormatError, LoadError, SerializeError};

// Model and metadata
pub use model::{CatValueTable, Combine, Model, ModelMeta, ModelValidationError};

// Ensemble representation
pub use repr::{CategorySets, Forest, ObliviousTree, SplitCond};

// Shared utilities
pub use utils::Parallelism;
