//! Inference over loaded models.
//!
//! This module evaluates a [`crate::Model`] against feature rows:
//!
//! - [`rows`]: tagged input variants ([`CatValues`], [`CatBatch`]) and
//!   argument validation
//! - [`predictor`]: the [`Predictor`], with single-row and blocked batch
//!   evaluation
//!
//! All call shapes funnel into one evaluation path, so supplying
//! categorical features as raw strings or precomputed hashes, one row or a
//! batch, cannot drift apart semantically.

pub mod predictor;
pub mod rows;

pub use predictor::{Predictor, DEFAULT_BLOCK_SIZE};
pub use rows::{CatBatch, CatValues, PredictError};
