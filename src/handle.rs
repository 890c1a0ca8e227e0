//! Handle-based model lifecycle.
//!
//! Embedders that cannot own a [`Model`] directly (FFI bindings, script
//! runtimes) register models in a [`ModelRegistry`] and pass opaque
//! [`ModelHandle`]s around instead. The registry is a slot arena with a
//! generation counter per slot: releasing a handle bumps the generation,
//! so a stale handle is detected and reported rather than resolving to
//! whatever model reused the slot.
//!
//! Release is explicit and idempotent. Mutation (`insert`, `release`)
//! takes `&mut self`, reads take `&self`; in-process the borrow checker
//! already prevents a release racing an in-flight predict, and embedders
//! putting the registry behind a lock get the same guarantee across
//! threads.

use std::fmt;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use thiserror::Error;

use crate::inference::{CatBatch, CatValues, PredictError, Predictor};
use crate::io::{FormatError, LoadError};
use crate::model::Model;
use crate::utils::Parallelism;

// =============================================================================
// ModelHandle
// =============================================================================

/// Opaque identifier for a model registered in a [`ModelRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Use of a handle that is not currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    #[error("model handle {handle} is not live (never loaded or already released)")]
    NotLive { handle: ModelHandle },
}

/// Errors from registry-level prediction calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Handle(#[from] HandleError),

    #[error(transparent)]
    Predict(#[from] PredictError),
}

// =============================================================================
// ModelRegistry
// =============================================================================

struct Slot {
    generation: u32,
    model: Option<Model>,
}

/// Arena of loaded models addressed by generation-checked handles.
#[derive(Default)]
pub struct ModelRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a model file and register it.
    ///
    /// A failed load allocates no slot and no handle.
    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<ModelHandle, LoadError> {
        let model = Model::load(path)?;
        Ok(self.insert(model))
    }

    /// Parse a model from bytes and register it.
    ///
    /// A failed parse allocates no slot and no handle.
    pub fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<ModelHandle, FormatError> {
        let model = Model::from_bytes(bytes)?;
        Ok(self.insert(model))
    }

    /// Register an already-constructed model.
    pub fn insert(&mut self, model: Model) -> ModelHandle {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                debug_assert!(slot.model.is_none());
                slot.model = Some(model);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    model: Some(model),
                });
                (self.slots.len() - 1) as u32
            }
        };
        let handle = ModelHandle {
            index,
            generation: self.slots[index as usize].generation,
        };
        tracing::debug!(handle = %handle, "registered model");
        handle
    }

    /// Release a handle's model.
    ///
    /// Idempotent: releasing a stale or already-released handle is a no-op.
    /// Returns whether a model was actually freed.
    pub fn release(&mut self, handle: ModelHandle) -> bool {
        match self.slots.get_mut(handle.index as usize) {
            Some(slot) if slot.generation == handle.generation && slot.model.is_some() => {
                slot.model = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(handle.index);
                tracing::debug!(handle = %handle, "released model");
                true
            }
            _ => false,
        }
    }

    /// Resolve a handle to its model.
    pub fn model(&self, handle: ModelHandle) -> Result<&Model, HandleError> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.model.as_ref())
            .ok_or(HandleError::NotLive { handle })
    }

    /// Whether a handle currently resolves to a model.
    pub fn is_live(&self, handle: ModelHandle) -> bool {
        self.model(handle).is_ok()
    }

    /// Number of live models.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.model.is_some()).count()
    }

    // =========================================================================
    // Shape Accessors
    // =========================================================================

    /// Output values per row for the handle's model.
    pub fn prediction_dimension(&self, handle: ModelHandle) -> Result<usize, HandleError> {
        Ok(self.model(handle)?.prediction_dimension())
    }

    /// Tree count for the handle's model.
    pub fn tree_count(&self, handle: ModelHandle) -> Result<usize, HandleError> {
        Ok(self.model(handle)?.tree_count())
    }

    /// Numeric feature count for the handle's model.
    pub fn numeric_feature_count(&self, handle: ModelHandle) -> Result<usize, HandleError> {
        Ok(self.model(handle)?.numeric_feature_count())
    }

    /// Categorical feature count for the handle's model.
    pub fn categorical_feature_count(&self, handle: ModelHandle) -> Result<usize, HandleError> {
        Ok(self.model(handle)?.categorical_feature_count())
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Evaluate one row against the handle's model.
    pub fn predict(
        &self,
        handle: ModelHandle,
        numeric: Option<&[f32]>,
        categorical: CatValues<'_>,
    ) -> Result<Vec<f64>, RegistryError> {
        Ok(self.model(handle)?.predict(numeric, categorical)?)
    }

    /// Evaluate a batch against the handle's model.
    pub fn predict_batch(
        &self,
        handle: ModelHandle,
        numeric: Option<ArrayView2<f32>>,
        categorical: CatBatch<'_>,
        parallelism: Parallelism,
    ) -> Result<Array2<f64>, RegistryError> {
        let predictor = Predictor::new(self.model(handle)?);
        Ok(predictor.predict_batch(numeric, categorical, parallelism)?)
    }
}
