//! The predictor: single-row and blocked batch evaluation.
//!
//! Batch prediction is semantically one single-row evaluation per row, in
//! input order; blocking and rayon parallelism only change the schedule,
//! never the result. Outputs are row-major `rows × prediction_dimension`
//! in `f64`; inputs are `f32`.

use ndarray::{Array2, ArrayView2};

use crate::model::{Combine, Model};
use crate::repr::NumericRow;
use crate::utils::Parallelism;

use super::rows::{self, CatBatch, CatValues, PredictError};

/// Default number of rows evaluated per block.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

const EMPTY_NUMERIC: &[f32] = &[];

/// Evaluates a model over feature rows.
///
/// Borrow-only and cheap to construct; build one per call site or keep one
/// around, both are fine. A model may be shared by predictors on many
/// threads concurrently.
///
/// # Example
///
/// ```ignore
/// use grove::{CatValues, Parallelism, Predictor};
///
/// let predictor = Predictor::new(&model);
/// let scores = predictor.predict_row(Some(&row), CatValues::Absent)?;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Predictor<'m> {
    model: &'m Model,
    /// Rows evaluated together for cache efficiency.
    block_size: usize,
}

impl<'m> Predictor<'m> {
    /// Create a predictor for the given model.
    #[inline]
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }

    /// Use a custom block size (clamped to at least 1).
    #[inline]
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }

    /// The configured block size.
    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The underlying model.
    #[inline]
    pub fn model(&self) -> &Model {
        self.model
    }

    // =========================================================================
    // Single Row
    // =========================================================================

    /// Evaluate one row, allocating the output.
    pub fn predict_row(
        &self,
        numeric: Option<&[f32]>,
        categorical: CatValues<'_>,
    ) -> Result<Vec<f64>, PredictError> {
        let mut out = vec![0.0; self.model.prediction_dimension()];
        self.predict_row_into(numeric, categorical, &mut out)?;
        Ok(out)
    }

    /// Evaluate one row into a caller-owned buffer.
    ///
    /// `out` needs capacity for `prediction_dimension()` values; only that
    /// prefix is written. All validation happens before the first write.
    pub fn predict_row_into(
        &self,
        numeric: Option<&[f32]>,
        categorical: CatValues<'_>,
        out: &mut [f64],
    ) -> Result<(), PredictError> {
        let dim = self.model.prediction_dimension();
        if out.len() < dim {
            return Err(PredictError::OutputTooSmall {
                required: dim,
                capacity: out.len(),
            });
        }
        let numeric = rows::check_numeric_row(self.model, numeric)?;
        let mut buckets = Vec::with_capacity(self.model.categorical_feature_count());
        rows::resolve_cat_row(self.model, &categorical, &mut buckets)?;

        self.eval_row(&numeric, &buckets, &mut out[..dim]);
        Ok(())
    }

    // =========================================================================
    // Batch
    // =========================================================================

    /// Evaluate a batch, allocating the `rows × prediction_dimension` output.
    pub fn predict_batch(
        &self,
        numeric: Option<ArrayView2<f32>>,
        categorical: CatBatch<'_>,
        parallelism: Parallelism,
    ) -> Result<Array2<f64>, PredictError> {
        let n_rows = rows::batch_shape(self.model, &numeric, &categorical)?;
        let mut out = Array2::zeros((n_rows, self.model.prediction_dimension()));
        let slice = out
            .as_slice_mut()
            .expect("freshly allocated output is contiguous");
        self.predict_batch_into(numeric, categorical, parallelism, slice)?;
        Ok(out)
    }

    /// Evaluate a batch into a caller-owned, row-major buffer.
    ///
    /// Equivalent to [`predict_row_into`](Self::predict_row_into) once per
    /// row, in order. Rows are processed in blocks of
    /// [`block_size`](Self::block_size); with [`Parallelism::Parallel`]
    /// blocks are distributed over the rayon pool. All shape and capacity
    /// validation happens before the first write.
    pub fn predict_batch_into(
        &self,
        numeric: Option<ArrayView2<f32>>,
        categorical: CatBatch<'_>,
        parallelism: Parallelism,
        out: &mut [f64],
    ) -> Result<(), PredictError> {
        let model = self.model;
        let dim = model.prediction_dimension();

        let n_rows = rows::batch_shape(model, &numeric, &categorical)?;
        let required = n_rows * dim;
        if out.len() < required {
            return Err(PredictError::OutputTooSmall {
                required,
                capacity: out.len(),
            });
        }
        if n_rows == 0 {
            return Ok(());
        }

        let block_rows = self.block_size;
        let blocks: Vec<(usize, &mut [f64])> = out[..required]
            .chunks_mut(block_rows * dim)
            .enumerate()
            .collect();

        parallelism.maybe_par_for_each(blocks, |(block_idx, out_block)| {
            let first_row = block_idx * block_rows;
            let rows_here = out_block.len() / dim;
            let mut buckets = Vec::with_capacity(model.categorical_feature_count());

            for r in 0..rows_here {
                let row = first_row + r;
                rows::resolve_batch_cat_row(model, &categorical, row, &mut buckets);
                let out_row = &mut out_block[r * dim..(r + 1) * dim];
                match &numeric {
                    Some(matrix) => self.eval_row(&matrix.row(row), &buckets, out_row),
                    None => self.eval_row(&EMPTY_NUMERIC, &buckets, out_row),
                }
            }
        });
        Ok(())
    }

    // =========================================================================
    // Core Evaluation
    // =========================================================================

    /// Accumulate all trees into `out` for one resolved row, then apply the
    /// combination rule and base score. `out.len()` is the group count.
    fn eval_row<R: NumericRow>(&self, numeric: &R, cat_buckets: &[u32], out: &mut [f64]) {
        let forest = self.model.forest();
        let dim = out.len();

        out.fill(0.0);
        for tree in forest.trees() {
            let leaf = tree.leaf_index(numeric, cat_buckets);
            for (acc, &value) in out.iter_mut().zip(tree.leaf(leaf, dim)) {
                *acc += value;
            }
        }

        if self.model.combine() == Combine::Average && forest.n_trees() > 0 {
            let n = forest.n_trees() as f64;
            for acc in out.iter_mut() {
                *acc /= n;
            }
        }

        for (acc, &base) in out.iter_mut().zip(forest.base_score()) {
            *acc += base;
        }
    }
}

// =============================================================================
// Model Convenience Methods
// =============================================================================

impl Model {
    /// Evaluate one row. See [`Predictor::predict_row`].
    pub fn predict(
        &self,
        numeric: Option<&[f32]>,
        categorical: CatValues<'_>,
    ) -> Result<Vec<f64>, PredictError> {
        Predictor::new(self).predict_row(numeric, categorical)
    }

    /// Evaluate a batch sequentially. See [`Predictor::predict_batch`].
    pub fn predict_batch(
        &self,
        numeric: Option<ArrayView2<f32>>,
        categorical: CatBatch<'_>,
    ) -> Result<Array2<f64>, PredictError> {
        Predictor::new(self).predict_batch(numeric, categorical, Parallelism::Sequential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;

    #[test]
    fn stump_routes_by_threshold() {
        let model = testing::numeric_stump(2, 0, 0.5, [10.0, 20.0]);
        let predictor = Predictor::new(&model);

        let out = predictor.predict_row(Some(&[0.0, 0.0]), CatValues::Absent).unwrap();
        assert_eq!(out, vec![10.0]);
        let out = predictor.predict_row(Some(&[1.0, 0.0]), CatValues::Absent).unwrap();
        assert_eq!(out, vec![20.0]);
    }

    #[test]
    fn trees_sum() {
        let model = testing::numeric_model();
        // Tree contributions: 0.3 -> 1.0 + 0.5; 0.8 -> 2.0 + 1.5.
        let out = model.predict(Some(&[0.3, 0.0]), CatValues::Absent).unwrap();
        assert_abs_diff_eq!(out[0], 1.5, epsilon = 1e-12);
        let out = model.predict(Some(&[0.8, 0.9]), CatValues::Absent).unwrap();
        assert_abs_diff_eq!(out[0], 3.5, epsilon = 1e-12);
    }

    #[test]
    fn base_score_is_added() {
        let model = testing::numeric_stump_with_base(2, 0, 0.5, [1.0, 2.0], 0.5);
        let out = model.predict(Some(&[0.0, 0.0]), CatValues::Absent).unwrap();
        assert_abs_diff_eq!(out[0], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn average_combine_divides_by_tree_count() {
        let model = testing::average_model();
        // Two trees contributing 1.0 and 3.0: Average -> 2.0.
        let out = model.predict(Some(&[0.0, 0.0]), CatValues::Absent).unwrap();
        assert_abs_diff_eq!(out[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn multiclass_outputs_every_group() {
        let model = testing::multiclass_model();
        let out = model.predict(Some(&[0.0, 0.0]), CatValues::Absent).unwrap();
        assert_eq!(out.len(), 3);
        assert_abs_diff_eq!(out[0], 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(out[1], 0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(out[2], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn row_buffer_capacity_is_checked() {
        let model = testing::multiclass_model();
        let predictor = Predictor::new(&model);
        let mut out = vec![0.0; 2];
        assert_eq!(
            predictor.predict_row_into(Some(&[0.0, 0.0]), CatValues::Absent, &mut out),
            Err(PredictError::OutputTooSmall { required: 3, capacity: 2 })
        );
    }

    #[test]
    fn batch_matches_rows_across_block_sizes_and_parallelism() {
        let model = testing::numeric_model();
        let n_rows = 150;
        let data: Vec<f32> = (0..n_rows * 2).map(|i| (i % 13) as f32 / 13.0).collect();
        let features = Array2::from_shape_vec((n_rows, 2), data).unwrap();

        let mut expected = Vec::with_capacity(n_rows);
        for row in features.rows() {
            let out = model
                .predict(Some(row.as_slice().unwrap()), CatValues::Absent)
                .unwrap();
            expected.push(out[0]);
        }

        for block_size in [1, 16, 64, 1000] {
            for parallelism in [Parallelism::Sequential, Parallelism::Parallel] {
                let predictor = Predictor::new(&model).with_block_size(block_size);
                let out = predictor
                    .predict_batch(Some(features.view()), CatBatch::Absent, parallelism)
                    .unwrap();
                assert_eq!(out.shape(), &[n_rows, 1]);
                for (i, &e) in expected.iter().enumerate() {
                    assert_eq!(out[[i, 0]], e, "row {i}, block {block_size}");
                }
            }
        }
    }

    #[test]
    fn empty_batch() {
        let model = testing::numeric_model();
        let features = Array2::<f32>::zeros((0, 2));
        let out = model.predict_batch(Some(features.view()), CatBatch::Absent).unwrap();
        assert_eq!(out.shape(), &[0, 1]);
    }

    #[test]
    fn failed_batch_leaves_buffer_untouched() {
        let model = testing::numeric_model();
        let predictor = Predictor::new(&model);
        let features = Array2::<f32>::zeros((4, 2));

        let mut out = vec![-7.0; 3]; // too small: need 4
        let err = predictor
            .predict_batch_into(
                Some(features.view()),
                CatBatch::Absent,
                Parallelism::Sequential,
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err, PredictError::OutputTooSmall { required: 4, capacity: 3 });
        assert_eq!(out, vec![-7.0; 3]);
    }
}
