//! Tagged feature-row inputs and argument validation.
//!
//! Categorical features arrive either as raw strings (hashed here) or as
//! hashes the caller computed up front via [`cat_feature_hash`]. Both forms,
//! single-row and batched, resolve to the same per-row bucket layout before
//! any tree is walked, and every shape error is raised before anything is
//! written to an output buffer.

use ndarray::ArrayView2;
use thiserror::Error;

use crate::hash::cat_feature_hash;
use crate::model::{Model, UNSEEN_BUCKET};

// =============================================================================
// Input Variants
// =============================================================================

/// Categorical features for a single row.
#[derive(Debug, Clone, Copy)]
pub enum CatValues<'a> {
    /// No categorical row supplied. Valid only for models with zero
    /// categorical features.
    Absent,
    /// Raw string values, hashed during resolution.
    Raw(&'a [&'a str]),
    /// Precomputed hashes from [`cat_feature_hash`].
    Hashed(&'a [u32]),
}

/// Categorical features for a batch of rows.
#[derive(Debug, Clone, Copy)]
pub enum CatBatch<'a> {
    /// No categorical rows supplied. Valid only for models with zero
    /// categorical features.
    Absent,
    /// Raw string values, one slice per row.
    Raw(&'a [&'a [&'a str]]),
    /// Precomputed hashes, `rows × categorical_feature_count`.
    Hashed(ArrayView2<'a, u32>),
}

// =============================================================================
// PredictError
// =============================================================================

/// Argument errors for prediction calls.
///
/// Raised before any output write; a failed call leaves caller buffers
/// exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredictError {
    #[error("numeric row has {actual} features, model expects {expected}")]
    NumericLengthMismatch { expected: usize, actual: usize },

    #[error("categorical row has {actual} features, model expects {expected}")]
    CategoricalLengthMismatch { expected: usize, actual: usize },

    #[error("numeric features absent, model expects {expected}")]
    NumericRowMissing { expected: usize },

    #[error("categorical features absent, model expects {expected}")]
    CategoricalRowMissing { expected: usize },

    #[error("numeric rows ({numeric}) and categorical rows ({categorical}) disagree")]
    RowCountMismatch { numeric: usize, categorical: usize },

    #[error("output buffer holds {capacity} values, {required} required")]
    OutputTooSmall { required: usize, capacity: usize },
}

// =============================================================================
// Validation and Resolution
// =============================================================================

/// Check a single numeric row against the model shape.
pub(crate) fn check_numeric_row<'a>(
    model: &Model,
    numeric: Option<&'a [f32]>,
) -> Result<&'a [f32], PredictError> {
    let expected = model.numeric_feature_count();
    match numeric {
        Some(row) if row.len() == expected => Ok(row),
        Some(row) => Err(PredictError::NumericLengthMismatch {
            expected,
            actual: row.len(),
        }),
        None if expected == 0 => Ok(&[]),
        None => Err(PredictError::NumericRowMissing { expected }),
    }
}

/// Bucket for one hashed value of one categorical feature.
#[inline]
pub(crate) fn lookup_bucket(model: &Model, feature: usize, hash: u32) -> u32 {
    model
        .cat_table(feature)
        .bucket_for(hash)
        .unwrap_or(UNSEEN_BUCKET)
}

/// Resolve a single categorical row into `out` (one bucket per feature).
pub(crate) fn resolve_cat_row(
    model: &Model,
    values: &CatValues<'_>,
    out: &mut Vec<u32>,
) -> Result<(), PredictError> {
    let expected = model.categorical_feature_count();
    out.clear();
    match *values {
        CatValues::Absent if expected == 0 => Ok(()),
        CatValues::Absent => Err(PredictError::CategoricalRowMissing { expected }),
        CatValues::Raw(row) => {
            if row.len() != expected {
                return Err(PredictError::CategoricalLengthMismatch {
                    expected,
                    actual: row.len(),
                });
            }
            for (feature, value) in row.iter().enumerate() {
                out.push(lookup_bucket(model, feature, cat_feature_hash(value)));
            }
            Ok(())
        }
        CatValues::Hashed(row) => {
            if row.len() != expected {
                return Err(PredictError::CategoricalLengthMismatch {
                    expected,
                    actual: row.len(),
                });
            }
            for (feature, &hash) in row.iter().enumerate() {
                out.push(lookup_bucket(model, feature, hash));
            }
            Ok(())
        }
    }
}

/// Validate batch shapes and return the row count.
///
/// Checks presence rules, per-row lengths for every row, and row-count
/// agreement between the numeric and categorical inputs, all up front.
pub(crate) fn batch_shape(
    model: &Model,
    numeric: &Option<ArrayView2<f32>>,
    cats: &CatBatch<'_>,
) -> Result<usize, PredictError> {
    let n_numeric = model.numeric_feature_count();
    let n_categorical = model.categorical_feature_count();

    let numeric_rows = match numeric {
        Some(matrix) => {
            if matrix.ncols() != n_numeric {
                return Err(PredictError::NumericLengthMismatch {
                    expected: n_numeric,
                    actual: matrix.ncols(),
                });
            }
            Some(matrix.nrows())
        }
        None if n_numeric == 0 => None,
        None => return Err(PredictError::NumericRowMissing { expected: n_numeric }),
    };

    let cat_rows = match *cats {
        CatBatch::Absent if n_categorical == 0 => None,
        CatBatch::Absent => {
            return Err(PredictError::CategoricalRowMissing {
                expected: n_categorical,
            })
        }
        CatBatch::Raw(rows) => {
            for row in rows {
                if row.len() != n_categorical {
                    return Err(PredictError::CategoricalLengthMismatch {
                        expected: n_categorical,
                        actual: row.len(),
                    });
                }
            }
            Some(rows.len())
        }
        CatBatch::Hashed(matrix) => {
            if matrix.ncols() != n_categorical {
                return Err(PredictError::CategoricalLengthMismatch {
                    expected: n_categorical,
                    actual: matrix.ncols(),
                });
            }
            Some(matrix.nrows())
        }
    };

    match (numeric_rows, cat_rows) {
        (Some(n), Some(c)) if n != c => Err(PredictError::RowCountMismatch {
            numeric: n,
            categorical: c,
        }),
        (Some(n), _) => Ok(n),
        (None, Some(c)) => Ok(c),
        // Both absent is only reachable with zero features of each kind;
        // the batch is then empty by definition.
        (None, None) => Ok(0),
    }
}

/// Fill `out` with the bucket row for batch row `row`.
///
/// Shapes must have passed [`batch_shape`] first.
pub(crate) fn resolve_batch_cat_row(
    model: &Model,
    cats: &CatBatch<'_>,
    row: usize,
    out: &mut Vec<u32>,
) {
    out.clear();
    match *cats {
        CatBatch::Absent => {}
        CatBatch::Raw(rows) => {
            for (feature, value) in rows[row].iter().enumerate() {
                out.push(lookup_bucket(model, feature, cat_feature_hash(value)));
            }
        }
        CatBatch::Hashed(matrix) => {
            for (feature, &hash) in matrix.row(row).iter().enumerate() {
                out.push(lookup_bucket(model, feature, hash));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use ndarray::Array2;

    #[test]
    fn numeric_row_rules() {
        let model = testing::numeric_model();
        assert!(check_numeric_row(&model, Some(&[0.0, 0.0])).is_ok());
        assert_eq!(
            check_numeric_row(&model, Some(&[0.0])),
            Err(PredictError::NumericLengthMismatch { expected: 2, actual: 1 })
        );
        assert_eq!(
            check_numeric_row(&model, None),
            Err(PredictError::NumericRowMissing { expected: 2 })
        );
    }

    #[test]
    fn cat_row_rules() {
        let model = testing::mixed_model();
        let mut out = Vec::new();

        assert_eq!(
            resolve_cat_row(&model, &CatValues::Absent, &mut out),
            Err(PredictError::CategoricalRowMissing { expected: 1 })
        );
        assert_eq!(
            resolve_cat_row(&model, &CatValues::Raw(&["a", "b"]), &mut out),
            Err(PredictError::CategoricalLengthMismatch { expected: 1, actual: 2 })
        );
        assert!(resolve_cat_row(&model, &CatValues::Raw(&["summer"]), &mut out).is_ok());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn unseen_value_gets_sentinel_bucket() {
        let model = testing::mixed_model();
        let mut out = Vec::new();
        resolve_cat_row(&model, &CatValues::Raw(&["never-seen-in-training"]), &mut out).unwrap();
        assert_eq!(out, vec![UNSEEN_BUCKET]);
    }

    #[test]
    fn batch_shape_rules() {
        let model = testing::numeric_model();

        let numeric = Array2::<f32>::zeros((3, 2));
        let rows = batch_shape(&model, &Some(numeric.view()), &CatBatch::Absent).unwrap();
        assert_eq!(rows, 3);

        let wrong = Array2::<f32>::zeros((3, 1));
        assert_eq!(
            batch_shape(&model, &Some(wrong.view()), &CatBatch::Absent),
            Err(PredictError::NumericLengthMismatch { expected: 2, actual: 1 })
        );

        assert_eq!(
            batch_shape(&model, &None, &CatBatch::Absent),
            Err(PredictError::NumericRowMissing { expected: 2 })
        );
    }

    #[test]
    fn batch_shape_row_count_agreement() {
        let model = testing::mixed_model();

        let numeric = Array2::<f32>::zeros((2, 2));
        let hashes = Array2::<u32>::zeros((3, 1));
        assert_eq!(
            batch_shape(&model, &Some(numeric.view()), &CatBatch::Hashed(hashes.view())),
            Err(PredictError::RowCountMismatch { numeric: 2, categorical: 3 })
        );

        let hashes = Array2::<u32>::zeros((2, 1));
        let rows =
            batch_shape(&model, &Some(numeric.view()), &CatBatch::Hashed(hashes.view())).unwrap();
        assert_eq!(rows, 2);
    }

    #[test]
    fn batch_shape_checks_every_raw_row() {
        let model = testing::mixed_model();
        let numeric = Array2::<f32>::zeros((2, 2));

        let good: &[&str] = &["summer"];
        let bad: &[&str] = &["summer", "extra"];
        let rows: &[&[&str]] = &[good, bad];
        assert_eq!(
            batch_shape(&model, &Some(numeric.view()), &CatBatch::Raw(rows)),
            Err(PredictError::CategoricalLengthMismatch { expected: 1, actual: 2 })
        );
    }
}
