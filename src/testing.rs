//! Model builders shared by unit and integration tests.
//!
//! These construct small, fully-validated models with hand-checkable
//! outputs. Not a stable API surface.

use crate::hash::cat_feature_hash;
use crate::model::{CatValueTable, Combine, Model, ModelMeta};
use crate::repr::{CategorySets, Forest, ObliviousTree, SplitCond};

/// Depth-1 tree on one numeric feature.
fn stump_tree(feature: u32, threshold: f32, leaves: [f64; 2]) -> ObliviousTree {
    ObliviousTree::new(
        vec![SplitCond::Numeric { feature, threshold }],
        leaves.to_vec(),
        CategorySets::empty(),
    )
}

fn meta(n_numeric: usize, n_categorical: usize, dim: usize, combine: Combine) -> ModelMeta {
    ModelMeta {
        n_numeric_features: n_numeric,
        n_categorical_features: n_categorical,
        prediction_dimension: dim,
        combine,
    }
}

/// Single-tree model: `feature > threshold` picks `leaves[1]`.
pub fn numeric_stump(
    n_numeric_features: usize,
    feature: u32,
    threshold: f32,
    leaves: [f64; 2],
) -> Model {
    let mut forest = Forest::for_regression();
    forest.push_tree(stump_tree(feature, threshold, leaves));
    Model::new(forest, vec![], meta(n_numeric_features, 0, 1, Combine::Sum))
        .expect("valid test model")
}

/// Like [`numeric_stump`] with a nonzero base score.
pub fn numeric_stump_with_base(
    n_numeric_features: usize,
    feature: u32,
    threshold: f32,
    leaves: [f64; 2],
    base: f64,
) -> Model {
    let mut forest = Forest::for_regression().with_base_score(vec![base]);
    forest.push_tree(stump_tree(feature, threshold, leaves));
    Model::new(forest, vec![], meta(n_numeric_features, 0, 1, Combine::Sum))
        .expect("valid test model")
}

/// Two numeric features, two stumps on feature 0 at 0.5.
///
/// Row with `f0 <= 0.5` scores `1.0 + 0.5`, otherwise `2.0 + 1.5`.
pub fn numeric_model() -> Model {
    let mut forest = Forest::for_regression();
    forest.push_tree(stump_tree(0, 0.5, [1.0, 2.0]));
    forest.push_tree(stump_tree(0, 0.5, [0.5, 1.5]));
    Model::new(forest, vec![], meta(2, 0, 1, Combine::Sum)).expect("valid test model")
}

/// Two stumps under [`Combine::Average`]; the bit-0 path scores
/// `(1.0 + 3.0) / 2`.
pub fn average_model() -> Model {
    let mut forest = Forest::for_regression();
    forest.push_tree(stump_tree(0, 0.5, [1.0, 10.0]));
    forest.push_tree(stump_tree(0, 0.5, [3.0, 30.0]));
    Model::new(forest, vec![], meta(2, 0, 1, Combine::Average)).expect("valid test model")
}

/// Three output groups, one depth-1 tree on feature 0 at 0.5.
///
/// Bit 0 yields `[0.1, 0.2, 0.3]`, bit 1 yields `[0.9, 0.8, 0.7]`.
pub fn multiclass_model() -> Model {
    let tree = ObliviousTree::new(
        vec![SplitCond::Numeric { feature: 0, threshold: 0.5 }],
        vec![0.1, 0.2, 0.3, 0.9, 0.8, 0.7],
        CategorySets::empty(),
    );
    let mut forest = Forest::new(3);
    forest.push_tree(tree);
    Model::new(forest, vec![], meta(2, 0, 3, Combine::Sum)).expect("valid test model")
}

/// One categorical feature over `{"red", "green", "blue"}`.
///
/// The split set holds the buckets of `"green"` and `"blue"`: those values
/// score `1.0`, while `"red"` and anything unseen in training score `-1.0`.
pub fn categorical_model() -> Model {
    let values = ["red", "green", "blue"];
    let table = CatValueTable::from_pairs(
        values
            .iter()
            .enumerate()
            .map(|(bucket, v)| (cat_feature_hash(v), bucket as u32)),
        values.len() as u32,
    );

    let tree = ObliviousTree::new(
        vec![SplitCond::Categorical { feature: 0, set: 0 }],
        vec![-1.0, 1.0],
        CategorySets::from_bucket_lists(&[vec![1, 2]]),
    );
    let mut forest = Forest::for_regression();
    forest.push_tree(tree);
    Model::new(forest, vec![table], meta(0, 1, 1, Combine::Sum)).expect("valid test model")
}

/// Two numeric features plus one categorical feature, depth-2 tree.
///
/// Level 0: `f0 > 0.5`; level 1: categorical value in `{"winter"}`.
pub fn mixed_model() -> Model {
    let values = ["summer", "winter", "spring"];
    let table = CatValueTable::from_pairs(
        values
            .iter()
            .enumerate()
            .map(|(bucket, v)| (cat_feature_hash(v), bucket as u32)),
        values.len() as u32,
    );

    let tree = ObliviousTree::new(
        vec![
            SplitCond::Numeric { feature: 0, threshold: 0.5 },
            SplitCond::Categorical { feature: 0, set: 0 },
        ],
        vec![10.0, 20.0, 30.0, 40.0],
        CategorySets::from_bucket_lists(&[vec![1]]),
    );
    let mut forest = Forest::for_regression();
    forest.push_tree(tree);
    Model::new(forest, vec![table], meta(2, 1, 1, Combine::Sum)).expect("valid test model")
}
