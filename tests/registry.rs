//! Handle lifecycle integration tests: the `Unloaded → Loaded → Released`
//! state machine as seen through the registry surface.

use grove::{testing, CatValues, HandleError, ModelRegistry, RegistryError};

#[test]
fn load_predict_release_cycle() {
    let mut registry = ModelRegistry::new();
    let bytes = testing::numeric_stump(2, 0, 0.5, [10.0, 20.0]).to_bytes().unwrap();

    let handle = registry.load_from_bytes(&bytes).unwrap();
    assert_eq!(registry.prediction_dimension(handle), Ok(1));
    assert_eq!(registry.tree_count(handle), Ok(1));
    assert_eq!(registry.numeric_feature_count(handle), Ok(2));
    assert_eq!(registry.categorical_feature_count(handle), Ok(0));

    let out = registry
        .predict(handle, Some(&[0.0, 0.0]), CatValues::Absent)
        .unwrap();
    assert_eq!(out, vec![10.0]);

    assert!(registry.release(handle));
    assert_eq!(registry.live_count(), 0);
}

#[test]
fn double_release_then_predict() {
    // Release twice succeeds (second is a no-op), and any later predict
    // on the handle is a handle error.
    let mut registry = ModelRegistry::new();
    let handle = registry.insert(testing::numeric_model());

    assert!(registry.release(handle));
    assert!(!registry.release(handle));

    let err = registry
        .predict(handle, Some(&[0.0, 0.0]), CatValues::Absent)
        .unwrap_err();
    assert_eq!(err, RegistryError::Handle(HandleError::NotLive { handle }));
}

#[test]
fn accessors_fail_on_released_handle() {
    let mut registry = ModelRegistry::new();
    let handle = registry.insert(testing::numeric_model());
    registry.release(handle);

    assert_eq!(registry.prediction_dimension(handle), Err(HandleError::NotLive { handle }));
    assert_eq!(registry.tree_count(handle), Err(HandleError::NotLive { handle }));
    assert_eq!(registry.numeric_feature_count(handle), Err(HandleError::NotLive { handle }));
    assert_eq!(
        registry.categorical_feature_count(handle),
        Err(HandleError::NotLive { handle })
    );
}

#[test]
fn corrupt_bytes_leave_no_live_handle() {
    let mut registry = ModelRegistry::new();

    assert!(registry.load_from_bytes(b"not a model at all").is_err());

    let mut bytes = testing::numeric_model().to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    assert!(registry.load_from_bytes(&bytes).is_err());

    assert_eq!(registry.live_count(), 0);
}

#[test]
fn load_from_path_and_missing_file() {
    let mut registry = ModelRegistry::new();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.grove");
    testing::categorical_model().save(&path).unwrap();

    let handle = registry.load_from_path(&path).unwrap();
    let out = registry.predict(handle, None, CatValues::Raw(&["green"])).unwrap();
    assert_eq!(out, vec![1.0]);

    assert!(registry.load_from_path(dir.path().join("absent.grove")).is_err());
    assert_eq!(registry.live_count(), 1);
}

#[test]
fn stale_handles_stay_dead_after_slot_reuse() {
    let mut registry = ModelRegistry::new();

    let first = registry.insert(testing::numeric_model());
    registry.release(first);

    // The freed slot is reused with a new generation.
    let second = registry.insert(testing::multiclass_model());
    assert_ne!(first, second);
    assert!(!registry.is_live(first));
    assert_eq!(registry.prediction_dimension(second), Ok(3));

    // The stale handle neither reads nor frees the new occupant.
    assert!(matches!(
        registry.predict(first, Some(&[0.0, 0.0]), CatValues::Absent),
        Err(RegistryError::Handle(_))
    ));
    assert!(!registry.release(first));
    assert!(registry.is_live(second));
}

#[test]
fn many_models_coexist() {
    let mut registry = ModelRegistry::new();
    let a = registry.insert(testing::numeric_model());
    let b = registry.insert(testing::categorical_model());
    let c = registry.insert(testing::multiclass_model());

    assert_eq!(registry.live_count(), 3);
    assert_eq!(registry.numeric_feature_count(a), Ok(2));
    assert_eq!(registry.categorical_feature_count(b), Ok(1));
    assert_eq!(registry.prediction_dimension(c), Ok(3));

    registry.release(b);
    assert_eq!(registry.live_count(), 2);
    assert!(registry.is_live(a));
    assert!(registry.is_live(c));
}
