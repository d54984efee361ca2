//! Loading the registry from a model file on disk

use gob_model::testing::SAMPLE_MODEL;
use gob_model::{ModelError, Registry};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_registry_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_MODEL.as_bytes()).unwrap();

    let registry = Registry::from_file(file.path()).unwrap();

    assert_eq!(registry.catalogs().len(), 2);
    assert_eq!(registry.collections().count(), 4);
    assert_eq!(
        registry.get_table_name("catalog", "collectiona").unwrap(),
        "catalog_collectiona"
    );
    assert!(registry.resolve_root("catalogCollectiona").is_some());
    assert!(registry.resolve_root("securePersonen").is_some());
}

#[test]
fn test_registry_from_missing_file() {
    let result = Registry::from_file("/nonexistent/gobmodel.json");
    assert!(matches!(result, Err(ModelError::Io(_))));
}

#[test]
fn test_registry_from_invalid_json() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();

    let result = Registry::from_file(file.path());
    assert!(matches!(result, Err(ModelError::Serialization(_))));
}
