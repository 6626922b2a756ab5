//! Provisioning operations: collection and table lifecycle, record removal.
//!
//! These run outside the index/match path. Creation is not idempotent: an
//! existing resource is reported as [`Error::AlreadyExists`] and left untouched.

use crate::engine::BiometricEngine;
use crate::error::{Error, ResourceKind, Result};
use crate::store::{IdentityStore, TableCatalog};
use crate::types::{FaceId, TableSpec};

/// Create a face collection, returning the provider's identifier for it.
pub fn create_collection(engine: &dyn BiometricEngine, name: &str) -> Result<String> {
    if engine.list_collections()?.iter().any(|c| c == name) {
        tracing::error!(collection = name, "collection already exists");
        return Err(Error::AlreadyExists {
            kind: ResourceKind::Collection,
            name: name.to_string(),
        });
    }
    let id = engine.create_collection(name)?;
    tracing::info!(collection = name, id = %id, "collection created");
    Ok(id)
}

pub fn delete_collection(engine: &dyn BiometricEngine, name: &str) -> Result<()> {
    engine.delete_collection(name)?;
    tracing::info!(collection = name, "collection deleted");
    Ok(())
}

/// Remove faces from a collection. Their identity records are not touched.
pub fn delete_faces(engine: &dyn BiometricEngine, face_ids: &[FaceId], collection: &str) -> Result<()> {
    engine.delete_faces(face_ids, collection)?;
    tracing::info!(collection, faces = face_ids.len(), "faces deleted");
    Ok(())
}

pub fn create_table(catalog: &dyn TableCatalog, spec: &TableSpec) -> Result<()> {
    if catalog.table_exists(&spec.name)? {
        tracing::error!(table = %spec.name, "table already exists");
        return Err(Error::AlreadyExists {
            kind: ResourceKind::Table,
            name: spec.name.clone(),
        });
    }
    catalog.create_table(spec)?;
    tracing::info!(table = %spec.name, key = %spec.key_attribute, "table created");
    Ok(())
}

pub fn table_exists(catalog: &dyn TableCatalog, name: &str) -> Result<bool> {
    catalog.table_exists(name)
}

pub fn delete_table(catalog: &dyn TableCatalog, name: &str) -> Result<()> {
    catalog.delete_table(name)?;
    tracing::info!(table = name, "table deleted");
    Ok(())
}

pub fn delete_identity(identities: &dyn IdentityStore, face_id: &FaceId) -> Result<()> {
    identities.delete(face_id)?;
    tracing::info!(face_id = %face_id, "identity record deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{FakeEngine, MemoryCatalog};

    fn spec(name: &str) -> TableSpec {
        TableSpec {
            name: name.into(),
            key_attribute: "face_id".into(),
        }
    }

    #[test]
    fn test_create_existing_table_fails_without_mutation() {
        let catalog = MemoryCatalog::default();
        create_table(&catalog, &spec("identities")).unwrap();
        assert_eq!(catalog.create_calls(), 1);

        let err = create_table(&catalog, &spec("identities")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(catalog.create_calls(), 1);
        assert!(table_exists(&catalog, "identities").unwrap());
    }

    #[test]
    fn test_delete_table() {
        let catalog = MemoryCatalog::default();
        create_table(&catalog, &spec("identities")).unwrap();
        delete_table(&catalog, "identities").unwrap();
        assert!(!table_exists(&catalog, "identities").unwrap());
    }

    #[test]
    fn test_create_existing_collection_fails_without_mutation() {
        let engine = FakeEngine::default();
        let id = create_collection(&engine, "faces").unwrap();
        assert_eq!(id, "collection/faces");

        let err = create_collection(&engine, "faces").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(engine.collections(), ["faces"]);
        assert_eq!(engine.create_collection_calls(), 1);
    }

    #[test]
    fn test_delete_collection_then_recreate() {
        let engine = FakeEngine::default();
        create_collection(&engine, "faces").unwrap();
        delete_collection(&engine, "faces").unwrap();
        assert!(engine.collections().is_empty());
        create_collection(&engine, "faces").unwrap();
    }
}
