//! Face indexing: bind every face found in an image to an identity label.

use crate::engine::BiometricEngine;
use crate::error::{Error, Result};
use crate::store::IdentityStore;
use crate::types::Attributes;
use std::sync::Arc;

pub struct FaceIndexer {
    engine: Arc<dyn BiometricEngine>,
    identities: Arc<dyn IdentityStore>,
    collection: String,
    full_name_attribute: String,
}

impl FaceIndexer {
    pub fn new(
        engine: Arc<dyn BiometricEngine>,
        identities: Arc<dyn IdentityStore>,
        collection: impl Into<String>,
        full_name_attribute: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            identities,
            collection: collection.into(),
            full_name_attribute: full_name_attribute.into(),
        }
    }

    /// Index `image` into the collection and record `label` for every face found.
    ///
    /// Returns the number of faces indexed. An image without faces is not an
    /// error. Records are written one by one; if a write fails the faces
    /// already indexed by the engine are left in place and the error reports
    /// how many records made it.
    pub fn index(&self, image: &[u8], label: &str) -> Result<usize> {
        let face_ids = self.engine.index_faces(image, &self.collection)?;

        if face_ids.is_empty() {
            tracing::info!(collection = %self.collection, label, "no faces indexed from image");
            return Ok(0);
        }

        let attributes = Attributes::from([(self.full_name_attribute.clone(), label.to_string())]);

        for (recorded, face_id) in face_ids.iter().enumerate() {
            if let Err(source) = self.identities.put(face_id, &attributes) {
                tracing::error!(
                    face_id = %face_id,
                    indexed = face_ids.len(),
                    recorded,
                    error = %source,
                    "identity record write failed; indexed faces left unnamed"
                );
                return Err(Error::PartialIndex {
                    indexed: face_ids.len(),
                    recorded,
                    source: Box::new(source),
                });
            }
            tracing::debug!(face_id = %face_id, label, "identity recorded");
        }

        tracing::info!(
            faces = face_ids.len(),
            collection = %self.collection,
            label,
            "faces indexed"
        );
        Ok(face_ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{FakeEngine, MemoryIdentityStore};

    fn indexer(engine: FakeEngine, store: Arc<MemoryIdentityStore>) -> FaceIndexer {
        FaceIndexer::new(Arc::new(engine), store, "faces", "full_name")
    }

    #[test]
    fn test_no_faces_performs_no_writes() {
        let store = Arc::new(MemoryIdentityStore::default());
        let count = indexer(FakeEngine::default(), store.clone())
            .index(b"empty", "Ada Lovelace")
            .unwrap();

        assert_eq!(count, 0);
        assert!(store.puts().is_empty());
    }

    #[test]
    fn test_each_face_gets_same_label() {
        let store = Arc::new(MemoryIdentityStore::default());
        let engine = FakeEngine::default().indexing(&["f1", "f2", "f3"]);
        let count = indexer(engine, store.clone())
            .index(b"group photo", "Ada Lovelace")
            .unwrap();

        assert_eq!(count, 3);
        let puts = store.puts();
        assert_eq!(puts.len(), 3);
        for (face_id, attributes) in &puts {
            assert!(["f1", "f2", "f3"].contains(&face_id.as_str()));
            assert_eq!(attributes.get("full_name").map(String::as_str), Some("Ada Lovelace"));
        }
    }

    #[test]
    fn test_write_failure_reports_partial_progress() {
        let store = Arc::new(MemoryIdentityStore::failing_after(1));
        let engine = FakeEngine::default().indexing(&["f1", "f2", "f3"]);
        let err = indexer(engine, store.clone())
            .index(b"group photo", "Ada Lovelace")
            .unwrap_err();

        match &err {
            Error::PartialIndex {
                indexed, recorded, ..
            } => {
                assert_eq!(*indexed, 3);
                assert_eq!(*recorded, 1);
            }
            other => panic!("expected PartialIndex, got {other:?}"),
        }
        assert_eq!(err.kind(), ErrorKind::Provider);
        assert_eq!(store.puts().len(), 1);
    }

    #[test]
    fn test_engine_fault_propagates() {
        let store = Arc::new(MemoryIdentityStore::default());
        let engine = FakeEngine::default().failing_index();
        let err = indexer(engine, store.clone()).index(b"img", "x").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Provider);
        assert!(store.puts().is_empty());
    }
}
