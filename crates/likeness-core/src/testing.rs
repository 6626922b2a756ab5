//! In-memory fakes of the external capabilities, recording every call.

use crate::engine::BiometricEngine;
use crate::error::{Error, ResourceKind, Result, Service};
use crate::store::{IdentityStore, ObjectStore, TableCatalog};
use crate::types::{
    Attributes, BoundingBox, FaceDetail, FaceId, Label, MatchCandidate, ObjectMetadata, TableSpec,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeEngine {
    indexed: Vec<FaceId>,
    candidates: Vec<MatchCandidate>,
    labels: Vec<Label>,
    faces: usize,
    fail_index: bool,
    fail_search: bool,
    collections: Mutex<Vec<String>>,
    create_calls: Mutex<usize>,
    label_requests: Mutex<Vec<(u32, f32)>>,
}

impl FakeEngine {
    pub fn indexing(mut self, face_ids: &[&str]) -> Self {
        self.indexed = face_ids.iter().map(|&id| FaceId::from(id)).collect();
        self
    }

    pub fn searching(mut self, candidates: &[(&str, f32)]) -> Self {
        self.candidates = candidates
            .iter()
            .map(|&(id, confidence)| MatchCandidate {
                face_id: id.into(),
                confidence,
            })
            .collect();
        self
    }

    pub fn labelling(mut self, labels: &[(&str, f32)]) -> Self {
        self.labels = labels
            .iter()
            .map(|&(name, confidence)| Label {
                name: name.into(),
                confidence,
            })
            .collect();
        self
    }

    pub fn detecting(mut self, faces: usize) -> Self {
        self.faces = faces;
        self
    }

    pub fn failing_index(mut self) -> Self {
        self.fail_index = true;
        self
    }

    pub fn failing_search(mut self) -> Self {
        self.fail_search = true;
        self
    }

    pub fn collections(&self) -> Vec<String> {
        self.collections.lock().unwrap().clone()
    }

    pub fn create_collection_calls(&self) -> usize {
        *self.create_calls.lock().unwrap()
    }

    pub fn label_requests(&self) -> Vec<(u32, f32)> {
        self.label_requests.lock().unwrap().clone()
    }
}

impl BiometricEngine for FakeEngine {
    fn index_faces(&self, _image: &[u8], _collection: &str) -> Result<Vec<FaceId>> {
        if self.fail_index {
            return Err(Error::provider(Service::Engine, "IndexFaces", "throttled"));
        }
        Ok(self.indexed.clone())
    }

    fn search_faces_by_image(&self, _image: &[u8], collection: &str) -> Result<Vec<MatchCandidate>> {
        if self.fail_search {
            return Err(Error::StoreNotFound {
                kind: ResourceKind::Collection,
                name: collection.to_string(),
            });
        }
        Ok(self.candidates.clone())
    }

    fn detect_labels(&self, _image: &[u8], max_labels: u32, min_confidence: f32) -> Result<Vec<Label>> {
        self.label_requests
            .lock()
            .unwrap()
            .push((max_labels, min_confidence));
        Ok(self.labels.clone())
    }

    fn detect_faces(&self, _image: &[u8]) -> Result<Vec<FaceDetail>> {
        Ok((0..self.faces)
            .map(|i| FaceDetail {
                bounding_box: BoundingBox {
                    left: 0.1 * i as f32,
                    top: 0.1,
                    width: 0.2,
                    height: 0.3,
                },
                confidence: 99.0,
            })
            .collect())
    }

    fn delete_faces(&self, _face_ids: &[FaceId], _collection: &str) -> Result<()> {
        Ok(())
    }

    fn create_collection(&self, name: &str) -> Result<String> {
        *self.create_calls.lock().unwrap() += 1;
        self.collections.lock().unwrap().push(name.to_string());
        Ok(format!("collection/{name}"))
    }

    fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.lock().unwrap().retain(|c| c != name);
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections())
    }
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    records: Mutex<BTreeMap<FaceId, Attributes>>,
    puts: Mutex<Vec<(FaceId, Attributes)>>,
    gets: Mutex<Vec<String>>,
    fail_after: Option<usize>,
    fail_get: Mutex<Option<FaceId>>,
}

impl MemoryIdentityStore {
    /// Store that accepts `n` writes and rejects every later one.
    pub fn failing_after(n: usize) -> Self {
        Self {
            fail_after: Some(n),
            ..Self::default()
        }
    }

    pub fn insert(&self, face_id: &str, attribute: &str, value: &str) {
        self.records.lock().unwrap().insert(
            face_id.into(),
            Attributes::from([(attribute.to_string(), value.to_string())]),
        );
    }

    pub fn fail_get_for(&self, face_id: &str) {
        *self.fail_get.lock().unwrap() = Some(face_id.into());
    }

    pub fn puts(&self) -> Vec<(FaceId, Attributes)> {
        self.puts.lock().unwrap().clone()
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn put(&self, face_id: &FaceId, attributes: &Attributes) -> Result<()> {
        let mut puts = self.puts.lock().unwrap();
        if self.fail_after.is_some_and(|n| puts.len() >= n) {
            return Err(Error::provider(Service::IdentityStore, "put", "write rejected"));
        }
        puts.push((face_id.clone(), attributes.clone()));
        self.records
            .lock()
            .unwrap()
            .insert(face_id.clone(), attributes.clone());
        Ok(())
    }

    fn get(&self, face_id: &FaceId) -> Result<Attributes> {
        self.gets.lock().unwrap().push(face_id.to_string());
        if self.fail_get.lock().unwrap().as_ref() == Some(face_id) {
            return Err(Error::provider(Service::IdentityStore, "get", "connection reset"));
        }
        self.records
            .lock()
            .unwrap()
            .get(face_id)
            .cloned()
            .ok_or_else(|| Error::RecordNotFound(face_id.clone()))
    }

    fn delete(&self, face_id: &FaceId) -> Result<()> {
        self.records.lock().unwrap().remove(face_id);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Vec<u8>, ObjectMetadata)>>,
    gets: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, ObjectMetadata::new()));
    }

    pub fn stored(&self, key: &str) -> Option<(Vec<u8>, ObjectMetadata)> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().unwrap().clone()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8], metadata: &ObjectMetadata) -> Result<()> {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes.to_vec(), metadata.clone()));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.gets.lock().unwrap().push(key.to_string());
        Ok(self.stored(key).map(|(bytes, _)| bytes))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().unwrap().contains_key(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn download(&self, key: &str, destination: &Path) -> Result<PathBuf> {
        let (bytes, _) = self.stored(key).ok_or_else(|| Error::StoreNotFound {
            kind: ResourceKind::Object,
            name: key.to_string(),
        })?;
        std::fs::write(destination, bytes).map_err(|e| Error::provider(Service::ObjectStore, "download", e.to_string()))?;
        Ok(destination.to_path_buf())
    }
}

#[derive(Default)]
pub struct MemoryCatalog {
    tables: Mutex<Vec<TableSpec>>,
    creates: Mutex<usize>,
}

impl MemoryCatalog {
    pub fn create_calls(&self) -> usize {
        *self.creates.lock().unwrap()
    }
}

impl TableCatalog for MemoryCatalog {
    fn create_table(&self, spec: &TableSpec) -> Result<()> {
        *self.creates.lock().unwrap() += 1;
        self.tables.lock().unwrap().push(spec.clone());
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.lock().unwrap().iter().any(|t| t.name == name))
    }

    fn delete_table(&self, name: &str) -> Result<()> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.len();
        tables.retain(|t| t.name != name);
        if tables.len() == before {
            return Err(Error::StoreNotFound {
                kind: ResourceKind::Table,
                name: name.to_string(),
            });
        }
        Ok(())
    }
}
