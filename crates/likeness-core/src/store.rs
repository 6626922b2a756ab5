//! Identity store and object store capabilities.

use crate::error::Result;
use crate::types::{Attributes, FaceId, ObjectMetadata, TableSpec};
use std::path::{Path, PathBuf};

/// Key-value store mapping a face to its identity attributes.
pub trait IdentityStore: Send + Sync {
    fn put(&self, face_id: &FaceId, attributes: &Attributes) -> Result<()>;

    /// Fetch the attributes of `face_id`.
    ///
    /// Returns [`Error::RecordNotFound`](crate::Error::RecordNotFound) when the
    /// table exists but holds no record for the face.
    fn get(&self, face_id: &FaceId) -> Result<Attributes>;

    fn delete(&self, face_id: &FaceId) -> Result<()>;
}

/// Lifecycle of identity store tables.
pub trait TableCatalog: Send + Sync {
    fn create_table(&self, spec: &TableSpec) -> Result<()>;
    fn table_exists(&self, name: &str) -> Result<bool>;
    fn delete_table(&self, name: &str) -> Result<()>;
}

/// Blob store addressed by key. Folder prefixing is the implementation's concern.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8], metadata: &ObjectMetadata) -> Result<()>;

    /// Object bytes, or `None` when no object is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn exists(&self, key: &str) -> Result<bool>;

    fn delete(&self, key: &str) -> Result<()>;

    /// Copy the object to the local filesystem and return the written path.
    ///
    /// A `destination` ending in `/` is treated as a directory and the key
    /// is appended as the file name.
    fn download(&self, key: &str, destination: &Path) -> Result<PathBuf>;
}
