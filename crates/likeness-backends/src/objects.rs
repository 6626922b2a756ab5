//! Filesystem object store.
//!
//! A bucket is a directory. Objects live at `<bucket>/<folder>/<name>`, and
//! their metadata as JSON under `<bucket>/.metadata/<folder>/<name>.json`.
//! Writes go to a `.part` file first and are renamed into place.
//!
//! Keys are opaque. A key made only of `[A-Za-z0-9_.-]` and not starting
//! with `.` is stored under its own name; any other key is stored as `~`
//! followed by its URL-safe base64 encoding, so every key maps to exactly
//! one file directly inside the folder.

use crate::BackendError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use likeness_core::{Error, ObjectMetadata, ObjectStore, ResourceKind, Result, Service};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const METADATA_DIR: &str = ".metadata";
const ENCODED_PREFIX: char = '~';

pub struct FsObjectStore {
    bucket: PathBuf,
    folder: Option<String>,
}

impl FsObjectStore {
    pub fn open(bucket: &Path, folder: Option<&str>) -> std::result::Result<Self, BackendError> {
        fs::create_dir_all(bucket).map_err(|source| BackendError::Directory {
            path: bucket.to_path_buf(),
            source,
        })?;
        let folder = folder
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        tracing::info!(bucket = %bucket.display(), folder = ?folder, "object store opened");
        Ok(Self {
            bucket: bucket.to_path_buf(),
            folder,
        })
    }

    /// Key as stored in the bucket, with the folder prefix applied.
    pub fn full_key(&self, key: &str) -> String {
        match &self.folder {
            Some(folder) => format!("{folder}/{key}"),
            None => key.to_string(),
        }
    }

    /// Metadata stored alongside `key`, if the object exists.
    pub fn metadata(&self, key: &str) -> Result<Option<ObjectMetadata>> {
        let path = self.metadata_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| fault("metadata", format!("corrupt metadata for {key}: {e}"))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(fault("metadata", e.to_string())),
        }
    }

    fn folder_dir(&self, root: PathBuf) -> PathBuf {
        match &self.folder {
            Some(folder) => root.join(folder),
            None => root,
        }
    }

    fn object_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.folder_dir(self.bucket.clone()).join(file_name(key)?))
    }

    fn metadata_path(&self, key: &str) -> Result<PathBuf> {
        let mut name = OsString::from(file_name(key)?);
        name.push(".json");
        Ok(self.folder_dir(self.bucket.join(METADATA_DIR)).join(name))
    }
}

impl ObjectStore for FsObjectStore {
    /// The metadata sidecar is written first. If the object itself cannot be
    /// written, the previous sidecar (or none) is put back.
    fn put(&self, key: &str, bytes: &[u8], metadata: &ObjectMetadata) -> Result<()> {
        let path = self.object_path(key)?;
        let meta_path = self.metadata_path(key)?;
        let meta_json = serde_json::to_vec_pretty(metadata).map_err(|e| fault("put", e.to_string()))?;

        let previous = fs::read(&meta_path).ok();
        write_atomic(&meta_path, &meta_json).map_err(|e| {
            tracing::error!(key, error = %e, "object metadata write failed");
            fault("put", e.to_string())
        })?;

        if let Err(e) = write_atomic(&path, bytes) {
            tracing::error!(key, error = %e, "object write failed");
            let restored = match previous {
                Some(old) => write_atomic(&meta_path, &old),
                None => remove_if_present(&meta_path),
            };
            if let Err(re) = restored {
                tracing::warn!(key, error = %re, "object metadata rollback failed");
            }
            return Err(fault("put", e.to_string()));
        }

        tracing::debug!(key = %self.full_key(key), bytes = bytes.len(), "object stored");
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.object_path(key)?;
        tracing::info!(key = %self.full_key(key), "fetching object");
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(key = %self.full_key(key), "object not found");
                Ok(None)
            }
            Err(e) => Err(fault("get", e.to_string())),
        }
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.object_path(key)?.is_file())
    }

    fn delete(&self, key: &str) -> Result<()> {
        remove_if_present(&self.object_path(key)?).map_err(|e| fault("delete", e.to_string()))?;
        remove_if_present(&self.metadata_path(key)?).map_err(|e| fault("delete", e.to_string()))?;
        Ok(())
    }

    fn download(&self, key: &str, destination: &Path) -> Result<PathBuf> {
        let source = self.object_path(key)?;
        if !source.is_file() {
            return Err(Error::StoreNotFound {
                kind: ResourceKind::Object,
                name: self.full_key(key),
            });
        }

        let target = download_target(destination, &file_name(key)?);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| fault("download", e.to_string()))?;
        }
        tracing::info!(key = %self.full_key(key), destination = %target.display(), "downloading object");
        fs::copy(&source, &target).map_err(|e| fault("download", e.to_string()))?;
        Ok(target)
    }
}

/// File name for `key` inside its folder. Only the empty key is rejected.
fn file_name(key: &str) -> Result<String> {
    if key.is_empty() {
        return Err(fault("validate", "empty object key"));
    }
    let plain = !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if plain {
        Ok(key.to_string())
    } else {
        Ok(format!("{ENCODED_PREFIX}{}", URL_SAFE_NO_PAD.encode(key)))
    }
}

/// A destination ending in `/` (or naming an existing directory) receives the object's file name.
fn download_target(destination: &Path, name: &str) -> PathBuf {
    let as_dir = destination.as_os_str().to_string_lossy().ends_with('/') || destination.is_dir();
    if as_dir {
        destination.join(name)
    } else {
        destination.to_path_buf()
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut partial = OsString::from(path.as_os_str());
    partial.push(".part");
    fs::write(&partial, bytes)?;
    fs::rename(&partial, path).map_err(|e| {
        let _ = fs::remove_file(&partial);
        e
    })
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn fault(operation: &'static str, message: impl Into<String>) -> Error {
    Error::provider(Service::ObjectStore, operation, message)
}
