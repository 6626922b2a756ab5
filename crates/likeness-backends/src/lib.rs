//! likeness-backends: concrete services behind the likeness-core traits.
//!
//! - [`identity`]: SQLite identity table and table catalog
//! - [`objects`]: filesystem object store with metadata sidecars
//! - [`biometric`]: D-Bus client for the external biometric engine
//! - [`config`]: runtime configuration shared by the daemon and CLI

pub mod biometric;
pub mod config;
pub mod identity;
pub mod objects;

pub use biometric::DbusBiometricEngine;
pub use config::{Config, ConfigError, EngineSettings};
pub use identity::{SqliteCatalog, SqliteIdentityStore};
pub use objects::FsObjectStore;

use likeness_core::{Pipeline, TableCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Failures while opening a backend. Call-time failures are
/// `likeness_core::Error`.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to open database {path}: {source}")]
    Database {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid table definition: {0}")]
    InvalidTable(String),
    #[error("failed to connect to biometric engine {service}: {source}")]
    EngineConnect {
        service: String,
        #[source]
        source: zbus::Error,
    },
}

/// Open every backend named by `config` and assemble a pipeline.
pub fn open_pipeline(config: &Config) -> Result<Pipeline, BackendError> {
    let engine = DbusBiometricEngine::connect(&config.engine)?;
    let identities = SqliteIdentityStore::open(&config.db_path, &config.table_spec())?;
    let objects = FsObjectStore::open(&config.bucket_dir, config.folder.as_deref())?;
    Ok(Pipeline::new(
        config.pipeline_config(),
        Arc::new(engine),
        Arc::new(identities),
        Arc::new(objects),
    ))
}

/// Table catalog over the configured database.
pub fn open_catalog(config: &Config) -> Result<Arc<dyn TableCatalog>, BackendError> {
    Ok(Arc::new(SqliteCatalog::open(&config.db_path)?))
}
