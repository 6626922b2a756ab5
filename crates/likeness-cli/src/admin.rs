//! Provisioning commands run locally against the configured backends.
//!
//! Backend calls block, so each command runs on the blocking pool.

use anyhow::{Context, Result};
use likeness_backends::{
    open_catalog, Config, DbusBiometricEngine, FsObjectStore, SqliteIdentityStore,
};
use likeness_core::{admin, FaceId, ObjectStore};
use std::path::PathBuf;

#[derive(Debug)]
pub enum AdminCommand {
    CreateCollection(String),
    DeleteCollection(String),
    ListCollections,
    CreateTable(Option<String>),
    DeleteTable(Option<String>),
    TableExists(Option<String>),
    DeleteFaces(Vec<String>),
    DeleteRecord(String),
    DownloadPortrait { key: String, destination: PathBuf },
    PortraitInfo(String),
}

pub async fn run(config: Config, command: AdminCommand) -> Result<()> {
    tokio::task::spawn_blocking(move || run_blocking(&config, command)).await?
}

fn run_blocking(config: &Config, command: AdminCommand) -> Result<()> {
    tracing::debug!(?command, "running admin command");
    match command {
        AdminCommand::CreateCollection(name) => {
            let engine = DbusBiometricEngine::connect(&config.engine)?;
            let id = admin::create_collection(&engine, &name)?;
            println!("Created collection '{name}' ({id})");
        }
        AdminCommand::DeleteCollection(name) => {
            let engine = DbusBiometricEngine::connect(&config.engine)?;
            admin::delete_collection(&engine, &name)?;
            println!("Deleted collection '{name}'");
        }
        AdminCommand::ListCollections => {
            let engine = DbusBiometricEngine::connect(&config.engine)?;
            for name in likeness_core::BiometricEngine::list_collections(&engine)? {
                println!("{name}");
            }
        }
        AdminCommand::CreateTable(name) => {
            let mut spec = config.table_spec();
            if let Some(name) = name {
                spec.name = name;
            }
            admin::create_table(open_catalog(config)?.as_ref(), &spec)?;
            println!("Created table '{}' keyed by '{}'", spec.name, spec.key_attribute);
        }
        AdminCommand::DeleteTable(name) => {
            let name = name.unwrap_or_else(|| config.table.clone());
            admin::delete_table(open_catalog(config)?.as_ref(), &name)?;
            println!("Deleted table '{name}'");
        }
        AdminCommand::TableExists(name) => {
            let name = name.unwrap_or_else(|| config.table.clone());
            let exists = admin::table_exists(open_catalog(config)?.as_ref(), &name)?;
            println!("{}", if exists { "yes" } else { "no" });
        }
        AdminCommand::DeleteFaces(ids) => {
            let engine = DbusBiometricEngine::connect(&config.engine)?;
            let ids: Vec<FaceId> = ids.into_iter().map(FaceId::from).collect();
            admin::delete_faces(&engine, &ids, &config.collection)?;
            println!("Deleted {} face(s) from '{}'", ids.len(), config.collection);
        }
        AdminCommand::DeleteRecord(face_id) => {
            let store = SqliteIdentityStore::open(&config.db_path, &config.table_spec())?;
            admin::delete_identity(&store, &FaceId::new(face_id.as_str()))?;
            println!("Deleted identity record for {face_id}");
        }
        AdminCommand::DownloadPortrait { key, destination } => {
            let objects = objects(config)?;
            let written = objects.download(&key, &destination)?;
            println!("Downloaded '{key}' to {}", written.display());
        }
        AdminCommand::PortraitInfo(key) => {
            let objects = objects(config)?;
            let metadata = objects
                .metadata(&key)?
                .with_context(|| format!("no portrait stored under '{key}'"))?;
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }
    Ok(())
}

fn objects(config: &Config) -> Result<FsObjectStore> {
    Ok(FsObjectStore::open(&config.bucket_dir, config.folder.as_deref())?)
}
