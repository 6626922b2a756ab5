use likeness_core::{CollisionPolicy, PipelineConfig, TableSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming an optional TOML configuration file.
pub const CONFIG_ENV: &str = "LIKENESS_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration shared by the daemon and the CLI.
///
/// Fixed at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Face collection searched and indexed into.
    pub collection: String,
    /// Identity table name.
    pub table: String,
    /// Attribute holding the face id in the identity table.
    pub key_attribute: String,
    /// Attribute holding the identity label.
    pub full_name_attribute: String,
    /// SQLite database holding the identity table.
    pub db_path: PathBuf,
    /// Directory acting as the object store bucket.
    pub bucket_dir: PathBuf,
    /// Optional folder prefix for object keys.
    pub folder: Option<String>,
    pub collision_policy: CollisionPolicy,
    pub engine: EngineSettings,
}

/// How to reach the biometric engine service.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Well-known bus name of the engine.
    pub service: String,
    /// Object path of the engine.
    pub path: String,
    /// Per-call D-Bus method timeout.
    pub timeout_secs: u64,
    /// Use the session bus instead of the system bus.
    pub session_bus: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            service: "org.freedesktop.Biometric1".to_string(),
            path: "/org/freedesktop/Biometric1".to_string(),
            timeout_secs: 10,
            session_bus: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            collection: "faces".to_string(),
            table: "identities".to_string(),
            key_attribute: "face_id".to_string(),
            full_name_attribute: "full_name".to_string(),
            db_path: data_dir.join("identities.db"),
            bucket_dir: data_dir.join("objects"),
            folder: None,
            collision_policy: CollisionPolicy::Overwrite,
            engine: EngineSettings::default(),
        }
    }
}

impl Config {
    /// Load from the file named by `LIKENESS_CONFIG` (if set), then apply
    /// `LIKENESS_*` environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup`, normally the process environment.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let set = |target: &mut String, key: &str| {
            if let Some(v) = lookup(key) {
                *target = v;
            }
        };
        set(&mut self.collection, "LIKENESS_COLLECTION");
        set(&mut self.table, "LIKENESS_TABLE");
        set(&mut self.key_attribute, "LIKENESS_KEY_ATTRIBUTE");
        set(&mut self.full_name_attribute, "LIKENESS_FULL_NAME_ATTRIBUTE");
        set(&mut self.engine.service, "LIKENESS_ENGINE_SERVICE");
        set(&mut self.engine.path, "LIKENESS_ENGINE_PATH");

        if let Some(v) = lookup("LIKENESS_DB_PATH") {
            self.db_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LIKENESS_BUCKET_DIR") {
            self.bucket_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("LIKENESS_FOLDER") {
            self.folder = Some(v).filter(|f| !f.is_empty());
        }
        if let Some(v) = lookup("LIKENESS_COLLISION_POLICY") {
            self.collision_policy = v.parse().map_err(|reason| ConfigError::Invalid {
                key: "LIKENESS_COLLISION_POLICY",
                value: v.clone(),
                reason,
            })?;
        }
        if let Some(v) = lookup("LIKENESS_ENGINE_TIMEOUT_SECS") {
            self.engine.timeout_secs = v.parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    key: "LIKENESS_ENGINE_TIMEOUT_SECS",
                    value: v.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(v) = lookup("LIKENESS_SESSION_BUS") {
            self.engine.session_bus = v != "0" && !v.eq_ignore_ascii_case("false");
        }
        Ok(())
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            collection: self.collection.clone(),
            full_name_attribute: self.full_name_attribute.clone(),
            collision_policy: self.collision_policy,
        }
    }

    pub fn table_spec(&self) -> TableSpec {
        TableSpec {
            name: self.table.clone(),
            key_attribute: self.key_attribute.clone(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("likeness")
}
