//! SQLite-backed identity store.
//!
//! One table per identity store, keyed by face id. The attribute map is kept
//! as a JSON object next to the key column; the key attribute itself is
//! added back on read so callers see the full item.

use crate::BackendError;
use likeness_core::{
    Attributes, Error, FaceId, IdentityStore, ResourceKind, Result, Service, TableCatalog,
    TableSpec,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const MAX_IDENTIFIER_LEN: usize = 255;

pub struct SqliteIdentityStore {
    conn: Mutex<Connection>,
    table: String,
    key_attribute: String,
}

impl SqliteIdentityStore {
    /// Open the database at `path`. The table is not created here; see
    /// [`SqliteCatalog`] and `likeness_core::admin::create_table`.
    pub fn open(path: &Path, spec: &TableSpec) -> std::result::Result<Self, BackendError> {
        let conn = open_database(path)?;
        check_identifier(&spec.name).map_err(|e| BackendError::InvalidTable(e.to_string()))?;
        check_identifier(&spec.key_attribute)
            .map_err(|e| BackendError::InvalidTable(e.to_string()))?;

        tracing::info!(path = %path.display(), table = %spec.name, "identity store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            table: spec.name.clone(),
            key_attribute: spec.key_attribute.clone(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::provider(Service::IdentityStore, "lock", "connection lock poisoned"))
    }

    fn fault(&self, operation: &'static str, err: rusqlite::Error) -> Error {
        sqlite_fault(operation, &self.table, err)
    }
}

impl IdentityStore for SqliteIdentityStore {
    fn put(&self, face_id: &FaceId, attributes: &Attributes) -> Result<()> {
        let mut stored = attributes.clone();
        stored.remove(&self.key_attribute);
        let json = serde_json::to_string(&stored)
            .map_err(|e| Error::provider(Service::IdentityStore, "put", e.to_string()))?;

        let sql = format!(
            "INSERT OR REPLACE INTO \"{}\" (\"{}\", attributes) VALUES (?1, ?2)",
            self.table, self.key_attribute
        );
        self.conn()?
            .execute(&sql, params![face_id.as_str(), json])
            .map_err(|e| {
                tracing::error!(table = %self.table, error = %e, "identity put failed");
                self.fault("put", e)
            })?;
        Ok(())
    }

    fn get(&self, face_id: &FaceId) -> Result<Attributes> {
        tracing::debug!(table = %self.table, key = %self.key_attribute, face_id = %face_id, "identity lookup");
        let sql = format!(
            "SELECT attributes FROM \"{}\" WHERE \"{}\" = ?1",
            self.table, self.key_attribute
        );
        let json: Option<String> = self
            .conn()?
            .query_row(&sql, params![face_id.as_str()], |row| row.get(0))
            .optional()
            .map_err(|e| self.fault("get", e))?;

        let Some(json) = json else {
            tracing::info!(face_id = %face_id, "identity record not found");
            return Err(Error::RecordNotFound(face_id.clone()));
        };

        let mut attributes: Attributes = serde_json::from_str(&json)
            .map_err(|e| Error::provider(Service::IdentityStore, "get", format!("corrupt record: {e}")))?;
        attributes.insert(self.key_attribute.clone(), face_id.to_string());
        Ok(attributes)
    }

    /// Deleting an absent record is not an error.
    fn delete(&self, face_id: &FaceId) -> Result<()> {
        let sql = format!("DELETE FROM \"{}\" WHERE \"{}\" = ?1", self.table, self.key_attribute);
        self.conn()?
            .execute(&sql, params![face_id.as_str()])
            .map_err(|e| {
                tracing::error!(table = %self.table, face_id = %face_id, error = %e, "identity delete failed");
                self.fault("delete", e)
            })?;
        Ok(())
    }
}

/// Table lifecycle over the same database file.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn open(path: &Path) -> std::result::Result<Self, BackendError> {
        Ok(Self {
            conn: Mutex::new(open_database(path)?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::provider(Service::IdentityStore, "lock", "connection lock poisoned"))
    }
}

impl TableCatalog for SqliteCatalog {
    fn create_table(&self, spec: &TableSpec) -> Result<()> {
        check_identifier(&spec.name)?;
        check_identifier(&spec.key_attribute)?;
        let sql = format!(
            "CREATE TABLE \"{}\" (\"{}\" TEXT PRIMARY KEY NOT NULL, attributes TEXT NOT NULL)",
            spec.name, spec.key_attribute
        );
        self.conn()?
            .execute(&sql, [])
            .map_err(|e| sqlite_fault("create_table", &spec.name, e))?;
        Ok(())
    }

    fn table_exists(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| sqlite_fault("table_exists", name, e))?;
        Ok(found.is_some())
    }

    fn delete_table(&self, name: &str) -> Result<()> {
        check_identifier(name)?;
        self.conn()?
            .execute(&format!("DROP TABLE \"{name}\""), [])
            .map_err(|e| sqlite_fault("delete_table", name, e))?;
        Ok(())
    }
}

fn open_database(path: &Path) -> std::result::Result<Connection, BackendError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| BackendError::Directory {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    Connection::open(path).map_err(|source| BackendError::Database {
        path: path.to_path_buf(),
        source,
    })
}

/// Table and attribute names: 1-255 characters of `[A-Za-z0-9_.-]`.
fn check_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_IDENTIFIER_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::provider(
            Service::IdentityStore,
            "validate",
            format!("invalid table or attribute name '{name}'"),
        ))
    }
}

fn sqlite_fault(operation: &'static str, table: &str, err: rusqlite::Error) -> Error {
    let message = err.to_string();
    if message.contains("no such table") {
        Error::StoreNotFound {
            kind: ResourceKind::Table,
            name: table.to_string(),
        }
    } else if message.contains("already exists") {
        Error::AlreadyExists {
            kind: ResourceKind::Table,
            name: table.to_string(),
        }
    } else {
        Error::provider(Service::IdentityStore, operation, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use likeness_core::{admin, ErrorKind};
    use tempfile::TempDir;

    fn spec() -> TableSpec {
        TableSpec {
            name: "identities".into(),
            key_attribute: "face_id".into(),
        }
    }

    fn provisioned(tmp: &TempDir) -> SqliteIdentityStore {
        let db = tmp.path().join("identities.db");
        let catalog = SqliteCatalog::open(&db).unwrap();
        admin::create_table(&catalog, &spec()).unwrap();
        SqliteIdentityStore::open(&db, &spec()).unwrap()
    }

    fn named(name: &str) -> Attributes {
        Attributes::from([("full_name".to_string(), name.to_string())])
    }

    #[test]
    fn test_put_then_get_includes_key_attribute() {
        let tmp = TempDir::new().unwrap();
        let store = provisioned(&tmp);
        let face = FaceId::new("0b6e5b6c-1c1f-4c0e-9a51-1d9d6a1f2b11");

        store.put(&face, &named("Ada Lovelace")).unwrap();
        let attributes = store.get(&face).unwrap();

        assert_eq!(attributes.get("full_name").map(String::as_str), Some("Ada Lovelace"));
        assert_eq!(attributes.get("face_id").map(String::as_str), Some(face.as_str()));
    }

    #[test]
    fn test_get_missing_record() {
        let tmp = TempDir::new().unwrap();
        let store = provisioned(&tmp);
        let err = store.get(&FaceId::new("ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RecordNotFound);
    }

    #[test]
    fn test_missing_table_is_store_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = SqliteIdentityStore::open(&tmp.path().join("empty.db"), &spec()).unwrap();

        let err = store.get(&FaceId::new("f1")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreNotFound);
        let err = store.put(&FaceId::new("f1"), &named("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StoreNotFound);
    }

    #[test]
    fn test_delete_record() {
        let tmp = TempDir::new().unwrap();
        let store = provisioned(&tmp);
        let face = FaceId::new("f1");
        store.put(&face, &named("Ada Lovelace")).unwrap();

        store.delete(&face).unwrap();
        assert_eq!(store.get(&face).unwrap_err().kind(), ErrorKind::RecordNotFound);
        store.delete(&face).unwrap();
    }

    #[test]
    fn test_catalog_lifecycle() {
        let tmp = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(&tmp.path().join("identities.db")).unwrap();

        assert!(!catalog.table_exists("identities").unwrap());
        admin::create_table(&catalog, &spec()).unwrap();
        assert!(catalog.table_exists("identities").unwrap());

        let err = admin::create_table(&catalog, &spec()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        admin::delete_table(&catalog, "identities").unwrap();
        assert!(!catalog.table_exists("identities").unwrap());
        assert_eq!(
            catalog.delete_table("identities").unwrap_err().kind(),
            ErrorKind::StoreNotFound
        );
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let tmp = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(&tmp.path().join("identities.db")).unwrap();
        let spec = TableSpec {
            name: "x\"; DROP TABLE y; --".into(),
            key_attribute: "face_id".into(),
        };
        assert_eq!(catalog.create_table(&spec).unwrap_err().kind(), ErrorKind::Provider);
        assert!(matches!(
            SqliteIdentityStore::open(&tmp.path().join("identities.db"), &spec),
            Err(BackendError::InvalidTable(_))
        ));
    }
}
