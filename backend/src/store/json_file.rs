//! File-backed store: a single JSON document with one array per collection.
//!
//! ```json
//! { "users": [], "templates": [], "documents": [] }
//! ```
//!
//! Every call reads the whole file, mutates it in memory and rewrites it. There
//! is no locking between processes; this backend is meant for development and
//! single-user deployments.

use super::{check_unique, merged_record, new_record, now_millis, Collection, Record, Store, StoreError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    users: Vec<Record>,
    #[serde(default)]
    templates: Vec<Record>,
    #[serde(default)]
    documents: Vec<Record>,
}

impl Database {
    fn collection(&self, collection: Collection) -> &Vec<Record> {
        match collection {
            Collection::Users => &self.users,
            Collection::Templates => &self.templates,
            Collection::Documents => &self.documents,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut Vec<Record> {
        match collection {
            Collection::Users => &mut self.users,
            Collection::Templates => &mut self.templates,
            Collection::Documents => &mut self.documents,
        }
    }
}

pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }

    /// Creates the parent directory and an empty database file if missing.
    fn ensure(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !self.path.exists() {
            debug!("Creating empty database file {}", self.path.display());
            self.write(&Database::default())?;
        }
        Ok(())
    }

    fn read(&self) -> Result<Database, StoreError> {
        self.ensure()?;
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Database::default());
        }
        serde_json::from_str(&raw).map_err(|e| {
            StoreError::Corrupt(format!("{}: {}", self.path.display(), e))
        })
    }

    /// Writes through a temporary file in the same directory and renames it
    /// over the database, so readers never observe a half-written file.
    fn write(&self, db: &Database) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), db)?;
        tmp.as_file_mut().write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

fn position(records: &[Record], id: &str) -> Option<usize> {
    records
        .iter()
        .position(|r| r.get("id").and_then(|v| v.as_str()) == Some(id))
}

impl Store for JsonFileStore {
    fn init(&self) -> Result<(), StoreError> {
        self.ensure()
    }

    fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let mut db = self.read()?;
        Ok(std::mem::take(db.collection_mut(collection)))
    }

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError> {
        let db = self.read()?;
        let records = db.collection(collection);
        Ok(position(records, id).map(|i| records[i].clone()))
    }

    fn add(&self, collection: Collection, partial: Record) -> Result<Record, StoreError> {
        let mut db = self.read()?;
        let record = new_record(collection, partial, now_millis());
        check_unique(collection, db.collection(collection), &record, None)?;
        db.collection_mut(collection).push(record.clone());
        self.write(&db)?;
        Ok(record)
    }

    fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Record,
    ) -> Result<Option<Record>, StoreError> {
        let mut db = self.read()?;
        let Some(idx) = position(db.collection(collection), id) else {
            return Ok(None);
        };
        let updated = merged_record(collection, &db.collection(collection)[idx], partial, now_millis());
        check_unique(collection, db.collection(collection), &updated, Some(id))?;
        db.collection_mut(collection)[idx] = updated.clone();
        self.write(&db)?;
        Ok(Some(updated))
    }

    fn remove(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let mut db = self.read()?;
        let Some(idx) = position(db.collection(collection), id) else {
            return Ok(false);
        };
        db.collection_mut(collection).remove(idx);
        self.write(&db)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;
    use serde_json::{json, Value};

    #[test]
    fn satisfies_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("db.json"));
        contract::run_all(&store);
    }

    #[test]
    fn creates_empty_file_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.json");
        let store = JsonFileStore::new(&path);
        assert!(store.list(Collection::Templates).unwrap().is_empty());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, json!({ "users": [], "templates": [], "documents": [] }));
    }

    #[test]
    fn tolerates_missing_collections_in_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{ "templates": [] }"#).unwrap();
        let store = JsonFileStore::new(&path);
        assert!(store.list(Collection::Users).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.list(Collection::Users), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn records_survive_a_new_store_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let first = JsonFileStore::new(&path);
        let added = first
            .add(
                Collection::Templates,
                json!({ "name": "n", "content": "c" }).as_object().cloned().unwrap(),
            )
            .unwrap();

        let second = JsonFileStore::new(&path);
        let found = second
            .find_by_id(Collection::Templates, added["id"].as_str().unwrap())
            .unwrap();
        assert_eq!(found, Some(added));
    }
}
