//! # Persistence Adapter
//!
//! A single CRUD contract over the `users`, `templates` and `documents`
//! collections, implemented twice:
//!
//! - [`json_file::JsonFileStore`]: one JSON document on disk. Every operation
//!   reads the whole file, mutates it in memory and rewrites it. Safe only for a
//!   single process with effectively serialized access; concurrent writers lose
//!   updates (last writer wins).
//! - [`sqlite::SqliteStore`]: one table per collection with typed columns.
//!
//! The backend is chosen once at start-up (see [`open`]) and callers only ever
//! see `Arc<dyn Store>`. Records travel as JSON objects; [`repo::Repository`]
//! gives a typed view over them.

pub mod json_file;
pub mod repo;
pub mod schema;
pub mod sqlite;

use crate::config::DataMode;
use log::info;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A stored record: a JSON object in the canonical shape of its collection.
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Templates,
    Documents,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Users, Collection::Templates, Collection::Documents];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Templates => "templates",
            Collection::Documents => "documents",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Conflict(String),

    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
}

/// Transactionless CRUD over the entity collections.
pub trait Store: Send + Sync {
    /// Creates the backing file or tables if they do not exist yet.
    fn init(&self) -> Result<(), StoreError>;

    /// All records of `collection`, in no particular order.
    fn list(&self, collection: Collection) -> Result<Vec<Record>, StoreError>;

    fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Record>, StoreError>;

    /// Persists `partial` as a new record and returns the stored shape.
    ///
    /// An `id` is generated when absent and both timestamps are set to now.
    fn add(&self, collection: Collection, partial: Record) -> Result<Record, StoreError>;

    /// Shallow-merges `partial` onto the record with `id`.
    ///
    /// `id` and `createdAt` never change, `updatedAt` is always refreshed.
    /// Returns `None` when no such record exists.
    fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Record,
    ) -> Result<Option<Record>, StoreError>;

    /// Deletes the record with `id`; `false` if there was none.
    fn remove(&self, collection: Collection, id: &str) -> Result<bool, StoreError>;
}

/// Opens and initializes the backend selected by `mode`.
pub fn open(mode: &DataMode) -> Result<Arc<dyn Store>, StoreError> {
    let store: Arc<dyn Store> = match mode {
        DataMode::JsonFile { path } => {
            info!("Using JSON file storage at {}", path.display());
            Arc::new(json_file::JsonFileStore::new(path))
        }
        DataMode::Sqlite { path } => {
            info!("Using SQLite storage at {}", path.display());
            Arc::new(sqlite::SqliteStore::new(path))
        }
    };
    store.init()?;
    Ok(store)
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Builds the record `add` will persist: canonical shape, id and timestamps.
pub(crate) fn new_record(collection: Collection, mut partial: Record, now: i64) -> Record {
    let has_id = matches!(partial.get("id"), Some(Value::String(s)) if !s.is_empty());
    if !has_id {
        partial.insert("id".into(), Value::String(new_id()));
    }
    partial.insert("createdAt".into(), Value::from(now));
    partial.insert("updatedAt".into(), Value::from(now));
    schema::normalize(collection, &partial)
}

/// Builds the record `update` will persist from the stored one and a patch.
pub(crate) fn merged_record(
    collection: Collection,
    existing: &Record,
    partial: Record,
    now: i64,
) -> Record {
    let mut merged = existing.clone();
    for (key, value) in partial {
        merged.insert(key, value);
    }
    let created_at = existing.get("createdAt").and_then(Value::as_i64).unwrap_or(now);
    merged.insert("id".into(), existing.get("id").cloned().unwrap_or(Value::Null));
    merged.insert("createdAt".into(), Value::from(created_at));
    merged.insert("updatedAt".into(), Value::from(now.max(created_at)));
    schema::normalize(collection, &merged)
}

/// Returns a conflict error if `candidate` clashes with another record of
/// `existing` on `id` or on any unique field.
pub(crate) fn check_unique<'a>(
    collection: Collection,
    existing: impl IntoIterator<Item = &'a Record>,
    candidate: &Record,
    skip_id: Option<&str>,
) -> Result<(), StoreError> {
    let candidate_id = candidate.get("id").and_then(Value::as_str);
    for other in existing {
        let other_id = other.get("id").and_then(Value::as_str);
        if skip_id.is_some() && other_id == skip_id {
            continue;
        }
        if other_id.is_some() && other_id == candidate_id {
            return Err(StoreError::Conflict(format!(
                "{} id '{}' already exists",
                collection,
                candidate_id.unwrap_or_default()
            )));
        }
        for field in schema::unique_fields(collection) {
            if candidate.get(field.name).is_some() && other.get(field.name) == candidate.get(field.name) {
                return Err(StoreError::Conflict(format!(
                    "{} {} already taken",
                    collection, field.name
                )));
            }
        }
    }
    Ok(())
}
