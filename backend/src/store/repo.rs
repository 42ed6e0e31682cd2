//! Typed view over a [`Store`] collection.

use super::{Collection, Record, Store, StoreError};
use common::model::document::Document;
use common::model::template::Template;
use common::model::user::User;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// A model type persisted in one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
}

impl Entity for Template {
    const COLLECTION: Collection = Collection::Templates;
}

impl Entity for Document {
    const COLLECTION: Collection = Collection::Documents;
}

impl Entity for User {
    const COLLECTION: Collection = Collection::Users;
}

pub struct Repository<T> {
    store: Arc<dyn Store>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Repository {
            store: Arc::clone(&self.store),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Repository<T> {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Repository {
            store,
            _entity: PhantomData,
        }
    }

    pub fn list(&self) -> Result<Vec<T>, StoreError> {
        self.store
            .list(T::COLLECTION)?
            .into_iter()
            .map(from_record)
            .collect()
    }

    pub fn find(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.store
            .find_by_id(T::COLLECTION, id)?
            .map(from_record)
            .transpose()
    }

    /// Stores `partial` (any serializable struct or map) as a new record.
    pub fn add<P: Serialize>(&self, partial: &P) -> Result<T, StoreError> {
        from_record(self.store.add(T::COLLECTION, to_record(partial)?)?)
    }

    /// Shallow-merges `partial` onto the record with `id`. Fields absent from
    /// the serialized patch are left as stored.
    pub fn update<P: Serialize>(&self, id: &str, partial: &P) -> Result<Option<T>, StoreError> {
        self.store
            .update(T::COLLECTION, id, to_record(partial)?)?
            .map(from_record)
            .transpose()
    }

    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.store.remove(T::COLLECTION, id)
    }
}

fn to_record<P: Serialize>(partial: &P) -> Result<Record, StoreError> {
    match serde_json::to_value(partial)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Corrupt(format!(
            "expected a JSON object to store, got {}",
            other
        ))),
    }
}

fn from_record<T: DeserializeOwned>(record: Record) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(record)).map_err(|e| StoreError::Corrupt(e.to_string()))
}
