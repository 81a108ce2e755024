//! In-process document store.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{Document, DocumentStore, StoreError};

#[derive(Default)]
struct MemoryCollection {
    docs: BTreeMap<String, Document>,
    unique_fields: BTreeSet<String>,
}

impl MemoryCollection {
    /// Find a unique field of `doc` already used by a document other than `id`
    fn clashing_field(&self, id: &str, doc: &Document) -> Option<String> {
        self.unique_fields
            .iter()
            .find(|field| {
                let Some(value) = doc.get(field.as_str()) else {
                    return false;
                };
                self.docs
                    .iter()
                    .any(|(other_id, other)| other_id != id && other.get(field.as_str()) == Some(value))
            })
            .cloned()
    }
}

/// Document store backed by process memory.
///
/// Each write holds the collection lock for its whole check-and-insert, so
/// unique constraints hold under concurrent requests.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.docs.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        if let Some(field) = coll.clashing_field(id, &doc) {
            return Err(StoreError::UniqueViolation { field });
        }

        coll.docs.insert(id.to_string(), doc);
        Ok(())
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<bool, StoreError> {
        let mut collections = self.collections.write();
        let coll = collections.entry(collection.to_string()).or_default();

        if let Some(field) = coll.clashing_field(id, &doc) {
            return Err(StoreError::UniqueViolation { field });
        }

        Ok(coll.docs.insert(id.to_string(), doc).is_none())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|coll| coll.docs.get(id))
            .cloned())
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|coll| {
                coll.docs
                    .iter()
                    .map(|(id, doc)| (id.clone(), doc.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Document)>, StoreError> {
        let collections = self.collections.read();
        Ok(collections.get(collection).and_then(|coll| {
            coll.docs
                .iter()
                .find(|(_, doc)| doc.get(field) == Some(value))
                .map(|(id, doc)| (id.clone(), doc.clone()))
        }))
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .map(|coll| coll.docs.len() as u64)
            .unwrap_or(0))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.write();
        Ok(collections
            .get_mut(collection)
            .map(|coll| coll.docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_default()
            .unique_fields
            .insert(field.to_string());
        Ok(())
    }
}
