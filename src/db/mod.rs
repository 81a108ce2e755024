//! Document database gateway.
//!
//! Every entity lives in a flat collection under the tenant root
//! `clients/{tenant}/{collection}`. Handlers only ever see typed
//! [`Collection`] handles; the backing [`DocumentStore`] is injected so the
//! server can run against MongoDB or an in-process store.

mod memory;
mod models;
mod mongo;

pub use memory::MemoryStore;
pub use models::*;
pub use mongo::MongoStore;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{DatabaseBackend, DatabaseConfig};

/// A stored document body. The identifier is kept out of the body and
/// travels separately as the document key.
pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("document '{0}' already exists")]
    AlreadyExists(String),
    #[error("unique constraint violated on field '{field}'")]
    UniqueViolation { field: String },
    #[error("failed to encode document: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode document '{id}': {source}")]
    Decode {
        id: String,
        source: serde_json::Error,
    },
    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// True when the write was refused because the document (or one of its
    /// unique fields) already exists.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::AlreadyExists(_) | StoreError::UniqueViolation { .. }
        )
    }
}

/// Storage operations the gateway needs from a document database.
///
/// Collections are addressed by their full path. Implementations must be
/// safe to share across request tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new document. Fails if `id` is taken or a unique field clashes.
    async fn create(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError>;

    /// Write a document, replacing any existing body under `id`.
    /// Returns true when nothing was stored under `id` before.
    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<bool, StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// All documents of a collection, ordered by id.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;

    /// First document whose `field` equals `value`.
    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Document)>, StoreError>;

    async fn count(&self, collection: &str) -> Result<u64, StoreError>;

    /// Remove a document. Returns false if nothing was stored under `id`.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    /// Declare that no two documents in `collection` may share `field`.
    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError>;
}

/// Entity types persisted as documents
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Collection name below the tenant root
    const COLLECTION: &'static str;
}

/// Handle to the tenant-scoped collections
#[derive(Clone)]
pub struct Database {
    store: Arc<dyn DocumentStore>,
    tenant: String,
}

impl Database {
    pub fn new(store: Arc<dyn DocumentStore>, tenant: impl Into<String>) -> Self {
        Self {
            store,
            tenant: tenant.into(),
        }
    }

    /// In-process database, used by tests and the `memory` backend
    pub fn in_memory(tenant: impl Into<String>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), tenant)
    }

    pub fn collection<T: Entity>(&self) -> Collection<T> {
        Collection {
            store: self.store.clone(),
            path: format!("clients/{}/{}", self.tenant, T::COLLECTION),
            _entity: PhantomData,
        }
    }

    pub fn attendees(&self) -> Collection<Attendee> {
        self.collection()
    }

    pub fn speakers(&self) -> Collection<Speaker> {
        self.collection()
    }

    pub fn sessions(&self) -> Collection<Session> {
        self.collection()
    }

    pub fn todos(&self) -> Collection<Todo> {
        self.collection()
    }

    /// Install storage-level constraints. Safe to run on every startup.
    pub async fn prepare(&self) -> Result<(), StoreError> {
        self.attendees().ensure_unique("email").await
    }
}

/// Typed view over one collection
pub struct Collection<T> {
    store: Arc<dyn DocumentStore>,
    path: String,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Collection<T> {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Store a new entity under a freshly assigned identifier and return it
    /// with that identifier filled in.
    pub async fn add(&self, entity: &T) -> Result<T, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let doc = encode(entity)?;
        self.store.create(&self.path, &id, doc.clone()).await?;
        decode(id, doc)
    }

    /// Replace the entity stored under `id`
    pub async fn set(&self, id: &str, entity: &T) -> Result<T, StoreError> {
        self.upsert(id, entity).await.map(|(entity, _)| entity)
    }

    /// Replace or create the entity stored under `id`. The flag is true when
    /// the write created it.
    pub async fn upsert(&self, id: &str, entity: &T) -> Result<(T, bool), StoreError> {
        let doc = encode(entity)?;
        let created = self.store.put(&self.path, id, doc.clone()).await?;
        Ok((decode(id.to_string(), doc)?, created))
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(&self.path, id).await? {
            Some(doc) => decode(id.to_string(), doc).map(Some),
            None => Ok(None),
        }
    }

    /// All decodable entities. Documents that no longer match the entity
    /// shape are skipped with a warning rather than failing the listing.
    pub async fn list(&self) -> Result<Vec<T>, StoreError> {
        let docs = self.store.list(&self.path).await?;
        let mut entities = Vec::with_capacity(docs.len());
        for (id, doc) in docs {
            match decode(id, doc) {
                Ok(entity) => entities.push(entity),
                Err(e) => warn!(collection = %self.path, error = %e, "Skipping malformed document"),
            }
        }
        Ok(entities)
    }

    pub async fn find_by(&self, field: &str, value: &str) -> Result<Option<T>, StoreError> {
        let value = Value::String(value.to_string());
        match self.store.find_one(&self.path, field, &value).await? {
            Some((id, doc)) => decode(id, doc).map(Some),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<u64, StoreError> {
        self.store.count(&self.path).await
    }

    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.store.delete(&self.path, id).await
    }

    pub async fn ensure_unique(&self, field: &str) -> Result<(), StoreError> {
        self.store.ensure_unique(&self.path, field).await
    }
}

fn encode<T: Serialize>(entity: &T) -> Result<Document, StoreError> {
    match serde_json::to_value(entity).map_err(StoreError::Encode)? {
        Value::Object(mut doc) => {
            doc.remove("id");
            Ok(doc)
        }
        other => Err(StoreError::Encode(serde::ser::Error::custom(format!(
            "expected an object, got {}",
            other
        )))),
    }
}

fn decode<T: DeserializeOwned>(id: String, mut doc: Document) -> Result<T, StoreError> {
    doc.insert("id".to_string(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(doc)).map_err(|source| StoreError::Decode { id, source })
}

/// Build the database gateway for the configured backend and install its
/// constraints. Any failure here is fatal for the server.
pub async fn init(config: &DatabaseConfig, tenant: &str) -> Result<Database> {
    let store: Arc<dyn DocumentStore> = match config.backend {
        DatabaseBackend::Memory => {
            warn!("Using in-memory document store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
        DatabaseBackend::Mongo => {
            let uri = config.connection_uri()?;
            Arc::new(MongoStore::connect(&uri, &config.name).await?)
        }
    };

    let db = Database::new(store, tenant);
    db.prepare().await?;

    info!(tenant = %tenant, "Database initialized successfully");
    Ok(db)
}
