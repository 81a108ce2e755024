//! MongoDB document store.
//!
//! Tenant paths map onto collection names by replacing `/` with `.`, so
//! `clients/acme/attendees` is stored in the collection `clients.acme.attendees`.
//! The document key is kept in `_id`.

use async_trait::async_trait;
use bson::{doc, Bson};
use futures::TryStreamExt;
use mongodb::{
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde_json::Value;
use tracing::info;

use super::{Document, DocumentStore, StoreError};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db_name: String,
}

impl MongoStore {
    /// Connect and verify the server answers a ping.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, StoreError> {
        // Bound server selection so an unreachable database fails startup quickly
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=5000&connectTimeoutMS=5000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=5000&connectTimeoutMS=5000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| StoreError::Backend(format!("MongoDB ping failed: {}", e)))?;

        info!(database = %db_name, "Connected to MongoDB");

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    fn collection(&self, path: &str) -> Collection<bson::Document> {
        self.client
            .database(&self.db_name)
            .collection(&collection_name(path))
    }
}

fn collection_name(path: &str) -> String {
    path.replace('/', ".")
}

fn backend(err: mongodb::error::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn to_bson(id: &str, doc: Document) -> Result<bson::Document, StoreError> {
    let mut body = bson::to_document(&doc)
        .map_err(|e| StoreError::Backend(format!("Failed to convert document: {}", e)))?;
    body.insert("_id", id);
    Ok(body)
}

fn from_bson(mut body: bson::Document) -> Result<(String, Document), StoreError> {
    let id = match body.remove("_id") {
        Some(Bson::String(id)) => id,
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => return Err(StoreError::Backend("document without _id".to_string())),
    };

    match Bson::Document(body).into_relaxed_extjson() {
        Value::Object(doc) => Ok((id, doc)),
        _ => Err(StoreError::Backend(format!("document '{}' is not an object", id))),
    }
}

/// Map a duplicate key write error onto the store's conflict errors
fn classify_write(err: mongodb::error::Error, id: &str) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write_error)) = err.kind.as_ref() {
        if write_error.code == DUPLICATE_KEY {
            return match duplicate_field(&write_error.message) {
                Some(field) if field != "_id" => StoreError::UniqueViolation { field },
                _ => StoreError::AlreadyExists(id.to_string()),
            };
        }
    }
    backend(err)
}

/// Extract the offending field from a message such as
/// `E11000 duplicate key error collection: db.c index: email_1 dup key: { email: "a@x" }`
fn duplicate_field(message: &str) -> Option<String> {
    let rest = message.split("dup key: {").nth(1)?;
    let field = rest.split(':').next()?.trim();
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn create(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        self.collection(collection)
            .insert_one(to_bson(id, doc)?)
            .await
            .map_err(|e| classify_write(e, id))?;
        Ok(())
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .replace_one(doc! { "_id": id }, to_bson(id, doc)?)
            .upsert(true)
            .await
            .map_err(|e| classify_write(e, id))?;
        Ok(result.upserted_id.is_some())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let found = self
            .collection(collection)
            .find_one(doc! { "_id": id })
            .await
            .map_err(backend)?;

        found
            .map(|body| from_bson(body).map(|(_, doc)| doc))
            .transpose()
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let cursor = self
            .collection(collection)
            .find(doc! {})
            .sort(doc! { "_id": 1 })
            .await
            .map_err(backend)?;

        let bodies: Vec<bson::Document> = cursor.try_collect().await.map_err(backend)?;
        bodies.into_iter().map(from_bson).collect()
    }

    async fn find_one(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<(String, Document)>, StoreError> {
        let value = bson::to_bson(value)
            .map_err(|e| StoreError::Backend(format!("Failed to convert filter: {}", e)))?;

        let found = self
            .collection(collection)
            .find_one(doc! { field: value })
            .await
            .map_err(backend)?;

        found.map(from_bson).transpose()
    }

    async fn count(&self, collection: &str) -> Result<u64, StoreError> {
        self.collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(backend)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(backend)?;
        Ok(result.deleted_count > 0)
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> Result<(), StoreError> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(Some(IndexOptions::builder().unique(true).build()))
            .build();

        self.collection(collection)
            .create_index(index)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to create index: {}", e)))?;
        Ok(())
    }
}
