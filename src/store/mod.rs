//! Resource store: CRUD over named, owner-scoped collections

mod filter;
pub mod memory;
mod postgrest;
mod query;
mod types;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

pub use filter::{Condition, Filter, FilterOperator};
pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use query::{Order, Query};
pub use types::{CountOption, ReturnOption};

/// Single-shot, non-transactional access to the remote collections.
///
/// Every call is scoped to the caller's identity by the storage layer: rows
/// owned by someone else are invisible, so updating or deleting one yields
/// [`StoreError::NotFound`] rather than a permission error. Nothing is cached.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, collection: &str, row: Value) -> Result<Value, StoreError>;

    async fn update(&self, collection: &str, id: Uuid, patch: Value) -> Result<Value, StoreError>;

    async fn delete(&self, collection: &str, id: Uuid) -> Result<(), StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;
}

/// Deserialize a JSON row into a model
pub fn decode<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|e| StoreError::Deserialization(e.to_string()))
}

/// Run a query and deserialize every row
pub async fn fetch_all<T: DeserializeOwned>(
    store: &dyn ResourceStore,
    collection: &str,
    query: &Query,
) -> Result<Vec<T>, StoreError> {
    store
        .query(collection, query)
        .await?
        .into_iter()
        .map(decode)
        .collect()
}

/// Run a query and deserialize the first row, if any
pub async fn fetch_one<T: DeserializeOwned>(
    store: &dyn ResourceStore,
    collection: &str,
    query: &Query,
) -> Result<Option<T>, StoreError> {
    match store.query(collection, query).await?.into_iter().next() {
        Some(row) => decode(row).map(Some),
        None => Ok(None),
    }
}
