//! Field store abstractions

use crate::core::error::Result;
use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One stored unit: sid -> value for one field on one date (and timestamp).
pub type FieldDocument = BTreeMap<String, f64>;

/// Address of a field document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub dname: String,
    pub date: String,
    pub time: Option<String>,
}

impl DocumentKey {
    pub fn day(dname: &str, date: &str) -> Self {
        Self {
            dname: dname.to_string(),
            date: date.to_string(),
            time: None,
        }
    }

    pub fn minute(dname: &str, date: &str, time: &str) -> Self {
        Self {
            dname: dname.to_string(),
            date: date.to_string(),
            time: Some(time.to_string()),
        }
    }
}

/// Drops values that can't be represented in a document.
pub fn sanitize(document: FieldDocument) -> FieldDocument {
    document.into_iter().filter(|(_, v)| v.is_finite()).collect()
}

#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Distinct field names stored in `collection`.
    async fn distinct_dnames(&self, collection: &str) -> Result<Vec<String>>;

    async fn get(&self, collection: &str, key: &DocumentKey) -> Result<Option<FieldDocument>>;

    /// Reads several documents, one result per key in key order.
    async fn get_many(
        &self,
        collection: &str,
        keys: &[DocumentKey],
    ) -> Result<Vec<Option<FieldDocument>>> {
        try_join_all(keys.iter().map(|key| self.get(collection, key))).await
    }

    /// Day documents for `dname` with `first <= date <= last`, keyed by date.
    async fn get_span(
        &self,
        collection: &str,
        dname: &str,
        first: &str,
        last: &str,
    ) -> Result<BTreeMap<String, FieldDocument>>;

    /// Inserts or replaces a document. Used by loaders, never by fetchers.
    async fn upsert(&self, collection: &str, key: DocumentKey, document: FieldDocument)
    -> Result<()>;
}

/// Source of the trading calendar and the universe.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn trading_dates(&self) -> Result<Vec<String>>;
    async fn sids(&self) -> Result<Vec<String>>;
}
