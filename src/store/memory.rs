use crate::core::error::Result;
use crate::core::store::{DocumentKey, FieldDocument, FieldStore, ReferenceSource, sanitize};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type Collection = BTreeMap<DocumentKey, FieldDocument>;

/// In-memory field store, used for tests and embedding.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, Collection>>>,
    dates: Vec<String>,
    sids: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that also serves the given calendar and universe.
    pub fn with_reference(dates: Vec<String>, sids: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
            dates,
            sids,
        }
    }
}

#[async_trait]
impl FieldStore for MemoryStore {
    async fn distinct_dnames(&self, collection: &str) -> Result<Vec<String>> {
        let store = self.inner.lock().await;
        let dnames: BTreeSet<String> = store
            .get(collection)
            .map(|docs| docs.keys().map(|k| k.dname.clone()).collect())
            .unwrap_or_default();
        Ok(dnames.into_iter().collect())
    }

    async fn get(&self, collection: &str, key: &DocumentKey) -> Result<Option<FieldDocument>> {
        let store = self.inner.lock().await;
        let document = store.get(collection).and_then(|docs| docs.get(key)).cloned();
        if document.is_none() {
            debug!(collection, ?key, "Document MISS");
        }
        Ok(document)
    }

    async fn get_span(
        &self,
        collection: &str,
        dname: &str,
        first: &str,
        last: &str,
    ) -> Result<BTreeMap<String, FieldDocument>> {
        let store = self.inner.lock().await;
        let Some(docs) = store.get(collection) else {
            return Ok(BTreeMap::new());
        };
        let from = DocumentKey::day(dname, first);
        let to = DocumentKey::day(dname, last);
        Ok(docs
            .range(from..=to)
            .filter(|(key, _)| key.time.is_none())
            .map(|(key, doc)| (key.date.clone(), doc.clone()))
            .collect())
    }

    async fn upsert(
        &self,
        collection: &str,
        key: DocumentKey,
        document: FieldDocument,
    ) -> Result<()> {
        let mut store = self.inner.lock().await;
        debug!(collection, ?key, sids = document.len(), "Document UPSERT");
        store
            .entry(collection.to_string())
            .or_default()
            .insert(key, sanitize(document));
        Ok(())
    }
}

#[async_trait]
impl ReferenceSource for MemoryStore {
    async fn trading_dates(&self) -> Result<Vec<String>> {
        Ok(self.dates.clone())
    }

    async fn sids(&self) -> Result<Vec<String>> {
        Ok(self.sids.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::MarketContext;

    fn doc(pairs: &[(&str, f64)]) -> FieldDocument {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_get_upsert() {
        let store = MemoryStore::new();
        let key = DocumentKey::day("close", "20240102");

        assert!(store.get("quote", &key).await.unwrap().is_none());

        store
            .upsert("quote", key.clone(), doc(&[("000001", 10.5)]))
            .await
            .unwrap();
        let found = store.get("quote", &key).await.unwrap().unwrap();
        assert_eq!(found.get("000001"), Some(&10.5));

        // Upsert replaces the whole document
        store
            .upsert("quote", key.clone(), doc(&[("600000", 7.0)]))
            .await
            .unwrap();
        let found = store.get("quote", &key).await.unwrap().unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("600000"));

        // Collections are isolated
        assert!(store.get("cax", &key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_distinct_dnames() {
        let store = MemoryStore::new();
        for dname in ["open", "close", "close"] {
            store
                .upsert("quote", DocumentKey::day(dname, "20240102"), doc(&[]))
                .await
                .unwrap();
        }
        store
            .upsert("quote", DocumentKey::day("close", "20240103"), doc(&[]))
            .await
            .unwrap();

        let dnames = store.distinct_dnames("quote").await.unwrap();
        assert_eq!(dnames, vec!["close".to_string(), "open".to_string()]);
        assert!(store.distinct_dnames("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_span_and_many() {
        let store = MemoryStore::new();
        for (date, value) in [("20240102", 1.0), ("20240103", 2.0), ("20240104", 3.0)] {
            store
                .upsert("quote", DocumentKey::day("close", date), doc(&[("a", value)]))
                .await
                .unwrap();
        }
        store
            .upsert("quote", DocumentKey::day("open", "20240103"), doc(&[("a", 0.0)]))
            .await
            .unwrap();

        let span = store
            .get_span("quote", "close", "20240103", "20240104")
            .await
            .unwrap();
        assert_eq!(span.len(), 2);
        assert_eq!(span["20240103"]["a"], 2.0);

        let keys = vec![
            DocumentKey::day("close", "20240104"),
            DocumentKey::day("close", "20240105"),
        ];
        let many = store.get_many("quote", &keys).await.unwrap();
        assert_eq!(many.len(), 2);
        assert!(many[0].is_some());
        assert!(many[1].is_none());
    }

    #[tokio::test]
    async fn test_reference_data_builds_context() {
        let store = MemoryStore::with_reference(
            vec!["20240102".into(), "20240103".into()],
            vec!["000001".into(), "600000".into()],
        );
        let context = MarketContext::load(&store).await.unwrap();
        assert_eq!(context.calendar.len(), 2);
        assert!(context.calendar.contains("20240103"));
        assert!(!context.calendar.contains("20240104"));
        assert!(context.universe.contains("600000"));
        assert!(!context.universe.contains("300750"));

        // A plain store has no calendar to build from
        let context = MarketContext::load(&MemoryStore::new()).await.unwrap();
        assert!(context.calendar.is_empty());
    }
}
