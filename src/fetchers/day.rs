use super::base::{
    finish_series, finish_table, is_contiguous, resolve_daily, resolve_history, resolve_range,
    resolve_window,
};
use super::{FetchOptions, Fetcher};
use crate::core::calendar::MarketContext;
use crate::core::error::{FetchError, Result};
use crate::core::store::{DocumentKey, FieldStore};
use crate::core::table::{Series, Table};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Fetcher for collections holding one document per (dname, date).
#[derive(Clone)]
pub struct DayFetcher {
    store: Arc<dyn FieldStore>,
    context: MarketContext,
    collection: String,
    dnames: HashSet<String>,
}

impl DayFetcher {
    /// Binds `collection`, enumerating its field names once.
    pub async fn new(
        store: Arc<dyn FieldStore>,
        context: MarketContext,
        collection: &str,
    ) -> Result<Self> {
        let dnames = store.distinct_dnames(collection).await?;
        debug!(collection, fields = dnames.len(), "Bound day fetcher");
        Ok(Self::with_fields(store, context, collection, dnames))
    }

    /// Binds `collection` with an explicit field set.
    pub fn with_fields(
        store: Arc<dyn FieldStore>,
        context: MarketContext,
        collection: &str,
        dnames: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            store,
            context,
            collection: collection.to_string(),
            dnames: dnames.into_iter().collect(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn context(&self) -> &MarketContext {
        &self.context
    }

    /// Field names of the bound collection, sorted.
    pub fn dnames(&self) -> Vec<&str> {
        let mut dnames: Vec<&str> = self.dnames.iter().map(String::as_str).collect();
        dnames.sort_unstable();
        dnames
    }

    pub fn ensure_field(&self, dname: &str) -> Result<()> {
        if self.dnames.contains(dname) {
            Ok(())
        } else {
            Err(FetchError::UnknownField {
                collection: self.collection.clone(),
                dname: dname.to_string(),
            })
        }
    }

    /// Reads one row per date. Consecutive dates are served by a single span read.
    async fn read_table(&self, dname: &str, dates: &[String]) -> Result<Table> {
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(Table::assemble(Vec::new(), &[]));
        };
        let documents = if is_contiguous(&self.context.calendar, dates) {
            let mut span = self
                .store
                .get_span(&self.collection, dname, first, last)
                .await?;
            dates.iter().map(|date| span.remove(date)).collect()
        } else {
            let keys: Vec<DocumentKey> = dates
                .iter()
                .map(|date| DocumentKey::day(dname, date))
                .collect();
            self.store.get_many(&self.collection, &keys).await?
        };
        debug!(
            collection = %self.collection,
            dname,
            rows = dates.len(),
            "Read day documents"
        );
        Ok(Table::assemble(dates.to_vec(), &documents))
    }
}

#[async_trait]
impl Fetcher for DayFetcher {
    type Field = str;
    type Output = Table;
    type Daily = Series;

    async fn fetch(
        &self,
        dname: &str,
        start: &str,
        end: Option<&str>,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        self.ensure_field(dname)?;
        let request = resolve_range(&self.context.calendar, start, end, backdays)?;
        let table = self
            .read_table(dname, &request.lookup)
            .await?
            .select_rows(&request.output)?;
        finish_table(table, &self.context, opts)
    }

    async fn fetch_window(
        &self,
        dname: &str,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<Table> {
        self.ensure_field(dname)?;
        let dates = resolve_window(&self.context.calendar, window)?;
        let table = self.read_table(dname, &dates).await?;
        finish_table(table, &self.context, opts)
    }

    async fn fetch_history(
        &self,
        dname: &str,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        self.ensure_field(dname)?;
        let dates = resolve_history(&self.context.calendar, date, backdays, opts.delay)?;
        let table = self.read_table(dname, &dates).await?;
        finish_table(table, &self.context, opts)
    }

    async fn fetch_daily(
        &self,
        dname: &str,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Series> {
        self.ensure_field(dname)?;
        let day = resolve_daily(&self.context.calendar, date, offset)?;
        let table = self.read_table(dname, std::slice::from_ref(&day)).await?;
        let series = table.row(0).ok_or_else(|| {
            FetchError::InvalidRange(format!("no row assembled for {day}"))
        })?;
        Ok(finish_series(series, &self.context, opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::{Calendar, Universe};
    use crate::core::store::FieldDocument;
    use crate::core::table::Index;
    use crate::store::MemoryStore;

    const DATES: [&str; 6] = [
        "20240102", "20240103", "20240104", "20240105", "20240108", "20240109",
    ];
    const SIDS: [&str; 4] = ["000001", "000002", "600000", "600519"];

    fn dates(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|x| x.to_string()).collect()
    }

    /// Prices for the first three sids; 600519 never trades and 000002
    /// is missing on 20240104.
    async fn fixture() -> DayFetcher {
        let store = MemoryStore::new();
        for (i, date) in DATES.iter().enumerate() {
            let mut doc = FieldDocument::new();
            doc.insert("000001".to_string(), 10.0 + i as f64);
            doc.insert("600000".to_string(), 20.0 + i as f64);
            if *date != "20240104" {
                doc.insert("000002".to_string(), 5.0 + i as f64);
            }
            store
                .upsert("quote", DocumentKey::day("close", date), doc)
                .await
                .unwrap();
        }
        let context = MarketContext::new(
            Calendar::new(dates(&DATES)).unwrap(),
            Universe::new(dates(&SIDS)),
        );
        DayFetcher::new(Arc::new(store), context, "quote").await.unwrap()
    }

    #[tokio::test]
    async fn test_unknown_field() {
        let fetcher = fixture().await;
        let err = fetcher
            .fetch_daily("volume", "20240102", 0, FetchOptions::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            FetchError::UnknownField {
                collection: "quote".to_string(),
                dname: "volume".to_string()
            }
        );
        assert_eq!(fetcher.dnames(), vec!["close"]);
    }

    #[tokio::test]
    async fn test_fetch_window_order_and_rows() {
        let fetcher = fixture().await;
        let window = dates(&["20240103", "20240105", "20240109"]);
        let table = fetcher
            .fetch_window("close", &window, FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.index, Index::Tokens(window));
        assert_eq!(table.get(1, "000001"), Some(13.0));
    }

    #[tokio::test]
    async fn test_fetch_backdays_keeps_output_range() {
        let fetcher = fixture().await;
        let table = fetcher
            .fetch("close", "20240104", Some("20240108"), 2, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(
            table.index,
            Index::Tokens(dates(&["20240104", "20240105", "20240108"]))
        );
        assert_eq!(table.get(0, "000002"), None);
        assert_eq!(table.get(0, "000001"), Some(12.0));

        let err = fetcher
            .fetch("close", "20240103", None, 2, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_fetch_matches_history_on_overlap() {
        let fetcher = fixture().await;
        let ranged = fetcher
            .fetch("close", "20240108", Some("20240108"), 3, FetchOptions::new())
            .await
            .unwrap();
        let history = fetcher
            .fetch_history("close", "20240108", 3, FetchOptions::new())
            .await
            .unwrap();

        assert_eq!(history.n_rows(), 4);
        assert_eq!(ranged.columns, history.columns);
        assert_eq!(ranged.values[0], history.values[3]);
    }

    #[tokio::test]
    async fn test_fetch_history_delay_and_underrun() {
        let fetcher = fixture().await;
        let table = fetcher
            .fetch_history("close", "20240109", 2, FetchOptions::new().delay(2))
            .await
            .unwrap();
        assert_eq!(
            table.index,
            Index::Tokens(dates(&["20240103", "20240104", "20240105"]))
        );

        let err = fetcher
            .fetch_history("close", "20240109", 6, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRange(_)));
    }

    #[tokio::test]
    async fn test_fetch_daily_offset_label() {
        let fetcher = fixture().await;
        let series = fetcher
            .fetch_daily("close", "20240109", 5, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(series.name, "20240102");
        assert_eq!(series.get("000001"), Some(10.0));
    }

    #[tokio::test]
    async fn test_reindex_columns() {
        let fetcher = fixture().await;
        let window = dates(&DATES);

        let plain = fetcher
            .fetch_window("close", &window, FetchOptions::new())
            .await
            .unwrap();
        assert!(plain.n_cols() < SIDS.len());
        assert!(plain.columns.iter().all(|sid| SIDS.contains(&sid.as_str())));

        let reindexed = fetcher
            .fetch_window("close", &window, FetchOptions::new().reindex(true))
            .await
            .unwrap();
        assert_eq!(reindexed.columns, dates(&SIDS));
        assert!(reindexed.values.iter().all(|row| row[3].is_none()));
    }

    #[tokio::test]
    async fn test_datetime_index_and_idempotence() {
        let fetcher = fixture().await;
        let opts = FetchOptions::new().datetime_index(true);
        let first = fetcher
            .fetch("close", "20240102", Some("20240105"), 0, opts)
            .await
            .unwrap();
        let second = fetcher
            .fetch("close", "20240102", Some("20240105"), 0, opts)
            .await
            .unwrap();
        assert_eq!(first, second);
        match &first.index {
            Index::Dates(days) => {
                assert_eq!(days.len(), 4);
                assert_eq!(days[0].to_string(), "2024-01-02");
            }
            other => panic!("Expected a date index, got {other:?}"),
        }
    }
}
