use super::base::{
    finish_series, finish_table, resolve_daily, resolve_history, resolve_range, resolve_window,
};
use super::util::parse_timestamp;
use super::{FetchOptions, Fetcher};
use crate::core::calendar::MarketContext;
use crate::core::error::{FetchError, Result};
use crate::core::store::{DocumentKey, FieldStore};
use crate::core::table::{Index, Panel, Series, Table};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Intraday timestamps (`HHMMSS`) requested alongside the dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Times {
    /// Collapses the timestamp axis.
    Single(String),
    /// Keeps the timestamp axis, in this order.
    Many(Vec<String>),
}

impl Times {
    fn as_slice(&self) -> &[String] {
        match self {
            Times::Single(time) => std::slice::from_ref(time),
            Times::Many(times) => times,
        }
    }
}

impl From<&str> for Times {
    fn from(time: &str) -> Self {
        Times::Single(time.to_string())
    }
}

impl From<Vec<String>> for Times {
    fn from(times: Vec<String>) -> Self {
        Times::Many(times)
    }
}

/// A minute field: dname plus the timestamps to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinuteField {
    pub dname: String,
    pub times: Times,
}

impl MinuteField {
    pub fn new(dname: &str, times: impl Into<Times>) -> Self {
        Self {
            dname: dname.to_string(),
            times: times.into(),
        }
    }
}

/// Date x sid for a single timestamp, date x timestamp x sid otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum MinuteFrame {
    Table(Table),
    Panel(Panel),
}

impl MinuteFrame {
    pub fn n_dates(&self) -> usize {
        match self {
            MinuteFrame::Table(table) => table.n_rows(),
            MinuteFrame::Panel(panel) => panel.values.len(),
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            MinuteFrame::Table(table) => &table.columns,
            MinuteFrame::Panel(panel) => &panel.columns,
        }
    }
}

/// One day's cross-section: per sid for a single timestamp, timestamp x sid otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum MinuteDaily {
    Series(Series),
    Table(Table),
}

/// Fetcher for collections holding one document per (dname, date, timestamp).
#[derive(Clone)]
pub struct MinuteFetcher {
    store: Arc<dyn FieldStore>,
    context: MarketContext,
    collection: String,
    dnames: HashSet<String>,
}

impl MinuteFetcher {
    pub async fn new(
        store: Arc<dyn FieldStore>,
        context: MarketContext,
        collection: &str,
    ) -> Result<Self> {
        let dnames = store.distinct_dnames(collection).await?;
        debug!(collection, fields = dnames.len(), "Bound minute fetcher");
        Ok(Self::with_fields(store, context, collection, dnames))
    }

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

    fn validate(&self, field: &MinuteField) -> Result<()> {
        if !self.dnames.contains(&field.dname) {
            return Err(FetchError::UnknownField {
                collection: self.collection.clone(),
                dname: field.dname.clone(),
            });
        }
        for time in field.times.as_slice() {
            parse_timestamp(time)?;
        }
        Ok(())
    }

    async fn read_panel(&self, field: &MinuteField, dates: &[String]) -> Result<Panel> {
        let times = field.times.as_slice();
        let keys: Vec<DocumentKey> = dates
            .iter()
            .flat_map(|date| {
                times
                    .iter()
                    .map(move |time| DocumentKey::minute(&field.dname, date, time))
            })
            .collect();
        let mut documents = self.store.get_many(&self.collection, &keys).await?.into_iter();
        let by_day: Vec<Vec<_>> = dates
            .iter()
            .map(|_| documents.by_ref().take(times.len()).collect())
            .collect();
        debug!(
            collection = %self.collection,
            dname = %field.dname,
            rows = dates.len(),
            times = times.len(),
            "Read minute documents"
        );
        Ok(Panel::assemble(dates.to_vec(), times.to_vec(), &by_day))
    }

    fn frame(&self, field: &MinuteField, panel: Panel, opts: FetchOptions) -> Result<MinuteFrame> {
        match &field.times {
            Times::Single(time) => {
                let table = panel.at_time(time).ok_or_else(|| {
                    FetchError::InvalidRange(format!("timestamp {time} not assembled"))
                })?;
                finish_table(table, &self.context, opts).map(MinuteFrame::Table)
            }
            Times::Many(_) => {
                let panel = if opts.reindex {
                    panel.reindex(&self.context.universe)
                } else {
                    panel
                };
                let panel = if opts.datetime_index {
                    panel.with_datetime_index()?
                } else {
                    panel
                };
                Ok(MinuteFrame::Panel(panel))
            }
        }
    }
}

#[async_trait]
impl Fetcher for MinuteFetcher {
    type Field = MinuteField;
    type Output = MinuteFrame;
    type Daily = MinuteDaily;

    async fn fetch(
        &self,
        field: &MinuteField,
        start: &str,
        end: Option<&str>,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<MinuteFrame> {
        self.validate(field)?;
        let request = resolve_range(&self.context.calendar, start, end, backdays)?;
        let panel = self.read_panel(field, &request.lookup).await?;
        let skip = request.lookup.len() - request.output.len();
        let panel = Panel {
            index: Index::Tokens(request.output),
            values: panel.values.into_iter().skip(skip).collect(),
            ..panel
        };
        self.frame(field, panel, opts)
    }

    async fn fetch_window(
        &self,
        field: &MinuteField,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<MinuteFrame> {
        self.validate(field)?;
        let dates = resolve_window(&self.context.calendar, window)?;
        let panel = self.read_panel(field, &dates).await?;
        self.frame(field, panel, opts)
    }

    async fn fetch_history(
        &self,
        field: &MinuteField,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<MinuteFrame> {
        self.validate(field)?;
        let dates = resolve_history(&self.context.calendar, date, backdays, opts.delay)?;
        let panel = self.read_panel(field, &dates).await?;
        self.frame(field, panel, opts)
    }

    async fn fetch_daily(
        &self,
        field: &MinuteField,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<MinuteDaily> {
        self.validate(field)?;
        let day = resolve_daily(&self.context.calendar, date, offset)?;
        let panel = self.read_panel(field, std::slice::from_ref(&day)).await?;
        let missing = || FetchError::InvalidRange(format!("no row assembled for {day}"));
        match &field.times {
            Times::Single(time) => {
                let series = panel
                    .at_time(time)
                    .and_then(|table| table.row(0))
                    .ok_or_else(missing)?;
                Ok(MinuteDaily::Series(finish_series(series, &self.context, opts)))
            }
            Times::Many(_) => {
                let table = panel.on_day(0).ok_or_else(missing)?;
                let table = if opts.reindex {
                    table.reindex(&self.context.universe)
                } else {
                    table
                };
                Ok(MinuteDaily::Table(table))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::{Calendar, Universe};
    use crate::core::store::FieldDocument;
    use crate::fetchers::util::generate_timestamps;
    use crate::store::MemoryStore;

    const DATES: [&str; 4] = ["20240102", "20240103", "20240104", "20240105"];

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|x| x.to_string()).collect()
    }

    async fn fixture() -> (MinuteFetcher, Vec<String>) {
        let store = MemoryStore::new();
        let times = generate_timestamps("100000", "113000", 30 * 60).unwrap();
        for (d, date) in DATES.iter().enumerate() {
            for (t, time) in times.iter().enumerate() {
                let mut doc = FieldDocument::new();
                doc.insert("600000".to_string(), (d * 10 + t) as f64);
                if t == 0 {
                    doc.insert("000001".to_string(), 1.0);
                }
                store
                    .upsert("ts_5min", DocumentKey::minute("close", date, time), doc)
                    .await
                    .unwrap();
            }
        }
        let context = MarketContext::new(
            Calendar::new(strings(&DATES)).unwrap(),
            Universe::new(strings(&["000001", "300750", "600000"])),
        );
        let fetcher = MinuteFetcher::new(Arc::new(store), context, "ts_5min")
            .await
            .unwrap();
        (fetcher, times)
    }

    #[tokio::test]
    async fn test_single_time_collapses_axis() {
        let (fetcher, times) = fixture().await;
        let field = MinuteField::new("close", times[1].as_str());
        let frame = fetcher
            .fetch_window(&field, &strings(&DATES), FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(fetcher.collection(), "ts_5min");
        assert_eq!(frame.n_dates(), 4);
        assert_eq!(frame.columns(), ["600000".to_string()]);

        let MinuteFrame::Table(table) = frame else {
            panic!("Expected a table for a single timestamp");
        };
        assert_eq!(table.n_rows(), 4);
        assert_eq!(table.get(2, "600000"), Some(21.0));
        assert_eq!(table.get(2, "000001"), None);
    }

    #[tokio::test]
    async fn test_many_times_keeps_axis() {
        let (fetcher, times) = fixture().await;
        let field = MinuteField::new("close", vec![times[0].clone()]);
        let frame = fetcher
            .fetch_window(&field, &strings(&DATES), FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(frame.n_dates(), 4);
        assert_eq!(frame.columns().len(), 2);
        let MinuteFrame::Panel(panel) = frame else {
            panic!("Expected a panel for a list of timestamps");
        };
        assert_eq!(panel.times, vec![times[0].clone()]);
        assert_eq!(panel.values.len(), 4);
    }

    #[tokio::test]
    async fn test_reindex_sid_axis_only() {
        let (fetcher, times) = fixture().await;
        let field = MinuteField::new("close", times.clone());
        let frame = fetcher
            .fetch_window(
                &field,
                &strings(&DATES),
                FetchOptions::new().reindex(true).datetime_index(true),
            )
            .await
            .unwrap();
        let MinuteFrame::Panel(panel) = frame else {
            panic!("Expected a panel");
        };
        assert_eq!(panel.columns, strings(&["000001", "300750", "600000"]));
        assert_eq!(panel.times, times);
        assert!(matches!(panel.index, Index::Dates(_)));
    }

    #[tokio::test]
    async fn test_fetch_backdays_and_history_delay() {
        let (fetcher, times) = fixture().await;
        let field = MinuteField::new("close", times.clone());

        let frame = fetcher
            .fetch(&field, "20240104", Some("20240105"), 2, FetchOptions::new())
            .await
            .unwrap();
        let MinuteFrame::Panel(panel) = frame else {
            panic!("Expected a panel");
        };
        assert_eq!(panel.index, Index::Tokens(strings(&["20240104", "20240105"])));
        let col = panel.columns.iter().position(|c| c == "600000").unwrap();
        assert_eq!(panel.values[0][0][col], Some(20.0));

        let frame = fetcher
            .fetch_history(&field, "20240105", 1, FetchOptions::new().delay(1))
            .await
            .unwrap();
        let MinuteFrame::Panel(panel) = frame else {
            panic!("Expected a panel");
        };
        assert_eq!(panel.index, Index::Tokens(strings(&["20240103", "20240104"])));
    }

    #[tokio::test]
    async fn test_fetch_daily_shapes() {
        let (fetcher, times) = fixture().await;

        let single = MinuteField::new("close", times[0].as_str());
        let daily = fetcher
            .fetch_daily(&single, "20240105", 3, FetchOptions::new())
            .await
            .unwrap();
        let MinuteDaily::Series(series) = daily else {
            panic!("Expected a series");
        };
        assert_eq!(series.name, "20240102");

        let many = MinuteField::new("close", times.clone());
        let daily = fetcher
            .fetch_daily(&many, "20240105", 0, FetchOptions::new())
            .await
            .unwrap();
        let MinuteDaily::Table(table) = daily else {
            panic!("Expected a table");
        };
        assert_eq!(table.index, Index::Tokens(times));
    }

    #[tokio::test]
    async fn test_rejects_malformed_timestamp() {
        let (fetcher, _) = fixture().await;
        let field = MinuteField::new("close", "10:00");
        let err = fetcher
            .fetch_daily(&field, "20240105", 0, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRange(_)));
    }
}
