//! Fetchers for adjusting factors and miscellaneous per-day flags.

use super::base::resolve_range;
use super::day::DayFetcher;
use super::{FetchOptions, Fetcher};
use crate::core::error::Result;
use crate::core::table::{Series, Table};
use async_trait::async_trait;

/// Adjusting factors: gaps are carried forward, then default to `1.0`.
#[derive(Clone)]
pub struct CaxFetcher {
    inner: DayFetcher,
}

impl CaxFetcher {
    pub fn new(inner: DayFetcher) -> Self {
        Self { inner }
    }

    fn fill(table: Table) -> Table {
        table.fill_forward().fill_missing(1.0)
    }
}

#[async_trait]
impl Fetcher for CaxFetcher {
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
        // Fill across the whole lookup so backdays can seed the first rows
        let request = resolve_range(&self.inner.context().calendar, start, end, backdays)?;
        let lookup_opts = opts.datetime_index(false);
        let table = self
            .inner
            .fetch_window(dname, &request.lookup, lookup_opts)
            .await?;
        let table = Self::fill(table).select_rows(&request.output)?;
        if opts.datetime_index {
            table.with_datetime_index()
        } else {
            Ok(table)
        }
    }

    async fn fetch_window(
        &self,
        dname: &str,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<Table> {
        let table = self.inner.fetch_window(dname, window, opts).await?;
        Ok(Self::fill(table))
    }

    async fn fetch_history(
        &self,
        dname: &str,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        let table = self.inner.fetch_history(dname, date, backdays, opts).await?;
        Ok(Self::fill(table))
    }

    async fn fetch_daily(
        &self,
        dname: &str,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Series> {
        let series = self.inner.fetch_daily(dname, date, offset, opts).await?;
        Ok(series.fill_missing(1.0))
    }
}

/// Tradable flags and other miscellaneous day fields.
#[derive(Clone)]
pub struct MiscFetcher {
    inner: DayFetcher,
}

impl MiscFetcher {
    pub fn new(inner: DayFetcher) -> Self {
        Self { inner }
    }

    /// Sids with a value for `dname` on the day `offset` steps before `date`.
    pub async fn valid_sids(
        &self,
        dname: &str,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Vec<String>> {
        let series = self.inner.fetch_daily(dname, date, offset, opts).await?;
        Ok(series.valid_sids())
    }
}

#[async_trait]
impl Fetcher for MiscFetcher {
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
        self.inner.fetch(dname, start, end, backdays, opts).await
    }

    async fn fetch_window(
        &self,
        dname: &str,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<Table> {
        self.inner.fetch_window(dname, window, opts).await
    }

    async fn fetch_history(
        &self,
        dname: &str,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        self.inner.fetch_history(dname, date, backdays, opts).await
    }

    async fn fetch_daily(
        &self,
        dname: &str,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Series> {
        self.inner.fetch_daily(dname, date, offset, opts).await
    }
}
