//! The fetch engine: four request shapes over day, minute and derived fields.

pub mod base;
pub mod cax;
pub mod day;
pub mod minute;
pub mod quote;
pub mod util;

use crate::core::error::Result;
use async_trait::async_trait;

pub use cax::{CaxFetcher, MiscFetcher};
pub use day::DayFetcher;
pub use minute::{MinuteDaily, MinuteFetcher, MinuteField, MinuteFrame, Times};
pub use quote::{QuoteFetcher, QuoteField};

/// Options shared by every request shape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Label rows with calendar dates instead of raw `YYYYMMDD` tokens.
    pub datetime_index: bool,
    /// Project columns onto the full universe, in universe order.
    pub reindex: bool,
    /// Steps to shift the anchor of `fetch_history` back before windowing.
    pub delay: usize,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn datetime_index(mut self, on: bool) -> Self {
        self.datetime_index = on;
        self
    }

    pub fn reindex(mut self, on: bool) -> Self {
        self.reindex = on;
        self
    }

    pub fn delay(mut self, steps: usize) -> Self {
        self.delay = steps;
        self
    }
}

/// The request surface every fetcher variant exposes.
///
/// `Field` names what to read (a plain dname for day fields, a dname plus
/// timestamps for minute fields, a stored-or-derived name for quotes).
#[async_trait]
pub trait Fetcher: Send + Sync {
    type Field: ?Sized + Sync;
    type Output: Send;
    type Daily: Send;

    /// Rows for the closed range `[start, end]` (`end` defaults to `start`).
    ///
    /// `backdays` widens the lookup backwards without changing the rows
    /// returned, which always begin at `start`.
    async fn fetch(
        &self,
        field: &Self::Field,
        start: &str,
        end: Option<&str>,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Self::Output>;

    /// Exactly one row per entry of `window`, in window order.
    async fn fetch_window(
        &self,
        field: &Self::Field,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<Self::Output>;

    /// The `backdays + 1` trading days ending at `date` shifted back by `opts.delay`.
    async fn fetch_history(
        &self,
        field: &Self::Field,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Self::Output>;

    /// Cross-section for the trading day `offset` steps before `date`.
    async fn fetch_daily(
        &self,
        field: &Self::Field,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Self::Daily>;
}
