//! Quote fetcher with the compounded `returnsN` field.
//!
//! Every request shape for `returnsN` follows the same three steps: widen the
//! requested dates back by `N - 1` trading days, compound the stored
//! single-day returns over each trailing `N`-day window, then trim back to
//! exactly the requested dates.

use super::base::{resolve_daily, resolve_history, resolve_range, resolve_window};
use super::day::DayFetcher;
use super::{FetchOptions, Fetcher};
use crate::core::error::{FetchError, Result};
use crate::core::table::{Series, Table};
use async_trait::async_trait;
use std::convert::Infallible;
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

const RETURNS_PREFIX: &str = "returns";

/// A quote field: stored as-is, or an `N`-day compounded return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuoteField {
    Stored(String),
    ReturnsN(usize),
}

impl QuoteField {
    pub fn stored(dname: &str) -> Self {
        QuoteField::Stored(dname.to_string())
    }

    /// `horizon`-day compounded returns. A zero horizon is rejected by the
    /// fetcher, which knows the collection it is bound to.
    pub fn returns(horizon: usize) -> Self {
        QuoteField::ReturnsN(horizon)
    }
}

impl Display for QuoteField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuoteField::Stored(dname) => write!(f, "{dname}"),
            QuoteField::ReturnsN(horizon) => write!(f, "{RETURNS_PREFIX}{horizon}"),
        }
    }
}

impl FromStr for QuoteField {
    type Err = Infallible;

    /// `returns5` is a 5-day compounded return; anything else is stored.
    fn from_str(s: &str) -> std::result::Result<Self, Infallible> {
        let horizon = s
            .strip_prefix(RETURNS_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse().ok());
        Ok(match horizon {
            Some(horizon) => QuoteField::returns(horizon),
            None => QuoteField::stored(s),
        })
    }
}

/// Compounds each trailing `horizon`-row window: `prod(1 + r) - 1`.
///
/// Missing inputs count as zero in the product, but any missing input in a
/// window masks that output cell. Rows without a full window are missing.
pub fn rolling_compound(table: &Table, horizon: usize) -> Table {
    let mut values = vec![vec![None; table.n_cols()]; table.n_rows()];
    for col in 0..table.n_cols() {
        for row in horizon.saturating_sub(1)..table.n_rows() {
            let window = &table.values[row + 1 - horizon..=row];
            let mut product = 1.0;
            let mut missing = false;
            for cells in window {
                let r = cells[col].unwrap_or_else(|| {
                    missing = true;
                    0.0
                });
                product *= 1.0 + r;
            }
            if !missing {
                values[row][col] = Some(product - 1.0);
            }
        }
    }
    Table {
        index: table.index.clone(),
        columns: table.columns.clone(),
        values,
    }
}

/// Day fetcher over the quote collection, adding `returnsN`.
#[derive(Clone)]
pub struct QuoteFetcher {
    inner: DayFetcher,
    base_field: String,
}

impl QuoteFetcher {
    /// Wraps `inner`; `base_field` is the stored single-day return.
    pub fn new(inner: DayFetcher, base_field: &str) -> Result<Self> {
        inner.ensure_field(base_field)?;
        Ok(Self {
            inner,
            base_field: base_field.to_string(),
        })
    }

    pub fn inner(&self) -> &DayFetcher {
        &self.inner
    }

    /// Widens `lookup` back by `horizon - 1` days, compounds, and trims to `output`.
    ///
    /// `lookup` is the span the request reads (wider than `output` when
    /// `fetch` is given `backdays`); `output` is the rows returned.
    async fn compounded(
        &self,
        horizon: usize,
        lookup: &[String],
        output: &[String],
        opts: FetchOptions,
    ) -> Result<Table> {
        if horizon == 0 {
            return Err(FetchError::UnknownField {
                collection: self.inner.collection().to_string(),
                dname: QuoteField::ReturnsN(0).to_string(),
            });
        }
        let calendar = &self.inner.context().calendar;
        let (Some(first), Some(last)) = (lookup.first(), lookup.last()) else {
            return Ok(Table::assemble(Vec::new(), &[]));
        };
        let widened_start = calendar.shift(first, horizon - 1)?;
        let span = calendar.span(widened_start, last)?.to_vec();
        debug!(
            horizon,
            requested = output.len(),
            widened = span.len(),
            "Compounding returns"
        );

        let base_opts = FetchOptions {
            datetime_index: false,
            delay: 0,
            ..opts
        };
        let base = self
            .inner
            .fetch_window(&self.base_field, &span, base_opts)
            .await?;
        let trimmed = rolling_compound(&base, horizon).select_rows(output)?;
        if opts.datetime_index {
            trimmed.with_datetime_index()
        } else {
            Ok(trimmed)
        }
    }
}

#[async_trait]
impl Fetcher for QuoteFetcher {
    type Field = QuoteField;
    type Output = Table;
    type Daily = Series;

    async fn fetch(
        &self,
        field: &QuoteField,
        start: &str,
        end: Option<&str>,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        match field {
            QuoteField::Stored(dname) => self.inner.fetch(dname, start, end, backdays, opts).await,
            QuoteField::ReturnsN(horizon) => {
                let calendar = &self.inner.context().calendar;
                let request = resolve_range(calendar, start, end, backdays)?;
                self.compounded(*horizon, &request.lookup, &request.output, opts)
                    .await
            }
        }
    }

    async fn fetch_window(
        &self,
        field: &QuoteField,
        window: &[String],
        opts: FetchOptions,
    ) -> Result<Table> {
        match field {
            QuoteField::Stored(dname) => self.inner.fetch_window(dname, window, opts).await,
            QuoteField::ReturnsN(horizon) => {
                let dates = resolve_window(&self.inner.context().calendar, window)?;
                self.compounded(*horizon, &dates, &dates, opts).await
            }
        }
    }

    async fn fetch_history(
        &self,
        field: &QuoteField,
        date: &str,
        backdays: usize,
        opts: FetchOptions,
    ) -> Result<Table> {
        match field {
            QuoteField::Stored(dname) => {
                self.inner.fetch_history(dname, date, backdays, opts).await
            }
            QuoteField::ReturnsN(horizon) => {
                let calendar = &self.inner.context().calendar;
                let dates = resolve_history(calendar, date, backdays, opts.delay)?;
                self.compounded(*horizon, &dates, &dates, opts).await
            }
        }
    }

    async fn fetch_daily(
        &self,
        field: &QuoteField,
        date: &str,
        offset: usize,
        opts: FetchOptions,
    ) -> Result<Series> {
        match field {
            QuoteField::Stored(dname) => self.inner.fetch_daily(dname, date, offset, opts).await,
            QuoteField::ReturnsN(horizon) => {
                let day = resolve_daily(&self.inner.context().calendar, date, offset)?;
                let days = std::slice::from_ref(&day);
                let table = self
                    .compounded(*horizon, days, days, opts.datetime_index(false))
                    .await?;
                table
                    .row(0)
                    .ok_or_else(|| FetchError::InvalidRange(format!("no row assembled for {day}")))
            }
        }
    }
}
