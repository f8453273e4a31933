//! Trading calendar and security universe reference data.

use crate::core::error::{FetchError, Result};
use crate::core::store::ReferenceSource;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Ordered, gapless sequence of trading-date tokens (`YYYYMMDD`).
#[derive(Debug, Clone)]
pub struct Calendar {
    dates: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Calendar {
    /// Builds a calendar, rejecting unsorted or duplicated tokens.
    pub fn new(dates: Vec<String>) -> Result<Self> {
        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(FetchError::InvalidRange(format!(
                "calendar is not strictly increasing at {} -> {}",
                pair[0], pair[1]
            )));
        }
        let positions = dates
            .iter()
            .enumerate()
            .map(|(i, date)| (date.clone(), i))
            .collect();
        Ok(Self { dates, positions })
    }

    pub fn dates(&self) -> &[String] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn contains(&self, date: &str) -> bool {
        self.positions.contains_key(date)
    }

    /// Position of `date` in the calendar.
    pub fn position(&self, date: &str) -> Result<usize> {
        self.positions
            .get(date)
            .copied()
            .ok_or_else(|| FetchError::InvalidRange(format!("{date} is not a trading day")))
    }

    /// Position `steps` trading days before `date`.
    pub fn shift_position(&self, date: &str, steps: usize) -> Result<usize> {
        let pos = self.position(date)?;
        pos.checked_sub(steps).ok_or_else(|| {
            FetchError::InvalidRange(format!(
                "{steps} trading days before {date} precedes the calendar start {}",
                self.dates.first().map(String::as_str).unwrap_or("")
            ))
        })
    }

    /// The trading day `steps` entries before `date`.
    pub fn shift(&self, date: &str, steps: usize) -> Result<&str> {
        let pos = self.shift_position(date, steps)?;
        Ok(&self.dates[pos])
    }

    /// Closed span `[start, end]`.
    pub fn span(&self, start: &str, end: &str) -> Result<&[String]> {
        let first = self.position(start)?;
        let last = self.position(end)?;
        if last < first {
            return Err(FetchError::InvalidRange(format!(
                "end date {end} precedes start date {start}"
            )));
        }
        Ok(&self.dates[first..=last])
    }

    /// The `len` entries ending at and including `date`.
    pub fn trailing(&self, date: &str, len: usize) -> Result<&[String]> {
        let last = self.position(date)?;
        let first = self.shift_position(date, len.saturating_sub(1))?;
        Ok(&self.dates[first..=last])
    }

    /// Checks that `window` is strictly increasing and drawn from the calendar.
    pub fn validate_window(&self, window: &[String]) -> Result<()> {
        let mut previous: Option<usize> = None;
        for date in window {
            let pos = self.position(date)?;
            if previous.is_some_and(|prev| prev >= pos) {
                return Err(FetchError::InvalidRange(format!(
                    "window is not strictly increasing at {date}"
                )));
            }
            previous = Some(pos);
        }
        Ok(())
    }
}

/// Ordered set of canonical security identifiers.
#[derive(Debug, Clone)]
pub struct Universe {
    sids: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Universe {
    /// Builds a universe; repeated sids keep their first position.
    pub fn new(sids: Vec<String>) -> Self {
        let mut unique = Vec::with_capacity(sids.len());
        let mut positions = HashMap::with_capacity(sids.len());
        for sid in sids {
            if !positions.contains_key(&sid) {
                positions.insert(sid.clone(), unique.len());
                unique.push(sid);
            }
        }
        Self {
            sids: unique,
            positions,
        }
    }

    pub fn sids(&self) -> &[String] {
        &self.sids
    }

    pub fn len(&self) -> usize {
        self.sids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sids.is_empty()
    }

    pub fn contains(&self, sid: &str) -> bool {
        self.positions.contains_key(sid)
    }

    pub fn position(&self, sid: &str) -> Result<usize> {
        self.positions
            .get(sid)
            .copied()
            .ok_or_else(|| FetchError::MissingUniverseEntry(sid.to_string()))
    }
}

/// Shared, read-only reference data handed to every fetcher.
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub calendar: Arc<Calendar>,
    pub universe: Arc<Universe>,
}

impl MarketContext {
    pub fn new(calendar: Calendar, universe: Universe) -> Self {
        Self {
            calendar: Arc::new(calendar),
            universe: Arc::new(universe),
        }
    }

    /// Loads calendar and universe once from a reference source.
    pub async fn load(source: &(dyn ReferenceSource + Send + Sync)) -> Result<Self> {
        let dates = source.trading_dates().await?;
        let sids = source.sids().await?;
        debug!(
            dates = dates.len(),
            sids = sids.len(),
            "Loaded calendar and universe"
        );
        Ok(Self::new(Calendar::new(dates)?, Universe::new(sids)))
    }
}
