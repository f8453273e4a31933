//! Date resolution and alignment shared by all fetchers.

use super::FetchOptions;
use crate::core::calendar::{Calendar, MarketContext};
use crate::core::error::Result;
use crate::core::table::{Index, Series, Table};

/// Dates a `fetch` call reads, and the subset it returns.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeRequest {
    pub lookup: Vec<String>,
    pub output: Vec<String>,
}

pub fn resolve_range(
    calendar: &Calendar,
    start: &str,
    end: Option<&str>,
    backdays: usize,
) -> Result<RangeRequest> {
    let end = end.unwrap_or(start);
    let output = calendar.span(start, end)?;
    let widened_start = calendar.shift(start, backdays)?;
    let lookup = calendar.span(widened_start, end)?;
    Ok(RangeRequest {
        lookup: lookup.to_vec(),
        output: output.to_vec(),
    })
}

pub fn resolve_window(calendar: &Calendar, window: &[String]) -> Result<Vec<String>> {
    calendar.validate_window(window)?;
    Ok(window.to_vec())
}

pub fn resolve_history(
    calendar: &Calendar,
    date: &str,
    backdays: usize,
    delay: usize,
) -> Result<Vec<String>> {
    let anchor = calendar.shift(date, delay)?;
    Ok(calendar.trailing(anchor, backdays + 1)?.to_vec())
}

pub fn resolve_daily(calendar: &Calendar, date: &str, offset: usize) -> Result<String> {
    calendar.shift(date, offset).map(str::to_string)
}

/// True when `dates` is a run of consecutive calendar entries.
pub fn is_contiguous(calendar: &Calendar, dates: &[String]) -> bool {
    let positions: Vec<usize> = dates
        .iter()
        .filter_map(|d| calendar.position(d).ok())
        .collect();
    positions.len() == dates.len() && positions.windows(2).all(|w| w[1] == w[0] + 1)
}

/// Applies `reindex` then `datetime_index`.
pub fn finish_table(table: Table, context: &MarketContext, opts: FetchOptions) -> Result<Table> {
    let table = if opts.reindex {
        table.reindex(&context.universe)
    } else {
        table
    };
    if opts.datetime_index {
        table.with_datetime_index()
    } else {
        Ok(table)
    }
}

/// Applies `reindex` to a cross-section. Its name stays the date token.
pub fn finish_series(series: Series, context: &MarketContext, opts: FetchOptions) -> Series {
    if !opts.reindex {
        return series;
    }
    let Series {
        name,
        index,
        values,
    } = series;
    let table = Table {
        index: Index::Tokens(vec![name.clone()]),
        columns: index,
        values: vec![values],
    }
    .reindex(&context.universe);
    Series {
        name,
        index: table.columns,
        values: table.values.into_iter().next().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::calendar::Universe;
    use crate::core::error::FetchError;

    fn calendar() -> Calendar {
        Calendar::new((1..=9).map(|d| format!("2024010{d}")).collect()).unwrap()
    }

    #[test]
    fn test_resolve_range_widens_lookup_only() {
        let cal = calendar();
        let request = resolve_range(&cal, "20240104", Some("20240106"), 2).unwrap();
        assert_eq!(request.output, vec!["20240104", "20240105", "20240106"]);
        assert_eq!(request.lookup.first().unwrap(), "20240102");
        assert_eq!(request.lookup.len(), 5);

        let single = resolve_range(&cal, "20240104", None, 0).unwrap();
        assert_eq!(single.output, vec!["20240104"]);
    }

    #[test]
    fn test_resolve_range_errors() {
        let cal = calendar();
        assert!(matches!(
            resolve_range(&cal, "20240106", Some("20240104"), 0),
            Err(FetchError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve_range(&cal, "20240102", None, 2),
            Err(FetchError::InvalidRange(_))
        ));
        assert!(matches!(
            resolve_range(&cal, "20231229", None, 0),
            Err(FetchError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_resolve_history_with_delay() {
        let cal = calendar();
        let dates = resolve_history(&cal, "20240109", 2, 3).unwrap();
        assert_eq!(dates, vec!["20240104", "20240105", "20240106"]);

        assert!(resolve_history(&cal, "20240109", 8, 0).is_ok());
        assert!(matches!(
            resolve_history(&cal, "20240109", 9, 0),
            Err(FetchError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_resolve_daily_offset() {
        let cal = calendar();
        assert_eq!(resolve_daily(&cal, "20240109", 8).unwrap(), "20240101");
        assert!(resolve_daily(&cal, "20240109", 9).is_err());
    }

    #[test]
    fn test_is_contiguous() {
        let cal = calendar();
        let run: Vec<String> = vec!["20240103".into(), "20240104".into(), "20240105".into()];
        let gap: Vec<String> = vec!["20240103".into(), "20240105".into()];
        assert!(is_contiguous(&cal, &run));
        assert!(!is_contiguous(&cal, &gap));
        assert!(is_contiguous(&cal, &[]));
    }

    #[test]
    fn test_finish_series_reindex() {
        let context = MarketContext::new(
            calendar(),
            Universe::new(vec!["b".to_string(), "a".to_string()]),
        );
        let series = Series {
            name: "20240102".to_string(),
            index: vec!["a".to_string(), "z".to_string()],
            values: vec![Some(1.0), Some(2.0)],
        };
        let reindexed = finish_series(series, &context, FetchOptions::new().reindex(true));
        assert_eq!(reindexed.name, "20240102");
        assert_eq!(reindexed.index, vec!["b".to_string(), "a".to_string()]);
        assert_eq!(reindexed.values, vec![None, Some(1.0)]);
    }
}
