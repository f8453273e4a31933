use crate::core::error::{FetchError, Result};
use chrono::{NaiveTime, Timelike};

const TIMESTAMP_FORMAT: &str = "%H%M%S";

/// Parses an intraday `HHMMSS` token.
pub fn parse_timestamp(token: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(token, TIMESTAMP_FORMAT)
        .map_err(|e| FetchError::InvalidRange(format!("{token} is not an HHMMSS timestamp: {e}")))
}

/// Timestamps from `start` to `end` inclusive, every `step_secs` seconds.
pub fn generate_timestamps(start: &str, end: &str, step_secs: u32) -> Result<Vec<String>> {
    if step_secs == 0 {
        return Err(FetchError::InvalidRange(
            "timestamp step must be positive".to_string(),
        ));
    }
    let first = parse_timestamp(start)?.num_seconds_from_midnight();
    let last = parse_timestamp(end)?.num_seconds_from_midnight();
    Ok((first..=last)
        .step_by(step_secs as usize)
        .filter_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0))
        .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .collect())
}
