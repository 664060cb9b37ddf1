use chrono::NaiveDate;

use crate::store::StoreError;

/// Ids are embedded in `:`-separated keys, so a separator inside an id would
/// let one article's range scan bleed into another's.
fn segment(value: &str) -> Result<&str, StoreError> {
    if value.is_empty() || value.contains(':') {
        return Err(StoreError::InvalidKey(value.to_string()));
    }
    Ok(value)
}

fn ts_segment(timestamp_ms: i64) -> String {
    format!("{:020}", timestamp_ms.max(0) as u64)
}

pub fn article_key(article_id: &str) -> Result<String, StoreError> {
    Ok(segment(article_id)?.to_string())
}

pub fn read_event_key(
    article_id: &str,
    timestamp_ms: i64,
    event_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:{}",
        segment(article_id)?,
        ts_segment(timestamp_ms),
        segment(event_id)?
    ))
}

/// Lower bound for all events of `article_id` at or after `timestamp_ms`.
/// Used as both ends of a half-open range scan.
pub fn read_event_bound(article_id: &str, timestamp_ms: i64) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{}:",
        segment(article_id)?,
        ts_segment(timestamp_ms)
    ))
}

pub fn read_time_key(timestamp_ms: i64, event_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", ts_segment(timestamp_ms), segment(event_id)?))
}

pub fn read_time_bound(timestamp_ms: i64) -> String {
    format!("{}:", ts_segment(timestamp_ms))
}

pub fn daily_aggregate_key(article_id: &str, date: NaiveDate) -> Result<String, StoreError> {
    Ok(format!("{}:{}", segment(article_id)?, date.format("%Y-%m-%d")))
}

pub fn daily_aggregate_prefix(article_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(article_id)?))
}
