use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::Transactional;

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEvent {
    pub id: String,
    pub article_id: String,
    pub reader_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl Store {
    /// Append one read event and its time-index entry atomically.
    pub fn append_read_event(
        &self,
        article_id: &str,
        reader_id: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> Result<ReadEvent, StoreError> {
        let event = ReadEvent {
            id: uuid::Uuid::new_v4().to_string(),
            article_id: article_id.to_string(),
            reader_id: reader_id.map(str::to_string),
            occurred_at,
        };

        let ts = occurred_at.timestamp_millis();
        let event_key = keys::read_event_key(article_id, ts, &event.id)?;
        let time_key = keys::read_time_key(ts, &event.id)?;
        let event_bytes = Self::serialize(&event)?;
        let article_bytes = article_id.as_bytes().to_vec();

        (&self.read_events, &self.read_events_by_time)
            .transaction(|(tx_events, tx_time)| {
                tx_events.insert(event_key.as_bytes(), event_bytes.as_slice())?;
                tx_time.insert(time_key.as_bytes(), article_bytes.as_slice())?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| match e {
                sled::transaction::TransactionError::Abort(()) => {
                    StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
                }
                sled::transaction::TransactionError::Storage(se) => StoreError::Sled(se),
            })?;

        Ok(event)
    }

    /// Count events for `article_id` with `start <= occurred_at < end`.
    pub fn count_read_events(
        &self,
        article_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if end <= start {
            return Ok(0);
        }
        let lower = keys::read_event_bound(article_id, start.timestamp_millis())?;
        let upper = keys::read_event_bound(article_id, end.timestamp_millis())?;

        let mut count = 0u64;
        for item in self.read_events.range(lower.as_bytes()..upper.as_bytes()) {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    /// Scan the time index over `[start, end)` and return each article id once.
    pub fn distinct_articles_with_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, StoreError> {
        let mut articles = BTreeSet::new();
        if end <= start {
            return Ok(articles);
        }
        let lower = keys::read_time_bound(start.timestamp_millis());
        let upper = keys::read_time_bound(end.timestamp_millis());

        for item in self
            .read_events_by_time
            .range(lower.as_bytes()..upper.as_bytes())
        {
            let (_, value) = item?;
            articles.insert(String::from_utf8_lossy(&value).into_owned());
        }
        Ok(articles)
    }
}
