use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub article_id: String,
    pub date: NaiveDate,
    pub view_count: u64,
}

impl Store {
    /// Overwrite the rollup for `(article_id, date)`. Never increments: the
    /// caller always passes a full recount.
    pub fn upsert_daily_aggregate(
        &self,
        article_id: &str,
        date: NaiveDate,
        view_count: u64,
    ) -> Result<DailyAggregate, StoreError> {
        let aggregate = DailyAggregate {
            article_id: article_id.to_string(),
            date,
            view_count,
        };
        let key = keys::daily_aggregate_key(article_id, date)?;
        self.daily_aggregates
            .insert(key.as_bytes(), Self::serialize(&aggregate)?)?;
        Ok(aggregate)
    }

    pub fn get_daily_aggregate(
        &self,
        article_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAggregate>, StoreError> {
        let key = keys::daily_aggregate_key(article_id, date)?;
        match self.daily_aggregates.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// All rollups of one article, oldest day first.
    pub fn list_daily_aggregates(
        &self,
        article_id: &str,
    ) -> Result<Vec<DailyAggregate>, StoreError> {
        let prefix = keys::daily_aggregate_prefix(article_id)?;
        let mut aggregates = Vec::new();
        for item in self.daily_aggregates.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            aggregates.push(Self::deserialize::<DailyAggregate>(&value)?);
        }
        Ok(aggregates)
    }

    /// Lifetime views of one article: the sum over every rolled-up day.
    pub fn total_views(&self, article_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .list_daily_aggregates(article_id)?
            .iter()
            .map(|agg| agg.view_count)
            .sum())
    }
}
