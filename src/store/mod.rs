pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub articles: sled::Tree,
    pub read_events: sled::Tree,
    pub daily_aggregates: sled::Tree,
    pub analytics_tasks: sled::Tree,
    pub meta: sled::Tree,
    // Secondary index trees
    pub read_events_by_time: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("invalid key segment: {0}")]
    InvalidKey(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let articles = db.open_tree(trees::ARTICLES)?;
        let read_events = db.open_tree(trees::READ_EVENTS)?;
        let daily_aggregates = db.open_tree(trees::DAILY_AGGREGATES)?;
        let analytics_tasks = db.open_tree(trees::ANALYTICS_TASKS)?;
        let meta = db.open_tree(trees::META)?;
        let read_events_by_time = db.open_tree(trees::READ_EVENTS_BY_TIME)?;

        Ok(Self {
            db,
            articles,
            read_events,
            daily_aggregates,
            analytics_tasks,
            meta,
            read_events_by_time,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
