use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tokio::sync::Mutex;

use crate::config::ReadLimitConfig;
use crate::constants::{GUEST_ACTOR, UNKNOWN_IP};

#[derive(Debug, Clone)]
struct WindowEntry {
    count: u64,
    window_start: Instant,
}

/// `read:{ip}:{actor}:{article}`. Missing identity collapses onto the
/// `0.0.0.0` / `guest` buckets, so anonymous readers behind one unknown
/// origin share a window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadKey(String);

impl ReadKey {
    pub fn new(ip: Option<IpAddr>, reader_id: Option<&str>, article_id: &str) -> Self {
        let ip = ip.map_or_else(|| UNKNOWN_IP.to_string(), |ip| ip.to_string());
        let actor = reader_id.filter(|id| !id.is_empty()).unwrap_or(GUEST_ACTOR);
        Self(format!("read:{ip}:{actor}:{article_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed-window counter deciding whether a read is recorded. It never
/// rejects the read itself.
#[derive(Debug, Clone)]
pub struct ReadRateLimiter {
    window: Duration,
    max_records: u64,
    entries: Arc<Mutex<HashMap<ReadKey, WindowEntry>>>,
}

impl ReadRateLimiter {
    pub fn new(window: Duration, max_records: u64) -> Self {
        Self {
            window,
            max_records,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &ReadLimitConfig) -> Self {
        Self::new(Duration::from_secs(config.window_secs), config.max_records)
    }

    /// `true` when this read should be recorded.
    pub async fn check(&self, key: &ReadKey) -> bool {
        self.check_at(key, Instant::now()).await
    }

    pub async fn check_at(&self, key: &ReadKey, now: Instant) -> bool {
        let mut map = self.entries.lock().await;
        let entry = map.entry(key.clone()).or_insert(WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.saturating_duration_since(entry.window_start) >= self.window {
            entry.count = 0;
            entry.window_start = now;
        }

        let allowed = entry.count < self.max_records;
        if allowed {
            entry.count += 1;
        }
        allowed
    }

    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now()).await
    }

    /// Drop windows that closed at least one full window ago. Returns how many
    /// keys were evicted.
    pub async fn cleanup_at(&self, now: Instant) -> usize {
        let mut map = self.entries.lock().await;
        let before = map.len();
        let horizon = self.window.saturating_mul(2);
        map.retain(|_, entry| now.saturating_duration_since(entry.window_start) < horizon);
        before - map.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

/// Client origin for rate-limit keys. Forwarding headers are honoured only
/// behind a trusted proxy; otherwise the socket peer is used.
pub fn extract_client_ip(
    headers: &HeaderMap,
    trust_proxy: bool,
    peer: Option<IpAddr>,
) -> Option<IpAddr> {
    if trust_proxy {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|first| first.trim().parse::<IpAddr>().ok());
        if forwarded.is_some() {
            return forwarded;
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<IpAddr>().ok());
        if real_ip.is_some() {
            return real_ip;
        }
    }

    peer
}
