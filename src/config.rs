use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::constants::{
    DEFAULT_BACKOFF_BASE_MS, DEFAULT_DAILY_ROLLUP_CRON, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_READ_LIMIT_MAX, DEFAULT_READ_LIMIT_WINDOW_SECS, DEFAULT_RECORDER_CAPACITY,
    DEFAULT_TASK_TIMEOUT_SECS, DEFAULT_WORKER_CONCURRENCY,
};

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub cors_origin: String,
    pub trust_proxy: bool,
    pub read_limit: ReadLimitConfig,
    pub worker: WorkerConfig,
    pub queue: QueueConfig,
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone)]
pub struct ReadLimitConfig {
    pub window_secs: u64,
    pub max_records: u64,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Only the leader instance runs cron jobs; every instance runs the
    /// aggregation pool.
    pub is_leader: bool,
    pub concurrency: usize,
    pub task_timeout_secs: u64,
    pub daily_rollup_cron: String,
}

#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RecorderConfig {
    pub channel_capacity: usize,
}

impl Default for ReadLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: DEFAULT_READ_LIMIT_WINDOW_SECS,
            max_records: DEFAULT_READ_LIMIT_MAX,
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            is_leader: true,
            concurrency: DEFAULT_WORKER_CONCURRENCY,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            daily_rollup_cron: DEFAULT_DAILY_ROLLUP_CRON.to_string(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_RECORDER_CAPACITY,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("cors_origin", &self.cors_origin)
            .field("trust_proxy", &self.trust_proxy)
            .field("read_limit", &self.read_limit)
            .field("worker", &self.worker)
            .field("queue", &self.queue)
            .field("recorder", &self.recorder)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/read-analytics.sled"),
            jwt_secret: env_or(
                "JWT_SECRET",
                "change_me_to_random_64_chars_change_me_to_random_64_chars",
            ),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            trust_proxy: env_or_bool("TRUST_PROXY", false),
            read_limit: ReadLimitConfig {
                window_secs: env_or_parse("READ_LIMIT_WINDOW_SECS", DEFAULT_READ_LIMIT_WINDOW_SECS),
                max_records: env_or_parse("READ_LIMIT_MAX", DEFAULT_READ_LIMIT_MAX),
            },
            worker: WorkerConfig {
                is_leader: env_or_bool("WORKER_LEADER", true),
                concurrency: env_or_parse("ANALYTICS_WORKERS", DEFAULT_WORKER_CONCURRENCY),
                task_timeout_secs: env_or_parse(
                    "ANALYTICS_TASK_TIMEOUT_SECS",
                    DEFAULT_TASK_TIMEOUT_SECS,
                ),
                daily_rollup_cron: env_or("ANALYTICS_DAILY_CRON", DEFAULT_DAILY_ROLLUP_CRON),
            },
            queue: QueueConfig {
                max_attempts: env_or_parse("ANALYTICS_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                backoff_base_ms: env_or_parse("ANALYTICS_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE_MS),
            },
            recorder: RecorderConfig {
                channel_capacity: env_or_parse("READ_RECORDER_CAPACITY", DEFAULT_RECORDER_CAPACITY),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    fn managed_keys() -> &'static [&'static str] {
        &[
            "HOST",
            "PORT",
            "RUST_LOG",
            "JWT_SECRET",
            "READ_LIMIT_WINDOW_SECS",
            "READ_LIMIT_MAX",
            "ANALYTICS_WORKERS",
            "ANALYTICS_MAX_ATTEMPTS",
            "ANALYTICS_BACKOFF_BASE_MS",
            "ANALYTICS_DAILY_CRON",
            "WORKER_LEADER",
        ]
    }

    fn clear_keys(keys: &[&str]) {
        for key in keys {
            env::remove_var(key);
        }
    }

    #[test]
    fn loads_defaults_when_missing() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.read_limit.window_secs, 30);
        assert_eq!(cfg.read_limit.max_records, 1);
        assert_eq!(cfg.queue.max_attempts, 3);
        assert_eq!(cfg.queue.backoff_base_ms, 2000);
        assert_eq!(cfg.worker.daily_rollup_cron, "0 5 0 * * *");
        assert!(cfg.worker.is_leader);
    }

    #[test]
    fn parses_numeric_values() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "4000");
        env::set_var("ANALYTICS_WORKERS", "8");
        env::set_var("ANALYTICS_MAX_ATTEMPTS", "5");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 4000);
        assert_eq!(cfg.worker.concurrency, 8);
        assert_eq!(cfg.queue.max_attempts, 5);
        clear_keys(managed_keys());
    }

    #[test]
    fn invalid_values_fall_back() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());

        env::set_var("PORT", "bad");
        env::set_var("READ_LIMIT_WINDOW_SECS", "x");
        env::set_var("WORKER_LEADER", "maybe");

        let cfg = Config::from_env();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.read_limit.window_secs, 30);
        assert!(cfg.worker.is_leader);
        clear_keys(managed_keys());
    }

    #[test]
    fn debug_redacts_secret() {
        let _guard = env_lock().lock().expect("env lock");
        clear_keys(managed_keys());
        env::set_var("JWT_SECRET", "super-secret-value");

        let cfg = Config::from_env();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("REDACTED"));
        clear_keys(managed_keys());
    }
}
