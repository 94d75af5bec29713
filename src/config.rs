//! # Master Configuration
//!
//! Environment-driven configuration for the control plane. Defaults come
//! from [`crate::constants::defaults`]; every knob can be overridden with a
//! `WHEELHOUSE_*` environment variable. Tasks receive the config by value at
//! construction, never through process-wide globals.

use crate::constants::{addresses, defaults};
use crate::error::{Error, Result};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Database connection string handed to each oracle worker.
    pub dsn: String,
    /// Channel addresses (see the table in the module docs of `constants`).
    pub status_queue: String,
    pub builds_queue: String,
    pub db_queue: String,
    pub oracle_queue: String,
    pub fs_queue: String,
    pub slave_queue: String,
    pub file_queue: String,
    pub import_queue: String,
    pub log_queue: String,
    pub stats_queue: String,
    /// Per-channel outstanding-envelope limit.
    pub high_water_mark: usize,
    /// Bounded wait used by every task event loop.
    pub poll_interval: Duration,
    /// Longest a send may block under backpressure.
    pub send_timeout: Duration,
    /// Broker request queue depth.
    pub broker_queue_depth: usize,
    /// Worker silence window before removal.
    pub liveness_window: Duration,
    /// Idle worker re-announcement interval.
    pub heartbeat_interval: Duration,
    /// Drain allowance after QUIT.
    pub grace_period: Duration,
    /// Client reply wait per attempt.
    pub request_timeout: Duration,
    /// Client retry budget for contention failures.
    pub request_retries: u32,
    /// Worker database connection retry budget.
    pub db_connect_retries: u32,
    /// Oracle pool size.
    pub oracle_workers: usize,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            dsn: "postgresql://wheelhouse@localhost/wheelhouse".to_string(),
            status_queue: addresses::STATUS_QUEUE.to_string(),
            builds_queue: addresses::BUILDS_QUEUE.to_string(),
            db_queue: addresses::DB_QUEUE.to_string(),
            oracle_queue: addresses::ORACLE_QUEUE.to_string(),
            fs_queue: addresses::FS_QUEUE.to_string(),
            slave_queue: addresses::SLAVE_QUEUE.to_string(),
            file_queue: addresses::FILE_QUEUE.to_string(),
            import_queue: addresses::IMPORT_QUEUE.to_string(),
            log_queue: addresses::LOG_QUEUE.to_string(),
            stats_queue: addresses::STATS_QUEUE.to_string(),
            high_water_mark: defaults::HIGH_WATER_MARK,
            poll_interval: defaults::POLL_INTERVAL,
            send_timeout: defaults::SEND_TIMEOUT,
            broker_queue_depth: defaults::BROKER_QUEUE_DEPTH,
            liveness_window: defaults::LIVENESS_WINDOW,
            heartbeat_interval: defaults::HEARTBEAT_INTERVAL,
            grace_period: defaults::GRACE_PERIOD,
            request_timeout: defaults::REQUEST_TIMEOUT,
            request_retries: defaults::REQUEST_RETRIES,
            db_connect_retries: defaults::DB_CONNECT_RETRIES,
            oracle_workers: defaults::ORACLE_WORKERS,
        }
    }
}

impl MasterConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dsn) = std::env::var("WHEELHOUSE_DSN") {
            config.dsn = dsn;
        }

        if let Ok(hwm) = std::env::var("WHEELHOUSE_HIGH_WATER_MARK") {
            config.high_water_mark = parse_field("high_water_mark", &hwm)?;
        }

        if let Ok(depth) = std::env::var("WHEELHOUSE_BROKER_QUEUE_DEPTH") {
            config.broker_queue_depth = parse_field("broker_queue_depth", &depth)?;
        }

        if let Ok(workers) = std::env::var("WHEELHOUSE_ORACLE_WORKERS") {
            config.oracle_workers = parse_field("oracle_workers", &workers)?;
        }

        if let Ok(ms) = std::env::var("WHEELHOUSE_LIVENESS_WINDOW_MS") {
            config.liveness_window = Duration::from_millis(parse_field("liveness_window_ms", &ms)?);
        }

        if let Ok(ms) = std::env::var("WHEELHOUSE_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(parse_field("poll_interval_ms", &ms)?);
        }

        if let Ok(ms) = std::env::var("WHEELHOUSE_GRACE_PERIOD_MS") {
            config.grace_period = Duration::from_millis(parse_field("grace_period_ms", &ms)?);
        }

        if let Ok(retries) = std::env::var("WHEELHOUSE_REQUEST_RETRIES") {
            config.request_retries = parse_field("request_retries", &retries)?;
        }

        Ok(config)
    }
}

fn parse_field<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e| Error::Configuration {
        message: format!("invalid {name}: {e}"),
    })
}
