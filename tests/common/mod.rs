//! Shared test configuration: the production defaults with every interval
//! shrunk so liveness and backpressure behavior is observable in
//! milliseconds.

use std::time::Duration;
use wheelhouse_core::MasterConfig;

pub fn fast_config() -> MasterConfig {
    MasterConfig {
        high_water_mark: 4,
        poll_interval: Duration::from_millis(10),
        send_timeout: Duration::from_millis(200),
        broker_queue_depth: 2,
        liveness_window: Duration::from_millis(300),
        heartbeat_interval: Duration::from_millis(100),
        grace_period: Duration::from_millis(500),
        request_timeout: Duration::from_millis(500),
        request_retries: 1,
        ..MasterConfig::default()
    }
}
