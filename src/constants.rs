//! # System Constants
//!
//! Channel addresses, protocol verbs and tuning defaults shared across the
//! control plane. The verb vocabulary is closed per channel: every verb a
//! channel accepts is listed here, and an envelope carrying anything else is
//! a protocol error.

/// Logical channel addresses (in-process transport).
///
/// Each address has exactly one bound endpoint; connecting peers reference
/// the same name. The supervisor owns the wiring.
pub mod addresses {
    /// Task health/status broadcast (one-way queue, pub-style).
    pub const STATUS_QUEUE: &str = "inproc://status";
    /// Build-completion submissions (one-way queue).
    pub const BUILDS_QUEUE: &str = "inproc://builds";
    /// State-entity persistence requests, client side of the broker (req/rep).
    pub const DB_QUEUE: &str = "inproc://db";
    /// Worker side of the database broker (req/rep, internal).
    pub const ORACLE_QUEUE: &str = "inproc://oracle";
    /// Artifact storage requests (req/rep via its own broker).
    pub const FS_QUEUE: &str = "inproc://fs";
    /// Dispatch work to build workers (req/rep).
    pub const SLAVE_QUEUE: &str = "inproc://slave-driver";
    /// Artifact upload streaming (one-way queue).
    pub const FILE_QUEUE: &str = "inproc://file-transfer";
    /// External package-index ingestion (one-way queue).
    pub const IMPORT_QUEUE: &str = "inproc://import";
    /// Log record forwarding (one-way queue).
    pub const LOG_QUEUE: &str = "inproc://log";
    /// Metrics aggregation (one-way queue).
    pub const STATS_QUEUE: &str = "inproc://stats";

    /// Per-task control channel address.
    pub fn control(task_name: &str) -> String {
        format!("inproc://control-{task_name}")
    }
}

/// Uppercase wire verbs, grouped by channel.
pub mod verbs {
    /// Control channel: supervisor to task.
    pub const PAUSE: &str = "PAUSE";
    pub const RESUME: &str = "RESUME";
    pub const QUIT: &str = "QUIT";
    /// Control channel ack, also the generic success reply.
    pub const OK: &str = "OK";
    /// Generic failure reply; args are `[code, message]`.
    pub const ERROR: &str = "ERROR";

    /// Status queue: task health broadcast.
    pub const STATUS: &str = "STATUS";

    /// Broker backend: worker announcement / re-announcement.
    pub const READY: &str = "READY";
    /// Broker backend: dispatched work unit, args `[client_id, request]`.
    pub const WORK: &str = "WORK";
    /// Broker backend: completed work, args `[client_id, reply]`.
    pub const DONE: &str = "DONE";

    /// Database requests.
    pub const NEWPKG: &str = "NEWPKG";
    pub const NEWVER: &str = "NEWVER";
    pub const LOGBUILD: &str = "LOGBUILD";
    pub const LOGDOWNLOAD: &str = "LOGDOWNLOAD";
    pub const GETABIS: &str = "GETABIS";
    pub const GETPKGNAMES: &str = "GETPKGNAMES";
    pub const GETVERSIONS: &str = "GETVERSIONS";
    /// Validation rejection reply; args are `[reason]`.
    pub const REJECT: &str = "REJECT";
}

/// Failure codes carried in `ERROR` replies so clients can distinguish
/// contention from everything else.
pub mod error_codes {
    pub const BROKER_OVERLOADED: &str = "BROKER_OVERLOADED";
    pub const WORKER_LOST: &str = "WORKER_LOST";
    pub const WORKER_FAILURE: &str = "WORKER_FAILURE";
    pub const PROTOCOL: &str = "PROTOCOL";
}

/// Tuning defaults; every one of these is overridable via [`crate::config::MasterConfig`].
pub mod defaults {
    use std::time::Duration;

    /// Outstanding-envelope limit per channel before `send` blocks.
    pub const HIGH_WATER_MARK: usize = 10;
    /// Bounded wait in every task event loop; responsiveness to control
    /// commands is within one interval.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
    /// Longest a `send` may block under backpressure.
    pub const SEND_TIMEOUT: Duration = Duration::from_secs(5);
    /// Broker request queue depth; the oldest queued request is failed back
    /// once exceeded.
    pub const BROKER_QUEUE_DEPTH: usize = 50;
    /// Silence window after which a worker is presumed dead.
    pub const LIVENESS_WINDOW: Duration = Duration::from_secs(5);
    /// Idle workers re-announce READY well inside the liveness window.
    pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
    /// Drain allowance after QUIT before a task is abandoned.
    pub const GRACE_PERIOD: Duration = Duration::from_secs(2);
    /// Client-side wait for a broker reply per attempt.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Client-side retry budget for contention failures.
    pub const REQUEST_RETRIES: u32 = 3;
    /// Worker-side retry budget for acquiring its database connection.
    pub const DB_CONNECT_RETRIES: u32 = 3;
    /// Number of oracle workers sharing the broker.
    pub const ORACLE_WORKERS: usize = 2;
}
