#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Wheelhouse Core
//!
//! Control-plane core of a distributed package-build farm: a master process
//! that accepts work requests, routes them to service workers, and persists
//! build, file and download lifecycle state in PostgreSQL. Everything is
//! communicated through typed messages over named channels, never shared
//! memory.
//!
//! ## Architecture
//!
//! The crate is built around an internal **task message bus**:
//!
//! - [`messaging`]: named, typed, backpressured channels with three
//!   delivery patterns (one-way queue, strict request/reply, symmetric
//!   pair), registered in an explicitly constructed, injected context.
//! - [`tasks`]: the independently scheduled unit of execution: an event
//!   loop multiplexed over data channels and one control channel, with a
//!   uniform PAUSE/RESUME/QUIT protocol and per-message fault isolation.
//! - [`broker`]: **Seraph**, the load-balancing broker: many concurrent
//!   clients multiplexed onto a small worker pool with LRU dispatch,
//!   bounded-queue backpressure and liveness detection.
//! - [`oracle`]: the serialized-resource worker pool behind the broker,
//!   each worker wrapping exactly one database connection, plus the typed
//!   request vocabulary and client wrapper.
//! - [`models`]: the lifecycle state entities (builds, files, downloads):
//!   pure data plus validation, serialized verbatim into request envelopes.
//! - [`database`]: transaction-scoped persistence executed by the workers.
//! - [`supervisor`]: process-level wiring and ordered shutdown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wheelhouse_core::config::MasterConfig;
//! use wheelhouse_core::supervisor::Supervisor;
//!
//! # async fn example() -> wheelhouse_core::error::Result<()> {
//! let supervisor = Supervisor::start(MasterConfig::from_env()?).await?;
//! let mut db = supervisor.db_client()?;
//! db.new_package("foo").await?;
//! db.new_version("foo", "0.1").await?;
//! supervisor.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! Per-producer order within a one-way queue; at-most-one in-flight request
//! per worker; bounded blocking everywhere (every wait takes a timeout);
//! failures delivered as typed reply payloads on the channel that carried
//! the request. In-flight envelopes do not survive a crash; only
//! database-committed state does.

pub mod broker;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod models;
pub mod oracle;
pub mod supervisor;
pub mod tasks;

pub use config::MasterConfig;
pub use error::{DbError, Error, ProtocolError, Result, StateError, TransportError};
pub use messaging::{Envelope, MessagingContext};
pub use models::{BuildState, DownloadState, FileState, LoggedBuild};
pub use supervisor::Supervisor;
