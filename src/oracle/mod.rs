//! # Oracle
//!
//! The serialized-resource worker pool behind the database broker: a fixed
//! set of workers, each owning one PostgreSQL connection, plus the typed
//! request vocabulary and the client-side wrapper.

pub mod client;
pub mod requests;
pub mod worker;

pub use client::DbClient;
pub use requests::{DbReply, DbRequest};
pub use worker::OracleWorker;
