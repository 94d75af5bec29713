//! # Broker
//!
//! Load-balancing intermediary between many request/reply clients and a
//! pool of serialized-resource workers.

pub mod protocol;
pub mod seraph;

pub use protocol::{WorkUnit, WorkerMsg};
pub use seraph::Seraph;
