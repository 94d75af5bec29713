//! # Messaging
//!
//! The internal task message bus: named, typed, backpressured channels over
//! in-process transports. Tasks interact only through these endpoints; no
//! two tasks share mutable state.

pub mod channel;
pub mod context;
pub mod envelope;

pub use channel::{DealerSocket, PairSocket, PeerId, QueueReceiver, QueueSender, ReqSocket, Router};
pub use context::MessagingContext;
pub use envelope::Envelope;
