//! # Lifecycle State Entities
//!
//! Plain records describing the stages of a package-build pipeline: builds,
//! produced files and observed downloads. Pure data plus validation, no I/O;
//! these are serialized verbatim into broker and oracle request envelopes.
//!
//! Ownership follows the message: the constructing task owns an entity until
//! it sends it, after which the receiving task does.

pub mod build;
pub mod download;
pub mod file;

pub use build::{BuildState, LoggedBuild};
pub use download::DownloadState;
pub use file::FileState;
