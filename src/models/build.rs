//! # Build State
//!
//! One build attempt and the artifacts it produced. A build starts life as a
//! mutable [`BuildState`]; once persisted it becomes an immutable
//! [`LoggedBuild`] carrying the assigned identifier. The finalize step
//! consumes the unlogged value, so logging the same build twice is
//! unrepresentable rather than a runtime check.

use crate::error::StateError;
use crate::models::file::FileState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A completed build attempt that has not yet been persisted.
///
/// Identity fields are fixed at construction; the only permitted mutation
/// before logging is appending produced files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    /// Identifier of the build worker that ran the attempt.
    pub built_by: i32,
    pub package: String,
    pub version: String,
    pub abi_tag: String,
    /// Whether the build succeeded.
    pub status: bool,
    /// Wall-clock duration in seconds, non-negative.
    pub duration: f64,
    /// Free-text build log.
    pub output: String,
    files: HashMap<String, FileState>,
}

impl BuildState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        built_by: i32,
        package: &str,
        version: &str,
        abi_tag: &str,
        status: bool,
        duration: f64,
        output: &str,
        files: HashMap<String, FileState>,
    ) -> Result<Self, StateError> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(StateError::InvalidDuration { duration });
        }
        Ok(Self {
            built_by,
            package: package.to_string(),
            version: version.to_string(),
            abi_tag: abi_tag.to_string(),
            status,
            duration,
            output: output.to_string(),
            files,
        })
    }

    /// Attach a produced artifact, keyed by filename.
    pub fn add_file(&mut self, file: FileState) {
        self.files.insert(file.filename.clone(), file);
    }

    pub fn files(&self) -> &HashMap<String, FileState> {
        &self.files
    }

    pub fn files_mut(&mut self) -> &mut HashMap<String, FileState> {
        &mut self.files
    }

    /// True once every produced file has been uploaded.
    pub fn transfers_done(&self) -> bool {
        self.files.values().all(|file| file.transferred)
    }

    /// The next artifact still awaiting upload, if any.
    pub fn next_file(&self) -> Option<&FileState> {
        self.files.values().find(|file| !file.transferred)
    }

    /// Finalize with the identifier assigned by the database. Consumes the
    /// unlogged state; the result is immutable.
    pub fn log(self, build_id: i32) -> LoggedBuild {
        LoggedBuild {
            build_id,
            state: self,
        }
    }
}

/// A persisted build. Identity fields can no longer change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedBuild {
    build_id: i32,
    state: BuildState,
}

impl LoggedBuild {
    pub fn build_id(&self) -> i32 {
        self.build_id
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }
}
