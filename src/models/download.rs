//! # Download State
//!
//! One observed client download event: an append-only fact, immutable once
//! constructed. The environment fields are free-form and may be empty when
//! the client did not report them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadState {
    pub filename: String,
    /// Client host the request came from.
    pub host: String,
    pub timestamp: DateTime<Utc>,
    pub arch: String,
    pub distro_name: String,
    pub distro_version: String,
    pub os_name: String,
    pub os_version: String,
    pub py_name: String,
    pub py_version: String,
}

impl DownloadState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        filename: &str,
        host: &str,
        timestamp: DateTime<Utc>,
        arch: &str,
        distro_name: &str,
        distro_version: &str,
        os_name: &str,
        os_version: &str,
        py_name: &str,
        py_version: &str,
    ) -> Self {
        Self {
            filename: filename.to_string(),
            host: host.to_string(),
            timestamp,
            arch: arch.to_string(),
            distro_name: distro_name.to_string(),
            distro_version: distro_version.to_string(),
            os_name: os_name.to_string(),
            os_version: os_version.to_string(),
            py_name: py_name.to_string(),
            py_version: py_version.to_string(),
        }
    }
}
