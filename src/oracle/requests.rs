//! # Database Request/Reply Types
//!
//! The closed vocabulary of the `db` channel, as typed enums. Requests and
//! replies encode to the `[VERB, args...]` wire envelope; decoding an
//! unknown verb is a protocol error which the worker answers with an
//! `ERROR` reply rather than dropping.
//!
//! Replies are decoded in the context of the request that produced them,
//! which keeps the payload shapes unambiguous without inventing a reply
//! verb per query.

use crate::constants::verbs;
use crate::error::ProtocolError;
use crate::messaging::Envelope;
use crate::models::{BuildState, DownloadState};

/// State-entity persistence and validation requests served by the oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum DbRequest {
    /// Register a package newly seen on the index.
    NewPackage { package: String },
    /// Register a new version of a known package.
    NewVersion { package: String, version: String },
    /// Persist a completed build with its files; replies with the build id.
    LogBuild { build: BuildState },
    /// Record one observed download event.
    LogDownload { download: DownloadState },
    /// ABIs the farm builds for, used to validate before insert.
    GetBuildAbis,
    /// All known package names.
    GetPackageNames,
    /// All known (package, version) pairs.
    GetPackageVersions,
}

impl DbRequest {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            DbRequest::NewPackage { package } => Envelope::new(verbs::NEWPKG).arg(package),
            DbRequest::NewVersion { package, version } => {
                Envelope::new(verbs::NEWVER).arg(package)?.arg(version)
            }
            DbRequest::LogBuild { build } => Envelope::new(verbs::LOGBUILD).arg(build),
            DbRequest::LogDownload { download } => {
                Envelope::new(verbs::LOGDOWNLOAD).arg(download)
            }
            DbRequest::GetBuildAbis => Ok(Envelope::new(verbs::GETABIS)),
            DbRequest::GetPackageNames => Ok(Envelope::new(verbs::GETPKGNAMES)),
            DbRequest::GetPackageVersions => Ok(Envelope::new(verbs::GETVERSIONS)),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.verb.as_str() {
            verbs::NEWPKG => {
                envelope.expect_args(1)?;
                Ok(DbRequest::NewPackage {
                    package: envelope.decode_arg(0)?,
                })
            }
            verbs::NEWVER => {
                envelope.expect_args(2)?;
                Ok(DbRequest::NewVersion {
                    package: envelope.decode_arg(0)?,
                    version: envelope.decode_arg(1)?,
                })
            }
            verbs::LOGBUILD => {
                envelope.expect_args(1)?;
                Ok(DbRequest::LogBuild {
                    build: envelope.decode_arg(0)?,
                })
            }
            verbs::LOGDOWNLOAD => {
                envelope.expect_args(1)?;
                Ok(DbRequest::LogDownload {
                    download: envelope.decode_arg(0)?,
                })
            }
            verbs::GETABIS => Ok(DbRequest::GetBuildAbis),
            verbs::GETPKGNAMES => Ok(DbRequest::GetPackageNames),
            verbs::GETVERSIONS => Ok(DbRequest::GetPackageVersions),
            other => Err(ProtocolError::UnknownVerb {
                verb: other.to_string(),
            }),
        }
    }
}

/// Replies produced by oracle workers.
#[derive(Debug, Clone, PartialEq)]
pub enum DbReply {
    /// Success with nothing to report.
    Done,
    /// Success of a `LogBuild`, carrying the assigned identifier.
    BuildLogged { build_id: i32 },
    BuildAbis(Vec<String>),
    PackageNames(Vec<String>),
    PackageVersions(Vec<(String, String)>),
    /// The request itself was invalid (duplicate key, missing foreign key).
    /// Never retried; surfaced verbatim to the client.
    Rejected { reason: String },
    /// The worker could not serve the request (resource failure).
    Failed { code: String, message: String },
}

impl DbReply {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            DbReply::Done => Ok(Envelope::ok()),
            DbReply::BuildLogged { build_id } => Envelope::new(verbs::OK).arg(build_id),
            DbReply::BuildAbis(abis) => Envelope::new(verbs::OK).arg(abis),
            DbReply::PackageNames(names) => Envelope::new(verbs::OK).arg(names),
            DbReply::PackageVersions(pairs) => Envelope::new(verbs::OK).arg(pairs),
            DbReply::Rejected { reason } => Envelope::new(verbs::REJECT).arg(reason),
            DbReply::Failed { code, message } => Ok(Envelope::error(code, message)),
        }
    }

    /// Decode a reply in the context of the request it answers.
    pub fn from_envelope(
        request: &DbRequest,
        envelope: &Envelope,
    ) -> Result<Self, ProtocolError> {
        match envelope.verb.as_str() {
            verbs::OK => match request {
                DbRequest::NewPackage { .. }
                | DbRequest::NewVersion { .. }
                | DbRequest::LogDownload { .. } => Ok(DbReply::Done),
                DbRequest::LogBuild { .. } => Ok(DbReply::BuildLogged {
                    build_id: envelope.decode_arg(0)?,
                }),
                DbRequest::GetBuildAbis => Ok(DbReply::BuildAbis(envelope.decode_arg(0)?)),
                DbRequest::GetPackageNames => {
                    Ok(DbReply::PackageNames(envelope.decode_arg(0)?))
                }
                DbRequest::GetPackageVersions => {
                    Ok(DbReply::PackageVersions(envelope.decode_arg(0)?))
                }
            },
            verbs::REJECT => Ok(DbReply::Rejected {
                reason: envelope.decode_arg(0)?,
            }),
            verbs::ERROR => {
                let (code, message) = envelope.error_parts()?;
                Ok(DbReply::Failed { code, message })
            }
            other => Err(ProtocolError::UnknownVerb {
                verb: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileState;
    use std::collections::HashMap;

    const HASH: &str = "97a6d21df7c51e88cdd4563832e6d1b723e69ec3ba7b73b97ac0db7eb8d0f0ca";

    #[test]
    fn log_build_round_trips_its_file_set() {
        let file =
            FileState::from_filename("foo-0.1-cp34-cp34m-linux_armv7l.whl", 123_456, HASH)
                .unwrap();
        let mut files = HashMap::new();
        files.insert(file.filename.clone(), file);
        let build =
            BuildState::new(1, "foo", "0.1", "cp34m", true, 300.0, "ok", files).unwrap();

        let request = DbRequest::LogBuild { build };
        let envelope = request.to_envelope().unwrap();
        assert_eq!(envelope.verb, verbs::LOGBUILD);
        assert_eq!(DbRequest::from_envelope(&envelope).unwrap(), request);
    }

    #[test]
    fn reply_decoding_follows_the_request() {
        let reply = DbReply::BuildAbis(vec!["cp34m".into(), "cp35m".into()]);
        let envelope = reply.to_envelope().unwrap();
        let decoded = DbReply::from_envelope(&DbRequest::GetBuildAbis, &envelope).unwrap();
        assert_eq!(decoded, reply);
    }

    #[test]
    fn unknown_request_verb_is_a_protocol_error() {
        let err = DbRequest::from_envelope(&Envelope::new("DROPTABLES")).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownVerb { .. }));
    }

    #[test]
    fn version_pairs_round_trip() {
        let reply = DbReply::PackageVersions(vec![("foo".into(), "0.1".into())]);
        let envelope = reply.to_envelope().unwrap();
        let decoded =
            DbReply::from_envelope(&DbRequest::GetPackageVersions, &envelope).unwrap();
        assert_eq!(decoded, reply);
    }
}
