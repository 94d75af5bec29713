//! # Database Client
//!
//! The client-side wrapper every coordinating task uses to talk to the
//! oracle pool through the broker. Strict request/reply with a bounded
//! retry policy: contention failures (`BROKER_OVERLOADED`, `WORKER_LOST`)
//! and reply timeouts are retried with a linear backoff; validation
//! rejections are surfaced verbatim and never retried.
//!
//! A timed-out request leaves a strict socket stuck mid-alternation, so the
//! client reconnects before retrying rather than violating the pattern.

use crate::config::MasterConfig;
use crate::constants::error_codes;
use crate::error::{DbError, Error, Result};
use crate::messaging::{MessagingContext, ReqSocket};
use crate::models::{BuildState, DownloadState, LoggedBuild};
use crate::oracle::requests::{DbRequest, DbReply};
use std::time::Duration;
use tracing::{debug, warn};

pub struct DbClient {
    ctx: MessagingContext,
    address: String,
    sock: ReqSocket,
    reply_timeout: Duration,
    retries: u32,
    backoff: Duration,
}

impl DbClient {
    pub fn new(ctx: &MessagingContext, config: &MasterConfig) -> Result<Self> {
        Ok(Self {
            ctx: ctx.clone(),
            address: config.db_queue.clone(),
            sock: ctx.connect_req(&config.db_queue)?,
            reply_timeout: config.request_timeout,
            retries: config.request_retries,
            backoff: config.poll_interval,
        })
    }

    /// Issue one request, retrying contention failures up to the budget.
    pub async fn request(&mut self, request: DbRequest) -> Result<DbReply> {
        let envelope = request.to_envelope()?;
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            self.sock.send(envelope.clone()).await?;
            let Some(reply) = self.sock.recv(self.reply_timeout).await? else {
                // No reply: the socket is stuck awaiting one, reconnect.
                self.sock = self.ctx.connect_req(&self.address)?;
                if attempts > self.retries {
                    return Err(DbError::Timeout {
                        timeout_ms: self.reply_timeout.as_millis() as u64,
                        attempts,
                    }
                    .into());
                }
                warn!(verb = %envelope.verb, attempts, "no reply from broker, retrying");
                continue;
            };

            if reply.is_error() {
                let (code, message) = reply.error_parts()?;
                let retryable = matches!(
                    code.as_str(),
                    error_codes::BROKER_OVERLOADED | error_codes::WORKER_LOST
                );
                if retryable && attempts <= self.retries {
                    debug!(verb = %envelope.verb, %code, attempts, "contention failure, retrying");
                    tokio::time::sleep(self.backoff * attempts).await;
                    continue;
                }
                return Err(match code.as_str() {
                    error_codes::BROKER_OVERLOADED => DbError::BrokerOverloaded.into(),
                    error_codes::WORKER_LOST => DbError::WorkerLost.into(),
                    _ => Error::Db(DbError::WorkerFailure {
                        message: format!("{code}: {message}"),
                    }),
                });
            }

            return match DbReply::from_envelope(&request, &reply)? {
                DbReply::Rejected { reason } => Err(DbError::Rejected { reason }.into()),
                reply => Ok(reply),
            };
        }
    }

    pub async fn new_package(&mut self, package: &str) -> Result<()> {
        self.request(DbRequest::NewPackage {
            package: package.to_string(),
        })
        .await
        .map(|_| ())
    }

    pub async fn new_version(&mut self, package: &str, version: &str) -> Result<()> {
        self.request(DbRequest::NewVersion {
            package: package.to_string(),
            version: version.to_string(),
        })
        .await
        .map(|_| ())
    }

    /// Persist a build, consuming the unlogged state and returning the
    /// logged form carrying the assigned identifier.
    pub async fn log_build(&mut self, build: BuildState) -> Result<LoggedBuild> {
        let reply = self
            .request(DbRequest::LogBuild {
                build: build.clone(),
            })
            .await?;
        match reply {
            DbReply::BuildLogged { build_id } => Ok(build.log(build_id)),
            other => Err(Error::Db(DbError::WorkerFailure {
                message: format!("unexpected reply to LOGBUILD: {other:?}"),
            })),
        }
    }

    pub async fn log_download(&mut self, download: DownloadState) -> Result<()> {
        self.request(DbRequest::LogDownload { download })
            .await
            .map(|_| ())
    }

    pub async fn get_build_abis(&mut self) -> Result<Vec<String>> {
        match self.request(DbRequest::GetBuildAbis).await? {
            DbReply::BuildAbis(abis) => Ok(abis),
            other => Err(unexpected("GETABIS", &other)),
        }
    }

    pub async fn get_package_names(&mut self) -> Result<Vec<String>> {
        match self.request(DbRequest::GetPackageNames).await? {
            DbReply::PackageNames(names) => Ok(names),
            other => Err(unexpected("GETPKGNAMES", &other)),
        }
    }

    pub async fn get_package_versions(&mut self) -> Result<Vec<(String, String)>> {
        match self.request(DbRequest::GetPackageVersions).await? {
            DbReply::PackageVersions(pairs) => Ok(pairs),
            other => Err(unexpected("GETVERSIONS", &other)),
        }
    }
}

fn unexpected(verb: &str, reply: &DbReply) -> Error {
    Error::Db(DbError::WorkerFailure {
        message: format!("unexpected reply to {verb}: {reply:?}"),
    })
}
