//! # Oracle Worker
//!
//! One worker wrapping exclusive access to a single database connection.
//! It registers with the broker, executes one request at a time inside a
//! transaction boundary, replies, and announces itself again. At-most-one
//! in-flight request is enforced by the broker, not here; the worker simply
//! never reads a second work unit before answering the first.

use crate::broker::protocol::{WorkUnit, WorkerMsg};
use crate::config::MasterConfig;
use crate::constants::error_codes;
use crate::database::Database;
use crate::error::Result;
use crate::messaging::{DealerSocket, Envelope, MessagingContext};
use crate::oracle::requests::DbRequest;
use crate::tasks::Task;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct OracleWorker {
    name: String,
    back: DealerSocket,
    db: Database,
    dsn: String,
    connect_retries: u32,
    poll_interval: Duration,
    heartbeat_interval: Duration,
    last_announce: Option<Instant>,
}

impl OracleWorker {
    /// Acquire the database connection (bounded retries), apply the schema
    /// and connect to the broker backend. Failures here are fatal and
    /// reported to the supervisor before the task ever runs.
    pub async fn new(
        ctx: &MessagingContext,
        config: &MasterConfig,
        index: usize,
    ) -> Result<Self> {
        let mut db = Database::connect(&config.dsn, config.db_connect_retries).await?;
        db.ensure_schema().await?;
        let back = ctx.connect_dealer(&config.oracle_queue)?;
        Ok(Self {
            name: format!("oracle-{index}"),
            back,
            db,
            dsn: config.dsn.clone(),
            connect_retries: config.db_connect_retries,
            poll_interval: config.poll_interval,
            heartbeat_interval: config.heartbeat_interval,
            last_announce: None,
        })
    }

    async fn announce(&mut self) -> Result<()> {
        let envelope = WorkerMsg::Ready
            .to_envelope()
            .map_err(crate::error::Error::from)?;
        self.back.send(envelope).await?;
        self.last_announce = Some(Instant::now());
        Ok(())
    }

    /// Run one request against the database and shape the outcome as a
    /// reply envelope. Resource failures become `ERROR` replies; the worker
    /// itself keeps running.
    async fn serve(&mut self, request: Envelope) -> Envelope {
        let request = match DbRequest::from_envelope(&request) {
            Ok(request) => request,
            Err(err) => {
                warn!(worker = %self.name, error = %err, "unserviceable request");
                return Envelope::error(error_codes::PROTOCOL, &err.to_string());
            }
        };
        let outcome = match self.db.execute(&request).await {
            Err(err) if is_connection_error(&err) => {
                // The resource went away mid-run. Reacquire it (bounded) and
                // give the request one more chance before failing it.
                warn!(worker = %self.name, error = %err, "database connection lost, reconnecting");
                match Database::connect(&self.dsn, self.connect_retries).await {
                    Ok(db) => {
                        self.db = db;
                        self.db.execute(&request).await
                    }
                    Err(reconnect_err) => {
                        return Envelope::error(
                            error_codes::WORKER_FAILURE,
                            &reconnect_err.to_string(),
                        )
                    }
                }
            }
            outcome => outcome,
        };
        match outcome {
            Ok(reply) => reply.to_envelope().unwrap_or_else(|err| {
                Envelope::error(error_codes::WORKER_FAILURE, &err.to_string())
            }),
            Err(err) => {
                warn!(worker = %self.name, error = %err, "request failed against the database");
                Envelope::error(error_codes::WORKER_FAILURE, &err.to_string())
            }
        }
    }
}

fn is_connection_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::WorkerCrashed
    )
}

impl OracleWorker {
    /// Serve one dispatched unit and answer with `DONE`.
    async fn handle(&mut self, envelope: Envelope) -> Result<()> {
        match WorkUnit::from_envelope(&envelope) {
            Ok(unit) => {
                debug!(worker = %self.name, verb = %unit.request.verb, "serving request");
                let reply = self.serve(unit.request).await;
                let done = WorkerMsg::Done {
                    client: unit.client,
                    reply,
                }
                .to_envelope()
                .map_err(crate::error::Error::from)?;
                self.back.send(done).await?;
                // DONE counts as liveness; no need to re-announce yet.
                self.last_announce = Some(Instant::now());
            }
            Err(err) => {
                warn!(worker = %self.name, error = %err, "unexpected backend envelope");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Task for OracleWorker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Result<()> {
        // A unit already dispatched to this socket wins over a due
        // heartbeat: announcing READY with work pending reads to the broker
        // as a restart and fails the waiting client.
        if let Some(envelope) = self.back.recv(Duration::ZERO).await? {
            return self.handle(envelope).await;
        }

        // READY doubles as registration and idle heartbeat; the broker
        // refreshes liveness on every one it sees.
        let due = match self.last_announce {
            None => true,
            Some(at) => at.elapsed() >= self.heartbeat_interval,
        };
        if due {
            self.announce().await?;
        }

        if let Some(envelope) = self.back.recv(self.poll_interval).await? {
            self.handle(envelope).await?;
        }
        Ok(())
    }
}
