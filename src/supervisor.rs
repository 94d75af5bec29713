//! # Supervisor
//!
//! Process-level owner of the control plane: constructs the messaging
//! context, wires channel addresses, starts the broker and the oracle pool,
//! and tears everything down in a safe order on shutdown.
//!
//! Teardown order is producers first: adopted client tasks stop before the
//! oracle workers, workers before the broker, and the context closes last so
//! no consumer-side endpoint disappears under a live producer.

use crate::broker::Seraph;
use crate::config::MasterConfig;
use crate::error::Result;
use crate::messaging::{Envelope, MessagingContext, QueueReceiver};
use crate::oracle::{DbClient, OracleWorker};
use crate::tasks::{spawn_task, Task, TaskHandle};
use futures::future::join_all;
use std::time::Duration;
use tracing::{error, info};

pub struct Supervisor {
    ctx: MessagingContext,
    config: MasterConfig,
    status: QueueReceiver,
    broker: Option<TaskHandle>,
    workers: Vec<TaskHandle>,
    adopted: Vec<TaskHandle>,
}

impl Supervisor {
    /// Start the database broker and its worker pool. Any channel bind or
    /// database connect failure aborts startup here.
    pub async fn start(config: MasterConfig) -> Result<Self> {
        let ctx = MessagingContext::new(&config);
        let status = ctx.bind_queue(&config.status_queue)?;

        let broker = spawn_task(Seraph::db_broker(&ctx, &config)?, &ctx, &config)?;
        let mut workers = Vec::with_capacity(config.oracle_workers);
        for index in 0..config.oracle_workers {
            let worker = OracleWorker::new(&ctx, &config, index).await?;
            workers.push(spawn_task(worker, &ctx, &config)?);
        }
        info!(workers = workers.len(), "control plane started");

        Ok(Self {
            ctx,
            config,
            status,
            broker: Some(broker),
            workers,
            adopted: Vec::new(),
        })
    }

    pub fn context(&self) -> &MessagingContext {
        &self.ctx
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// A fresh client of the database broker.
    pub fn db_client(&self) -> Result<DbClient> {
        DbClient::new(&self.ctx, &self.config)
    }

    /// Start an additional task under this supervisor; it will be stopped
    /// before the broker and workers on shutdown.
    pub fn spawn<T: Task>(&mut self, task: T) -> Result<()> {
        let handle = spawn_task(task, &self.ctx, &self.config)?;
        self.adopted.push(handle);
        Ok(())
    }

    /// Next task status broadcast, if one arrives within `wait`.
    pub async fn status_update(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        self.status.recv(wait).await
    }

    /// Ordered shutdown. Quit commands are idempotent; a task that already
    /// stopped is not an error.
    pub async fn stop(mut self) -> Result<()> {
        let mut first_failure = None;

        for handle in self.adopted.drain(..) {
            record(&mut first_failure, handle.quit().await);
        }
        for outcome in join_all(self.workers.drain(..).map(TaskHandle::quit)).await {
            record(&mut first_failure, outcome);
        }
        if let Some(broker) = self.broker.take() {
            record(&mut first_failure, broker.quit().await);
        }
        self.ctx.close();

        match first_failure {
            None => {
                info!("control plane stopped");
                Ok(())
            }
            Some(err) => {
                error!(error = %err, "shutdown completed with failures");
                Err(err)
            }
        }
    }
}

fn record(first_failure: &mut Option<crate::error::Error>, outcome: Result<()>) {
    if let Err(err) = outcome {
        if first_failure.is_none() {
            *first_failure = Some(err);
        }
    }
}
