//! # Tasks
//!
//! The independently scheduled unit of the control plane. A task owns its
//! data channels plus exactly one control channel; its event loop is a
//! multiplexed wait over both, bounded by the poll interval so termination
//! commands are honored within one interval.
//!
//! Implementations provide [`Task::poll`] (service the data channels once,
//! waiting at most one poll interval) and optionally [`Task::drain`]
//! (finish in-flight work before stopping). The runner supplies the control
//! protocol, fault isolation and status broadcasting uniformly, for
//! production tasks and test doubles alike.

pub mod control;

use crate::config::MasterConfig;
use crate::constants::{addresses, error_codes};
use crate::error::{Error, Result, TransportError};
use crate::messaging::{Envelope, MessagingContext, QueueSender, ReqSocket, Router};
use async_trait::async_trait;
use control::{status_envelope, ControlRequest, TaskPhase};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

#[async_trait]
pub trait Task: Send + 'static {
    /// Stable name; also determines the control channel address.
    fn name(&self) -> &str;

    /// Service the data channels once. Must wait no longer than one poll
    /// interval so the runner can interleave control commands.
    async fn poll(&mut self) -> Result<()>;

    /// Finish or abandon in-flight work before stopping. The runner bounds
    /// this with the grace period.
    async fn drain(&mut self) {}
}

/// Client half of a spawned task: the supervisor's view.
#[derive(Debug)]
pub struct TaskHandle {
    name: String,
    control: ReqSocket,
    join: JoinHandle<()>,
    reply_timeout: Duration,
    grace_period: Duration,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.command(ControlRequest::Pause).await
    }

    pub async fn resume(&mut self) -> Result<()> {
        self.command(ControlRequest::Resume).await
    }

    /// Terminate the task and wait for its loop to finish. Idempotent from
    /// the task's perspective: a quit that races the task already stopping
    /// still succeeds.
    pub async fn quit(mut self) -> Result<()> {
        match self.command(ControlRequest::Quit).await {
            Ok(()) => {}
            // Already stopped: the control binding is gone or unresponsive.
            Err(Error::Transport(_)) => {}
            Err(other) => return Err(other),
        }
        match timeout(self.grace_period * 2, &mut self.join).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.join.abort();
                Err(Error::TaskStuck { name: self.name })
            }
        }
    }

    async fn command(&mut self, request: ControlRequest) -> Result<()> {
        self.control.send(request.to_envelope()).await?;
        match self.control.recv(self.reply_timeout).await? {
            Some(reply) if reply.is_ok() => Ok(()),
            Some(reply) => {
                let (code, message) = reply.error_parts()?;
                Err(Error::Configuration {
                    message: format!("task {} refused {request:?}: {code}: {message}", self.name),
                })
            }
            None => Err(Error::Transport(TransportError::SendTimeout {
                address: self.control.address().to_string(),
            })),
        }
    }
}

/// Bind the control channel and start the task's event loop.
///
/// Channel construction failures surface here, synchronously, so the
/// supervisor sees a bad startup before anything runs.
pub fn spawn_task<T: Task>(
    task: T,
    ctx: &MessagingContext,
    config: &MasterConfig,
) -> Result<TaskHandle> {
    let name = task.name().to_string();
    let control_addr = addresses::control(&name);
    let control = ctx.bind_router(&control_addr)?;
    let handle_sock = ctx.connect_req(&control_addr)?;
    // Status broadcasting is best-effort: absent queue means nobody listens.
    let status = ctx.connect_queue(&config.status_queue).ok();

    let runner = TaskRunner {
        name: name.clone(),
        control,
        status,
        poll_interval: config.poll_interval,
        grace_period: config.grace_period,
    };
    let ctx = ctx.clone();
    let join = tokio::spawn(async move {
        runner.run(task).await;
        ctx.unbind(&control_addr);
    });

    Ok(TaskHandle {
        name,
        control: handle_sock,
        join,
        reply_timeout: config.request_timeout,
        grace_period: config.grace_period,
    })
}

struct TaskRunner {
    name: String,
    control: Router,
    status: Option<QueueSender>,
    poll_interval: Duration,
    grace_period: Duration,
}

impl TaskRunner {
    async fn run<T: Task>(mut self, mut task: T) {
        info!(task = %self.name, "task started");
        self.broadcast(TaskPhase::Running);
        let mut paused = false;

        loop {
            // While running, the bounded wait lives in task.poll(); while
            // paused, it moves here so the loop never spins.
            let wait = if paused {
                self.poll_interval
            } else {
                Duration::ZERO
            };
            match self.control.recv(wait).await {
                Ok(Some((peer, envelope))) => match ControlRequest::from_envelope(&envelope) {
                    Ok(ControlRequest::Pause) => {
                        paused = true;
                        self.broadcast(TaskPhase::Paused);
                        let _ = self.control.send(peer, Envelope::ok()).await;
                    }
                    Ok(ControlRequest::Resume) => {
                        paused = false;
                        self.broadcast(TaskPhase::Running);
                        let _ = self.control.send(peer, Envelope::ok()).await;
                    }
                    Ok(ControlRequest::Quit) => {
                        if timeout(self.grace_period, task.drain()).await.is_err() {
                            warn!(task = %self.name, "grace period expired while draining");
                        }
                        self.broadcast(TaskPhase::Stopped);
                        let _ = self.control.send(peer, Envelope::ok()).await;
                        break;
                    }
                    Err(err) => {
                        warn!(task = %self.name, error = %err, "bad control envelope");
                        let _ = self
                            .control
                            .send(peer, Envelope::error(error_codes::PROTOCOL, &err.to_string()))
                            .await;
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    // Control binding gone: the context was torn down.
                    error!(task = %self.name, error = %err, "control channel lost, stopping");
                    break;
                }
            }

            if paused {
                continue;
            }
            if let Err(err) = task.poll().await {
                // One bad message must not take the task down.
                warn!(task = %self.name, error = %err, "task fault, continuing");
            }
        }
        info!(task = %self.name, "task stopped");
    }

    fn broadcast(&self, phase: TaskPhase) {
        if let Some(status) = &self.status {
            if !status.try_send(status_envelope(&self.name, phase)) {
                debug!(task = %self.name, phase = phase.as_str(), "status queue full, update dropped");
            }
        }
    }
}
