//! Task event-loop tests: the PAUSE/RESUME/QUIT control protocol, status
//! broadcasting and per-message fault isolation.

mod common;

use async_trait::async_trait;
use common::fast_config;
use std::time::Duration;
use wheelhouse_core::constants::addresses;
use wheelhouse_core::error::{Error, Result};
use wheelhouse_core::messaging::{Envelope, MessagingContext, QueueReceiver, QueueSender};
use wheelhouse_core::tasks::{spawn_task, Task, TaskHandle};
use wheelhouse_core::MasterConfig;

/// Minimal task: forwards envelopes from one queue to another, failing on a
/// `BOOM` envelope to exercise fault isolation.
struct EchoTask {
    input: QueueReceiver,
    output: QueueSender,
    poll_interval: Duration,
}

impl EchoTask {
    fn new(ctx: &MessagingContext, config: &MasterConfig) -> Result<Self> {
        Ok(Self {
            input: ctx.bind_queue("inproc://echo-in")?,
            output: ctx.connect_queue("inproc://echo-out")?,
            poll_interval: config.poll_interval,
        })
    }
}

#[async_trait]
impl Task for EchoTask {
    fn name(&self) -> &str {
        "echo"
    }

    async fn poll(&mut self) -> Result<()> {
        if let Some(envelope) = self.input.recv(self.poll_interval).await? {
            if envelope.verb == "BOOM" {
                return Err(Error::Configuration {
                    message: "poison envelope".to_string(),
                });
            }
            self.output.send(envelope).await?;
        }
        Ok(())
    }
}

struct Harness {
    ctx: MessagingContext,
    out: QueueReceiver,
    input: QueueSender,
    handle: TaskHandle,
}

/// Bind the output queue, start an echo task and connect to its input.
fn start_echo() -> Harness {
    let config = fast_config();
    let ctx = MessagingContext::new(&config);
    let out = ctx.bind_queue("inproc://echo-out").unwrap();
    let task = EchoTask::new(&ctx, &config).unwrap();
    let input = ctx.connect_queue("inproc://echo-in").unwrap();
    let handle = spawn_task(task, &ctx, &config).unwrap();
    Harness {
        ctx,
        out,
        input,
        handle,
    }
}

#[tokio::test]
async fn pause_resume_quit_lifecycle() {
    let mut h = start_echo();

    h.input.send(Envelope::new("ONE")).await.unwrap();
    let got = h.out.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(got.verb, "ONE");

    h.handle.pause().await.unwrap();
    h.input.send(Envelope::new("TWO")).await.unwrap();
    // Paused: data channels are not serviced, but the message is not lost.
    assert!(h.out.recv(Duration::from_millis(100)).await.unwrap().is_none());

    h.handle.resume().await.unwrap();
    let got = h.out.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(got.verb, "TWO");

    h.handle.quit().await.unwrap();
}

#[tokio::test]
async fn quit_races_an_already_stopped_task() {
    let h = start_echo();

    // Stop the task through a second control client, as a supervisor
    // restart path would.
    let mut side = h.ctx.connect_req(&addresses::control("echo")).unwrap();
    side.send(Envelope::new("QUIT")).await.unwrap();
    let reply = side.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert!(reply.is_ok());

    // The handle's own quit arrives after the task stopped; still fine.
    h.handle.quit().await.unwrap();
}

#[tokio::test]
async fn unknown_control_verb_is_answered_not_fatal() {
    let mut h = start_echo();

    let mut side = h.ctx.connect_req(&addresses::control("echo")).unwrap();
    side.send(Envelope::new("REBOOT")).await.unwrap();
    let reply = side.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert!(reply.is_error());

    // Task is still alive and serviceable.
    h.input.send(Envelope::new("STILL-HERE")).await.unwrap();
    let got = h.out.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(got.verb, "STILL-HERE");

    h.handle.quit().await.unwrap();
}

#[tokio::test]
async fn one_bad_message_does_not_kill_the_task() {
    let mut h = start_echo();

    h.input.send(Envelope::new("BOOM")).await.unwrap();
    h.input.send(Envelope::new("AFTER")).await.unwrap();

    let got = h.out.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(got.verb, "AFTER");

    h.handle.quit().await.unwrap();
}

#[tokio::test]
async fn lifecycle_transitions_are_broadcast() {
    let config = fast_config();
    let ctx = MessagingContext::new(&config);
    let mut status = ctx.bind_queue(&config.status_queue).unwrap();
    ctx.bind_queue("inproc://echo-out").unwrap();
    let task = EchoTask::new(&ctx, &config).unwrap();
    let mut handle = spawn_task(task, &ctx, &config).unwrap();

    let update = status.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(update.verb, "STATUS");
    assert_eq!(update.decode_arg::<String>(0).unwrap(), "echo");
    assert_eq!(update.decode_arg::<String>(1).unwrap(), "running");

    handle.pause().await.unwrap();
    let update = status.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(update.decode_arg::<String>(1).unwrap(), "paused");

    handle.quit().await.unwrap();
    let update = status.recv(Duration::from_millis(500)).await.unwrap().unwrap();
    assert_eq!(update.decode_arg::<String>(1).unwrap(), "stopped");
}
