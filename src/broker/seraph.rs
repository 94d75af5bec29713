//! # Seraph, the Load-Balancing Broker
//!
//! Multiplexes many request/reply clients onto a small pool of workers, each
//! of which wraps a serialized resource and therefore must never see two
//! concurrent requests. The broker is the only component aware of the full
//! worker set.
//!
//! Worker lifecycle, as the broker sees it:
//! `UNKNOWN -> REGISTERED/IDLE -> BUSY -> IDLE -> ... -> REMOVED`, where
//! registration happens on `READY`, busy on dispatch, idle again on `DONE`,
//! and removal after a full liveness window of silence. Idle workers are
//! dispatched least-recently-used by completion so load spreads evenly and a
//! stuck worker surfaces quickly.
//!
//! Requests that cannot be dispatched queue FIFO up to a bounded depth; past
//! it the oldest queued request is failed back with `BROKER_OVERLOADED`.
//! Requests dispatched to a worker that then vanishes are failed back with
//! `WORKER_LOST` within one liveness window, never left pending.

use crate::broker::protocol::{WorkUnit, WorkerMsg};
use crate::config::MasterConfig;
use crate::constants::error_codes;
use crate::error::Result;
use crate::messaging::{Envelope, MessagingContext, PeerId, Router};
use crate::tasks::Task;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// Cap on envelopes handled per channel per poll, so one busy channel cannot
// starve the other or the control loop.
const DRAIN_LIMIT: usize = 32;

#[derive(Debug)]
struct WorkerEntry {
    last_seen: Instant,
    in_flight: Option<InFlight>,
}

#[derive(Debug)]
struct InFlight {
    client: PeerId,
    dispatched_at: Instant,
}

#[derive(Debug)]
struct QueuedRequest {
    client: PeerId,
    request: Envelope,
}

pub struct Seraph {
    name: String,
    front: Router,
    back: Router,
    workers: HashMap<PeerId, WorkerEntry>,
    /// Idle workers, least-recently-used at the front.
    idle: VecDeque<PeerId>,
    queue: VecDeque<QueuedRequest>,
    queue_depth: usize,
    liveness_window: Duration,
    poll_interval: Duration,
}

impl Seraph {
    /// Bind both sides of the broker. Bind conflicts surface here and are
    /// fatal at startup.
    pub fn new(
        ctx: &MessagingContext,
        config: &MasterConfig,
        name: &str,
        front_address: &str,
        back_address: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            front: ctx.bind_router(front_address)?,
            back: ctx.bind_router(back_address)?,
            workers: HashMap::new(),
            idle: VecDeque::new(),
            queue: VecDeque::new(),
            queue_depth: config.broker_queue_depth,
            liveness_window: config.liveness_window,
            poll_interval: config.poll_interval,
        })
    }

    /// The broker serving database persistence requests.
    pub fn db_broker(ctx: &MessagingContext, config: &MasterConfig) -> Result<Self> {
        Self::new(ctx, config, "seraph-db", &config.db_queue, &config.oracle_queue)
    }

    fn idle_count(&self) -> usize {
        self.idle.len()
    }

    async fn handle_backend(&mut self, worker: PeerId, envelope: Envelope) {
        match WorkerMsg::from_envelope(&envelope) {
            Ok(WorkerMsg::Ready) => self.handle_ready(worker).await,
            Ok(WorkerMsg::Done { client, reply }) => {
                self.handle_done(worker, client, reply).await;
            }
            Err(err) => {
                warn!(broker = %self.name, %worker, error = %err, "bad backend envelope");
                let _ = self
                    .back
                    .send(worker, Envelope::error(error_codes::PROTOCOL, &err.to_string()))
                    .await;
            }
        }
    }

    async fn handle_ready(&mut self, worker: PeerId) {
        let now = Instant::now();
        let abandoned = {
            let entry = self.workers.entry(worker).or_insert_with(|| {
                debug!(broker = %self.name, %worker, "worker registered");
                WorkerEntry {
                    last_seen: now,
                    in_flight: None,
                }
            });
            entry.last_seen = now;
            entry.in_flight.take()
        };
        if let Some(in_flight) = abandoned {
            // READY from a busy worker means it restarted mid-request; the
            // reply will never come.
            warn!(broker = %self.name, %worker, "worker re-announced while busy");
            self.fail_client(in_flight.client, error_codes::WORKER_LOST, "worker restarted")
                .await;
        }
        if !self.idle.contains(&worker) {
            self.idle.push_back(worker);
        }
    }

    async fn handle_done(&mut self, worker: PeerId, client: PeerId, reply: Envelope) {
        let Some(entry) = self.workers.get_mut(&worker) else {
            // Worker was removed after the liveness window; its client has
            // already received WORKER_LOST, so a late reply must be dropped
            // rather than corrupting the client's request/reply alternation.
            warn!(broker = %self.name, %worker, "late reply from removed worker dropped");
            return;
        };
        entry.last_seen = Instant::now();
        match entry.in_flight.take() {
            Some(in_flight) if in_flight.client == client => {}
            Some(current) => {
                // Stale DONE racing a newer dispatch. The client it names was
                // already failed; forwarding the reply would desynchronize
                // that client's request/reply alternation.
                warn!(
                    broker = %self.name, %worker, %client,
                    expected = %current.client,
                    "stale reply dropped"
                );
                entry.in_flight = Some(current);
                return;
            }
            None => {
                // Worker re-announced while this unit was in its socket; the
                // client already received WORKER_LOST.
                warn!(broker = %self.name, %worker, %client, "reply without a dispatched request dropped");
                if !self.idle.contains(&worker) {
                    self.idle.push_back(worker);
                }
                return;
            }
        }
        // LRU by completion: just-finished workers go to the back.
        if !self.idle.contains(&worker) {
            self.idle.push_back(worker);
        }
        if let Err(err) = self.front.send(client, reply).await {
            warn!(broker = %self.name, %client, error = %err, "client gone, reply dropped");
        }
    }

    async fn handle_frontend(&mut self, client: PeerId, request: Envelope) {
        self.queue.push_back(QueuedRequest { client, request });
        // The depth bound applies to requests no idle worker can absorb.
        self.dispatch().await;
        if self.queue.len() > self.queue_depth {
            // Bounded-queue backpressure: fail the oldest, not the newest.
            if let Some(oldest) = self.queue.pop_front() {
                debug!(broker = %self.name, client = %oldest.client, "queue over depth, failing oldest");
                self.fail_client(
                    oldest.client,
                    error_codes::BROKER_OVERLOADED,
                    "request queue full",
                )
                .await;
            }
        }
    }

    async fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(worker) = self.idle.pop_front() else {
                return;
            };
            // Stale idle entries can linger after a liveness removal.
            if !self.workers.contains_key(&worker) {
                continue;
            }
            let Some(queued) = self.queue.pop_front() else {
                self.idle.push_front(worker);
                return;
            };
            let unit = WorkUnit {
                client: queued.client,
                request: queued.request,
            };
            let envelope = match unit.to_envelope() {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(broker = %self.name, error = %err, "unencodable work unit dropped");
                    self.fail_client(unit.client, error_codes::PROTOCOL, "unencodable request")
                        .await;
                    self.idle.push_front(worker);
                    continue;
                }
            };
            match self.back.send(worker, envelope).await {
                Ok(()) => {
                    if let Some(entry) = self.workers.get_mut(&worker) {
                        entry.in_flight = Some(InFlight {
                            client: unit.client,
                            dispatched_at: Instant::now(),
                        });
                    }
                }
                Err(err) => {
                    warn!(broker = %self.name, %worker, error = %err, "dispatch failed, worker dropped");
                    self.workers.remove(&worker);
                    // Put the request back at the head; another worker gets it.
                    self.queue.push_front(QueuedRequest {
                        client: unit.client,
                        request: unit.request,
                    });
                }
            }
        }
    }

    async fn sweep_liveness(&mut self) {
        // Reconnecting clients mint fresh identities; forget the dead ones.
        self.front.prune_peers();
        self.back.prune_peers();

        let now = Instant::now();
        let expired: Vec<PeerId> = self
            .workers
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_seen) > self.liveness_window)
            .map(|(worker, _)| *worker)
            .collect();
        for worker in expired {
            if let Some(entry) = self.workers.remove(&worker) {
                warn!(broker = %self.name, %worker, "worker silent past liveness window, removed");
                self.idle.retain(|idle| *idle != worker);
                if let Some(in_flight) = entry.in_flight {
                    debug!(
                        broker = %self.name, %worker,
                        in_flight_for = ?now.duration_since(in_flight.dispatched_at),
                        "failing request dispatched to dead worker"
                    );
                    self.fail_client(
                        in_flight.client,
                        error_codes::WORKER_LOST,
                        "worker stopped responding",
                    )
                    .await;
                }
            }
        }
    }

    async fn fail_client(&mut self, client: PeerId, code: &str, message: &str) {
        if let Err(err) = self.front.send(client, Envelope::error(code, message)).await {
            warn!(broker = %self.name, %client, error = %err, "client gone, failure reply dropped");
        }
    }
}

#[async_trait]
impl Task for Seraph {
    fn name(&self) -> &str {
        &self.name
    }

    async fn poll(&mut self) -> Result<()> {
        self.sweep_liveness().await;

        // Drain the backend first so completed workers are idle again before
        // new requests are considered.
        let mut activity = false;
        for _ in 0..DRAIN_LIMIT {
            match self.back.recv(Duration::ZERO).await? {
                Some((worker, envelope)) => {
                    activity = true;
                    self.handle_backend(worker, envelope).await;
                }
                None => break,
            }
        }
        for _ in 0..DRAIN_LIMIT {
            match self.front.recv(Duration::ZERO).await? {
                Some((client, request)) => {
                    activity = true;
                    self.handle_frontend(client, request).await;
                }
                None => break,
            }
        }
        self.dispatch().await;

        if !activity {
            // Nothing ready: block for up to one poll interval, split across
            // both channels, so the loop stays responsive without spinning.
            if let Some((worker, envelope)) = self.back.recv(self.poll_interval / 2).await? {
                self.handle_backend(worker, envelope).await;
            } else if let Some((client, request)) = self.front.recv(self.poll_interval / 2).await? {
                self.handle_frontend(client, request).await;
            }
            self.dispatch().await;
        }
        Ok(())
    }

    async fn drain(&mut self) {
        // No worker will serve queued requests after shutdown; fail them now
        // rather than leaving clients to time out.
        while let Some(queued) = self.queue.pop_front() {
            self.fail_client(queued.client, error_codes::WORKER_LOST, "broker shutting down")
                .await;
        }
        info!(broker = %self.name, idle = self.idle_count(), "broker drained");
    }
}
