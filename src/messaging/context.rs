//! # Messaging Context
//!
//! Explicitly constructed registry mapping channel addresses to their bound
//! endpoints. The supervisor builds one context and hands a clone to every
//! task at construction; there is no process-wide singleton.
//!
//! Each address has exactly one bound endpoint and zero or more connected
//! peers, matching its delivery pattern. Teardown order matters: stop the
//! producing tasks first, then [`MessagingContext::close`], then drop the
//! consuming endpoints.

use crate::config::MasterConfig;
use crate::error::{Result, TransportError};
use crate::messaging::channel::{
    DealerSocket, PairSocket, QueueReceiver, QueueSender, ReqSocket, Router, RouterInbound,
};
use crate::messaging::envelope::Envelope;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug)]
struct PairPeerEnds {
    tx: mpsc::Sender<Envelope>,
    rx: mpsc::Receiver<Envelope>,
}

#[derive(Debug)]
enum Binding {
    Queue { tx: mpsc::Sender<Envelope> },
    Router { tx: mpsc::Sender<RouterInbound> },
    Pair { slot: Mutex<Option<PairPeerEnds>> },
}

impl Binding {
    fn pattern(&self) -> &'static str {
        match self {
            Binding::Queue { .. } => "queue",
            Binding::Router { .. } => "req/rep",
            Binding::Pair { .. } => "pair",
        }
    }
}

#[derive(Debug)]
struct ContextInner {
    bindings: DashMap<String, Binding>,
    high_water_mark: usize,
    send_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MessagingContext {
    inner: Arc<ContextInner>,
}

impl MessagingContext {
    pub fn new(config: &MasterConfig) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                bindings: DashMap::new(),
                high_water_mark: config.high_water_mark.max(1),
                send_timeout: config.send_timeout,
            }),
        }
    }

    /// Bind the consuming end of a one-way queue.
    pub fn bind_queue(&self, address: &str) -> Result<QueueReceiver> {
        let (tx, rx) = mpsc::channel(self.inner.high_water_mark);
        self.insert(address, Binding::Queue { tx })?;
        Ok(QueueReceiver {
            address: address.to_string(),
            rx,
        })
    }

    /// Connect a producing end to a bound one-way queue.
    pub fn connect_queue(&self, address: &str) -> Result<QueueSender> {
        let binding = self.lookup(address)?;
        match binding.value() {
            Binding::Queue { tx } => Ok(QueueSender {
                address: address.to_string(),
                tx: tx.clone(),
                send_timeout: self.inner.send_timeout,
            }),
            other => Err(self.mismatch(address, other)),
        }
    }

    /// Bind the multiplexing end of a request/reply channel.
    pub fn bind_router(&self, address: &str) -> Result<Router> {
        let (tx, rx) = mpsc::channel(self.inner.high_water_mark);
        self.insert(address, Binding::Router { tx })?;
        Ok(Router {
            address: address.to_string(),
            rx,
            peers: Default::default(),
            send_timeout: self.inner.send_timeout,
        })
    }

    /// Connect a strictly alternating request client.
    pub fn connect_req(&self, address: &str) -> Result<ReqSocket> {
        Ok(ReqSocket {
            inner: self.connect_dealer(address)?,
            awaiting_reply: false,
        })
    }

    /// Connect a free-running request client (broker workers).
    pub fn connect_dealer(&self, address: &str) -> Result<DealerSocket> {
        let binding = self.lookup(address)?;
        match binding.value() {
            Binding::Router { tx } => {
                let (reply_tx, reply_rx) = mpsc::channel(self.inner.high_water_mark);
                Ok(DealerSocket {
                    address: address.to_string(),
                    peer_id: Uuid::new_v4(),
                    tx: tx.clone(),
                    reply_tx,
                    reply_rx,
                    send_timeout: self.inner.send_timeout,
                })
            }
            other => Err(self.mismatch(address, other)),
        }
    }

    /// Bind one side of a symmetric pair.
    pub fn bind_pair(&self, address: &str) -> Result<PairSocket> {
        let (to_peer_tx, to_peer_rx) = mpsc::channel(self.inner.high_water_mark);
        let (to_bound_tx, to_bound_rx) = mpsc::channel(self.inner.high_water_mark);
        self.insert(
            address,
            Binding::Pair {
                slot: Mutex::new(Some(PairPeerEnds {
                    tx: to_bound_tx,
                    rx: to_peer_rx,
                })),
            },
        )?;
        Ok(PairSocket {
            address: address.to_string(),
            tx: to_peer_tx,
            rx: to_bound_rx,
            send_timeout: self.inner.send_timeout,
        })
    }

    /// Connect the single peer of a bound pair. A second connect fails with
    /// `AddressInUse` since a pair admits exactly one peer per side.
    pub fn connect_pair(&self, address: &str) -> Result<PairSocket> {
        let binding = self.lookup(address)?;
        match binding.value() {
            Binding::Pair { slot } => {
                let ends = slot
                    .lock()
                    .take()
                    .ok_or_else(|| TransportError::AddressInUse {
                        address: address.to_string(),
                    })?;
                Ok(PairSocket {
                    address: address.to_string(),
                    tx: ends.tx,
                    rx: ends.rx,
                    send_timeout: self.inner.send_timeout,
                })
            }
            other => Err(self.mismatch(address, other)),
        }
    }

    /// Release a bound address so it can be bound again (task restart).
    pub fn unbind(&self, address: &str) {
        self.inner.bindings.remove(address);
    }

    /// Drop every binding. Connected senders observe `Closed` once their own
    /// clones drop; call only after producing tasks have stopped.
    pub fn close(&self) {
        self.inner.bindings.clear();
    }

    fn insert(&self, address: &str, binding: Binding) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.inner.bindings.entry(address.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AddressInUse {
                address: address.to_string(),
            }
            .into()),
            Entry::Vacant(slot) => {
                slot.insert(binding);
                Ok(())
            }
        }
    }

    fn lookup(
        &self,
        address: &str,
    ) -> Result<dashmap::mapref::one::Ref<'_, String, Binding>> {
        self.inner
            .bindings
            .get(address)
            .ok_or_else(|| {
                TransportError::Unreachable {
                    address: address.to_string(),
                }
                .into()
            })
    }

    fn mismatch(&self, address: &str, bound: &Binding) -> crate::error::Error {
        TransportError::PatternMismatch {
            address: address.to_string(),
            expected: bound.pattern().to_string(),
        }
        .into()
    }
}
