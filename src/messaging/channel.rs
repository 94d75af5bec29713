//! # Channel Endpoints
//!
//! Typed endpoints over in-process bounded channels, one flavor per delivery
//! pattern:
//!
//! - **one-way queue**: many [`QueueSender`]s feeding one bound
//!   [`QueueReceiver`]; each envelope reaches exactly one consumer and
//!   per-producer order is preserved.
//! - **request/reply**: a bound [`Router`] addressing many connected peers by
//!   identity. [`ReqSocket`] enforces strict send/receive alternation;
//!   [`DealerSocket`] is the free-running variant used by broker workers,
//!   which must announce `READY` between requests.
//! - **symmetric pair**: exactly one [`PairSocket`] on each side, either may
//!   send or receive at will.
//!
//! Every endpoint honors the channel contract: `send` blocks under
//! backpressure up to the configured send timeout and never silently drops;
//! `recv` waits up to its timeout and yields `Ok(None)` on expiry, which is
//! not an error.

use crate::error::{ProtocolError, Result, TransportError};
use crate::messaging::envelope::Envelope;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

/// Identity of a connected request/reply peer, assigned at connect time and
/// attached to every envelope the bound side receives.
pub type PeerId = Uuid;

/// One queued inbound message on a router binding.
#[derive(Debug)]
pub(crate) struct RouterInbound {
    pub peer: PeerId,
    pub reply_tx: mpsc::Sender<Envelope>,
    pub envelope: Envelope,
}

/// Consuming end of a one-way queue (the bound endpoint).
#[derive(Debug)]
pub struct QueueReceiver {
    pub(crate) address: String,
    pub(crate) rx: mpsc::Receiver<Envelope>,
}

impl QueueReceiver {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        match timeout(wait, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Some(envelope)) => Ok(Some(envelope)),
        }
    }
}

/// Producing end of a one-way queue.
#[derive(Debug, Clone)]
pub struct QueueSender {
    pub(crate) address: String,
    pub(crate) tx: mpsc::Sender<Envelope>,
    pub(crate) send_timeout: Duration,
}

impl QueueSender {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send, blocking under backpressure up to the send timeout.
    pub async fn send(&self, envelope: Envelope) -> Result<()> {
        match timeout(self.send_timeout, self.tx.send(envelope)).await {
            Err(_) => Err(TransportError::SendTimeout {
                address: self.address.clone(),
            }
            .into()),
            Ok(Err(_)) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Non-blocking send for pub-style broadcasts; returns false when the
    /// queue is at its high-water mark or closed.
    pub fn try_send(&self, envelope: Envelope) -> bool {
        self.tx.try_send(envelope).is_ok()
    }
}

/// Bound side of a request/reply channel, multiplexing many peers.
///
/// `recv` yields `(peer, envelope)`; `send` routes a reply back to the named
/// peer. The router itself imposes no alternation, its peers do.
#[derive(Debug)]
pub struct Router {
    pub(crate) address: String,
    pub(crate) rx: mpsc::Receiver<RouterInbound>,
    pub(crate) peers: HashMap<PeerId, mpsc::Sender<Envelope>>,
    pub(crate) send_timeout: Duration,
}

impl Router {
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Peers the router can currently address.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Forget peers whose receiving half is gone. Without this the peer map
    /// grows by one entry per reconnect for the life of the binding.
    pub fn prune_peers(&mut self) {
        self.peers.retain(|_, tx| !tx.is_closed());
    }

    pub async fn recv(&mut self, wait: Duration) -> Result<Option<(PeerId, Envelope)>> {
        match timeout(wait, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Some(inbound)) => {
                self.peers.insert(inbound.peer, inbound.reply_tx);
                Ok(Some((inbound.peer, inbound.envelope)))
            }
        }
    }

    pub async fn send(&mut self, peer: PeerId, envelope: Envelope) -> Result<()> {
        let tx = self
            .peers
            .get(&peer)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable {
                address: format!("{}#{peer}", self.address),
            })?;
        match timeout(self.send_timeout, tx.send(envelope)).await {
            Err(_) => Err(TransportError::SendTimeout {
                address: self.address.clone(),
            }
            .into()),
            Ok(Err(_)) => {
                // Peer hung up; forget it so later sends fail fast.
                self.peers.remove(&peer);
                Err(TransportError::Closed {
                    address: format!("{}#{peer}", self.address),
                }
                .into())
            }
            Ok(Ok(())) => Ok(()),
        }
    }
}

/// Strict request/reply client: send and receive must alternate, starting
/// with a send. Violating the alternation is a programming error surfaced
/// immediately as [`ProtocolError::AlternationViolated`].
#[derive(Debug)]
pub struct ReqSocket {
    pub(crate) inner: DealerSocket,
    pub(crate) awaiting_reply: bool,
}

impl ReqSocket {
    pub fn address(&self) -> &str {
        self.inner.address()
    }

    pub async fn send(&mut self, envelope: Envelope) -> Result<()> {
        if self.awaiting_reply {
            return Err(ProtocolError::AlternationViolated {
                address: self.inner.address.clone(),
                operation: "send".to_string(),
            }
            .into());
        }
        self.inner.send(envelope).await?;
        self.awaiting_reply = true;
        Ok(())
    }

    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        if !self.awaiting_reply {
            return Err(ProtocolError::AlternationViolated {
                address: self.inner.address.clone(),
                operation: "recv".to_string(),
            }
            .into());
        }
        let reply = self.inner.recv(wait).await?;
        if reply.is_some() {
            self.awaiting_reply = false;
        }
        Ok(reply)
    }
}

/// Free-running request/reply client, no alternation enforced. Used on the
/// broker backend where workers interleave announcements with replies.
#[derive(Debug)]
pub struct DealerSocket {
    pub(crate) address: String,
    pub(crate) peer_id: PeerId,
    pub(crate) tx: mpsc::Sender<RouterInbound>,
    pub(crate) reply_tx: mpsc::Sender<Envelope>,
    pub(crate) reply_rx: mpsc::Receiver<Envelope>,
    pub(crate) send_timeout: Duration,
}

impl DealerSocket {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn peer_id(&self) -> PeerId {
        self.peer_id
    }

    pub async fn send(&mut self, envelope: Envelope) -> Result<()> {
        let inbound = RouterInbound {
            peer: self.peer_id,
            reply_tx: self.reply_tx.clone(),
            envelope,
        };
        match timeout(self.send_timeout, self.tx.send(inbound)).await {
            Err(_) => Err(TransportError::SendTimeout {
                address: self.address.clone(),
            }
            .into()),
            Ok(Err(_)) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Ok(())) => Ok(()),
        }
    }

    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        match timeout(wait, self.reply_rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Some(envelope)) => Ok(Some(envelope)),
        }
    }
}

/// One side of a symmetric pair.
#[derive(Debug)]
pub struct PairSocket {
    pub(crate) address: String,
    pub(crate) tx: mpsc::Sender<Envelope>,
    pub(crate) rx: mpsc::Receiver<Envelope>,
    pub(crate) send_timeout: Duration,
}

impl PairSocket {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn send(&mut self, envelope: Envelope) -> Result<()> {
        match timeout(self.send_timeout, self.tx.send(envelope)).await {
            Err(_) => Err(TransportError::SendTimeout {
                address: self.address.clone(),
            }
            .into()),
            Ok(Err(_)) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Ok(())) => Ok(()),
        }
    }

    pub async fn recv(&mut self, wait: Duration) -> Result<Option<Envelope>> {
        match timeout(wait, self.rx.recv()).await {
            Err(_) => Ok(None),
            Ok(None) => Err(TransportError::Closed {
                address: self.address.clone(),
            }
            .into()),
            Ok(Some(envelope)) => Ok(Some(envelope)),
        }
    }
}
