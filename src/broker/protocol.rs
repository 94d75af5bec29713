//! # Broker Backend Protocol
//!
//! The closed vocabulary spoken between the broker and its workers. Workers
//! announce `READY`, receive `WORK` units carrying the originating client's
//! identity, and answer with `DONE` tagged with the same identity so the
//! broker can relay the reply.

use crate::constants::verbs;
use crate::error::ProtocolError;
use crate::messaging::{Envelope, PeerId};

/// A dispatched request: the client identity travels with it so the reply
/// can be correlated without the worker knowing anything about clients.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    pub client: PeerId,
    pub request: Envelope,
}

impl WorkUnit {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        Envelope::new(verbs::WORK)
            .arg(&self.client)?
            .arg(&self.request)
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        if envelope.verb != verbs::WORK {
            return Err(ProtocolError::UnknownVerb {
                verb: envelope.verb.clone(),
            });
        }
        Ok(Self {
            client: envelope.decode_arg(0)?,
            request: envelope.decode_arg(1)?,
        })
    }
}

/// Worker-to-broker messages.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMsg {
    /// Announcement or idle re-announcement; doubles as the heartbeat.
    Ready,
    /// Completed work unit, relayed verbatim to the named client.
    Done { client: PeerId, reply: Envelope },
}

impl WorkerMsg {
    pub fn to_envelope(&self) -> Result<Envelope, serde_json::Error> {
        match self {
            WorkerMsg::Ready => Ok(Envelope::new(verbs::READY)),
            WorkerMsg::Done { client, reply } => {
                Envelope::new(verbs::DONE).arg(client)?.arg(reply)
            }
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.verb.as_str() {
            verbs::READY => Ok(WorkerMsg::Ready),
            verbs::DONE => Ok(WorkerMsg::Done {
                client: envelope.decode_arg(0)?,
                reply: envelope.decode_arg(1)?,
            }),
            other => Err(ProtocolError::UnknownVerb {
                verb: other.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn work_unit_round_trips() {
        let unit = WorkUnit {
            client: Uuid::new_v4(),
            request: Envelope::new("GETABIS"),
        };
        let decoded = WorkUnit::from_envelope(&unit.to_envelope().unwrap()).unwrap();
        assert_eq!(decoded, unit);
    }

    #[test]
    fn done_round_trips() {
        let msg = WorkerMsg::Done {
            client: Uuid::new_v4(),
            reply: Envelope::ok(),
        };
        let decoded = WorkerMsg::from_envelope(&msg.to_envelope().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn unknown_backend_verb_is_rejected() {
        let err = WorkerMsg::from_envelope(&Envelope::new("HELLO")).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownVerb { .. }));
    }
}
