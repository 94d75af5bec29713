//! # Wire Envelope
//!
//! Every message crossing a channel is an [`Envelope`]: an uppercase verb
//! followed by verb-specific arguments. Envelopes are owned values; sending
//! one transfers ownership, so no payload is ever shared mutably between
//! tasks.
//!
//! The typed request/reply enums elsewhere in the crate encode to and decode
//! from this shape. An unrecognized verb decodes to
//! [`ProtocolError::UnknownVerb`] and is answered with an `ERROR` reply,
//! never silently ignored.

use crate::constants::verbs;
use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub verb: String,
    pub args: Vec<Value>,
}

impl Envelope {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(verb: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            verb: verb.into(),
            args,
        }
    }

    /// Append a serialized argument, builder style.
    pub fn arg<T: Serialize>(mut self, value: &T) -> Result<Self, serde_json::Error> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Decode the argument at `index`, reporting a malformed envelope if it
    /// is missing or of the wrong shape.
    pub fn decode_arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtocolError> {
        let raw = self
            .args
            .get(index)
            .ok_or_else(|| ProtocolError::MalformedEnvelope {
                verb: self.verb.clone(),
                reason: format!("missing argument {index}"),
            })?;
        serde_json::from_value(raw.clone()).map_err(|e| ProtocolError::MalformedEnvelope {
            verb: self.verb.clone(),
            reason: format!("argument {index}: {e}"),
        })
    }

    pub fn expect_args(&self, count: usize) -> Result<(), ProtocolError> {
        if self.args.len() == count {
            Ok(())
        } else {
            Err(ProtocolError::MalformedEnvelope {
                verb: self.verb.clone(),
                reason: format!("expected {count} argument(s), got {}", self.args.len()),
            })
        }
    }

    /// The generic `OK` success reply.
    pub fn ok() -> Self {
        Self::new(verbs::OK)
    }

    /// An `ERROR` reply carrying a failure code and human-readable message.
    pub fn error(code: &str, message: &str) -> Self {
        Self::with_args(
            verbs::ERROR,
            vec![Value::from(code), Value::from(message)],
        )
    }

    pub fn is_ok(&self) -> bool {
        self.verb == verbs::OK
    }

    pub fn is_error(&self) -> bool {
        self.verb == verbs::ERROR
    }

    /// Extract `(code, message)` from an `ERROR` reply.
    pub fn error_parts(&self) -> Result<(String, String), ProtocolError> {
        let code: String = self.decode_arg(0)?;
        let message: String = self.decode_arg(1).unwrap_or_default();
        Ok((code, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trips_typed_args() {
        let env = Envelope::new("NEWVER")
            .arg(&"foo")
            .unwrap()
            .arg(&"0.1")
            .unwrap();
        assert_eq!(env.verb, "NEWVER");
        assert_eq!(env.decode_arg::<String>(0).unwrap(), "foo");
        assert_eq!(env.decode_arg::<String>(1).unwrap(), "0.1");
    }

    #[test]
    fn missing_argument_is_malformed() {
        let env = Envelope::new("NEWPKG");
        let err = env.decode_arg::<String>(0).unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedEnvelope { .. }));
    }

    #[test]
    fn error_reply_carries_code_and_message() {
        let env = Envelope::error("WORKER_LOST", "worker vanished");
        assert!(env.is_error());
        let (code, message) = env.error_parts().unwrap();
        assert_eq!(code, "WORKER_LOST");
        assert_eq!(message, "worker vanished");
    }
}
