//! # Task Control Protocol
//!
//! The closed verb vocabulary of a task's control channel, plus the status
//! broadcast sent on lifecycle transitions. Every accepted command is
//! acknowledged with `OK`; an unknown verb is answered with an `ERROR` reply
//! and does not tear the task down.

use crate::constants::verbs;
use crate::error::ProtocolError;
use crate::messaging::Envelope;
use serde_json::Value;

/// Supervisor-to-task lifecycle commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Stop servicing data channels; the control channel stays responsive.
    Pause,
    /// Undo a pause.
    Resume,
    /// Drain in-flight work within the grace period, then stop.
    Quit,
}

impl ControlRequest {
    pub fn to_envelope(self) -> Envelope {
        match self {
            ControlRequest::Pause => Envelope::new(verbs::PAUSE),
            ControlRequest::Resume => Envelope::new(verbs::RESUME),
            ControlRequest::Quit => Envelope::new(verbs::QUIT),
        }
    }

    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.verb.as_str() {
            verbs::PAUSE => Ok(ControlRequest::Pause),
            verbs::RESUME => Ok(ControlRequest::Resume),
            verbs::QUIT => Ok(ControlRequest::Quit),
            other => Err(ProtocolError::UnknownVerb {
                verb: other.to_string(),
            }),
        }
    }
}

/// Task lifecycle phase, broadcast on the status queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Running,
    Paused,
    Stopped,
}

impl TaskPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskPhase::Running => "running",
            TaskPhase::Paused => "paused",
            TaskPhase::Stopped => "stopped",
        }
    }
}

/// Build a `STATUS` broadcast envelope for the given task.
pub fn status_envelope(task: &str, phase: TaskPhase) -> Envelope {
    Envelope::with_args(
        verbs::STATUS,
        vec![Value::from(task), Value::from(phase.as_str())],
    )
}
