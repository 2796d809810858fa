//! Shared error classification.
//!
//! Every stage-specific error type (`ShmError`, `DetectError`, `DecideError`,
//! `OrchestrateError`) exposes an [`ErrorKind`] so the orchestrator can keep
//! per-kind counters and rate-limited logging without matching on every
//! concrete error variant from every downstream crate.

use std::fmt;

/// Classification of an error occurring anywhere in the pipeline, matching
/// the kinds enumerated in `SPEC_FULL.md` §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No new detection arrived within the tick's read timeout.
    TransientDetectorMiss,
    /// A detection record was read but failed to parse/validate.
    DetectorParseError,
    /// A consumer exhausted its attach retry budget.
    ShmAttachTimeout,
    /// A writer observed a lock left in the owner-died state and recovered it.
    ShmWriteTornRecovery,
    /// The simulator failed to advance within the fatal timeout.
    SimulatorTickTimeout,
    /// Configuration failed to load or validate.
    Config,
    /// A broadcast message could not be delivered to a lagging subscriber.
    BroadcasterDropped,
    /// A viewer lost its connection to the broadcaster and must reconnect.
    ViewerDisconnected,
    /// A viewer received a frame it could not parse off the wire.
    ViewerProtocolError,
}

impl ErrorKind {
    /// Whether an error of this kind is fatal (must end the process) or
    /// transient (the tick loop degrades and continues).
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            ErrorKind::SimulatorTickTimeout | ErrorKind::Config
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TransientDetectorMiss => "transient_detector_miss",
            ErrorKind::DetectorParseError => "detector_parse_error",
            ErrorKind::ShmAttachTimeout => "shm_attach_timeout",
            ErrorKind::ShmWriteTornRecovery => "shm_write_torn_recovery",
            ErrorKind::SimulatorTickTimeout => "simulator_tick_timeout",
            ErrorKind::Config => "config",
            ErrorKind::BroadcasterDropped => "broadcaster_dropped",
            ErrorKind::ViewerDisconnected => "viewer_disconnected",
            ErrorKind::ViewerProtocolError => "viewer_protocol_error",
        };
        f.write_str(s)
    }
}

/// Implemented by every stage-specific error enum so common handling code
/// (counters, rate-limited logging) can stay generic over the concrete type.
pub trait ClassifiedError {
    fn kind(&self) -> ErrorKind;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_simulator_timeout_and_config_are_fatal() {
        for kind in [
            ErrorKind::TransientDetectorMiss,
            ErrorKind::DetectorParseError,
            ErrorKind::ShmAttachTimeout,
            ErrorKind::ShmWriteTornRecovery,
            ErrorKind::BroadcasterDropped,
            ErrorKind::ViewerDisconnected,
            ErrorKind::ViewerProtocolError,
        ] {
            assert!(!kind.is_fatal(), "{kind} should not be fatal");
        }
        assert!(ErrorKind::SimulatorTickTimeout.is_fatal());
        assert!(ErrorKind::Config.is_fatal());
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(ErrorKind::ShmAttachTimeout.to_string(), "shm_attach_timeout");
    }
}
