//! Convenience re-exports for downstream crates.

pub use crate::config::{Config, ConfigError, LogLevel};
pub use crate::error::{ClassifiedError, ErrorKind};
pub use crate::mode::{Mode, ModeEvent, ModeMachine, Resumable, TransitionResult};
pub use crate::model::{ControlCommand, ControlMode, DetectionResult, Lane, LaneMetrics, LaneStatus};
