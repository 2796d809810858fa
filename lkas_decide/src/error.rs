//! Error type for the decision controller.
//!
//! `analyze`/`decide` are pure functions with no I/O; the only failure mode
//! is malformed input geometry handed in by the caller.

use lkas_common::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum DecideError {
    #[error("invalid image geometry: {0}")]
    InvalidGeometry(String),
}

impl ClassifiedError for DecideError {
    fn kind(&self) -> ErrorKind {
        match self {
            DecideError::InvalidGeometry(_) => ErrorKind::Config,
        }
    }
}

pub type DecideResult<T> = Result<T, DecideError>;
