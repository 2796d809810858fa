//! Error types for shared-memory ring operations.

use lkas_common::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

/// Errors that can occur creating, attaching to, or operating on a ring.
#[derive(Error, Debug)]
pub enum ShmError {
    /// A region with this name already exists and could not be unlinked.
    #[error("region already in use: {name}")]
    AlreadyInUse { name: String },

    /// No region with this name exists (consumer attach failed, or the
    /// producer has since destroyed it).
    #[error("region not found: {name}")]
    NotFound { name: String },

    /// `attach` exhausted its retry budget.
    #[error("attach timed out after {retries} attempts: {name}")]
    AttachTimeout { name: String, retries: u32 },

    /// A write or read would exceed the record's fixed slot size.
    #[error("record size {size} exceeds slot capacity {capacity}")]
    InvalidSize { size: usize, capacity: usize },

    /// The header magic did not match; the region is not a valid ring.
    #[error("invalid region header for {name}")]
    InvalidHeader { name: String },

    /// A read observed no new `frame_id` before its timeout elapsed.
    #[error("read timed out waiting for a new frame")]
    ReadTimeout,

    /// Process liveness check failed outright (not the same as "dead").
    #[error("process not found: {pid}")]
    ProcessNotFound { pid: u32 },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("system call error: {source}")]
    Nix {
        #[from]
        source: nix::Error,
    },

    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl ClassifiedError for ShmError {
    fn kind(&self) -> ErrorKind {
        match self {
            ShmError::AttachTimeout { .. } => ErrorKind::ShmAttachTimeout,
            ShmError::ReadTimeout => ErrorKind::TransientDetectorMiss,
            ShmError::InvalidHeader { .. } | ShmError::InvalidSize { .. } => {
                ErrorKind::DetectorParseError
            }
            _ => ErrorKind::ShmAttachTimeout,
        }
    }
}

/// Result type for shared-memory ring operations.
pub type ShmResult<T> = Result<T, ShmError>;
