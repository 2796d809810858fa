//! Error type for the viewer.

use lkas_common::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("broadcast connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("malformed frame on the wire: {0}")]
    MalformedFrame(String),
}

impl ClassifiedError for ViewerError {
    fn kind(&self) -> ErrorKind {
        match self {
            ViewerError::Connection(_) => ErrorKind::ViewerDisconnected,
            ViewerError::MalformedFrame(_) => ErrorKind::ViewerProtocolError,
        }
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
