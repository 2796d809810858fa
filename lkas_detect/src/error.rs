//! Error types for the detector worker.

use lkas_common::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("unknown detector '{0}'")]
    UnknownDetector(String),

    #[error("detector config error: {0}")]
    Config(String),

    #[error("shared memory error: {0}")]
    Shm(#[from] lkas_shm::ShmError),

    #[error("detection pipeline error: {0}")]
    Pipeline(String),
}

impl ClassifiedError for DetectError {
    fn kind(&self) -> ErrorKind {
        match self {
            DetectError::UnknownDetector(_) | DetectError::Config(_) => ErrorKind::Config,
            DetectError::Shm(inner) => inner.kind(),
            DetectError::Pipeline(_) => ErrorKind::DetectorParseError,
        }
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
