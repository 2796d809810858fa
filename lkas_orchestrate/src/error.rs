//! Error type for the orchestrator.

use lkas_common::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("configuration error: {0}")]
    Config(#[from] lkas_common::config::ConfigError),

    #[error("shared memory error: {0}")]
    Shm(#[from] lkas_shm::ShmError),

    #[error("unknown vehicle actor: {0}")]
    UnknownVehicleActor(String),

    #[error("simulator did not advance within {0:?}")]
    SimulatorTickTimeout(std::time::Duration),

    #[error("decision controller error: {0}")]
    Decide(#[from] lkas_decide::DecideError),
}

impl ClassifiedError for OrchestrateError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrchestrateError::Config(_) => ErrorKind::Config,
            OrchestrateError::Shm(_) => ErrorKind::ShmAttachTimeout,
            OrchestrateError::UnknownVehicleActor(_) => ErrorKind::Config,
            OrchestrateError::SimulatorTickTimeout(_) => ErrorKind::SimulatorTickTimeout,
            OrchestrateError::Decide(_) => ErrorKind::Config,
        }
    }
}

pub type OrchestrateResult<T> = Result<T, OrchestrateError>;
