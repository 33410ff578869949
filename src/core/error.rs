use thiserror::Error;
use tokio::time::error::Elapsed;

#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigInvalid(pub String);

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("failed to fetch the forecast: {0:#}")]
    FetchFailure(anyhow::Error),

    #[error("no forecast available: {0:#}")]
    NoForecastAvailable(anyhow::Error),
}

/// Single register operation failure.
#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("communication failure: {0:#}")]
    Communication(anyhow::Error),

    #[error("register #{address} rejected the request: {reason}")]
    Rejected { address: u16, reason: String },
}

impl From<Elapsed> for RegisterError {
    fn from(elapsed: Elapsed) -> Self {
        Self::Communication(elapsed.into())
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("actuation failed: {0:#}")]
    Actuation(anyhow::Error),

    #[error("rejected by the device: register #{address}, {reason}")]
    RejectedByDevice { address: u16, reason: String },

    #[error("failed to persist the inverter state: {0:#}")]
    Persistence(anyhow::Error),
}

impl From<RegisterError> for ControllerError {
    fn from(error: RegisterError) -> Self {
        match error {
            RegisterError::Communication(error) => Self::Actuation(error),
            RegisterError::Rejected { address, reason } => Self::RejectedByDevice { address, reason },
        }
    }
}
