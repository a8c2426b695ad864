//! Error types for the airdrop robots

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type RobotResult<T> = std::result::Result<T, RobotError>;

/// Runtime error taxonomy shared by the robot collaborators
#[derive(Debug, Error)]
pub enum RobotError {
    /// Entity directory could not be reached or answered with a non-2xx status
    #[error("Entity directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// Entity directory answered with a body that does not match the schema
    #[error("Entity directory response malformed: {0}")]
    DirectoryMalformed(String),

    /// RPC failure, revert or unexpected contract output
    #[error("Chain call error: {0}")]
    ChainCall(String),

    /// Keystore or transaction authorization failure
    #[error("Signer error: {0}")]
    Signer(String),

    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Whole cycle exceeded its time bound
    #[error("Cycle timed out after {0:?}")]
    CycleTimeout(Duration),
}

impl RobotError {
    /// Errors that abort the current cycle and drive the error backoff transition.
    pub fn is_cycle_fatal(&self) -> bool {
        !matches!(self, RobotError::Config(_))
    }
}
