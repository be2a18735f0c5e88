//! Alert error types.

use surveil_core::{AlertId, CoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("Invalid alert config: {0}")]
    InvalidConfig(String),

    #[error("Alert not found: {0}")]
    NotFound(AlertId),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type AlertResult<T> = Result<T, AlertError>;
