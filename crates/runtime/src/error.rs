use thiserror::Error;

use crate::model::ModelError;
use crate::tools::SchemaError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tool catalog rejected: {0}")]
    Schema(#[from] SchemaError),

    #[error("tool server connection failed: {0}")]
    Connection(#[from] mcp::Error),

    #[error("not connected to the tool server")]
    NotConnected,

    #[error("model backend failed: {0}")]
    Model(#[from] ModelError),

    #[error("turn abandoned after {rounds} tool-call rounds without a final answer")]
    TurnLimitExceeded { rounds: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
