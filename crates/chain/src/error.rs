//! Error types for chain access

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChainError {
    /// The node could not be reached or did not answer in time
    #[error("RPC transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Signing failed: {0}")]
    Signing(String),
}

pub type ChainResult<T> = Result<T, ChainError>;
