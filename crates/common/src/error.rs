use thiserror::Error;

/// Reasons a string fails to parse as an account address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("address must be 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters")]
    InvalidHex,

    #[error("address checksum mismatch")]
    BadChecksum,
}

/// Reasons a string fails to parse as a 32-byte hash
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("hash must be 0x followed by 64 hex characters")]
    Malformed,
}
