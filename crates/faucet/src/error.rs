//! Error types for the faucet service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use faucet_chain::ChainError;
use serde_json::json;
use thiserror::Error;

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Cooldown active: {minutes} minutes remaining")]
    CooldownActive { minutes: u64 },

    #[error("A claim for this address is already in progress")]
    ClaimInProgress,

    #[error("Captcha verification failed")]
    CaptchaFailed,

    #[error("Insufficient funds in faucet")]
    InsufficientFunds,

    #[error("Transaction already submitted")]
    DuplicateSubmission,

    #[error("Fee too low to replace a pending transaction")]
    FeeTooLow,

    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Transaction {0} not confirmed in time")]
    ConfirmationTimeout(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sled::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FaucetError {
    /// Stable machine-readable code, also used as the metrics label
    pub fn code(&self) -> &'static str {
        match self {
            FaucetError::InvalidRequest(_) => "INVALID_REQUEST",
            FaucetError::InvalidAddress(_) => "INVALID_ADDRESS",
            FaucetError::InvalidToken(_) => "INVALID_TOKEN",
            FaucetError::RateLimited => "RATE_LIMITED",
            FaucetError::CooldownActive { .. } => "COOLDOWN_ACTIVE",
            FaucetError::ClaimInProgress => "CLAIM_IN_PROGRESS",
            FaucetError::CaptchaFailed => "CAPTCHA_FAILED",
            FaucetError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            FaucetError::DuplicateSubmission => "DUPLICATE_SUBMISSION",
            FaucetError::FeeTooLow => "FEE_TOO_LOW",
            FaucetError::NetworkUnavailable(_) => "NETWORK_UNAVAILABLE",
            FaucetError::ConfirmationTimeout(_) => "CONFIRMATION_TIMEOUT",
            FaucetError::Unexpected(_) => "UNEXPECTED_ERROR",
            FaucetError::DatabaseError(_) => "DATABASE_ERROR",
            FaucetError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            FaucetError::InvalidRequest(_)
            | FaucetError::InvalidAddress(_)
            | FaucetError::InvalidToken(_)
            | FaucetError::CaptchaFailed => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited
            | FaucetError::CooldownActive { .. }
            | FaucetError::ClaimInProgress => {
                StatusCode::TOO_MANY_REQUESTS
            }
            FaucetError::DuplicateSubmission => StatusCode::CONFLICT,
            FaucetError::InsufficientFunds
            | FaucetError::FeeTooLow
            | FaucetError::NetworkUnavailable(_)
            | FaucetError::ConfirmationTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            FaucetError::Unexpected(_)
            | FaucetError::DatabaseError(_)
            | FaucetError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Reason shown to the user verbatim
    pub fn user_message(&self) -> String {
        match self {
            FaucetError::InvalidRequest(msg) => format!("Invalid request: {}", msg),
            FaucetError::InvalidAddress(msg) => format!("Invalid Ethereum address: {}", msg),
            FaucetError::InvalidToken(token) => format!("Invalid token selection: {}", token),
            FaucetError::RateLimited => "Rate limit exceeded. Please try again later.".to_string(),
            FaucetError::CooldownActive { minutes } => {
                format!("Please wait {} minutes before claiming again", minutes)
            }
            FaucetError::ClaimInProgress => {
                "A claim for this address is already being processed. Please wait.".to_string()
            }
            FaucetError::CaptchaFailed => "Invalid captcha".to_string(),
            FaucetError::InsufficientFunds => {
                "Faucet is out of funds. Please try again later.".to_string()
            }
            FaucetError::DuplicateSubmission => {
                "Transaction already submitted. Please wait and try again later.".to_string()
            }
            FaucetError::FeeTooLow => "Network is busy. Please try again later.".to_string(),
            FaucetError::NetworkUnavailable(_) => {
                "Network error. Please try again later.".to_string()
            }
            FaucetError::ConfirmationTimeout(tx) => format!(
                "Transaction {} was sent but is not confirmed yet. Check it before trying again.",
                tx
            ),
            FaucetError::Unexpected(msg) => format!("An unexpected error occurred: {}", msg),
            FaucetError::DatabaseError(_) => {
                "An unexpected error occurred: storage failure".to_string()
            }
            FaucetError::Config(msg) => format!("An unexpected error occurred: {}", msg),
        }
    }
}

/// Chain reads outside broadcast: transport trouble is a network outage,
/// everything else is unexpected.
impl From<ChainError> for FaucetError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Transport(msg) => FaucetError::NetworkUnavailable(msg),
            other => FaucetError::Unexpected(other.to_string()),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": self.user_message(),
            "code": self.code(),
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));

        (self.status(), body).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
