//! Testnet faucet service
//!
//! Sends a fixed amount of native coin or ERC-20 token to a claimant once
//! per cooldown window, with:
//! - Address validation (EIP-55 aware)
//! - Per-IP fixed-window rate limiting and a global throughput limit
//! - Captcha verification
//! - Cooldown tracking in an append-only claim ledger
//! - Serialized nonce sequencing for the single faucet wallet
//! - Prometheus metrics and an HTTP API

pub mod api;
pub mod asset;
pub mod captcha;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod nonce;
pub mod rate_limiter;
pub mod service;
pub mod submitter;

pub use asset::{Asset, AssetKind, AssetTable};
pub use config::{FaucetConfig, FeeMode, TokenConfig};
pub use error::{FaucetError, FaucetResult};
pub use ledger::{ClaimLedger, ClaimRecord, ClaimStatistics, ClaimStore};
pub use service::{
    AssetStatus, ClaimIssuer, ClaimReceipt, ClaimRequest, Collaborators, FaucetStatus,
};
