//! Chain access for the faucet: JSON-RPC client, transaction signing and
//! ERC-20 call encoding.

pub mod client;
pub mod erc20;
pub mod error;
pub mod rpc;
pub mod signer;
pub mod transaction;

pub use client::{ChainClient, TransactionReceipt};
pub use error::{ChainError, ChainResult};
pub use rpc::JsonRpcClient;
pub use signer::LocalSigner;
pub use transaction::{FeeParams, SignedTransaction, TransactionRequest};
