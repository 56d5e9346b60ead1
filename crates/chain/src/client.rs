use crate::error::ChainResult;
use async_trait::async_trait;
use faucet_common::{Address, Hash};

/// Receipt of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_hash: Hash,
    pub block_number: u64,
    /// `false` when execution reverted
    pub status: bool,
}

/// Read and broadcast access to an EVM chain.
///
/// All quantities are in base units (wei or token units).
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> ChainResult<u64>;

    async fn block_number(&self) -> ChainResult<u64>;

    /// Native balance at the latest block
    async fn balance(&self, address: &Address) -> ChainResult<u128>;

    /// ERC-20 `balanceOf(holder)` on `token`
    async fn token_balance(&self, token: &Address, holder: &Address) -> ChainResult<u128>;

    /// Transaction count including the node's pending pool
    async fn pending_transaction_count(&self, address: &Address) -> ChainResult<u64>;

    async fn gas_price(&self) -> ChainResult<u128>;

    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128>;

    /// `baseFeePerGas` of the latest block
    async fn base_fee_per_gas(&self) -> ChainResult<u128>;

    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<Hash>;

    /// `None` while the transaction is not yet mined
    async fn transaction_receipt(&self, hash: &Hash) -> ChainResult<Option<TransactionReceipt>>;
}
