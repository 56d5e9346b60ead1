//! Builds, signs and broadcasts faucet transfers, then waits for them

use crate::asset::Asset;
use crate::config::FeeMode;
use crate::error::{FaucetError, FaucetResult};
use faucet_chain::{
    erc20, ChainClient, ChainError, FeeParams, LocalSigner, TransactionReceipt,
    TransactionRequest,
};
use faucet_common::{Address, Hash};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Map a broadcast failure reported by the node onto a caller-visible error
pub fn classify_broadcast_error(err: ChainError) -> FaucetError {
    match err {
        ChainError::Transport(msg) => FaucetError::NetworkUnavailable(msg),
        ChainError::Rpc { message, .. } => {
            let lower = message.to_lowercase();
            if lower.contains("already known")
                || lower.contains("known transaction")
                || lower.contains("nonce too low")
            {
                FaucetError::DuplicateSubmission
            } else if lower.contains("underpriced") || lower.contains("fee too low") {
                FaucetError::FeeTooLow
            } else if lower.contains("insufficient funds") {
                FaucetError::InsufficientFunds
            } else {
                FaucetError::Unexpected(message)
            }
        }
        other => FaucetError::Unexpected(other.to_string()),
    }
}

/// Submission settings fixed at startup
#[derive(Debug, Clone)]
pub struct SubmitterSettings {
    pub chain_id: u64,
    pub fee_mode: FeeMode,
    pub confirmations: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

pub struct TransactionSubmitter {
    chain: Arc<dyn ChainClient>,
    signer: LocalSigner,
    settings: SubmitterSettings,
}

impl TransactionSubmitter {
    pub fn new(chain: Arc<dyn ChainClient>, signer: LocalSigner, settings: SubmitterSettings) -> Self {
        Self {
            chain,
            signer,
            settings,
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Current fee parameters from the node
    pub async fn fee_params(&self) -> FaucetResult<FeeParams> {
        match self.settings.fee_mode {
            FeeMode::Legacy => Ok(FeeParams::Legacy {
                gas_price: self.chain.gas_price().await?,
            }),
            FeeMode::Eip1559 => {
                let priority = self.chain.max_priority_fee_per_gas().await?;
                let base_fee = self.chain.base_fee_per_gas().await?;
                Ok(FeeParams::Eip1559 {
                    max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority),
                    max_priority_fee_per_gas: priority,
                })
            }
        }
    }

    /// Unsigned transfer of `asset` to `destination`
    pub fn build(
        &self,
        destination: &Address,
        asset: &Asset,
        nonce: u64,
        fee: FeeParams,
    ) -> TransactionRequest {
        let (to, value, data) = match asset.contract {
            None => (*destination, asset.amount, Vec::new()),
            Some(contract) => (contract, 0, erc20::transfer_calldata(destination, asset.amount)),
        };

        TransactionRequest {
            chain_id: self.settings.chain_id,
            nonce,
            fee,
            gas_limit: asset.gas_limit,
            to,
            value,
            data,
        }
    }

    /// Sign and broadcast; returns once the node accepted the transaction
    pub async fn broadcast(&self, destination: &Address, asset: &Asset, nonce: u64) -> FaucetResult<Hash> {
        let fee = self.fee_params().await?;
        let request = self.build(destination, asset, nonce, fee);
        let signed = request.sign(&self.signer)?;

        debug!(nonce, tx = %signed.hash, ?fee, "broadcasting");
        let node_hash = self
            .chain
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(classify_broadcast_error)?;

        if node_hash != signed.hash {
            warn!(local = %signed.hash, node = %node_hash, "node reported a different transaction hash");
        }

        info!("Transaction sent: {} (nonce {}) -> {} {}", node_hash, nonce, destination, asset.symbol);
        Ok(node_hash)
    }

    /// Poll for the receipt until it has enough confirmations or the timeout hits.
    ///
    /// Read errors while polling are logged and polling continues; the
    /// transaction is already out, so only the timeout ends the wait.
    pub async fn wait_for_confirmation(&self, hash: &Hash) -> FaucetResult<TransactionReceipt> {
        let poll = async {
            loop {
                match self.confirmed_receipt(hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => {}
                    Err(e) => warn!(tx = %hash, "receipt poll failed: {}", e),
                }
                tokio::time::sleep(self.settings.poll_interval).await;
            }
        };

        let receipt = tokio::time::timeout(self.settings.confirmation_timeout, poll)
            .await
            .map_err(|_| FaucetError::ConfirmationTimeout(hash.to_string()))?;

        if !receipt.status {
            return Err(FaucetError::Unexpected(format!("transaction {} reverted", hash)));
        }
        Ok(receipt)
    }

    async fn confirmed_receipt(&self, hash: &Hash) -> FaucetResult<Option<TransactionReceipt>> {
        let Some(receipt) = self.chain.transaction_receipt(hash).await? else {
            return Ok(None);
        };
        if self.settings.confirmations <= 1 {
            return Ok(Some(receipt));
        }

        let head = self.chain.block_number().await?;
        let depth = head.saturating_sub(receipt.block_number) + 1;
        Ok((depth >= self.settings.confirmations).then_some(receipt))
    }
}
