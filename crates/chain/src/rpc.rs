//! JSON-RPC client for Ethereum-compatible nodes

use crate::client::{ChainClient, TransactionReceipt};
use crate::erc20;
use crate::error::{ChainError, ChainResult};
use async_trait::async_trait;
use faucet_common::{Address, Hash};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// Parse a hex quantity (`0x1a`) or 32-byte ABI word, saturating above u128
pub fn parse_quantity(value: &str) -> ChainResult<u128> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::InvalidResponse(format!("not a hex quantity: {}", value)))?
        .trim_start_matches('0');

    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        if digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(u128::MAX);
        }
        return Err(ChainError::InvalidResponse(format!("not a hex quantity: {}", value)));
    }

    u128::from_str_radix(digits, 16)
        .map_err(|_| ChainError::InvalidResponse(format!("not a hex quantity: {}", value)))
}

fn quantity_field(value: &Value, field: &str) -> ChainResult<u128> {
    let text = value
        .as_str()
        .ok_or_else(|| ChainError::InvalidResponse(format!("{} is not a string", field)))?;
    parse_quantity(text)
}

fn small_quantity(value: &Value, field: &str) -> ChainResult<u64> {
    let n = quantity_field(value, field)?;
    u64::try_from(n).map_err(|_| ChainError::InvalidResponse(format!("{} out of range", field)))
}

/// RPC client for interacting with blockchain
pub struct JsonRpcClient {
    rpc_url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(rpc_url: String, timeout: Duration) -> ChainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;

        Ok(Self {
            rpc_url,
            client,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> ChainResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id
        });
        trace!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{} failed: {}", method, e)))?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ChainError::Transport(format!("{} returned HTTP {}", method, status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ChainError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = body.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            debug!(method, code, %message, "rpc error");
            return Err(ChainError::Rpc { code, message });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl ChainClient for JsonRpcClient {
    async fn chain_id(&self) -> ChainResult<u64> {
        let result = self.call("eth_chainId", json!([])).await?;
        small_quantity(&result, "chainId")
    }

    async fn block_number(&self) -> ChainResult<u64> {
        let result = self.call("eth_blockNumber", json!([])).await?;
        small_quantity(&result, "blockNumber")
    }

    async fn balance(&self, address: &Address) -> ChainResult<u128> {
        let result = self
            .call("eth_getBalance", json!([address.to_string(), "latest"]))
            .await?;
        quantity_field(&result, "balance")
    }

    async fn token_balance(&self, token: &Address, holder: &Address) -> ChainResult<u128> {
        let data = format!("0x{}", hex::encode(erc20::balance_of_calldata(holder)));
        let result = self
            .call(
                "eth_call",
                json!([{ "to": token.to_string(), "data": data }, "latest"]),
            )
            .await?;
        quantity_field(&result, "balanceOf")
    }

    async fn pending_transaction_count(&self, address: &Address) -> ChainResult<u64> {
        let result = self
            .call(
                "eth_getTransactionCount",
                json!([address.to_string(), "pending"]),
            )
            .await?;
        small_quantity(&result, "transactionCount")
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        let result = self.call("eth_gasPrice", json!([])).await?;
        quantity_field(&result, "gasPrice")
    }

    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128> {
        let result = self.call("eth_maxPriorityFeePerGas", json!([])).await?;
        quantity_field(&result, "maxPriorityFeePerGas")
    }

    async fn base_fee_per_gas(&self) -> ChainResult<u128> {
        let block = self
            .call("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        let base_fee = block.get("baseFeePerGas").ok_or_else(|| {
            ChainError::InvalidResponse("latest block has no baseFeePerGas".to_string())
        })?;
        quantity_field(base_fee, "baseFeePerGas")
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<Hash> {
        let result = self
            .call(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        result
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ChainError::InvalidResponse(format!("bad transaction hash: {}", result)))
    }

    async fn transaction_receipt(&self, hash: &Hash) -> ChainResult<Option<TransactionReceipt>> {
        let result = self
            .call("eth_getTransactionReceipt", json!([hash.to_string()]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }

        // Some nodes return a receipt shell before the block is sealed
        let block_number = match result.get("blockNumber") {
            Some(Value::Null) | None => return Ok(None),
            Some(v) => small_quantity(v, "blockNumber")?,
        };
        let status = match result.get("status") {
            Some(v) => quantity_field(v, "status")? == 1,
            // pre-Byzantium receipts carry no status
            None => true,
        };

        Ok(Some(TransactionReceipt {
            transaction_hash: *hash,
            block_number,
            status,
        }))
    }
}
