//! Shared fixtures: a scripted chain, a switchable captcha and counting
//! wrappers around the real stores.

#![allow(dead_code)]

use async_trait::async_trait;
use faucet_chain::{ChainClient, ChainError, ChainResult, TransactionReceipt};
use faucet_common::{Address, Hash};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use testnet_faucet::captcha::CaptchaVerifier;
use testnet_faucet::rate_limiter::{CounterStore, InMemoryCounterStore};
use testnet_faucet::{
    ClaimIssuer, ClaimLedger, ClaimRecord, ClaimStatistics, ClaimStore, Collaborators,
    FaucetConfig, FaucetResult, TokenConfig,
};

/// secp256k1 key 1; address 0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf
pub const FAUCET_KEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
pub const FAUCET_ADDRESS: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

pub const ALICE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
pub const BOB: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";
pub const CAROL: &str = "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB";
pub const DAVE: &str = "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb";

pub const TOKEN_A_CONTRACT: &str = "0x1111111111111111111111111111111111111111";

pub const NATIVE_AMOUNT: u128 = 30_000_000_000_000_000;
pub const TOKEN_AMOUNT: u128 = 1_000_000_000_000_000_000;
pub const CHAIN_ID: u64 = 11_155_111;

/// How the chain answers receipt queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiptMode {
    Mined,
    Reverted,
    NeverMined,
}

/// Chain double. Broadcasts are recorded raw; failures are queued per call.
pub struct MockChain {
    pub pending_count: AtomicU64,
    pub native_balance: Mutex<u128>,
    pub token_balance: Mutex<u128>,
    pub send_failures: Mutex<VecDeque<ChainError>>,
    pub receipts: Mutex<ReceiptMode>,
    pub sent: Mutex<Vec<Vec<u8>>>,
    pub balance_calls: AtomicUsize,
    pub pending_calls: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            pending_count: AtomicU64::new(0),
            native_balance: Mutex::new(u128::MAX),
            token_balance: Mutex::new(u128::MAX),
            send_failures: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(ReceiptMode::Mined),
            sent: Mutex::new(Vec::new()),
            balance_calls: AtomicUsize::new(0),
            pending_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_send(&self, err: ChainError) {
        self.send_failures.lock().unwrap().push_back(err);
    }

    pub fn set_receipts(&self, mode: ReceiptMode) {
        *self.receipts.lock().unwrap() = mode;
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> ChainResult<u64> {
        Ok(CHAIN_ID)
    }

    async fn block_number(&self) -> ChainResult<u64> {
        Ok(100)
    }

    async fn balance(&self, _address: &Address) -> ChainResult<u128> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn token_balance(&self, _token: &Address, _holder: &Address) -> ChainResult<u128> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.token_balance.lock().unwrap())
    }

    async fn pending_transaction_count(&self, _address: &Address) -> ChainResult<u64> {
        self.pending_calls.fetch_add(1, Ordering::SeqCst);
        // yield so concurrent claims interleave here if the lane lets them
        tokio::task::yield_now().await;
        Ok(self.pending_count.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(1_000_000_000)
    }

    async fn max_priority_fee_per_gas(&self) -> ChainResult<u128> {
        Ok(1_500_000_000)
    }

    async fn base_fee_per_gas(&self) -> ChainResult<u128> {
        Ok(7)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<Hash> {
        if let Some(err) = self.send_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.sent.lock().unwrap().push(raw.to_vec());
        Ok(Hash::keccak(raw))
    }

    async fn transaction_receipt(&self, hash: &Hash) -> ChainResult<Option<TransactionReceipt>> {
        let mode = *self.receipts.lock().unwrap();
        Ok(match mode {
            ReceiptMode::NeverMined => None,
            ReceiptMode::Mined | ReceiptMode::Reverted => Some(TransactionReceipt {
                transaction_hash: *hash,
                block_number: 99,
                status: mode == ReceiptMode::Mined,
            }),
        })
    }
}

/// Captcha double
pub struct MockCaptcha {
    pub accept: AtomicBool,
    pub calls: AtomicUsize,
}

impl MockCaptcha {
    pub fn accepting() -> Self {
        Self {
            accept: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CaptchaVerifier for MockCaptcha {
    async fn verify(&self, token: &str, _remote_ip: Option<IpAddr>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        !token.is_empty() && self.accept.load(Ordering::SeqCst)
    }
}

/// Counts rate limiter traffic
pub struct CountingCounters {
    inner: InMemoryCounterStore,
    pub calls: AtomicUsize,
}

#[async_trait]
impl CounterStore for CountingCounters {
    async fn increment(&self, key: &str) -> FaucetResult<u64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.increment(key).await
    }
}

/// Counts ledger traffic
pub struct CountingLedger {
    pub inner: ClaimLedger,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
}

impl CountingLedger {
    pub async fn seed(&self, record: ClaimRecord) {
        self.inner.record_claim(record).await.unwrap();
    }
}

#[async_trait]
impl ClaimStore for CountingLedger {
    async fn last_claim_time(&self, address: &str) -> FaucetResult<Option<i64>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.last_claim_time(address).await
    }

    async fn record_claim(&self, record: ClaimRecord) -> FaucetResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_claim(record).await
    }

    async fn statistics(&self) -> FaucetResult<ClaimStatistics> {
        self.inner.statistics().await
    }

    async fn recent_claims(&self, limit: usize) -> FaucetResult<Vec<ClaimRecord>> {
        self.inner.recent_claims(limit).await
    }
}

pub fn test_config() -> FaucetConfig {
    FaucetConfig {
        private_key: FAUCET_KEY.to_string(),
        chain_id: Some(CHAIN_ID),
        native_amount: NATIVE_AMOUNT.to_string(),
        token_a: Some(TokenConfig {
            symbol: "TKA".to_string(),
            contract: TOKEN_A_CONTRACT.to_string(),
            amount: TOKEN_AMOUNT.to_string(),
        }),
        captcha_enabled: false,
        confirmation_timeout_secs: 1,
        confirmation_poll_interval_ms: 10,
        ..FaucetConfig::default()
    }
}

/// Issuer wired to doubles, with handles to every double
pub struct Harness {
    pub issuer: Arc<ClaimIssuer>,
    pub chain: Arc<MockChain>,
    pub captcha: Arc<MockCaptcha>,
    pub counters: Arc<CountingCounters>,
    pub ledger: Arc<CountingLedger>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: FaucetConfig) -> Self {
        let chain = Arc::new(MockChain::new());
        let captcha = Arc::new(MockCaptcha::accepting());
        let counters = Arc::new(CountingCounters {
            inner: InMemoryCounterStore::new(config.rate_limit_duration(), config.rate_limit_capacity),
            calls: AtomicUsize::new(0),
        });
        let ledger = Arc::new(CountingLedger {
            inner: ClaimLedger::temporary().unwrap(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        });

        let collaborators = Collaborators {
            chain: chain.clone(),
            ledger: ledger.clone(),
            captcha: captcha.clone(),
            counters: counters.clone(),
            chain_id: CHAIN_ID,
        };
        let issuer = Arc::new(ClaimIssuer::new(&config, collaborators).unwrap());

        Self {
            issuer,
            chain,
            captcha,
            counters,
            ledger,
        }
    }
}

/// Fields of a signed legacy transaction
pub struct DecodedLegacy {
    pub nonce: u64,
    pub to: Vec<u8>,
    pub value: Vec<u8>,
    pub data: Vec<u8>,
}

pub fn decode_legacy(raw: &[u8]) -> DecodedLegacy {
    let rlp = rlp::Rlp::new(raw);
    assert_eq!(rlp.item_count().unwrap(), 9);
    DecodedLegacy {
        nonce: rlp.val_at(0).unwrap(),
        to: rlp.at(3).unwrap().data().unwrap().to_vec(),
        value: rlp.at(4).unwrap().data().unwrap().to_vec(),
        data: rlp.at(5).unwrap().data().unwrap().to_vec(),
    }
}

pub fn address_bytes(address: &str) -> Vec<u8> {
    address.parse::<Address>().unwrap().0.to_vec()
}

/// Big-endian bytes without leading zeros, as RLP stores integers
pub fn trimmed_be(value: u128) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[start..].to_vec()
}
