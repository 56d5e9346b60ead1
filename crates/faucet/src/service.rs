//! Claim issuance: the orchestrator that runs one claim through every check
//! and the single submission lane for the faucet wallet.

use crate::asset::{Asset, AssetKind, AssetTable};
use crate::captcha::{CaptchaVerifier, DisabledCaptcha, HCaptchaVerifier};
use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use crate::ledger::{ClaimLedger, ClaimRecord, ClaimStatistics, ClaimStore};
use crate::metrics::FaucetMetrics;
use crate::nonce::NonceSequencer;
use crate::rate_limiter::{CounterStore, InMemoryCounterStore, RateLimiter};
use crate::submitter::{SubmitterSettings, TransactionSubmitter};
use chrono::Utc;
use faucet_chain::{ChainClient, JsonRpcClient, LocalSigner};
use faucet_common::{Address, Hash};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Minutes left before `address` may claim again, or `None` if it may claim now.
///
/// The cooldown boundary is exclusive: a claim exactly `cooldown_secs` after
/// the last one is allowed.
pub fn cooldown_remaining_minutes(last_claim: i64, now: i64, cooldown_secs: u64) -> Option<u64> {
    let elapsed = u64::try_from(now - last_claim).unwrap_or(0);
    if elapsed >= cooldown_secs {
        return None;
    }
    Some((cooldown_secs - elapsed).div_ceil(60))
}

/// Addresses with a claim between the cooldown check and the ledger write
#[derive(Default)]
struct InFlight(std::sync::Mutex<HashSet<Address>>);

impl InFlight {
    /// `None` if `address` already has a claim in flight
    fn reserve(&self, address: Address) -> Option<Reservation<'_>> {
        let inserted = self
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(address);
        if !inserted {
            return None;
        }
        Some(Reservation {
            in_flight: self,
            address,
        })
    }
}

/// Releases the address when the claim ends, however it ends
struct Reservation<'a> {
    in_flight: &'a InFlight,
    address: Address,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.in_flight
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.address);
    }
}

/// One inbound claim
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub address: String,
    pub token: Option<String>,
    pub captcha: String,
    pub client_ip: IpAddr,
}

/// Result of a confirmed claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub tx_hash: Hash,
    pub address: Address,
    pub asset: AssetKind,
    pub amount: String,
    pub block_number: u64,
}

/// Per-asset line of the status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetStatus {
    pub kind: AssetKind,
    pub symbol: String,
    pub amount: String,
    pub contract: Option<Address>,
}

/// Faucet status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetStatus {
    pub address: Address,
    pub balance: String,
    pub cooldown_secs: u64,
    pub assets: Vec<AssetStatus>,
    pub statistics: ClaimStatistics,
    pub last_nonce: Option<u64>,
}

/// External services the issuer talks to
pub struct Collaborators {
    pub chain: Arc<dyn ChainClient>,
    pub ledger: Arc<dyn ClaimStore>,
    pub captcha: Arc<dyn CaptchaVerifier>,
    pub counters: Arc<dyn CounterStore>,
    pub chain_id: u64,
}

impl Collaborators {
    /// Production wiring: JSON-RPC node, sled ledger, hCaptcha, in-memory counters
    pub async fn from_config(config: &FaucetConfig) -> FaucetResult<(Self, Arc<ClaimLedger>)> {
        let chain: Arc<dyn ChainClient> =
            Arc::new(JsonRpcClient::new(config.rpc_url.clone(), config.rpc_timeout())?);

        let chain_id = match config.chain_id {
            Some(id) => id,
            None => {
                let id = chain.chain_id().await?;
                info!("Chain id reported by node: {}", id);
                id
            }
        };

        let captcha: Arc<dyn CaptchaVerifier> = if config.captcha_enabled {
            let secret = config
                .captcha_secret
                .clone()
                .ok_or_else(|| FaucetError::Config("captcha_secret is required".to_string()))?;
            let verifier =
                HCaptchaVerifier::new(config.captcha_verify_url.clone(), secret, config.rpc_timeout())
                    .map_err(|e| FaucetError::Config(e.to_string()))?;
            Arc::new(verifier)
        } else {
            warn!("Captcha verification is disabled");
            Arc::new(DisabledCaptcha)
        };

        let ledger = Arc::new(ClaimLedger::open(&config.db_path)?);
        let counters = Arc::new(InMemoryCounterStore::new(
            config.rate_limit_duration(),
            config.rate_limit_capacity,
        ));

        Ok((
            Self {
                chain,
                ledger: ledger.clone(),
                captcha,
                counters,
                chain_id,
            },
            ledger,
        ))
    }
}

/// Claim orchestrator.
///
/// Stages run in order and the first rejection ends the claim:
/// validate, rate limit, captcha, cooldown, balance, nonce + broadcast,
/// confirmation, ledger write. Nothing is retried. A failure after broadcast
/// leaves no ledger record even though a transaction may exist.
pub struct ClaimIssuer {
    assets: AssetTable,
    cooldown_secs: u64,
    faucet_address: Address,
    chain: Arc<dyn ChainClient>,
    ledger: Arc<dyn ClaimStore>,
    captcha: Arc<dyn CaptchaVerifier>,
    rate_limiter: RateLimiter,
    nonces: NonceSequencer,
    submitter: TransactionSubmitter,
    /// Held from nonce acquisition through broadcast
    submission_lane: Mutex<()>,
    in_flight: InFlight,
    metrics: FaucetMetrics,
}

impl ClaimIssuer {
    pub fn new(config: &FaucetConfig, collaborators: Collaborators) -> FaucetResult<Self> {
        config.validate()?;
        let assets = AssetTable::from_config(config)?;
        let signer = LocalSigner::from_hex(&config.private_key)
            .map_err(|e| FaucetError::Config(e.to_string()))?;
        let faucet_address = signer.address();
        info!("Faucet address: {}", faucet_address.to_checksum());

        let Collaborators {
            chain,
            ledger,
            captcha,
            counters,
            chain_id,
        } = collaborators;

        let rate_limiter = RateLimiter::new(
            counters,
            config.max_requests_per_window,
            config.global_requests_per_minute,
        );
        let nonces = NonceSequencer::new(chain.clone(), faucet_address);
        let submitter = TransactionSubmitter::new(
            chain.clone(),
            signer,
            SubmitterSettings {
                chain_id,
                fee_mode: config.fee_mode,
                confirmations: config.confirmations,
                confirmation_timeout: config.confirmation_timeout(),
                poll_interval: config.confirmation_poll_interval(),
            },
        );

        Ok(Self {
            assets,
            cooldown_secs: config.address_cooldown_secs,
            faucet_address,
            chain,
            ledger,
            captcha,
            rate_limiter,
            nonces,
            submitter,
            submission_lane: Mutex::new(()),
            in_flight: InFlight::default(),
            metrics: FaucetMetrics::new()?,
        })
    }

    pub fn faucet_address(&self) -> Address {
        self.faucet_address
    }

    pub fn metrics(&self) -> &FaucetMetrics {
        &self.metrics
    }

    /// Run one claim to completion
    pub async fn claim(&self, request: ClaimRequest) -> FaucetResult<ClaimReceipt> {
        let timer = self.metrics.claim_duration.start_timer();
        let result = self.issue(request).await;
        timer.observe_duration();
        self.metrics.record_outcome(&result);
        result
    }

    async fn issue(&self, request: ClaimRequest) -> FaucetResult<ClaimReceipt> {
        info!("Claim request for address: {}, IP: {}", request.address, request.client_ip);

        // 1. Validate address and asset
        let address = self.validate_address(&request.address)?;
        let asset = self.assets.resolve(request.token.as_deref())?;

        // 2. Rate limit
        if !self.rate_limiter.try_consume(&request.client_ip.to_string()).await {
            return Err(FaucetError::RateLimited);
        }

        // 3. Captcha
        if !self.captcha.verify(&request.captcha, Some(request.client_ip)).await {
            return Err(FaucetError::CaptchaFailed);
        }

        // 4. Cooldown; the reservation covers the gap until the ledger write
        let _reservation = self.in_flight.reserve(address).ok_or_else(|| {
            debug!("Address {} already has a claim in flight", address);
            FaucetError::ClaimInProgress
        })?;
        self.check_cooldown(&address).await?;

        // 5. Faucet balance
        self.check_faucet_balance(asset).await?;

        // 6. Nonce + broadcast, one claim at a time
        let tx_hash = {
            let _lane = self.submission_lane.lock().await;
            let nonce = self.nonces.next_nonce().await?;
            self.metrics.last_nonce.set(i64::try_from(nonce).unwrap_or(i64::MAX));
            match self.submitter.broadcast(&address, asset, nonce).await {
                Ok(hash) => hash,
                // the node already holds a transaction at this nonce
                Err(e @ FaucetError::DuplicateSubmission) => return Err(e),
                Err(e) => {
                    self.nonces.release(nonce);
                    return Err(e);
                }
            }
        };

        // 7. Confirmation
        let receipt = self.submitter.wait_for_confirmation(&tx_hash).await?;

        // 8. Record
        let record = ClaimRecord {
            address: address.to_string(),
            asset: asset.kind,
            amount: asset.amount.to_string(),
            tx_hash: tx_hash.to_string(),
            timestamp: Utc::now().timestamp(),
            ip_address: request.client_ip.to_string(),
        };
        if let Err(e) = self.ledger.record_claim(record).await {
            error!("Claim {} confirmed but not recorded: {}", tx_hash, e);
            return Err(e);
        }

        info!(
            "Successfully sent {} {} to {}, tx: {}",
            asset.amount, asset.symbol, address, tx_hash
        );

        Ok(ClaimReceipt {
            tx_hash,
            address,
            asset: asset.kind,
            amount: asset.amount.to_string(),
            block_number: receipt.block_number,
        })
    }

    /// Validate address format
    fn validate_address(&self, raw: &str) -> FaucetResult<Address> {
        let address: Address = raw
            .trim()
            .parse()
            .map_err(|e: faucet_common::AddressError| FaucetError::InvalidAddress(e.to_string()))?;

        if address.is_zero() {
            return Err(FaucetError::InvalidAddress("zero address not allowed".to_string()));
        }
        if address == self.faucet_address {
            return Err(FaucetError::InvalidAddress(
                "cannot send to the faucet address".to_string(),
            ));
        }
        Ok(address)
    }

    /// Check address cooldown
    async fn check_cooldown(&self, address: &Address) -> FaucetResult<()> {
        let Some(last_claim) = self.ledger.last_claim_time(&address.to_string()).await? else {
            return Ok(());
        };

        let now = Utc::now().timestamp();
        match cooldown_remaining_minutes(last_claim, now, self.cooldown_secs) {
            Some(minutes) => {
                debug!("Address {} in cooldown, {} minutes left", address, minutes);
                Err(FaucetError::CooldownActive { minutes })
            }
            None => Ok(()),
        }
    }

    /// Check faucet balance covers one claim of `asset`
    async fn check_faucet_balance(&self, asset: &Asset) -> FaucetResult<()> {
        let balance = match asset.contract {
            None => self.chain.balance(&self.faucet_address).await?,
            Some(token) => self.chain.token_balance(&token, &self.faucet_address).await?,
        };

        if balance < asset.amount {
            warn!("Faucet {} balance low: {}", asset.symbol, balance);
            return Err(FaucetError::InsufficientFunds);
        }
        Ok(())
    }

    /// Get faucet status
    pub async fn status(&self) -> FaucetResult<FaucetStatus> {
        let balance = self.chain.balance(&self.faucet_address).await?;
        let statistics = self.ledger.statistics().await?;

        let assets = self
            .assets
            .iter()
            .map(|asset| AssetStatus {
                kind: asset.kind,
                symbol: asset.symbol.clone(),
                amount: asset.amount.to_string(),
                contract: asset.contract,
            })
            .collect();

        Ok(FaucetStatus {
            address: self.faucet_address,
            balance: balance.to_string(),
            cooldown_secs: self.cooldown_secs,
            assets,
            statistics,
            last_nonce: self.nonces.last_issued(),
        })
    }

    /// Most recent confirmed claims, newest first
    pub async fn recent_claims(&self, limit: usize) -> FaucetResult<Vec<ClaimRecord>> {
        self.ledger.recent_claims(limit).await
    }
}
