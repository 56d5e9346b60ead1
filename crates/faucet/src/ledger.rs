//! Claim ledger for cooldown tracking and audit

use crate::asset::AssetKind;
use crate::error::{FaucetError, FaucetResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Claim record, written once the transfer is confirmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Claimant address, lowercase `0x` form
    pub address: String,
    pub asset: AssetKind,
    /// Amount sent (base units)
    pub amount: String,
    /// Transaction hash
    pub tx_hash: String,
    /// Seconds since epoch
    pub timestamp: i64,
    /// IP address
    pub ip_address: String,
}

impl ClaimRecord {
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.timestamp, 0).unwrap_or_else(Utc::now)
    }
}

/// Claim statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClaimStatistics {
    pub total_claims: usize,
    pub unique_addresses: u64,
    pub claims_by_asset: BTreeMap<AssetKind, usize>,
}

/// Append-only store of confirmed claims
#[async_trait]
pub trait ClaimStore: Send + Sync {
    /// Timestamp of the newest claim for `address` (exact, lowercase match)
    async fn last_claim_time(&self, address: &str) -> FaucetResult<Option<i64>>;

    async fn record_claim(&self, record: ClaimRecord) -> FaucetResult<()>;

    async fn statistics(&self) -> FaucetResult<ClaimStatistics>;

    /// Newest first
    async fn recent_claims(&self, limit: usize) -> FaucetResult<Vec<ClaimRecord>>;
}

/// sled-backed ledger.
///
/// `claims` holds every record keyed `address:timestamp:tx_hash` so a prefix
/// scan yields one claimant's history in time order. `by_time` holds the same
/// records keyed `timestamp:address:tx_hash` for newest-first reads. `latest`
/// maps each address to its newest timestamp for the cooldown lookup, and
/// `counters` keeps the running totals reported by `statistics`.
pub struct ClaimLedger {
    db: Db,
    claims: Tree,
    by_time: Tree,
    latest: Tree,
    counters: Tree,
}

const TOTAL_CLAIMS: &str = "total";
const UNIQUE_ADDRESSES: &str = "unique";
const ASSET_PREFIX: &str = "asset:";

fn decode_timestamp(bytes: &[u8]) -> FaucetResult<i64> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| FaucetError::Unexpected("invalid timestamp format".to_string()))?;
    Ok(i64::from_be_bytes(arr))
}

fn decode_record(value: &IVec) -> FaucetResult<ClaimRecord> {
    bincode::deserialize(value).map_err(|e| FaucetError::Unexpected(e.to_string()))
}

fn decode_count(bytes: Option<&[u8]>) -> u64 {
    bytes
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map_or(0, u64::from_be_bytes)
}

fn bump(tree: &Tree, key: &str) -> FaucetResult<()> {
    tree.update_and_fetch(key, |old| Some((decode_count(old) + 1).to_be_bytes().to_vec()))?;
    Ok(())
}

fn as_count(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

impl ClaimLedger {
    /// Create or open the ledger at `path`
    pub fn open(path: &str) -> FaucetResult<Self> {
        info!("Opening claim ledger at: {}", path);
        let db = sled::Config::default()
            .path(path)
            .cache_capacity(64 * 1024 * 1024)
            .open()?;
        Self::from_db(db)
    }

    /// Ledger that disappears when dropped
    pub fn temporary() -> FaucetResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> FaucetResult<Self> {
        Ok(Self {
            claims: db.open_tree("claims")?,
            by_time: db.open_tree("claims_by_time")?,
            latest: db.open_tree("latest")?,
            counters: db.open_tree("counters")?,
            db,
        })
    }

    /// Force pending writes to disk
    pub async fn flush(&self) -> FaucetResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }

    /// Full history for one address, oldest first
    pub fn claims_for_address(&self, address: &str) -> FaucetResult<Vec<ClaimRecord>> {
        self.claims
            .scan_prefix(format!("{}:", address))
            .map(|item| {
                let (_, value) = item?;
                decode_record(&value)
            })
            .collect()
    }

    fn counter(&self, key: &str) -> FaucetResult<u64> {
        Ok(decode_count(self.counters.get(key)?.as_deref()))
    }
}

#[async_trait]
impl ClaimStore for ClaimLedger {
    async fn last_claim_time(&self, address: &str) -> FaucetResult<Option<i64>> {
        match self.latest.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(decode_timestamp(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn record_claim(&self, record: ClaimRecord) -> FaucetResult<()> {
        let value =
            bincode::serialize(&record).map_err(|e| FaucetError::Unexpected(e.to_string()))?;
        let key = format!("{}:{:020}:{}", record.address, record.timestamp, record.tx_hash);
        let time_key = format!("{:020}:{}:{}", record.timestamp, record.address, record.tx_hash);
        self.claims.insert(key, value.clone())?;
        self.by_time.insert(time_key, value)?;

        // keep the newest timestamp even if writes land out of order
        let timestamp = record.timestamp;
        let previous = self.latest.fetch_and_update(record.address.as_bytes(), |old| {
            let newest = old
                .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
                .map(i64::from_be_bytes)
                .map_or(timestamp, |prev| prev.max(timestamp));
            Some(newest.to_be_bytes().to_vec())
        })?;

        bump(&self.counters, TOTAL_CLAIMS)?;
        bump(&self.counters, &format!("{}{}", ASSET_PREFIX, record.asset))?;
        if previous.is_none() {
            bump(&self.counters, UNIQUE_ADDRESSES)?;
        }

        debug!("Recorded claim for address: {}", record.address);
        Ok(())
    }

    async fn statistics(&self) -> FaucetResult<ClaimStatistics> {
        let mut claims_by_asset = BTreeMap::new();
        for item in self.counters.scan_prefix(ASSET_PREFIX) {
            let (key, value) = item?;
            let name = std::str::from_utf8(&key[ASSET_PREFIX.len()..])
                .map_err(|e| FaucetError::Unexpected(e.to_string()))?;
            let kind: AssetKind = name.parse()?;
            claims_by_asset.insert(kind, as_count(decode_count(Some(&value[..]))));
        }

        Ok(ClaimStatistics {
            total_claims: as_count(self.counter(TOTAL_CLAIMS)?),
            unique_addresses: self.counter(UNIQUE_ADDRESSES)?,
            claims_by_asset,
        })
    }

    async fn recent_claims(&self, limit: usize) -> FaucetResult<Vec<ClaimRecord>> {
        self.by_time
            .iter()
            .rev()
            .take(limit)
            .map(|item| {
                let (_, value) = item?;
                decode_record(&value)
            })
            .collect()
    }
}
