//! Nonce sequencing for the faucet wallet.
//!
//! The node's pending transaction count is the source of truth, but it can
//! lag behind transactions this process has just broadcast. The sequencer
//! remembers the last nonce it handed out and never returns anything at or
//! below it. A nonce whose transaction the node rejected is handed back with
//! [`NonceSequencer::release`] so the next claim fills the slot instead of
//! opening a gap the node would queue behind forever.
//!
//! That memory is process-local: a restart forgets in-flight nonces, and two
//! processes sharing one wallet need external coordination.

use crate::error::FaucetResult;
use faucet_chain::ChainClient;
use faucet_common::Address;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

pub struct NonceSequencer {
    chain: Arc<dyn ChainClient>,
    address: Address,
    last_issued: Mutex<Option<u64>>,
}

impl NonceSequencer {
    pub fn new(chain: Arc<dyn ChainClient>, address: Address) -> Self {
        Self {
            chain,
            address,
            last_issued: Mutex::new(None),
        }
    }

    /// `max(pending count, last issued + 1)`, recorded as the new last issued
    pub async fn next_nonce(&self) -> FaucetResult<u64> {
        let pending = self.chain.pending_transaction_count(&self.address).await?;

        let mut last_issued = self.last_issued.lock().unwrap_or_else(PoisonError::into_inner);
        let nonce = match *last_issued {
            Some(last) => pending.max(last + 1),
            None => pending,
        };
        *last_issued = Some(nonce);

        debug!(pending, nonce, "nonce issued");
        Ok(nonce)
    }

    /// Hand back `nonce` after its broadcast was rejected.
    ///
    /// Only rewinds while `nonce` is still the newest issued value; the
    /// caller must hold the submission lane so nothing was issued after it.
    pub fn release(&self, nonce: u64) {
        let mut last_issued = self.last_issued.lock().unwrap_or_else(PoisonError::into_inner);
        if *last_issued == Some(nonce) {
            *last_issued = nonce.checked_sub(1);
            debug!(nonce, "nonce released");
        }
    }

    pub fn last_issued(&self) -> Option<u64> {
        *self.last_issued.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
