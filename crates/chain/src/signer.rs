//! The faucet's secp256k1 signing key

use crate::error::{ChainError, ChainResult};
use faucet_common::{Address, Hash};
use k256::ecdsa::SigningKey;

/// Recoverable ECDSA signature split into Ethereum's components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id, 0 or 1
    pub y_parity: u8,
}

/// Signing key held in memory together with its derived address
pub struct LocalSigner {
    signing_key: SigningKey,
    address: Address,
}

impl LocalSigner {
    /// Load from a 32-byte hex private key, with or without `0x`
    pub fn from_hex(private_key: &str) -> ChainResult<Self> {
        let private_key_hex = private_key.strip_prefix("0x").unwrap_or(private_key);
        let bytes = hex::decode(private_key_hex)
            .map_err(|e| ChainError::InvalidKey(format!("not hex: {}", e)))?;
        let signing_key =
            SigningKey::from_slice(&bytes).map_err(|e| ChainError::InvalidKey(e.to_string()))?;
        Ok(Self::new(signing_key))
    }

    pub fn new(signing_key: SigningKey) -> Self {
        let public_key = signing_key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 uncompressed tag
        let address = Address::from_public_key(&public_key.as_bytes()[1..]);
        Self {
            signing_key,
            address,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, low-s normalized
    pub fn sign_hash(&self, hash: &Hash) -> ChainResult<RecoverableSignature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&hash.0)
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(RecoverableSignature {
            r,
            s,
            y_parity: recovery_id.to_byte(),
        })
    }
}

impl std::fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
