//! Transaction construction and signing.
//!
//! Supports legacy (EIP-155 replay protected) and EIP-1559 (type 2)
//! transactions, which is all a transfer-only sender needs.

use crate::error::ChainResult;
use crate::signer::{LocalSigner, RecoverableSignature};
use faucet_common::{Address, Hash};
use rlp::RlpStream;

/// EIP-2718 type byte for EIP-1559 transactions
const TX_TYPE_EIP1559: u8 = 0x02;

/// Fee fields, fetched from the node right before signing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
    },
}

/// Unsigned transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub chain_id: u64,
    pub nonce: u64,
    pub fee: FeeParams,
    pub gas_limit: u64,
    pub to: Address,
    /// Value in wei
    pub value: u128,
    pub data: Vec<u8>,
}

/// Signed, broadcast-ready transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: Hash,
}

impl SignedTransaction {
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Append an integer as a minimal big-endian byte string
fn append_uint(stream: &mut RlpStream, value: u128) {
    append_be_bytes(stream, &value.to_be_bytes());
}

fn append_be_bytes(stream: &mut RlpStream, bytes: &[u8]) {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    stream.append(&bytes[start..].to_vec());
}

impl TransactionRequest {
    fn append_common_fields(&self, stream: &mut RlpStream) {
        stream.append(&self.gas_limit);
        stream.append(&self.to.0.to_vec());
        append_uint(stream, self.value);
        stream.append(&self.data);
    }

    fn append_signature(stream: &mut RlpStream, v: u64, sig: &RecoverableSignature) {
        stream.append(&v);
        append_be_bytes(stream, &sig.r);
        append_be_bytes(stream, &sig.s);
    }

    /// Bytes whose keccak hash gets signed
    pub fn signing_payload(&self) -> Vec<u8> {
        match self.fee {
            FeeParams::Legacy { gas_price } => {
                let mut stream = RlpStream::new_list(9);
                stream.append(&self.nonce);
                append_uint(&mut stream, gas_price);
                self.append_common_fields(&mut stream);

                // EIP-155: chain id, 0, 0
                stream.append(&self.chain_id);
                stream.append(&0u8);
                stream.append(&0u8);
                stream.out().to_vec()
            }
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut stream = RlpStream::new_list(9);
                stream.append(&self.chain_id);
                stream.append(&self.nonce);
                append_uint(&mut stream, max_priority_fee_per_gas);
                append_uint(&mut stream, max_fee_per_gas);
                self.append_common_fields(&mut stream);
                stream.begin_list(0); // access list

                let mut payload = vec![TX_TYPE_EIP1559];
                payload.extend_from_slice(&stream.out());
                payload
            }
        }
    }

    pub fn signing_hash(&self) -> Hash {
        Hash::keccak(&self.signing_payload())
    }

    /// Sign and encode for `eth_sendRawTransaction`
    pub fn sign(&self, signer: &LocalSigner) -> ChainResult<SignedTransaction> {
        let sig = signer.sign_hash(&self.signing_hash())?;

        let raw = match self.fee {
            FeeParams::Legacy { gas_price } => {
                let mut stream = RlpStream::new_list(9);
                stream.append(&self.nonce);
                append_uint(&mut stream, gas_price);
                self.append_common_fields(&mut stream);

                let v = self.chain_id * 2 + 35 + u64::from(sig.y_parity);
                Self::append_signature(&mut stream, v, &sig);
                stream.out().to_vec()
            }
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                let mut stream = RlpStream::new_list(12);
                stream.append(&self.chain_id);
                stream.append(&self.nonce);
                append_uint(&mut stream, max_priority_fee_per_gas);
                append_uint(&mut stream, max_fee_per_gas);
                self.append_common_fields(&mut stream);
                stream.begin_list(0);
                Self::append_signature(&mut stream, u64::from(sig.y_parity), &sig);

                let mut raw = vec![TX_TYPE_EIP1559];
                raw.extend_from_slice(&stream.out());
                raw
            }
        };

        let hash = Hash::keccak(&raw);
        Ok(SignedTransaction { raw, hash })
    }
}
