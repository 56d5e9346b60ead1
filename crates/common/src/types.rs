use crate::error::{AddressError, HashError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const HASH_LENGTH: usize = 32;
pub const ADDRESS_LENGTH: usize = 20;

// --- NewTypes ---

/// 32-byte hash, used for transaction hashes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; HASH_LENGTH]);

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", hex::encode(self.0))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").ok_or(HashError::Malformed)?;
        let mut arr = [0u8; HASH_LENGTH];
        hex::decode_to_slice(body, &mut arr).map_err(|_| HashError::Malformed)?;
        Ok(Hash(arr))
    }
}

impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Hash {
    /// Keccak-256 of `bytes`
    pub fn keccak(bytes: &[u8]) -> Self {
        Hash(keccak_hash::keccak(bytes).0)
    }
}

/// 20-byte account address.
///
/// Displays in canonical lowercase `0x` form, which is also the key used for
/// claim bookkeeping. Parsing accepts all-lowercase or all-uppercase hex, and
/// mixed case only when it matches the EIP-55 checksum.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LENGTH]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LENGTH]
    }

    /// Address owned by an uncompressed secp256k1 public key (without the 0x04 tag)
    pub fn from_public_key(uncompressed: &[u8]) -> Self {
        let hash = keccak_hash::keccak(uncompressed);
        let mut addr = [0u8; ADDRESS_LENGTH];
        addr.copy_from_slice(&hash.0[12..]);
        Address(addr)
    }

    /// EIP-55 mixed-case checksum encoding
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak_hash::keccak(lower.as_bytes());

        let mut out = String::with_capacity(2 + ADDRESS_LENGTH * 2);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let byte = hash.0[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressError::MissingPrefix)?;

        if body.len() != ADDRESS_LENGTH * 2 {
            return Err(AddressError::InvalidLength(body.len()));
        }

        let mut arr = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(body, &mut arr).map_err(|_| AddressError::InvalidHex)?;
        let address = Address(arr);

        let has_lower = body.bytes().any(|b| b.is_ascii_lowercase());
        let has_upper = body.bytes().any(|b| b.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum()[2..] != *body {
            return Err(AddressError::BadChecksum);
        }

        Ok(address)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn test_checksum_encoding() {
        for s in CHECKSUMMED {
            let addr: Address = s.parse().unwrap();
            assert_eq!(addr.to_checksum(), s);
        }
    }

    #[test]
    fn test_parse_accepts_single_case() {
        let lower = CHECKSUMMED[0].to_lowercase();
        let upper = format!("0x{}", CHECKSUMMED[0][2..].to_uppercase());
        let a: Address = lower.parse().unwrap();
        let b: Address = upper.parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), lower);
    }

    #[test]
    fn test_parse_rejects_bad_checksum() {
        // flip the case of one letter
        let bad = "0x5aaeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
        assert_eq!(bad.parse::<Address>(), Err(AddressError::BadChecksum));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert_eq!("0xZZZ".parse::<Address>(), Err(AddressError::InvalidLength(3)));
        assert_eq!(
            "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse::<Address>(),
            Err(AddressError::MissingPrefix)
        );
        assert_eq!(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaeg".parse::<Address>(),
            Err(AddressError::InvalidHex)
        );
        assert!("0x5aaeb6053f3e94c9b9a09f33669435e7ef1bea".parse::<Address>().is_err());
    }

    #[test]
    fn test_zero_address() {
        let zero: Address = "0x0000000000000000000000000000000000000000".parse().unwrap();
        assert!(zero.is_zero());
        assert_eq!(zero, Address::ZERO);
    }

    #[test]
    fn test_hash_roundtrip_display() {
        let hash = Hash::keccak(b"");
        let text = hash.to_string();
        assert_eq!(
            text,
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(text.parse::<Hash>().unwrap(), hash);
        assert!("0x1234".parse::<Hash>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_hex() {
        let addr: Address = CHECKSUMMED[1].parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", CHECKSUMMED[1].to_lowercase()));
    }
}
