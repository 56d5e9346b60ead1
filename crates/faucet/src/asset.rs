//! Assets the faucet can send

use crate::config::FaucetConfig;
use crate::error::{FaucetError, FaucetResult};
use faucet_common::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Asset selector carried in a claim request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetKind {
    Native,
    TokenA,
    TokenB,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Native => "NATIVE",
            AssetKind::TokenA => "TOKEN_A",
            AssetKind::TokenB => "TOKEN_B",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetKind {
    type Err = FaucetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NATIVE" => Ok(AssetKind::Native),
            "TOKEN_A" => Ok(AssetKind::TokenA),
            "TOKEN_B" => Ok(AssetKind::TokenB),
            other => Err(FaucetError::InvalidToken(other.to_string())),
        }
    }
}

/// A configured asset with everything needed to build its transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub kind: AssetKind,
    pub symbol: String,
    /// Amount per claim in base units
    pub amount: u128,
    /// ERC-20 contract; `None` for the native coin
    pub contract: Option<Address>,
    pub gas_limit: u64,
}

fn parse_amount(field: &str, value: &str) -> FaucetResult<u128> {
    value
        .parse::<u128>()
        .map_err(|_| FaucetError::Config(format!("{} is not a base-unit integer: {}", field, value)))
}

/// Native asset plus up to two tokens
#[derive(Debug, Clone)]
pub struct AssetTable {
    native: Asset,
    token_a: Option<Asset>,
    token_b: Option<Asset>,
}

impl AssetTable {
    pub fn from_config(config: &FaucetConfig) -> FaucetResult<Self> {
        let native = Asset {
            kind: AssetKind::Native,
            symbol: config.native_symbol.clone(),
            amount: parse_amount("native_amount", &config.native_amount)?,
            contract: None,
            gas_limit: config.native_gas_limit,
        };

        let token = |kind: AssetKind, token: &Option<crate::config::TokenConfig>| {
            token
                .as_ref()
                .map(|t| -> FaucetResult<Asset> {
                    let contract = t.contract.parse::<Address>().map_err(|e| {
                        FaucetError::Config(format!("{} contract: {}", kind, e))
                    })?;
                    Ok(Asset {
                        kind,
                        symbol: t.symbol.clone(),
                        amount: parse_amount(kind.as_str(), &t.amount)?,
                        contract: Some(contract),
                        gas_limit: config.token_gas_limit,
                    })
                })
                .transpose()
        };

        Ok(Self {
            native,
            token_a: token(AssetKind::TokenA, &config.token_a)?,
            token_b: token(AssetKind::TokenB, &config.token_b)?,
        })
    }

    pub fn get(&self, kind: AssetKind) -> Option<&Asset> {
        match kind {
            AssetKind::Native => Some(&self.native),
            AssetKind::TokenA => self.token_a.as_ref(),
            AssetKind::TokenB => self.token_b.as_ref(),
        }
    }

    /// Resolve the request's `token` field; absent means native
    pub fn resolve(&self, token: Option<&str>) -> FaucetResult<&Asset> {
        let kind = match token {
            None => AssetKind::Native,
            Some(name) => name.parse()?,
        };
        self.get(kind)
            .ok_or_else(|| FaucetError::InvalidToken(format!("{} is not offered", kind)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        std::iter::once(&self.native)
            .chain(self.token_a.iter())
            .chain(self.token_b.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;

    fn config_with_token_a() -> FaucetConfig {
        FaucetConfig {
            token_a: Some(TokenConfig {
                symbol: "MORPH".to_string(),
                contract: "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".to_string(),
                amount: "10000000000000000000".to_string(),
            }),
            ..FaucetConfig::default()
        }
    }

    #[test]
    fn test_resolve_defaults_to_native() {
        let table = AssetTable::from_config(&FaucetConfig::default()).unwrap();
        let asset = table.resolve(None).unwrap();
        assert_eq!(asset.kind, AssetKind::Native);
        assert_eq!(asset.amount, 30_000_000_000_000_000);
        assert_eq!(asset.gas_limit, 21_000);
        assert!(asset.contract.is_none());
    }

    #[test]
    fn test_resolve_token() {
        let table = AssetTable::from_config(&config_with_token_a()).unwrap();
        let asset = table.resolve(Some("TOKEN_A")).unwrap();
        assert_eq!(asset.symbol, "MORPH");
        assert_eq!(asset.gas_limit, 100_000);
        assert!(asset.contract.is_some());
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_resolve_rejects_unknown_and_unconfigured() {
        let table = AssetTable::from_config(&config_with_token_a()).unwrap();
        assert!(matches!(table.resolve(Some("DOGE")), Err(FaucetError::InvalidToken(_))));
        assert!(matches!(table.resolve(Some("TOKEN_B")), Err(FaucetError::InvalidToken(_))));
    }

    #[test]
    fn test_bad_amount_is_config_error() {
        let config = FaucetConfig {
            native_amount: "0.03".to_string(),
            ..FaucetConfig::default()
        };
        assert!(matches!(AssetTable::from_config(&config), Err(FaucetError::Config(_))));
    }
}
