//! Chain asset tables and balance normalization.
//!
//! Balances arrive in two encodings depending on the API a node exposes:
//! the structured NAI form (`{"amount": "2015429", "precision": 3, "nai": "@@000000021"}`)
//! and the legacy string form (`"2015.429 STEEM"`). Both are normalized into
//! an [`Amount`] scaled to the asset's precision with round-half-to-even.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

pub const STEEM_CHAIN_ID: &str = "0000000000000000000000000000000000000000000000000000000000000000";
pub const HIVE_CHAIN_ID: &str = "beeab0de00000000000000000000000000000000000000000000000000000000";
pub const BLURT_CHAIN_ID: &str = "cd8d90f29ae273abec3eaa7731e25934c63eb654d55080caff2ebb7f5df6381f";
pub const GOLOS_CHAIN_ID: &str = "782a3039b478c839e4cb0c941ff4eaeb7df40bdd68bd441afd444b9da763de12";

// ==============================================================================
// Asset / Amount
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    pub symbol: String,
    pub precision: u32,
    /// Numeric asset identifier (NAI), e.g. `@@000000021`. Absent on chains
    /// that predate NAIs and on ad-hoc assets.
    pub asset_id: Option<String>,
    pub chain_id: String,
}

impl Asset {
    pub fn new(symbol: &str, precision: u32, asset_id: Option<&str>, chain_id: &str) -> Self {
        Self {
            symbol: symbol.to_owned(),
            precision,
            asset_id: asset_id.map(str::to_owned),
            chain_id: chain_id.to_owned(),
        }
    }
}

/// A quantity of an [`Asset`], always carrying exactly `asset.precision`
/// fractional digits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub asset: Asset,
    pub value: BigDecimal,
}

impl Amount {
    /// Scale `value` to the asset's precision (half-to-even) and wrap it.
    pub fn new(asset: Asset, value: &BigDecimal) -> Self {
        let value = value.with_scale_round(i64::from(asset.precision), RoundingMode::HalfEven);
        Self { asset, value }
    }

    pub fn symbol(&self) -> &str {
        &self.asset.symbol
    }

    pub fn precision(&self) -> u32 {
        self.asset.precision
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.asset.symbol)
    }
}

// ==============================================================================
// Known Asset Tables
// ==============================================================================

/// Assets of one chain, reachable by NAI and by symbol.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    by_key: HashMap<String, Asset>,
}

impl AssetTable {
    pub fn new(chain_id: &str, assets: &[(&str, u32, Option<&str>)]) -> Self {
        let mut table = Self::default();
        for (symbol, precision, nai) in assets {
            table.insert(Asset::new(symbol, *precision, *nai, chain_id));
        }
        table
    }

    pub fn insert(&mut self, asset: Asset) {
        if let Some(nai) = &asset.asset_id {
            self.by_key.insert(nai.clone(), asset.clone());
        }
        self.by_key.insert(asset.symbol.clone(), asset);
    }

    /// Look up by NAI or symbol.
    pub fn get(&self, key: &str) -> Option<&Asset> {
        self.by_key.get(key)
    }
}

/// Per-chain asset tables, keyed by chain id.
#[derive(Debug, Clone, Default)]
pub struct KnownAssets {
    tables: HashMap<String, AssetTable>,
}

impl KnownAssets {
    /// Tables for every chain this crate ships defaults for.
    pub fn builtin() -> Self {
        let mut known = Self::default();
        known.insert_table(
            STEEM_CHAIN_ID,
            AssetTable::new(
                STEEM_CHAIN_ID,
                &[
                    ("SBD", 3, Some("@@000000013")),
                    ("STEEM", 3, Some("@@000000021")),
                    ("VESTS", 6, Some("@@000000037")),
                ],
            ),
        );
        known.insert_table(
            HIVE_CHAIN_ID,
            AssetTable::new(
                HIVE_CHAIN_ID,
                &[
                    ("HBD", 3, Some("@@000000013")),
                    ("HIVE", 3, Some("@@000000021")),
                    ("VESTS", 6, Some("@@000000037")),
                ],
            ),
        );
        known.insert_table(
            BLURT_CHAIN_ID,
            AssetTable::new(
                BLURT_CHAIN_ID,
                &[
                    ("BLURT", 3, Some("@@000000021")),
                    ("VESTS", 6, Some("@@000000037")),
                ],
            ),
        );
        known.insert_table(
            GOLOS_CHAIN_ID,
            AssetTable::new(
                GOLOS_CHAIN_ID,
                &[("GOLOS", 3, None), ("GBG", 3, None), ("GESTS", 6, None)],
            ),
        );
        known
    }

    pub fn insert_table(&mut self, chain_id: &str, table: AssetTable) {
        self.tables.insert(chain_id.to_owned(), table);
    }

    pub fn table(&self, chain_id: &str) -> Option<&AssetTable> {
        self.tables.get(chain_id)
    }

    pub fn lookup(&self, chain_id: &str, key: &str) -> Option<&Asset> {
        self.table(chain_id).and_then(|table| table.get(key))
    }
}

// ==============================================================================
// Balance Resolution
// ==============================================================================

/// Normalize a raw balance field returned by a node into an [`Amount`].
pub fn resolve_balance(
    raw: &serde_json::Value,
    chain_id: &str,
    known: &KnownAssets,
) -> Result<Amount, CoreError> {
    match raw {
        serde_json::Value::String(s) => resolve_legacy_balance(s, chain_id, known),
        serde_json::Value::Object(_) => resolve_nai_balance(raw, chain_id, known),
        other => Err(CoreError::domain(format!(
            "unsupported balance encoding: {other}"
        ))),
    }
}

fn resolve_nai_balance(
    raw: &serde_json::Value,
    chain_id: &str,
    known: &KnownAssets,
) -> Result<Amount, CoreError> {
    let nai = raw
        .get("nai")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| CoreError::domain(format!("balance is missing `nai`: {raw}")))?;
    let asset = known.lookup(chain_id, nai).ok_or_else(|| {
        CoreError::domain(format!(
            "asset `{nai}` is not known for chain id `{chain_id}`"
        ))
    })?;

    let amount = match raw.get("amount") {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => {
            return Err(CoreError::domain(format!(
                "balance is missing `amount`: {raw}"
            )))
        }
    };
    let precision = raw
        .get("precision")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(u64::from(asset.precision));

    let integer = parse_decimal(&amount)?;
    let (digits, exponent) = integer.into_bigint_and_exponent();
    let precision = i64::try_from(precision)
        .map_err(|_| CoreError::domain(format!("balance precision out of range: {precision}")))?;
    let value = BigDecimal::new(digits, exponent + precision);

    Ok(Amount::new(asset.clone(), &value))
}

fn resolve_legacy_balance(
    raw: &str,
    chain_id: &str,
    known: &KnownAssets,
) -> Result<Amount, CoreError> {
    let mut parts = raw.split_whitespace();
    let (Some(literal), Some(symbol), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(CoreError::domain(format!(
            "balance string must look like `<amount> <SYMBOL>`, got `{raw}`"
        )));
    };
    let value = parse_decimal(literal)?;

    let asset = match known.lookup(chain_id, symbol) {
        Some(asset) => asset.clone(),
        None => {
            let precision = literal
                .split_once('.')
                .map(|(_, frac)| frac.len() as u32)
                .unwrap_or(0);
            warn!(
                symbol,
                chain_id,
                precision,
                "unknown asset symbol; deriving precision from the amount literal"
            );
            Asset::new(symbol, precision, None, chain_id)
        }
    };

    Ok(Amount::new(asset, &value))
}

fn parse_decimal(literal: &str) -> Result<BigDecimal, CoreError> {
    BigDecimal::from_str(literal)
        .map_err(|e| CoreError::domain(format!("invalid decimal amount `{literal}`: {e}")))
}
