//! Domain types for blocks, transactions, operations and accounts.
//!
//! Nodes return blocks in slightly different shapes depending on the API and
//! fork: operations come either as `[name, value]` pairs (condenser) or as
//! `{"type": "..._operation", "value": {...}}` objects, and condenser blocks
//! omit per-transaction ids. The `from_rpc` constructors accept both shapes
//! and fill the gaps from the block itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assets::Amount;
use crate::error::CoreError;

// ==============================================================================
// Blocks
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    /// Block number, taken from the request that fetched the block.
    pub number: u64,
    pub block_id: String,
    pub previous: String,
    pub timestamp: String,
    pub witness: String,
    pub witness_signature: String,
    pub transaction_ids: Vec<String>,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub block_num: u64,
    pub id: String,
    /// Position of the transaction within its block.
    pub transaction_num: u32,
    pub ref_block_num: u64,
    pub ref_block_prefix: u64,
    pub expiration: String,
    pub operations: Vec<Operation>,
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Operation name without the `_operation` suffix, e.g. `vote`.
    #[serde(rename = "type")]
    pub op_type: String,
    pub data: serde_json::Value,
    pub block_num: u64,
    pub tx_id: String,
    pub index_within_tx: u32,
    /// `"{tx_id}-{transaction_num}-{index_within_tx}"`; unique across the chain.
    pub synthetic_id: String,
}

impl Block {
    /// Build a block from a `get_block` result. A `null` result (block not
    /// produced yet, or node lagging) is a domain error so callers can retry
    /// against another node.
    pub fn from_rpc(number: u64, raw: serde_json::Value) -> Result<Self, CoreError> {
        if raw.is_null() {
            return Err(CoreError::domain(format!(
                "block {number} is not available on this node"
            )));
        }
        let raw: RawBlock = serde_json::from_value(raw)
            .map_err(|e| CoreError::domain(format!("invalid block {number}: {e}")))?;

        let transactions = raw
            .transactions
            .into_iter()
            .enumerate()
            .map(|(idx, mut tx)| {
                let transaction_num = tx
                    .transaction_num
                    .unwrap_or_else(|| u32::try_from(idx).unwrap_or(u32::MAX));
                let id = tx
                    .transaction_id
                    .take()
                    .or_else(|| raw.transaction_ids.get(idx).cloned())
                    .unwrap_or_default();
                Transaction::assemble(number, id, transaction_num, tx)
            })
            .collect();

        Ok(Self {
            number,
            block_id: raw.block_id,
            previous: raw.previous,
            timestamp: raw.timestamp,
            witness: raw.witness,
            witness_signature: raw.witness_signature,
            transaction_ids: raw.transaction_ids,
            transactions,
        })
    }

    /// All operations of the block in transaction order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.transactions.iter().flat_map(|tx| tx.operations.iter())
    }
}

impl Transaction {
    fn assemble(block_num: u64, id: String, transaction_num: u32, raw: RawTransaction) -> Self {
        let operations = raw
            .operations
            .into_iter()
            .enumerate()
            .map(|(idx, op)| {
                let (name, data) = op.into_parts();
                let index_within_tx = u32::try_from(idx).unwrap_or(u32::MAX);
                Operation {
                    op_type: normalize_op_type(&name),
                    data,
                    block_num,
                    tx_id: id.clone(),
                    index_within_tx,
                    synthetic_id: format!("{id}-{transaction_num}-{index_within_tx}"),
                }
            })
            .collect();

        Self {
            block_num,
            id,
            transaction_num,
            ref_block_num: raw.ref_block_num,
            ref_block_prefix: raw.ref_block_prefix,
            expiration: raw.expiration,
            operations,
            signatures: raw.signatures,
        }
    }
}

/// `vote_operation` -> `vote`; names without the suffix pass through.
pub fn normalize_op_type(name: &str) -> String {
    name.strip_suffix("_operation").unwrap_or(name).to_owned()
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(default)]
    block_id: String,
    #[serde(default)]
    previous: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    witness: String,
    #[serde(default)]
    witness_signature: String,
    #[serde(default)]
    transaction_ids: Vec<String>,
    #[serde(default)]
    transactions: Vec<RawTransaction>,
}

#[derive(Deserialize)]
struct RawTransaction {
    #[serde(default)]
    ref_block_num: u64,
    #[serde(default)]
    ref_block_prefix: u64,
    #[serde(default)]
    expiration: String,
    #[serde(default)]
    operations: Vec<RawOperation>,
    #[serde(default)]
    signatures: Vec<String>,
    #[serde(default)]
    transaction_id: Option<String>,
    #[serde(default)]
    transaction_num: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOperation {
    Pair(String, serde_json::Value),
    Object {
        #[serde(rename = "type")]
        op_type: String,
        #[serde(default)]
        value: serde_json::Value,
    },
}

impl RawOperation {
    fn into_parts(self) -> (String, serde_json::Value) {
        match self {
            Self::Pair(name, value) => (name, value),
            Self::Object { op_type, value } => (op_type, value),
        }
    }
}

// ==============================================================================
// Account History
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    /// Sequence number of the entry in the account's history.
    pub index: u64,
    pub block_num: u64,
    pub trx_id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub op_type: String,
    pub data: serde_json::Value,
}

impl HistoryItem {
    /// Parse one `[index, {trx_id, block, timestamp, op, ...}]` history entry.
    pub fn from_rpc(raw: &serde_json::Value) -> Result<Self, CoreError> {
        #[derive(Deserialize)]
        struct Entry {
            #[serde(default)]
            trx_id: String,
            #[serde(default)]
            block: u64,
            #[serde(default)]
            timestamp: String,
            op: RawOperation,
        }

        let (index, entry) = match raw.as_array().map(Vec::as_slice) {
            Some([index, entry]) => (index, entry),
            _ => {
                return Err(CoreError::domain(format!(
                    "account history entry must be `[index, entry]`, got {raw}"
                )))
            }
        };
        let index = index
            .as_u64()
            .ok_or_else(|| CoreError::domain(format!("invalid history index: {index}")))?;
        let entry: Entry = serde_json::from_value(entry.clone())
            .map_err(|e| CoreError::domain(format!("invalid history entry {index}: {e}")))?;
        let (name, data) = entry.op.into_parts();

        Ok(Self {
            index,
            block_num: entry.block,
            trx_id: entry.trx_id,
            timestamp: entry.timestamp,
            op_type: normalize_op_type(&name),
            data,
        })
    }
}

// ==============================================================================
// Accounts
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub name: String,
    pub id: Option<u64>,
    /// Resolved balances keyed by asset symbol.
    pub balances: BTreeMap<String, Amount>,
    /// The account object as the node returned it.
    pub raw: serde_json::Value,
}

impl Account {
    /// Wrap a raw account object. Balances are resolved separately since that
    /// needs the chain's asset table.
    pub fn from_rpc(raw: serde_json::Value) -> Result<Self, CoreError> {
        let name = raw
            .get("name")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| CoreError::domain("account object is missing `name`"))?
            .to_owned();
        let id = raw.get("id").and_then(serde_json::Value::as_u64);
        Ok(Self {
            name,
            id,
            balances: BTreeMap::new(),
            raw,
        })
    }

    pub fn balance(&self, symbol: &str) -> Option<&Amount> {
        self.balances.get(symbol)
    }
}
