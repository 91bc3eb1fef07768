use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::assets::HIVE_CHAIN_ID;
use crate::client::ChainClient;
use crate::config::ClientConfig;
use crate::error::CoreError;

use super::Transport;

/// How the next scripted POST fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// HTTP-level failure (as if the node returned 502).
    Transport,
    /// 200 with a body that is not JSON.
    Decode,
    /// Well-formed response carrying a JSON-RPC `error`.
    Rpc,
    /// Batch response containing a non-object element.
    NonObject,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub node: String,
    pub body: Value,
}

struct MockState {
    head: u64,
    failures: VecDeque<Failure>,
    requests: Vec<RecordedRequest>,
}

/// A scripted in-process node for testing.
///
/// Simulates a chain whose head advances by `head_step` every time dynamic
/// global properties are read. Blocks `1..=head` exist; anything above the
/// head is returned as `null`, like a real node. Every POST is recorded.
pub struct MockTransport {
    state: Mutex<MockState>,
    head_step: u64,
    reverse_batches: bool,
    down_nodes: HashSet<String>,
    config: Value,
    accounts: HashMap<String, Value>,
    witnesses: Vec<Value>,
}

impl MockTransport {
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder {
            head: 100,
            head_step: 0,
            failures: VecDeque::new(),
            reverse_batches: false,
            down_nodes: HashSet::new(),
            config: json!({
                "HIVE_CHAIN_ID": HIVE_CHAIN_ID,
                "HIVE_BLOCKCHAIN_VERSION": "1.27.5",
                "HIVE_100_PERCENT": 10000,
            }),
            accounts: HashMap::new(),
            witnesses: Vec::new(),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Nodes targeted by each POST, in order.
    pub fn nodes_hit(&self) -> Vec<String> {
        self.lock().requests.iter().map(|r| r.node.clone()).collect()
    }

    /// Number of POSTs whose body named `method` (directly or through `call`).
    pub fn calls_to(&self, method: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .flat_map(|r| match &r.body {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            })
            .filter(|req| route_of(req).0 == method)
            .count()
    }

    pub fn head(&self) -> u64 {
        self.lock().head
    }

    pub fn set_head(&self, head: u64) {
        self.lock().head = head;
    }

    pub fn fail_next(&self, failure: Failure, times: usize) {
        let mut state = self.lock();
        state.failures.extend(std::iter::repeat(failure).take(times));
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let (method, args) = route_of(request);
        let result = match method.as_str() {
            "get_dynamic_global_properties" => {
                let mut state = self.lock();
                let head = state.head;
                state.head += self.head_step;
                Ok(json!({
                    "head_block_number": head,
                    "head_block_id": block_id(head),
                    "time": "2024-01-01T00:00:00",
                    "current_witness": "alice",
                }))
            }
            "get_block" => {
                let number = args.get(0).and_then(Value::as_u64).unwrap_or(0);
                let head = self.lock().head;
                if number == 0 || number > head {
                    Ok(Value::Null)
                } else {
                    Ok(block_json(number))
                }
            }
            "get_config" => Ok(self.config.clone()),
            "find_accounts" => {
                let names = args.get("accounts").cloned().unwrap_or(Value::Null);
                Ok(json!({"accounts": self.lookup_accounts(&names)}))
            }
            "get_accounts" => {
                let names = args.get(0).cloned().unwrap_or(Value::Null);
                Ok(Value::Array(self.lookup_accounts(&names)))
            }
            "get_account_history" => {
                let account = args.get(0).and_then(Value::as_str).unwrap_or_default();
                let start = args.get(1).and_then(Value::as_i64).unwrap_or(-1);
                let limit = args.get(2).and_then(Value::as_u64).unwrap_or(0);
                Ok(history_json(account, start, limit))
            }
            "get_witness_by_account" => {
                let name = args.get(0).and_then(Value::as_str).unwrap_or_default();
                Ok(self
                    .witnesses
                    .iter()
                    .find(|w| w.get("owner").and_then(Value::as_str) == Some(name))
                    .cloned()
                    .unwrap_or(Value::Null))
            }
            "get_witnesses_by_vote" => {
                let from = args.get(0).and_then(Value::as_str).unwrap_or_default();
                let limit = args.get(1).and_then(Value::as_u64).unwrap_or(0) as usize;
                let skip = self
                    .witnesses
                    .iter()
                    .position(|w| w.get("owner").and_then(Value::as_str) == Some(from))
                    .unwrap_or(0);
                Ok(Value::Array(
                    self.witnesses.iter().skip(skip).take(limit).cloned().collect(),
                ))
            }
            other => Err(json!({
                "code": -32601,
                "message": format!("method not found: {other}"),
            })),
        };
        match result {
            Ok(result) => json!({"jsonrpc": "2.0", "id": id, "result": result}),
            Err(error) => json!({"jsonrpc": "2.0", "id": id, "error": error}),
        }
    }

    fn lookup_accounts(&self, names: &Value) -> Vec<Value> {
        names
            .as_array()
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|name| self.accounts.get(name).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct MockTransportBuilder {
    head: u64,
    head_step: u64,
    failures: VecDeque<Failure>,
    reverse_batches: bool,
    down_nodes: HashSet<String>,
    config: Value,
    accounts: HashMap<String, Value>,
    witnesses: Vec<Value>,
}

impl MockTransportBuilder {
    pub fn head(mut self, head: u64) -> Self {
        self.head = head;
        self
    }

    /// Advance the head by `step` blocks on every properties read.
    pub fn head_step(mut self, step: u64) -> Self {
        self.head_step = step;
        self
    }

    pub fn fail_next(mut self, failure: Failure, times: usize) -> Self {
        self.failures
            .extend(std::iter::repeat(failure).take(times));
        self
    }

    /// Every POST to `node` fails at the HTTP level.
    pub fn down_node(mut self, node: &str) -> Self {
        self.down_nodes.insert(node.to_owned());
        self
    }

    /// Answer batches in reverse request order.
    pub fn reverse_batches(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn with_account(mut self, account: Value) -> Self {
        let name = account
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        self.accounts.insert(name, account);
        self
    }

    pub fn with_witness(mut self, witness: Value) -> Self {
        self.witnesses.push(witness);
        self
    }

    pub fn build(self) -> MockTransport {
        MockTransport {
            state: Mutex::new(MockState {
                head: self.head,
                failures: self.failures,
                requests: Vec::new(),
            }),
            head_step: self.head_step,
            reverse_batches: self.reverse_batches,
            down_nodes: self.down_nodes,
            config: self.config,
            accounts: self.accounts,
            witnesses: self.witnesses,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn post(&self, node: &str, body: &str) -> Result<String, CoreError> {
        let parsed: Value = serde_json::from_str(body).map_err(|e| CoreError::Decode {
            node: node.to_owned(),
            message: format!("mock received invalid request body: {e}"),
        })?;
        let failure = {
            let mut state = self.lock();
            state.requests.push(RecordedRequest {
                node: node.to_owned(),
                body: parsed.clone(),
            });
            state.failures.pop_front()
        };

        if self.down_nodes.contains(node) || failure == Some(Failure::Transport) {
            return Err(CoreError::Transport {
                node: node.to_owned(),
                status: Some(502),
                timed_out: false,
                message: "HTTP status 502 Bad Gateway".to_owned(),
            });
        }
        match failure {
            Some(Failure::Decode) => return Ok("<html>upstream error</html>".to_owned()),
            Some(Failure::Rpc) => {
                return Ok(json!({
                    "jsonrpc": "2.0",
                    "id": parsed.get("id").cloned().unwrap_or(Value::Null),
                    "error": {"code": -32000, "message": "Internal Error"},
                })
                .to_string())
            }
            Some(Failure::NonObject) => return Ok("[1, 2, 3]".to_owned()),
            Some(Failure::Transport) | None => {}
        }

        let response = match &parsed {
            Value::Array(requests) => {
                let mut responses: Vec<Value> = requests.iter().map(|r| self.respond(r)).collect();
                if self.reverse_batches {
                    responses.reverse();
                }
                Value::Array(responses)
            }
            single => self.respond(single),
        };
        Ok(response.to_string())
    }
}

/// A two-node Hive client over `mock`, with `max_retry = 2` and a short
/// retry delay.
pub fn mock_client(mock: MockTransport) -> (Arc<MockTransport>, ChainClient) {
    let mock = Arc::new(mock);
    let config = ClientConfig::default()
        .with_nodes(["http://n0.test", "http://n1.test"])
        .with_retry(2, Duration::from_millis(10));
    let client = ChainClient::with_transport(config, mock.clone()).expect("valid config");
    (mock, client)
}

/// Sample Hive account with legacy string balances.
pub fn hive_account(name: &str, id: u64) -> Value {
    json!({
        "id": id,
        "name": name,
        "balance": "2015.429 HIVE",
        "hbd_balance": "78.068 HBD",
        "vesting_shares": "1000.000000 VESTS",
        "post_count": 12,
    })
}

pub fn witness(owner: &str, votes: u64) -> Value {
    json!({
        "owner": owner,
        "votes": votes.to_string(),
        "url": format!("https://{owner}.example"),
        "running_version": "1.27.5",
    })
}

/// `(method, args)` of a request, seen through either calling convention.
fn route_of(request: &Value) -> (String, Value) {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let params = request.get("params").cloned().unwrap_or(Value::Null);
    if method == "call" {
        let name = params
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        return (name, params.get(2).cloned().unwrap_or(Value::Null));
    }
    let name = method.rsplit('.').next().unwrap_or(method).to_owned();
    (name, params)
}

fn block_id(number: u64) -> String {
    format!("{number:08x}{}", "ab".repeat(16))
}

pub fn tx_id(number: u64) -> String {
    format!("{number:08x}{}", "cd".repeat(16))
}

fn block_json(number: u64) -> Value {
    json!({
        "previous": block_id(number - 1),
        "timestamp": "2024-01-01T00:00:00",
        "witness": "alice",
        "transaction_merkle_root": "0000000000000000000000000000000000000000",
        "extensions": [],
        "witness_signature": "1f00",
        "block_id": block_id(number),
        "signing_key": "STM5mockkey",
        "transaction_ids": [tx_id(number)],
        "transactions": [{
            "ref_block_num": number & 0xffff,
            "ref_block_prefix": 3_141_592_653u64,
            "expiration": "2024-01-01T00:01:00",
            "operations": [
                ["vote", {"voter": "alice", "author": "bob", "permlink": "post", "weight": 10000}],
                ["custom_json_operation", {"id": "follow", "json": "[]"}],
            ],
            "extensions": [],
            "signatures": ["1f01"],
        }],
    })
}

fn history_json(account: &str, start: i64, limit: u64) -> Value {
    let last = if start < 0 { 50 } else { start };
    let first = (last - limit as i64).max(0);
    Value::Array(
        (first..=last)
            .map(|idx| {
                json!([idx, {
                    "trx_id": tx_id(idx as u64),
                    "block": 1000 + idx,
                    "trx_in_block": 0,
                    "op_in_trx": 0,
                    "timestamp": "2024-01-01T00:00:00",
                    "op": ["transfer", {"from": account, "to": "bob", "amount": "1.000 HIVE", "memo": ""}],
                }])
            })
            .collect(),
    )
}
