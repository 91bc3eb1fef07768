//! JSON-RPC 2.0 envelopes and response validation.

use std::ops::Range;

use serde::Serialize;

use crate::error::{CoreError, RpcErrorPayload};

/// Longest slice of an undecodable body quoted back in a `Decode` error.
const BODY_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

// ==============================================================================
// Calling Conventions
// ==============================================================================

/// How API methods are addressed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStyle {
    /// `{"method": "condenser_api.get_block", "params": [1]}`
    Appbase,
    /// `{"method": "call", "params": ["database_api", "get_block", [1]]}`
    Legacy,
}

impl CallStyle {
    pub fn from_appbase(use_appbase: bool) -> Self {
        if use_appbase {
            Self::Appbase
        } else {
            Self::Legacy
        }
    }

    /// Method name and params for `api.method(params)` under this convention.
    pub fn route(
        self,
        api: &str,
        method: &str,
        params: serde_json::Value,
    ) -> (String, serde_json::Value) {
        match self {
            Self::Appbase => (format!("{api}.{method}"), params),
            Self::Legacy => (
                "call".to_owned(),
                serde_json::json!([api, method, params]),
            ),
        }
    }
}

/// One request per number in `range`, each using the number as its id.
pub fn bulk_requests<F>(range: Range<u64>, mut build: F) -> Vec<JsonRpcRequest>
where
    F: FnMut(u64) -> (String, serde_json::Value),
{
    range
        .map(|n| {
            let (method, params) = build(n);
            JsonRpcRequest::new(method, params, n)
        })
        .collect()
}

// ==============================================================================
// Response Validation
// ==============================================================================

/// Validate a single-call response body.
///
/// Some nodes answer a single call with a list; every element is checked for
/// an `error` in that case.
pub(crate) fn check_response(node: &str, body: &str) -> Result<serde_json::Value, CoreError> {
    let decoded = decode_body(node, body)?;
    match &decoded {
        serde_json::Value::Array(items) => {
            for item in items {
                check_error_field(item)?;
            }
        }
        other => check_error_field(other)?,
    }
    Ok(decoded)
}

/// Validate a batch response body: a JSON array of objects, none of which
/// carries an `error`.
pub(crate) fn check_batch_response(
    node: &str,
    body: &str,
) -> Result<Vec<serde_json::Value>, CoreError> {
    match decode_body(node, body)? {
        serde_json::Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                if !item.is_object() {
                    return Err(CoreError::domain(format!(
                        "batch response item {idx} from {node} is not an object: {item}"
                    )));
                }
                check_error_field(item)?;
            }
            Ok(items)
        }
        other => {
            check_error_field(&other)?;
            Err(CoreError::domain(format!(
                "batch response from {node} is not a JSON array"
            )))
        }
    }
}

pub fn parse_response_id(id: &serde_json::Value) -> Option<u64> {
    if let Some(n) = id.as_u64() {
        return Some(n);
    }
    id.as_str().and_then(|s| s.parse::<u64>().ok())
}

fn decode_body(node: &str, body: &str) -> Result<serde_json::Value, CoreError> {
    serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(BODY_EXCERPT_CHARS).collect();
        CoreError::Decode {
            node: node.to_owned(),
            message: format!("{e}; body={excerpt}"),
        }
    })
}

fn check_error_field(value: &serde_json::Value) -> Result<(), CoreError> {
    match value.get("error") {
        Some(err) if is_truthy(err) => Err(CoreError::Rpc(RpcErrorPayload::from_value(err.clone()))),
        _ => Ok(()),
    }
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64() != Some(0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}
