use std::fmt;

/// Coarse classification of a [`CoreError`], for callers that want to branch
/// on the failure family without matching every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Decode,
    Rpc,
    Domain,
    Config,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    /// HTTP-level failure: connection refused, timeout, or a non-2xx status.
    #[error("transport failure against {node}: {message}")]
    Transport {
        node: String,
        status: Option<u16>,
        timed_out: bool,
        message: String,
    },

    /// The node answered, but the body was not valid JSON.
    #[error("undecodable response from {node}: {message}")]
    Decode { node: String, message: String },

    /// The node answered with a populated JSON-RPC `error` field.
    #[error("node returned JSON-RPC error: {0}")]
    Rpc(RpcErrorPayload),

    #[error("{0}")]
    Domain(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } => ErrorKind::Transport,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::Rpc(_) => ErrorKind::Rpc,
            Self::Domain(_) => ErrorKind::Domain,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether the transport should rotate nodes and resend after this error.
    ///
    /// Configuration errors are the only kind that a different node cannot fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    pub(crate) fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }
}

/// The content of a JSON-RPC `error` field as returned by a node.
///
/// Steem-family nodes return `{"code": <int>, "message": <string>, "data": {...}}`,
/// but older forks sometimes return a bare string. The raw value is always
/// kept in `raw` so nothing the node said is lost.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcErrorPayload {
    pub code: Option<i64>,
    pub message: String,
    pub raw: serde_json::Value,
}

impl RpcErrorPayload {
    pub fn from_value(raw: serde_json::Value) -> Self {
        let code = raw.get("code").and_then(serde_json::Value::as_i64);
        let message = match &raw {
            serde_json::Value::String(s) => s.clone(),
            other => other
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| other.to_string()),
        };
        Self { code, message, raw }
    }
}

impl fmt::Display for RpcErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code {code})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}
