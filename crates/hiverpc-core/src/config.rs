//! Client configuration.
//!
//! [`ClientConfig`] carries every knob of a [`ChainClient`](crate::ChainClient).
//! Values are per instance; there is no process-wide configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Url;

use crate::error::CoreError;

pub const DEFAULT_HIVE_NODES: &[&str] = &[
    "https://api.deathwing.me",
    "https://anyx.io",
    "https://rpc.ausbit.dev",
    "https://techcoderx.com",
    "https://api.openhive.network",
];
pub const DEFAULT_STEEM_NODES: &[&str] = &["https://api.steemit.com"];
pub const DEFAULT_BLURT_NODES: &[&str] = &["https://api.blurt.blog", "https://rpc.blurt.world"];

// ==============================================================================
// Network
// ==============================================================================

/// Supported Steem-family networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Network {
    #[default]
    Hive,
    Steem,
    Blurt,
}

impl Network {
    pub fn default_nodes(self) -> Vec<String> {
        let nodes = match self {
            Self::Hive => DEFAULT_HIVE_NODES,
            Self::Steem => DEFAULT_STEEM_NODES,
            Self::Blurt => DEFAULT_BLURT_NODES,
        };
        nodes.iter().map(|n| (*n).to_owned()).collect()
    }

    /// Account field holding the chain's secondary (dollar-pegged) currency.
    /// Blurt has no such currency.
    pub fn secondary_balance_field(self) -> Option<&'static str> {
        match self {
            Self::Hive => Some("hbd_balance"),
            Self::Steem => Some("sbd_balance"),
            Self::Blurt => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hive => write!(f, "hive"),
            Self::Steem => write!(f, "steem"),
            Self::Blurt => write!(f, "blurt"),
        }
    }
}

impl FromStr for Network {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hive" => Ok(Self::Hive),
            "steem" => Ok(Self::Steem),
            "blurt" => Ok(Self::Blurt),
            other => Err(CoreError::Config(format!(
                "unknown network `{other}`; expected hive, steem or blurt"
            ))),
        }
    }
}

// ==============================================================================
// Client Config
// ==============================================================================

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub network: Network,
    pub nodes: Vec<String>,
    /// Address methods as `api.method` (appbase) instead of wrapping them in
    /// the legacy `call` envelope.
    pub use_appbase: bool,
    pub max_retry: u32,
    pub retry_delay: Duration,
    /// Upper bound on the number of concurrent chunks a block range is split
    /// into; ranges shorter than this go out as one batch.
    pub batch_size: usize,
    pub timeout: Duration,
    /// HTTP timeout for batch (JSON array) requests, which can carry a whole
    /// chunk of blocks.
    pub batch_timeout: Duration,
    pub headers: BTreeMap<String, String>,
    /// Keep one HTTP client for the lifetime of the instance instead of one
    /// per call.
    pub reuse_http: bool,
    /// Outbound HTTP request rate limit. A batch counts as one request.
    pub requests_per_second: Option<u32>,
    /// Clear the stop signal when a block stream finishes.
    pub auto_reset_stream: bool,
}

impl ClientConfig {
    pub fn new(network: Network) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_owned(), "application/json".to_owned());
        Self {
            network,
            nodes: network.default_nodes(),
            use_appbase: true,
            max_retry: 10,
            retry_delay: Duration::from_secs(2),
            batch_size: 40,
            timeout: Duration::from_secs(10),
            batch_timeout: Duration::from_secs(120),
            headers,
            reuse_http: false,
            requests_per_second: None,
            auto_reset_stream: true,
        }
    }

    /// Replace the node list. An empty list keeps the network defaults.
    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let nodes: Vec<String> = nodes.into_iter().map(Into::into).collect();
        if !nodes.is_empty() {
            self.nodes = nodes;
        }
        self
    }

    pub fn with_appbase(mut self, use_appbase: bool) -> Self {
        self.use_appbase = use_appbase;
        self
    }

    pub fn with_retry(mut self, max_retry: u32, retry_delay: Duration) -> Self {
        self.max_retry = max_retry;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_reuse_http(mut self, reuse_http: bool) -> Self {
        self.reuse_http = reuse_http;
        self
    }

    pub fn with_requests_per_second(mut self, limit: Option<u32>) -> Self {
        self.requests_per_second = limit;
        self
    }

    pub fn with_auto_reset_stream(mut self, auto_reset: bool) -> Self {
        self.auto_reset_stream = auto_reset;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_nodes(&self.nodes)?;
        validate_batch_size(self.batch_size)?;
        if self.requests_per_second == Some(0) {
            return Err(CoreError::Config(
                "requests_per_second must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

pub(crate) fn validate_nodes(nodes: &[String]) -> Result<(), CoreError> {
    if nodes.is_empty() {
        return Err(CoreError::Config("node list must not be empty".to_owned()));
    }
    for node in nodes {
        parse_node_url(node)?;
    }
    Ok(())
}

pub(crate) fn validate_batch_size(batch_size: usize) -> Result<(), CoreError> {
    if batch_size == 0 {
        return Err(CoreError::Config("batch size must be at least 1".to_owned()));
    }
    Ok(())
}

fn parse_node_url(node: &str) -> Result<(), CoreError> {
    let parsed = Url::parse(node).map_err(|e| {
        CoreError::Config(format!("invalid node `{node}`: expected HTTP(S) URL ({e})"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(CoreError::Config(format!(
            "unsupported node scheme `{other}`; expected http or https"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_parses_case_insensitively() {
        assert_eq!("HIVE".parse::<Network>().unwrap(), Network::Hive);
        assert_eq!("steem".parse::<Network>().unwrap(), Network::Steem);
        assert!(matches!(
            "golos".parse::<Network>(),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn defaults_follow_network() {
        let steem = ClientConfig::new(Network::Steem);
        assert_eq!(steem.nodes, vec!["https://api.steemit.com".to_owned()]);
        assert_eq!(steem.batch_size, 40);
        assert_eq!(steem.max_retry, 10);
        assert_eq!(steem.timeout, Duration::from_secs(10));
        assert_eq!(steem.batch_timeout, Duration::from_secs(120));
        assert_eq!(
            steem.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );
        assert!(steem.validate().is_ok());
    }

    #[test]
    fn empty_override_keeps_defaults() {
        let cfg = ClientConfig::new(Network::Blurt).with_nodes(Vec::<String>::new());
        assert_eq!(cfg.nodes, Network::Blurt.default_nodes());
    }

    #[test]
    fn validate_rejects_bad_nodes_and_sizes() {
        let err = ClientConfig::default()
            .with_nodes(["ftp://example.com"])
            .validate()
            .expect_err("ftp is not a node scheme");
        assert!(err.to_string().contains("unsupported node scheme"));

        let err = ClientConfig::default()
            .with_batch_size(0)
            .validate()
            .expect_err("zero batch size");
        assert!(matches!(err, CoreError::Config(_)));

        let err = ClientConfig::default()
            .with_requests_per_second(Some(0))
            .validate()
            .expect_err("zero rate limit");
        assert!(err.to_string().contains("requests_per_second"));
    }

    #[test]
    fn secondary_balance_field_per_network() {
        assert_eq!(Network::Hive.secondary_balance_field(), Some("hbd_balance"));
        assert_eq!(Network::Steem.secondary_balance_field(), Some("sbd_balance"));
        assert_eq!(Network::Blurt.secondary_balance_field(), None);
    }
}
