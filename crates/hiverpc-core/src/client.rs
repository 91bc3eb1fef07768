//! [`ChainClient`]: the public entry point.
//!
//! Block range fetching, head-relative addressing, streaming and account
//! lookups are implemented in their own modules as further `impl ChainClient`
//! blocks; this module holds construction, runtime overrides and the plain
//! single-call chain queries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::assets::KnownAssets;
use crate::cache::{CacheFill, TtlCache};
use crate::config::{validate_batch_size, ClientConfig, Network};
use crate::error::CoreError;
use crate::rpc::{CallStyle, HttpTransport, RpcClient, Transport};
use crate::stream::StopSignal;
use crate::types::{Account, Block, HistoryItem};

/// How long a node's `get_config` answer is reused.
pub const NODE_CONFIG_TTL: Duration = Duration::from_secs(300);

pub struct ChainClient {
    pub(crate) rpc: RpcClient,
    network: Network,
    batch_size: AtomicUsize,
    pub(crate) known_assets: KnownAssets,
    /// Node metadata: `node_config`, `chain_id`.
    pub(crate) metadata: TtlCache<serde_json::Value>,
    /// `accounts:{names}` -> accounts by name.
    pub(crate) accounts: TtlCache<HashMap<String, Account>>,
    pub(crate) stop: StopSignal,
    pub(crate) auto_reset_stream: AtomicBool,
}

impl ChainClient {
    /// Build a client talking HTTP to the configured nodes.
    pub fn new(config: ClientConfig) -> Result<Self, CoreError> {
        config.validate()?;
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client over any [`Transport`].
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        Ok(Self {
            rpc: RpcClient::new(transport, &config)?,
            network: config.network,
            batch_size: AtomicUsize::new(config.batch_size),
            known_assets: KnownAssets::builtin(),
            metadata: TtlCache::new(),
            accounts: TtlCache::new(),
            stop: StopSignal::new(),
            auto_reset_stream: AtomicBool::new(config.auto_reset_stream),
        })
    }

    pub fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// Open a session scope: the transport keeps one HTTP client alive until
    /// the last outstanding [`Session`] is dropped.
    pub fn session(&self) -> Session {
        let transport = self.rpc.transport().clone();
        transport.enter_session();
        Session { transport }
    }

    // ==========================================================================
    // Runtime overrides
    // ==========================================================================

    pub fn set_nodes(&self, nodes: Vec<String>) -> Result<(), CoreError> {
        self.rpc.nodes().set_nodes(nodes)
    }

    pub fn nodes(&self) -> Vec<String> {
        self.rpc.nodes().nodes()
    }

    pub fn set_use_appbase(&self, use_appbase: bool) {
        self.rpc.set_use_appbase(use_appbase);
    }

    pub fn set_max_retry(&self, max_retry: u32) {
        self.rpc.set_max_retry(max_retry);
    }

    pub fn set_retry_delay(&self, delay: Duration) {
        self.rpc.set_retry_delay(delay);
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.load(Ordering::Relaxed)
    }

    pub fn set_batch_size(&self, batch_size: usize) -> Result<(), CoreError> {
        validate_batch_size(batch_size)?;
        self.batch_size.store(batch_size, Ordering::Relaxed);
        Ok(())
    }

    // ==========================================================================
    // Raw calls
    // ==========================================================================

    /// Send `method(params)` exactly as given and return the whole response.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        self.rpc.call(method, params).await
    }

    /// Call `api.method(params)` under the configured convention and return
    /// its `result`.
    pub async fn api_call(
        &self,
        api: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        self.rpc.api_call(api, method, params).await
    }

    /// Condenser-style methods live under `condenser_api` on appbase nodes
    /// and under `database_api` through the legacy `call` envelope.
    pub(crate) async fn condenser_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        let api = match self.rpc.call_style() {
            CallStyle::Appbase => "condenser_api",
            CallStyle::Legacy => "database_api",
        };
        self.rpc.api_call(api, method, params).await
    }

    // ==========================================================================
    // Chain queries
    // ==========================================================================

    /// Dynamic global properties.
    pub async fn get_props(&self) -> Result<serde_json::Value, CoreError> {
        self.condenser_call("get_dynamic_global_properties", json!([]))
            .await
    }

    /// The node's compile-time configuration, uncached.
    pub async fn get_config(&self) -> Result<serde_json::Value, CoreError> {
        self.condenser_call("get_config", json!([])).await
    }

    /// [`Self::get_config`], cached for [`NODE_CONFIG_TTL`].
    pub async fn node_config(&self) -> Result<serde_json::Value, CoreError> {
        self.metadata
            .get_or_set(
                "node_config",
                CacheFill::deferred(self.get_config()),
                NODE_CONFIG_TTL,
            )
            .await
    }

    pub async fn get_head_block_number(&self) -> Result<u64, CoreError> {
        let props = self.get_props().await?;
        props
            .get("head_block_number")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                CoreError::domain("dynamic global properties lack `head_block_number`")
            })
    }

    pub async fn get_block(&self, number: u64) -> Result<Block, CoreError> {
        let raw = self.condenser_call("get_block", json!([number])).await?;
        Block::from_rpc(number, raw)
    }

    pub async fn get_head_block(&self) -> Result<Block, CoreError> {
        let head = self.get_head_block_number().await?;
        self.get_block(head).await
    }

    /// Up to `limit + 1` history entries of `account`, ending at `start`
    /// (`-1` for the most recent).
    pub async fn account_history(
        &self,
        account: &str,
        start: i64,
        limit: u32,
    ) -> Result<Vec<HistoryItem>, CoreError> {
        let raw = self
            .condenser_call("get_account_history", json!([account, start, limit]))
            .await?;
        let entries = raw.as_array().ok_or_else(|| {
            CoreError::domain(format!("account history of {account} is not a list"))
        })?;
        entries.iter().map(HistoryItem::from_rpc).collect()
    }

    /// Witness object of `name`, or `None` if the account is not a witness.
    pub async fn get_witness(&self, name: &str) -> Result<Option<serde_json::Value>, CoreError> {
        let raw = self
            .condenser_call("get_witness_by_account", json!([name]))
            .await?;
        Ok((!raw.is_null()).then_some(raw))
    }

    /// Witnesses ordered by votes, starting at `start_name` (empty for the top).
    pub async fn get_witness_list(
        &self,
        start_name: &str,
        limit: u32,
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        let raw = self
            .condenser_call("get_witnesses_by_vote", json!([start_name, limit]))
            .await?;
        match raw {
            serde_json::Value::Array(items) => Ok(items),
            other => Err(CoreError::domain(format!(
                "witness list is not a list: {other}"
            ))),
        }
    }
}

/// Session scope guard returned by [`ChainClient::session`].
#[must_use = "the session ends when the guard is dropped"]
pub struct Session {
    transport: Arc<dyn Transport>,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.transport.exit_session();
    }
}
