use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::config::ClientConfig;
use crate::error::CoreError;

use super::nodes::NodePool;
use super::protocol::{check_batch_response, check_response, CallStyle, JsonRpcRequest};
use super::Transport;

/// Whether a failed call is resent against the next node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Retry {
    #[default]
    Auto,
    /// Return the first failure unchanged. Used by callers that run their
    /// own retry loop around a larger unit of work.
    Never,
}

/// JSON-RPC client with node failover.
///
/// Every failure except [`CoreError::Config`] is retried: the client rotates
/// to the next node, sleeps `retry_delay`, and resends the identical body.
/// After `max_retry` retries the last error is returned unchanged, so
/// `max_retry = 2` means at most three attempts.
pub struct RpcClient {
    transport: Arc<dyn Transport>,
    nodes: NodePool,
    use_appbase: AtomicBool,
    max_retry: AtomicU32,
    retry_delay_ms: AtomicU64,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Result<Self, CoreError> {
        Ok(Self {
            transport,
            nodes: NodePool::new(config.nodes.clone())?,
            use_appbase: AtomicBool::new(config.use_appbase),
            max_retry: AtomicU32::new(config.max_retry),
            retry_delay_ms: AtomicU64::new(duration_millis(config.retry_delay)),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn nodes(&self) -> &NodePool {
        &self.nodes
    }

    pub fn call_style(&self) -> CallStyle {
        CallStyle::from_appbase(self.use_appbase.load(Ordering::Relaxed))
    }

    pub fn set_use_appbase(&self, use_appbase: bool) {
        self.use_appbase.store(use_appbase, Ordering::Relaxed);
    }

    pub fn max_retry(&self) -> u32 {
        self.max_retry.load(Ordering::Relaxed)
    }

    pub fn set_max_retry(&self, max_retry: u32) {
        self.max_retry.store(max_retry, Ordering::Relaxed);
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms.load(Ordering::Relaxed))
    }

    pub fn set_retry_delay(&self, delay: Duration) {
        self.retry_delay_ms
            .store(duration_millis(delay), Ordering::Relaxed);
    }

    /// Reserve the next request id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send one request and return the whole decoded response.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        self.call_with(method, params, None, Retry::Auto).await
    }

    pub async fn call_with(
        &self,
        method: &str,
        params: serde_json::Value,
        id: Option<u64>,
        retry: Retry,
    ) -> Result<serde_json::Value, CoreError> {
        let id = id.unwrap_or_else(|| self.next_id());
        let request = JsonRpcRequest::new(method, params, id);
        let body = serde_json::to_string(&request)
            .map_err(|e| CoreError::domain(format!("cannot encode request: {e}")))?;
        debug!(rpc.id = id, rpc.method = method, "rpc call");
        trace!(rpc.id = id, body = %body, "rpc request body");

        self.with_retry(retry, |node| {
            let body = &body;
            async move {
                let text = self.transport.post(&node, body).await?;
                check_response(&node, &text)
            }
        })
        .await
    }

    /// Send all requests as one JSON array and return the response elements
    /// as the node ordered them.
    pub async fn batch_call(
        &self,
        requests: &[JsonRpcRequest],
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        self.batch_call_with(requests, Retry::Auto).await
    }

    pub async fn batch_call_with(
        &self,
        requests: &[JsonRpcRequest],
        retry: Retry,
    ) -> Result<Vec<serde_json::Value>, CoreError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        let body = serde_json::to_string(requests)
            .map_err(|e| CoreError::domain(format!("cannot encode batch request: {e}")))?;
        debug!(
            rpc.batch_start_id = requests[0].id,
            rpc.batch_size = requests.len(),
            "rpc batch call"
        );
        trace!(rpc.batch_size = requests.len(), body = %body, "rpc batch request body");

        self.with_retry(retry, |node| {
            let body = &body;
            async move {
                let text = self.transport.post(&node, body).await?;
                check_batch_response(&node, &text)
            }
        })
        .await
    }

    /// Call `api.method(params)` under the configured convention and return
    /// the `result` field.
    pub async fn api_call(
        &self,
        api: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, CoreError> {
        let (method, params) = self.call_style().route(api, method, params);
        let response = self.call(&method, params).await?;
        Ok(result_of(response))
    }

    /// Run `attempt` against the current node until it succeeds or the retry
    /// budget is spent.
    ///
    /// The closure receives the node to use. Between attempts the node pool
    /// rotates and the task sleeps `retry_delay`.
    pub async fn with_retry<T, F, Fut>(&self, retry: Retry, mut attempt: F) -> Result<T, CoreError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, CoreError>>,
    {
        let mut retries: u32 = 0;
        loop {
            let node = self.nodes.current();
            let err = match attempt(node.clone()).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if retry == Retry::Never || !err.is_retryable() {
                return Err(err);
            }

            retries += 1;
            let max_retry = self.max_retry();
            if retries > max_retry {
                warn!(node = %node, attempts = retries, error = %err, "rpc retries exhausted");
                return Err(err);
            }
            warn!(
                node = %node,
                attempt = retries,
                max_retry,
                error = %err,
                "rpc request failed; retrying on next node"
            );
            self.nodes.rotate();
            tokio::time::sleep(self.retry_delay()).await;
        }
    }
}

/// The `result` of a single-call response. A list response (some nodes
/// answer that way) yields the first element's result.
pub(crate) fn result_of(response: serde_json::Value) -> serde_json::Value {
    match response {
        serde_json::Value::Array(mut items) if !items.is_empty() => result_of(items.swap_remove(0)),
        serde_json::Value::Object(mut map) => map.remove("result").unwrap_or(serde_json::Value::Null),
        _ => serde_json::Value::Null,
    }
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
