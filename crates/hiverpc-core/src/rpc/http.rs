use std::num::NonZeroU32;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::CoreError;

use super::Transport;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

struct SessionState {
    depth: usize,
    client: Option<reqwest::Client>,
}

/// `reqwest`-backed [`Transport`].
///
/// Without `reuse_http` every POST builds a fresh `reqwest::Client` unless a
/// session is open, in which case one client (and its connection pool) is
/// shared until the outermost session closes. With `reuse_http` the shared
/// client lives as long as the transport.
///
/// If `requests_per_second` is set, every outbound POST waits on a governor
/// limiter first; a batch counts as one request.
pub struct HttpTransport {
    headers: HeaderMap,
    timeout: Duration,
    batch_timeout: Duration,
    reuse_http: bool,
    limiter: Option<DirectRateLimiter>,
    session: Mutex<SessionState>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self, CoreError> {
        let headers = build_headers(config)?;
        let limiter = match config.requests_per_second {
            None => None,
            Some(limit) => {
                let limit = NonZeroU32::new(limit).ok_or_else(|| {
                    CoreError::Config("requests_per_second must be at least 1".to_owned())
                })?;
                Some(RateLimiter::direct(Quota::per_second(limit)))
            }
        };

        let transport = Self {
            headers,
            timeout: config.timeout,
            batch_timeout: config.batch_timeout,
            reuse_http: config.reuse_http,
            limiter,
            session: Mutex::new(SessionState {
                depth: 0,
                client: None,
            }),
        };
        // Surface builder failures at construction rather than on first call.
        let probe = transport.build_client()?;
        if transport.reuse_http {
            transport.lock_session().client = Some(probe);
        }
        Ok(transport)
    }

    /// Whether a shared client is currently held.
    pub fn has_shared_client(&self) -> bool {
        self.lock_session().client.is_some()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn build_client(&self) -> Result<reqwest::Client, CoreError> {
        reqwest::Client::builder()
            .default_headers(self.headers.clone())
            .connect_timeout(CONNECT_TIMEOUT.min(self.timeout))
            .timeout(self.timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(|e| CoreError::Config(format!("cannot build HTTP client: {e}")))
    }

    fn client(&self) -> Result<reqwest::Client, CoreError> {
        let mut session = self.lock_session();
        if let Some(client) = &session.client {
            return Ok(client.clone());
        }
        let client = self.build_client()?;
        if self.reuse_http || session.depth > 0 {
            session.client = Some(client.clone());
        }
        Ok(client)
    }

    /// Batches get their own (longer) timeout.
    fn timeout_for(&self, body: &str) -> Duration {
        if body.trim_start().starts_with('[') {
            self.batch_timeout
        } else {
            self.timeout
        }
    }

    async fn wait_for_rate_limit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, node: &str, body: &str) -> Result<String, CoreError> {
        self.wait_for_rate_limit().await;
        let client = self.client()?;
        let timeout = self.timeout_for(body);
        debug!(rpc.node = node, body_len = body.len(), ?timeout, "http post");

        let response = client
            .post(node)
            .timeout(timeout)
            .body(body.to_owned())
            .send()
            .await
            .map_err(|e| transport_error(node, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| transport_error(node, e))?;
        debug!(rpc.node = node, %status, body_len = text.len(), "http response");
        trace!(rpc.node = node, body = %text, "http response body");

        if !status.is_success() {
            return Err(CoreError::Transport {
                node: node.to_owned(),
                status: Some(status.as_u16()),
                timed_out: false,
                message: format!("HTTP status {status}"),
            });
        }
        Ok(text)
    }

    fn enter_session(&self) {
        self.lock_session().depth += 1;
    }

    fn exit_session(&self) {
        let mut session = self.lock_session();
        session.depth = session.depth.saturating_sub(1);
        if session.depth == 0 && !self.reuse_http {
            session.client = None;
        }
    }
}

fn build_headers(config: &ClientConfig) -> Result<HeaderMap, CoreError> {
    let mut headers = HeaderMap::with_capacity(config.headers.len());
    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| CoreError::Config(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| CoreError::Config(format!("invalid value for header `{name}`: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn transport_error(node: &str, err: reqwest::Error) -> CoreError {
    CoreError::Transport {
        node: node.to_owned(),
        status: err.status().map(|s| s.as_u16()),
        timed_out: err.is_timeout(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_from_config() {
        let config = ClientConfig::default().with_header("x-app", "hiverpc");
        let headers = build_headers(&config).expect("valid headers");
        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("x-app").unwrap(), "hiverpc");
    }

    #[test]
    fn invalid_header_is_config_error() {
        let config = ClientConfig::default().with_header("bad header", "v");
        assert!(matches!(build_headers(&config), Err(CoreError::Config(_))));
    }

    #[test]
    fn session_holds_shared_client_until_outermost_exit() {
        let transport = HttpTransport::new(&ClientConfig::default()).expect("transport");
        assert!(!transport.has_shared_client());

        transport.enter_session();
        transport.enter_session();
        transport.client().expect("client");
        assert!(transport.has_shared_client());

        transport.exit_session();
        assert!(transport.has_shared_client());
        transport.exit_session();
        assert!(!transport.has_shared_client());
    }

    #[test]
    fn reuse_http_keeps_client_outside_sessions() {
        let config = ClientConfig::default().with_reuse_http(true);
        let transport = HttpTransport::new(&config).expect("transport");
        assert!(transport.has_shared_client());
        transport.enter_session();
        transport.exit_session();
        assert!(transport.has_shared_client());
    }

    #[test]
    fn batch_bodies_use_batch_timeout() {
        let config = ClientConfig::default()
            .with_timeout(Duration::from_secs(7))
            .with_batch_timeout(Duration::from_secs(90));
        let transport = HttpTransport::new(&config).expect("transport");
        assert_eq!(
            transport.timeout_for(r#"{"jsonrpc":"2.0","method":"m","params":[],"id":1}"#),
            Duration::from_secs(7)
        );
        assert_eq!(
            transport.timeout_for(r#"[{"jsonrpc":"2.0","method":"m","params":[],"id":1}]"#),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        let config = ClientConfig::default().with_requests_per_second(Some(0));
        assert!(matches!(
            HttpTransport::new(&config),
            Err(CoreError::Config(_))
        ));
    }
}
