//! HTTP layer for platform calls.
//!
//! [`Transport`] is the seam: one attempt, no interpretation of the response.
//! [`Http`] sits on top of it and owns everything the SDK promises callers:
//! base-URL joining, default headers, timeouts, the retry loop and mapping
//! non-success statuses to [`SdkError::UpstreamHttp`].

mod retry;
mod transport;

#[cfg(test)]
pub(crate) mod mock;

pub use retry::{Attempt, RetryPolicy, RetryStrategy};
pub use transport::ReqwestTransport;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;

use crate::defaults;
use crate::error::{Result, SdkError};
use crate::util::mask_token;

/// Headers whose values are masked in logs.
const SECRET_HEADERS: [&str; 2] = ["authorization", "x-access-token"];

/// A single outbound request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Absolute URL, or a path starting with `/` joined onto the base URL
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
    /// Replaces the client's retry policy for this request only
    pub retry: Option<RetryPolicy>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
            timeout: None,
            retry: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Status and raw body of one attempt.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// One attempt against the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse>;
}

/// Request settings shared by every call made through an [`Http`] client.
///
/// Also the caller-facing `request` block of the config options.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Joined in front of request paths that start with `/`
    pub base_url: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<Duration>,
    pub retry_strategy: Option<RetryStrategy>,
}

impl RequestOptions {
    /// Fill unset fields from `defaults`. Headers present in `self` win.
    pub fn with_defaults(mut self, defaults: &RequestOptions) -> Self {
        if self.base_url.is_none() {
            self.base_url = defaults.base_url.clone();
        }
        for (name, value) in &defaults.headers {
            self.headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        self.timeout = self.timeout.or(defaults.timeout);
        self.max_attempts = self.max_attempts.or(defaults.max_attempts);
        self.retry_delay = self.retry_delay.or(defaults.retry_delay);
        if self.retry_strategy.is_none() {
            self.retry_strategy = defaults.retry_strategy.clone();
        }
        self
    }

    fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::default();
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts.max(1);
        }
        if let Some(delay) = self.retry_delay {
            policy.retry_delay = delay;
        }
        if let Some(strategy) = &self.retry_strategy {
            policy.strategy = strategy.clone();
        }
        policy
    }
}

/// Configured platform client: transport plus request defaults.
#[derive(Clone)]
pub struct Http {
    transport: Arc<dyn Transport>,
    options: RequestOptions,
}

impl std::fmt::Debug for Http {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Http")
            .field("base_url", &self.options.base_url)
            .field("headers", &masked_headers(&self.options.headers))
            .finish()
    }
}

impl Http {
    /// Client over the default reqwest transport.
    pub fn new(options: RequestOptions) -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()), options)
    }

    pub fn with_transport(transport: Arc<dyn Transport>, options: RequestOptions) -> Self {
        tracing::debug!(
            "http created: base_url={:?} headers={:?}",
            options.base_url,
            masked_headers(&options.headers)
        );
        Self { transport, options }
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<Value> {
        self.request(HttpRequest::get(url)).await
    }

    /// Send a request with retries and return the parsed body.
    ///
    /// Bodies that are not JSON are returned as [`Value::String`]; an empty
    /// body is [`Value::Null`].
    pub async fn request(&self, request: HttpRequest) -> Result<Value> {
        let prepared = self.prepare(request);
        let policy = prepared
            .retry
            .clone()
            .unwrap_or_else(|| self.options.retry_policy());

        tracing::debug!("{} {}", prepared.method, prepared.url);

        let mut attempt = 1;
        let response = loop {
            let outcome = self.transport.execute(&prepared).await;
            let observed = match &outcome {
                Ok(response) => Attempt::Responded(response.status),
                Err(err) => Attempt::Failed(err),
            };
            if policy.should_retry(attempt, observed) {
                tracing::warn!(
                    "Attempt {}/{} for {} {} failed ({}), retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    prepared.method,
                    prepared.url,
                    describe(&observed),
                    policy.retry_delay
                );
                tokio::time::sleep(policy.retry_delay).await;
                attempt += 1;
                continue;
            }
            break outcome?;
        };

        tracing::debug!("status: {}", response.status);
        let body = parse_body(&response.body);
        if !(200..300).contains(&response.status) {
            return Err(SdkError::UpstreamHttp {
                status: response.status,
                body,
            });
        }
        Ok(body)
    }

    fn prepare(&self, mut request: HttpRequest) -> HttpRequest {
        if request.url.starts_with('/') {
            if let Some(base) = &self.options.base_url {
                request.url = format!("{}{}", base.trim_end_matches('/'), request.url);
            }
        }
        for (name, value) in &self.options.headers {
            request
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        if request.timeout.is_none() {
            request.timeout = Some(self.options.timeout.unwrap_or_else(defaults::timeout));
        }
        request
    }
}

fn describe(attempt: &Attempt<'_>) -> String {
    match attempt {
        Attempt::Failed(err) => err.to_string(),
        Attempt::Responded(status) => format!("HTTP {}", status),
    }
}

/// Parse a response body as JSON, passing raw text through otherwise.
pub fn parse_body(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| {
        tracing::debug!("Could not parse response body as JSON, returning raw text");
        Value::String(raw.to_string())
    })
}

fn masked_headers(headers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if SECRET_HEADERS.contains(&name.to_lowercase().as_str()) {
                mask_token(value)
            } else {
                value.clone()
            };
            (name.clone(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;
    use serde_json::json;

    fn fast_options() -> RequestOptions {
        RequestOptions {
            base_url: Some("https://platform.test".to_string()),
            max_attempts: Some(3),
            retry_delay: Some(Duration::ZERO),
            retry_strategy: Some(RetryStrategy::new(|attempt| match attempt {
                Attempt::Failed(_) => true,
                Attempt::Responded(status) => crate::error::is_retryable_status(status),
            })),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn joins_relative_urls_onto_base() {
        let transport = MockTransport::new(|_| Ok(MockTransport::json(200, json!({"ok": true}))));
        let http = Http::with_transport(transport.clone(), fast_options());

        let body = http.get("/api/user").await.unwrap();
        assert_eq!(body, json!({"ok": true}));

        let body = http.get("https://other.test/x").await.unwrap();
        assert_eq!(body, json!({"ok": true}));

        let urls: Vec<String> = transport.calls().into_iter().map(|c| c.url).collect();
        assert_eq!(urls, vec!["https://platform.test/api/user", "https://other.test/x"]);
    }

    #[tokio::test]
    async fn request_headers_override_client_headers() {
        let transport = MockTransport::new(|_| Ok(MockTransport::json(200, json!(null))));
        let mut options = fast_options();
        options.headers.insert("Authorization".into(), "default".into());
        options.headers.insert("X-Extra".into(), "1".into());
        let http = Http::with_transport(transport.clone(), options);

        http.request(HttpRequest::get("/x").header("Authorization", "override"))
            .await
            .unwrap();

        let call = &transport.calls()[0];
        assert_eq!(call.headers["Authorization"], "override");
        assert_eq!(call.headers["X-Extra"], "1");
    }

    #[tokio::test]
    async fn retries_gateway_errors_then_succeeds() {
        let transport = MockTransport::sequence(vec![
            Ok(MockTransport::json(503, json!({"message": "unavailable"}))),
            Ok(MockTransport::json(502, json!(null))),
            Ok(MockTransport::json(200, json!({"id": 1}))),
        ]);
        let http = Http::with_transport(transport.clone(), fast_options());

        let body = http.get("/api/pipelines").await.unwrap();
        assert_eq!(body, json!({"id": 1}));
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport =
            MockTransport::new(|_| Ok(MockTransport::json(404, json!({"message": "nope"}))));
        let http = Http::with_transport(transport.clone(), fast_options());

        let err = http.get("/api/pipelines/x").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "nope");
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn network_errors_exhaust_attempt_budget() {
        let transport = MockTransport::new(|_| Err(SdkError::network("connection reset")));
        let http = Http::with_transport(transport.clone(), fast_options());

        let err = http.get("/api/user").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Network);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn per_request_policy_replaces_client_policy() {
        let transport = MockTransport::new(|_| Ok(MockTransport::json(503, json!(null))));
        let http = Http::with_transport(transport.clone(), fast_options());

        let err = http
            .request(HttpRequest::get("/api/user").retry(RetryPolicy::disabled()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(transport.calls().len(), 1);
    }

    #[test]
    fn parse_body_passes_raw_text_through() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("plain text"), json!("plain text"));
    }

    #[test]
    fn with_defaults_keeps_caller_values() {
        let caller = RequestOptions {
            timeout: Some(Duration::from_secs(1)),
            headers: BTreeMap::from([("Authorization".to_string(), "mine".to_string())]),
            ..Default::default()
        };
        let context = RequestOptions {
            base_url: Some("https://ctx.test".into()),
            timeout: Some(Duration::from_secs(9)),
            headers: BTreeMap::from([
                ("Authorization".to_string(), "ctx".to_string()),
                ("x-access-token".to_string(), "jwt".to_string()),
            ]),
            ..Default::default()
        };

        let merged = caller.with_defaults(&context);
        assert_eq!(merged.base_url.as_deref(), Some("https://ctx.test"));
        assert_eq!(merged.timeout, Some(Duration::from_secs(1)));
        assert_eq!(merged.headers["Authorization"], "mine");
        assert_eq!(merged.headers["x-access-token"], "jwt");
    }
}
