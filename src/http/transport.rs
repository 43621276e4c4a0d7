//! reqwest-backed transport: executes exactly one attempt per call.

use async_trait::async_trait;
use reqwest::Client;

use super::{HttpRequest, RawResponse, Transport};
use crate::error::{Result, SdkError};

/// Default transport over a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: &HttpRequest) -> Result<RawResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("Request timeout: {}", e)
                } else if e.is_connect() {
                    format!("Connection failed: {}", e)
                } else {
                    format!("Request failed: {}", e)
                };
                return Err(SdkError::Network {
                    message,
                    source: Some(e),
                });
            }
        };

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| SdkError::Network {
            message: format!("Failed to read response body: {}", e),
            source: Some(e),
        })?;

        Ok(RawResponse { status, body })
    }
}
