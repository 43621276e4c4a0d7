//! SDK facade: one configured client plus the resource router.

use std::sync::Arc;

use serde_json::Value;

use crate::args::CallArgs;
use crate::config::{Config, ConfigOptions, ConfigResolver};
use crate::error::{Result, SdkError};
use crate::http::HttpRequest;
use crate::router::{ResourceNode, ResourceRouter};

#[derive(Debug, Default)]
pub struct Sdk {
    config: Option<Config>,
    router: Option<ResourceRouter>,
}

impl Sdk {
    pub fn new(config: Config) -> Self {
        let mut sdk = Self::default();
        sdk.configure(config);
        sdk
    }

    /// Resolve a config with [`ConfigResolver::load`] and configure with it.
    pub async fn load(resolver: &ConfigResolver, options: ConfigOptions) -> Result<Self> {
        Ok(Self::new(resolver.load(options).await?))
    }

    /// Switch to `config`. Nodes handed out earlier stay valid and route
    /// through the new client.
    pub fn configure(&mut self, config: Config) {
        tracing::debug!("sdk configured with context -- {}", config.context());
        match &self.router {
            Some(router) => router.set_client(config.client()),
            None => self.router = Some(ResourceRouter::new(config.client())),
        }
        self.config = Some(config);
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Re-resolve the current config (same strategy and options).
    pub async fn reload_config(&mut self) -> Result<()> {
        let Some(config) = &self.config else {
            return Err(SdkError::NotConfigured(
                "Could not reload - sdk is not configured".to_string(),
            ));
        };
        let config = config.recreate().await?;
        self.configure(config);
        Ok(())
    }

    /// Raw request against the context's base URL with its auth headers.
    pub async fn http(&self, request: HttpRequest) -> Result<Value> {
        let Some(config) = &self.config else {
            return Err(SdkError::NotConfigured(
                "Could not execute request - sdk is not configured".to_string(),
            ));
        };
        config.http().request(request).await
    }

    pub fn router(&self) -> Result<&ResourceRouter> {
        self.router.as_ref().ok_or_else(|| {
            SdkError::NotConfigured("Could not resolve resource - sdk is not configured".to_string())
        })
    }

    pub fn resource(&self, name: &str) -> Result<Arc<ResourceNode>> {
        Ok(self.router()?.resource(name))
    }

    pub fn node(&self, path: &str) -> Result<Arc<ResourceNode>> {
        Ok(self.router()?.node(path))
    }

    pub async fn call(&self, path: &str, args: impl Into<CallArgs>) -> Result<Value> {
        self.router()?.call(path, args).await
    }
}
