//! Authentication contexts.
//!
//! A context is a named credential bound to a platform URL. The variant set is
//! closed: API key, JWT, and the credential-less context used to reach public
//! endpoints. Behavior dispatches on [`ContextType`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::jwt::is_jwt;
use super::whoami;
use crate::error::{Result, SdkError};
use crate::http::{RequestOptions, Transport};

/// Name given to contexts created from a bare token.
pub const DEFAULT_CONTEXT_NAME: &str = "default";

const NO_AUTH_NAME: &str = "no-auth";
const NO_AUTH_TOKEN: &str = "no-token";

/// Discriminant of a context, as written to the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextType {
    #[serde(rename = "APIKeyContext")]
    ApiKey,
    #[serde(rename = "JWTContext")]
    Jwt,
    #[serde(rename = "NoAuthContext")]
    NoAuth,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::ApiKey => "APIKeyContext",
            ContextType::Jwt => "JWTContext",
            ContextType::NoAuth => "NoAuthContext",
        }
    }
}

impl FromStr for ContextType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "APIKeyContext" => Ok(ContextType::ApiKey),
            "JWTContext" => Ok(ContextType::Jwt),
            "NoAuthContext" => Ok(ContextType::NoAuth),
            other => Err(SdkError::ContextType(other.to_string())),
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Plain record stored under `contexts.<name>` in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializedContext {
    #[serde(rename = "type")]
    pub context_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_prem: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<bool>,
}

/// A named, typed credential.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub name: String,
    pub url: String,
    pub context_type: ContextType,
    pub token: String,
    /// Set from the identity check; `None` for contexts never validated
    pub on_prem: Option<bool>,
    pub beta: Option<bool>,
    /// Whether this is the store's current context (never persisted)
    pub current: bool,
}

impl Context {
    fn with_type(context_type: ContextType, token: String, url: String) -> Self {
        Self {
            name: DEFAULT_CONTEXT_NAME.to_string(),
            url,
            context_type,
            token,
            on_prem: None,
            beta: None,
            current: false,
        }
    }

    pub fn api_key(token: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_type(ContextType::ApiKey, token.into(), url.into())
    }

    pub fn jwt(token: impl Into<String>, url: impl Into<String>) -> Self {
        Self::with_type(ContextType::Jwt, token.into(), url.into())
    }

    pub fn no_auth(url: impl Into<String>) -> Self {
        Self {
            name: NO_AUTH_NAME.to_string(),
            ..Self::with_type(ContextType::NoAuth, NO_AUTH_TOKEN.to_string(), url.into())
        }
    }

    /// Pick the variant from the token shape: JWT if it decodes as one,
    /// API key otherwise.
    pub fn create_from_token(token: impl Into<String>, url: impl Into<String>) -> Self {
        let token = token.into();
        if is_jwt(&token) {
            Self::jwt(token, url)
        } else {
            Self::api_key(token, url)
        }
    }

    /// Rebuild a context from its config-file record, by `type`.
    pub fn create_from_serialized(raw: SerializedContext) -> Result<Self> {
        let context_type: ContextType = raw.context_type.parse()?;
        let mut context = match context_type {
            ContextType::NoAuth => Self::no_auth(raw.url),
            other => Self::with_type(other, raw.token, raw.url),
        };
        if !raw.name.is_empty() {
            context.name = raw.name;
        }
        context.beta = raw.beta;
        if context_type != ContextType::NoAuth {
            context.on_prem = raw.on_prem;
        }
        Ok(context)
    }

    pub fn is_no_auth(&self) -> bool {
        self.context_type == ContextType::NoAuth
    }

    /// Headers that authenticate a request with this context.
    pub fn prepare_auth(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        match self.context_type {
            ContextType::ApiKey => {
                headers.insert("Authorization".to_string(), self.token.clone());
            }
            ContextType::Jwt => {
                headers.insert("x-access-token".to_string(), self.token.clone());
            }
            ContextType::NoAuth => {}
        }
        headers
    }

    /// Request defaults for this context: its URL as base and its auth headers.
    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            base_url: Some(self.url.clone()),
            headers: self.prepare_auth(),
            ..Default::default()
        }
    }

    /// Check the credential against the identity endpoint and return the
    /// user payload. No-op for the credential-less context.
    pub async fn validate(&self, transport: Arc<dyn Transport>) -> Result<Value> {
        if self.is_no_auth() {
            return Ok(Value::Null);
        }
        whoami::get_user(self, transport, None).await
    }

    pub fn serialize(&self) -> SerializedContext {
        SerializedContext {
            context_type: self.context_type.as_str().to_string(),
            name: self.name.clone(),
            url: self.url.clone(),
            token: self.token.clone(),
            on_prem: self.on_prem,
            beta: self.beta,
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "name: {}, url: {}", self.name, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn raw(context_type: &str, name: &str) -> SerializedContext {
        SerializedContext {
            context_type: context_type.to_string(),
            name: name.to_string(),
            url: "https://g.codefresh.io".to_string(),
            token: "tok".to_string(),
            on_prem: Some(true),
            beta: Some(false),
        }
    }

    #[test]
    fn test_auth_headers_per_variant() {
        let api_key = Context::api_key("key", "https://x.test");
        assert_eq!(api_key.prepare_auth()["Authorization"], "key");

        let jwt = Context::jwt("a.b.c", "https://x.test");
        assert_eq!(jwt.prepare_auth()["x-access-token"], "a.b.c");
        assert!(!jwt.prepare_auth().contains_key("Authorization"));

        assert!(Context::no_auth("https://x.test").prepare_auth().is_empty());
    }

    #[test]
    fn test_no_auth_defaults() {
        let context = Context::no_auth("https://onprem.test");
        assert_eq!(context.name, "no-auth");
        assert_eq!(context.token, "no-token");
        assert_eq!(context.on_prem, None);
        assert_eq!(context.request_options().base_url.as_deref(), Some("https://onprem.test"));
    }

    #[test]
    fn test_create_from_serialized_by_discriminant() {
        let context = Context::create_from_serialized(raw("JWTContext", "prod")).unwrap();
        assert_eq!(context.context_type, ContextType::Jwt);
        assert_eq!(context.name, "prod");
        assert_eq!(context.on_prem, Some(true));

        let context = Context::create_from_serialized(raw("NoAuthContext", "public")).unwrap();
        assert_eq!(context.context_type, ContextType::NoAuth);
        assert_eq!(context.name, "public");
        assert_eq!(context.on_prem, None);
    }

    #[test]
    fn test_unknown_discriminant_fails() {
        let err = Context::create_from_serialized(raw("OAuthContext", "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ContextType);
        assert_eq!(err.to_string(), "Failed to parse context of type: OAuthContext");
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut context = Context::api_key("key", "https://g.codefresh.io");
        context.name = "ci".to_string();
        context.on_prem = Some(false);

        let back = Context::create_from_serialized(context.serialize()).unwrap();
        assert_eq!(back, context);
    }

    #[tokio::test]
    async fn test_no_auth_validate_skips_network() {
        let transport = crate::http::mock::MockTransport::new(|_| {
            Err(SdkError::network("must not be called"))
        });
        let payload = Context::no_auth("https://x.test")
            .validate(transport.clone())
            .await
            .unwrap();
        assert_eq!(payload, Value::Null);
        assert!(transport.calls().is_empty());
    }
}
