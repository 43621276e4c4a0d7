//! Identity endpoint: `GET {url}/api/user`.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::context::Context;
use crate::error::Result;
use crate::http::{Http, HttpRequest, RetryPolicy, Transport};

const USER_PATH: &str = "/api/user";

/// Role that marks an on-premises administrator.
const ADMIN_ROLE: &str = "Admin";

/// Subset of the identity payload the SDK reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub active_account_name: Option<String>,
    #[serde(default)]
    pub account: Vec<Account>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub runtime_environment: Option<Value>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Name and runtime environment of the active account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountInfo {
    pub name: Option<String>,
    pub runtime_environment: Option<Value>,
}

impl User {
    /// Lenient parse: an unexpected payload reads as a user with no accounts.
    pub fn from_payload(payload: &Value) -> Self {
        serde_json::from_value(payload.clone()).unwrap_or_default()
    }

    pub fn active_account(&self) -> Option<&Account> {
        let active = self.active_account_name.as_deref()?;
        self.account.iter().find(|a| a.name == active)
    }

    /// Roles of the active account, or the top-level roles if there is none.
    pub fn effective_roles(&self) -> &[String] {
        match self.active_account() {
            Some(account) if !account.roles.is_empty() => &account.roles,
            _ => &self.roles,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.effective_roles().iter().any(|r| r == ADMIN_ROLE)
    }
}

/// Fetch the full user payload with the context's credentials.
pub async fn get_user(
    context: &Context,
    transport: Arc<dyn Transport>,
    retry: Option<RetryPolicy>,
) -> Result<Value> {
    tracing::debug!("loading context -- {}", context);
    let http = Http::with_transport(transport, context.request_options());
    let mut request = HttpRequest::get(USER_PATH);
    request.retry = retry;
    let user = http.request(request).await?;
    tracing::debug!("context \"{}\" successfully loaded", context.name);
    Ok(user)
}

/// Active account summary, with a short timeout and no retries.
pub async fn current_account(context: &Context, transport: Arc<dyn Transport>) -> Result<AccountInfo> {
    let http = Http::with_transport(transport, context.request_options());
    let payload = http
        .request(
            HttpRequest::get(USER_PATH)
                .timeout(Duration::from_secs(5))
                .retry(RetryPolicy::disabled()),
        )
        .await?;

    let user = User::from_payload(&payload);
    let info = user
        .active_account()
        .map(|account| AccountInfo {
            name: Some(account.name.clone()),
            runtime_environment: account.runtime_environment.clone(),
        })
        .unwrap_or_default();

    tracing::debug!(
        "current account name is: {:?}",
        user.active_account_name.as_deref()
    );
    Ok(info)
}
