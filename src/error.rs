//! SDK error types with cause chaining and retry classification.
//!
//! Every public resolution step wraps the failure of the step below it with
//! [`SdkError::context`], so callers get one error with an actionable message
//! and the full chain available through [`std::error::Error::source`].

use serde_json::Value;
use thiserror::Error;

pub type Result<T, E = SdkError> = std::result::Result<T, E>;

/// Error from SDK configuration, routing and upstream calls.
#[derive(Debug, Error)]
pub enum SdkError {
    /// No usable credential at a given resolution stage.
    #[error("{0}")]
    MissingCredential(String),

    /// Named context not found, or no context to work with.
    #[error("{0}")]
    InvalidContext(String),

    /// Config file unreadable, unparsable or not loaded yet.
    #[error("{message}")]
    ConfigLoad {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialized context carries an unknown `type` discriminant.
    #[error("Failed to parse context of type: {0}")]
    ContextType(String),

    /// Router path has no bound operation in either source.
    #[error("SDK has no handler for path: '{0}'. Please check the openapi.json used for sdk")]
    UnknownOperation(String),

    /// Non-success response from the platform.
    #[error("{}", upstream_message(.status, .body))]
    UpstreamHttp { status: u16, body: Value },

    /// Connection failure or timeout; retry-eligible.
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// OpenAPI document could not be obtained or understood.
    #[error("{0}")]
    Spec(String),

    /// Operation requires a configured SDK.
    #[error("{0}")]
    NotConfigured(String),

    /// Hand-written operation failed: bad arguments, terminal state or timeout.
    #[error("{0}")]
    Operation(String),

    /// Contextual message wrapping the error of a failed step.
    #[error("{message}")]
    Chained {
        message: String,
        #[source]
        source: Box<SdkError>,
    },
}

/// Classification of SDK errors, independent of chaining.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingCredential,
    InvalidContext,
    ConfigLoad,
    ContextType,
    UnknownOperation,
    UpstreamHttp,
    Network,
    Spec,
    NotConfigured,
    Operation,
}

impl SdkError {
    pub fn config_load(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SdkError::ConfigLoad {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        SdkError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap this error under a contextual message, keeping it as the cause.
    pub fn context(self, message: impl Into<String>) -> Self {
        SdkError::Chained {
            message: message.into(),
            source: Box::new(self),
        }
    }

    /// The innermost SDK error of a chain.
    pub fn root_cause(&self) -> &SdkError {
        let mut current = self;
        while let SdkError::Chained { source, .. } = current {
            current = source;
        }
        current
    }

    /// Kind of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self.root_cause() {
            SdkError::MissingCredential(_) => ErrorKind::MissingCredential,
            SdkError::InvalidContext(_) => ErrorKind::InvalidContext,
            SdkError::ConfigLoad { .. } => ErrorKind::ConfigLoad,
            SdkError::ContextType(_) => ErrorKind::ContextType,
            SdkError::UnknownOperation(_) => ErrorKind::UnknownOperation,
            SdkError::UpstreamHttp { .. } => ErrorKind::UpstreamHttp,
            SdkError::Network { .. } => ErrorKind::Network,
            SdkError::Spec(_) => ErrorKind::Spec,
            SdkError::NotConfigured(_) => ErrorKind::NotConfigured,
            SdkError::Operation(_) => ErrorKind::Operation,
            SdkError::Chained { .. } => unreachable!("root_cause never returns a chain link"),
        }
    }

    /// HTTP status of an upstream failure anywhere in the chain.
    pub fn status(&self) -> Option<u16> {
        match self.root_cause() {
            SdkError::UpstreamHttp { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check if this error is transient and may be retried.
    pub fn is_transient(&self) -> bool {
        match self.root_cause() {
            SdkError::Network { .. } => true,
            SdkError::UpstreamHttp { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Full chain rendered as `outer: inner: root`.
    pub fn chain_message(&self) -> String {
        let mut parts = vec![self.to_string()];
        let mut current: &dyn std::error::Error = self;
        while let Some(next) = current.source() {
            parts.push(next.to_string());
            current = next;
        }
        parts.join(": ")
    }
}

/// Gateway-class statuses that are retried transparently.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 502 | 503 | 504)
}

fn upstream_message(status: &u16, body: &Value) -> String {
    match *status {
        300..=399 => "Request was not properly redirected".to_string(),
        401 => "Please create or update your authentication context".to_string(),
        403 => "You do not have permissions to perform this action".to_string(),
        _ => match (
            body.get("message").and_then(Value::as_str),
            body.get("error").and_then(Value::as_str),
        ) {
            (Some(message), Some(error)) => format!("message: {}\nerror: {}", message, error),
            (Some(message), None) => message.to_string(),
            _ => match body {
                Value::String(raw) => raw.clone(),
                Value::Null => format!("HTTP {}", status),
                other => other.to_string(),
            },
        },
    }
}
