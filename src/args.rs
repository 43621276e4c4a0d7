//! Call argument normalization.
//!
//! Callers pass operation arguments loosely: parameters only, a body only, both,
//! or a parameter object that carries its body under `requestBody`.
//! [`resolve_args`] turns any of those shapes into one canonical
//! `(params, request_body)` pair, using the operation's declared request body to
//! settle the ambiguous case.

use serde_json::{Map, Value};

/// Field of a parameter object that holds the request body.
pub const REQUEST_BODY_FIELD: &str = "requestBody";

/// Arguments as supplied by a caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub params: Option<Value>,
    pub request_body: Option<Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn params(params: Value) -> Self {
        Self {
            params: Some(params),
            request_body: None,
        }
    }

    pub fn body(request_body: Value) -> Self {
        Self {
            params: None,
            request_body: Some(request_body),
        }
    }

    pub fn with_body(mut self, request_body: Value) -> Self {
        self.request_body = Some(request_body);
        self
    }

    /// Look up a named parameter, treating `null` as absent.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params
            .as_ref()
            .and_then(|p| p.get(name))
            .filter(|v| !v.is_null())
    }
}

impl From<Value> for CallArgs {
    fn from(params: Value) -> Self {
        Self::params(params)
    }
}

impl From<(Value, Value)> for CallArgs {
    fn from((params, request_body): (Value, Value)) -> Self {
        Self::params(params).with_body(request_body)
    }
}

/// Canonical arguments handed to an operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedArgs {
    pub params: Option<Value>,
    pub request_body: Option<Value>,
}

impl ResolvedArgs {
    /// Parameters as an object map; anything else reads as empty.
    pub fn param_map(&self) -> Map<String, Value> {
        match &self.params {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }
}

/// Normalize caller arguments for an operation.
///
/// `has_request_body` is whether the operation declares a request body. When
/// only parameters are given and it does, the parameters double as the body.
pub fn resolve_args(args: CallArgs, has_request_body: bool) -> ResolvedArgs {
    let params = args.params.filter(|v| !v.is_null());
    let request_body = args.request_body.filter(|v| !v.is_null());

    match (params, request_body) {
        (None, None) => ResolvedArgs::default(),
        (None, Some(body)) => ResolvedArgs {
            params: Some(Value::Object(Map::new())),
            request_body: Some(body),
        },
        (Some(params), Some(body)) => ResolvedArgs {
            params: Some(params),
            request_body: Some(body),
        },
        (Some(Value::Object(mut params)), None)
            if params
                .get(REQUEST_BODY_FIELD)
                .is_some_and(|v| !v.is_null()) =>
        {
            let body = params.remove(REQUEST_BODY_FIELD);
            ResolvedArgs {
                params: Some(Value::Object(params)),
                request_body: body,
            }
        }
        (Some(params), None) if has_request_body => ResolvedArgs {
            request_body: Some(params.clone()),
            params: Some(params),
        },
        (Some(params), None) => ResolvedArgs {
            params: Some(params),
            request_body: None,
        },
    }
}
