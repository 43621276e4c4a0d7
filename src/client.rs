//! Spec-driven operation client.
//!
//! [`SpecClient`] is cheap to construct. The OpenAPI document is fetched and
//! turned into an [`OperationTable`] on first use, through a
//! [`tokio::sync::OnceCell`] so concurrent first callers share one load. A
//! failed load is not kept and the next call tries again.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::args::{resolve_args, CallArgs, ResolvedArgs};
use crate::defaults;
use crate::error::{Result, SdkError};
use crate::http::{Http, HttpRequest};
use crate::spec::{self, OperationDescriptor, OperationTable, ParameterLocation, SpecLoader, SpecOptions};

/// Operations bound to a server URL.
#[derive(Debug)]
pub struct BoundApi {
    pub operations: OperationTable,
    pub server_url: String,
}

#[derive(Debug)]
pub struct SpecClient {
    http: Http,
    loader: SpecLoader,
    spec_options: SpecOptions,
    api: OnceCell<BoundApi>,
}

impl SpecClient {
    /// Client whose calls go through `http`. The context base URL of `http`,
    /// when set, also decides the server URL operations are sent to.
    pub fn new(http: Http, spec_options: SpecOptions) -> Self {
        let loader = SpecLoader::new(http.clone());
        Self {
            http,
            loader,
            spec_options,
            api: OnceCell::new(),
        }
    }

    pub fn with_loader(mut self, loader: SpecLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn http(&self) -> &Http {
        &self.http
    }

    pub fn is_loaded(&self) -> bool {
        self.api.initialized()
    }

    /// Load the document and bind its operations, once.
    pub async fn load_client(&self) -> Result<&BoundApi> {
        self.api.get_or_try_init(|| self.bind()).await
    }

    async fn bind(&self) -> Result<BoundApi> {
        tracing::debug!(
            "loading spec: url={:?} disable_cache={} force_refresh={}",
            self.spec_options.url,
            self.spec_options.disable_cache,
            self.spec_options.force_refresh
        );
        let document = self.loader.load_spec(&self.spec_options).await?;
        let operations = OperationTable::from_spec(&document);

        let server_url = match self.http.options().base_url.as_deref() {
            Some(url) => api_url(url),
            None => spec::server_url(&document)
                .map(String::from)
                .unwrap_or_else(|| api_url(defaults::URL)),
        };
        tracing::debug!(
            "client loaded: {} operations, server url {}",
            operations.len(),
            server_url
        );
        Ok(BoundApi {
            operations,
            server_url,
        })
    }

    /// Descriptor bound to an SDK path.
    pub async fn operation(&self, path: &str) -> Result<OperationDescriptor> {
        let api = self.load_client().await?;
        api.operations.get(path).cloned().ok_or_else(|| {
            tracing::debug!("no handler for path: {}", path);
            SdkError::UnknownOperation(path.to_string())
        })
    }

    /// Invoke the operation bound to `path`.
    pub async fn resolve(&self, path: &str, args: CallArgs) -> Result<Value> {
        let api = self.load_client().await?;
        tracing::debug!("sdk path: {}", path);
        let operation = api.operations.get(path).ok_or_else(|| {
            tracing::debug!("no handler for path: {}", path);
            SdkError::UnknownOperation(path.to_string())
        })?;

        let resolved = resolve_args(args, operation.has_request_body);
        let request = build_request(operation, &resolved, &api.server_url);
        self.http.request(request).await
    }
}

fn api_url(url: &str) -> String {
    if url.ends_with(defaults::API_SUFFIX) {
        url.to_string()
    } else {
        format!("{}{}", url.trim_end_matches('/'), defaults::API_SUFFIX)
    }
}

fn placeholder() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\{([^{}]+)\}").expect("placeholder pattern is valid"))
}

fn build_request(
    operation: &OperationDescriptor,
    args: &ResolvedArgs,
    server_url: &str,
) -> HttpRequest {
    let params = args.param_map();
    let present = |name: &str| params.get(name).filter(|v| !v.is_null());

    let path = placeholder().replace_all(&operation.url_template, |caps: &Captures<'_>| {
        match present(&caps[1]) {
            Some(value) => urlencoding::encode(&scalar(value)).into_owned(),
            None => {
                tracing::debug!("path parameter {} not provided", &caps[1]);
                caps[0].to_string()
            }
        }
    });

    let mut request = HttpRequest::new(
        operation.http_method.clone(),
        format!("{}{}", server_url.trim_end_matches('/'), path),
    );

    for param in &operation.parameters {
        let Some(value) = present(&param.name) else { continue };
        match param.location {
            ParameterLocation::Query => flatten_query(&param.name, value, &mut request.query),
            ParameterLocation::Header => {
                request.headers.insert(param.name.clone(), scalar(value));
            }
            ParameterLocation::Path | ParameterLocation::Cookie => {}
        }
    }

    request.body = args.request_body.clone();
    request
}

/// Query encoding: arrays repeat the key, objects nest as `key[sub]`.
fn flatten_query(key: &str, value: &Value, out: &mut Vec<(String, String)>) {
    match value {
        Value::Null => {}
        Value::Array(items) => {
            for item in items {
                flatten_query(key, item, out);
            }
        }
        Value::Object(fields) => flatten_object(key, fields, out),
        other => out.push((key.to_string(), scalar(other))),
    }
}

fn flatten_object(key: &str, fields: &Map<String, Value>, out: &mut Vec<(String, String)>) {
    for (sub, value) in fields {
        flatten_query(&format!("{}[{}]", key, sub), value, out);
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
