//! Operation descriptors extracted from an OpenAPI document.

use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;

/// Vendor extension naming an operation's dotted SDK path.
pub const SDK_PATH_EXTENSION: &str = "x-sdk-interface";

const HTTP_METHODS: [&str; 8] = [
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl ParameterLocation {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "path" => Some(Self::Path),
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub location: ParameterLocation,
}

/// One SDK-exposed operation.
#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub operation_id: Option<String>,
    pub http_method: Method,
    /// Path template, e.g. `/pipelines/{name}`
    pub url_template: String,
    pub sdk_path: String,
    pub has_request_body: bool,
    pub parameters: Vec<ParameterDescriptor>,
}

/// SDK path to operation lookup, built once per loaded document.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: HashMap<String, OperationDescriptor>,
}

impl OperationTable {
    /// Walk `paths` in document order and keep every operation annotated
    /// with an SDK path. The first operation claiming a path keeps it.
    pub fn from_spec(spec: &Value) -> Self {
        let mut operations = HashMap::new();
        let Some(paths) = spec.get("paths").and_then(Value::as_object) else {
            return Self { operations };
        };

        for (url, item) in paths {
            let Some(item) = item.as_object() else { continue };
            let shared = item.get("parameters");

            for (method_name, operation) in item {
                if !HTTP_METHODS.contains(&method_name.as_str()) {
                    continue;
                }
                let Some(sdk_path) = operation.get(SDK_PATH_EXTENSION).and_then(Value::as_str)
                else {
                    continue;
                };
                let Ok(http_method) = method_name.to_uppercase().parse::<Method>() else {
                    continue;
                };
                if operations.contains_key(sdk_path) {
                    tracing::debug!(
                        "duplicate sdk path {} on {} {}, keeping first",
                        sdk_path,
                        http_method,
                        url
                    );
                    continue;
                }

                let descriptor = OperationDescriptor {
                    operation_id: operation
                        .get("operationId")
                        .and_then(Value::as_str)
                        .map(String::from),
                    http_method,
                    url_template: url.clone(),
                    sdk_path: sdk_path.to_string(),
                    has_request_body: operation
                        .get("requestBody")
                        .is_some_and(|b| !b.is_null()),
                    parameters: collect_parameters(spec, shared, operation.get("parameters")),
                };
                operations.insert(sdk_path.to_string(), descriptor);
            }
        }

        Self { operations }
    }

    pub fn get(&self, sdk_path: &str) -> Option<&OperationDescriptor> {
        self.operations.get(sdk_path)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn sdk_paths(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

/// Path-level parameters overlaid with operation-level ones (same name and
/// location: the operation wins). `$ref`s into the document are followed.
fn collect_parameters(
    spec: &Value,
    shared: Option<&Value>,
    own: Option<&Value>,
) -> Vec<ParameterDescriptor> {
    let mut parameters: Vec<ParameterDescriptor> = Vec::new();
    let lists = [shared, own];
    for raw in lists.into_iter().flatten().filter_map(Value::as_array).flatten() {
        let Some(param) = resolve_ref(spec, raw) else { continue };
        let (Some(name), Some(location)) = (
            param.get("name").and_then(Value::as_str),
            param
                .get("in")
                .and_then(Value::as_str)
                .and_then(ParameterLocation::parse),
        ) else {
            continue;
        };
        parameters.retain(|p| !(p.name == name && p.location == location));
        parameters.push(ParameterDescriptor {
            name: name.to_string(),
            location,
        });
    }
    parameters
}

fn resolve_ref<'a>(spec: &'a Value, value: &'a Value) -> Option<&'a Value> {
    match value.get("$ref").and_then(Value::as_str) {
        Some(reference) => spec.pointer(reference.strip_prefix('#')?),
        None => Some(value),
    }
}
