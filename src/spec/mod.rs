//! OpenAPI document handling: loading, caching and operation extraction.

pub mod loader;
pub mod operations;

pub use loader::{SpecLoader, SpecOptions};
pub use operations::{
    OperationDescriptor, OperationTable, ParameterDescriptor, ParameterLocation,
    SDK_PATH_EXTENSION,
};

use serde_json::{json, Value};

/// First server URL declared by the document, if any.
pub fn server_url(spec: &Value) -> Option<&str> {
    spec.get("servers")?.get(0)?.get("url")?.as_str()
}

/// Replace the document's servers with a single entry.
pub fn set_server_url(spec: &mut Value, url: &str) {
    if let Some(object) = spec.as_object_mut() {
        object.insert("servers".to_string(), json!([{ "url": url }]));
    }
}
