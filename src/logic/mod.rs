//! Hand-written operations layered over the generated ones.
//!
//! Each entry of the [`LogicRegistry`] is keyed by its full dotted path. The
//! router asks the registry before falling back to the OpenAPI client, so a
//! registered path shadows any generated operation of the same name.

mod runtime_envs;
mod workflows;

pub use runtime_envs::{RuntimeEnvAction, RuntimeEnvType, RuntimeEnvs};
pub use workflows::WaitForStatus;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::args::CallArgs;
use crate::error::Result;
use crate::router::ResourceRouter;

/// An operation implemented in the SDK rather than bound from the OpenAPI document.
#[async_trait]
pub trait LogicOperation: Send + Sync {
    async fn call(&self, router: &ResourceRouter, args: CallArgs) -> Result<Value>;
}

#[derive(Clone, Default)]
pub struct LogicRegistry {
    operations: BTreeMap<String, Arc<dyn LogicOperation>>,
}

impl fmt::Debug for LogicRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.operations.keys()).finish()
    }
}

impl LogicRegistry {
    /// Registry with no operations.
    pub fn empty() -> Self {
        Self::default()
    }

    /// `workflows.waitForStatus` and the `runtimeEnvs.*` family.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register("workflows.waitForStatus", WaitForStatus::default());
        for action in RuntimeEnvAction::ALL {
            registry.register(
                format!("runtimeEnvs.{}", action.name()),
                RuntimeEnvs::new(action),
            );
        }
        tracing::debug!("init logic resources: {:?}", registry);
        registry
    }

    pub fn register(&mut self, path: impl Into<String>, operation: impl LogicOperation + 'static) {
        self.operations.insert(path.into(), Arc::new(operation));
    }

    pub fn get(&self, path: &str) -> Option<Arc<dyn LogicOperation>> {
        self.operations.get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.operations.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

/// Loose truthiness for flag parameters such as `account`.
fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(_) => true,
    }
}
