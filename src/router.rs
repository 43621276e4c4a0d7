//! Dotted-path resource tree over the OpenAPI client and the logic registry.
//!
//! `router.resource("pipelines").child("getAll")` and
//! `router.node("pipelines.getAll")` name the same node, and repeated access
//! returns the identical [`Arc<ResourceNode>`]. A node whose full path is a
//! registered hand-written operation dispatches there; every other node
//! resolves through the current [`SpecClient`] at call time, so nodes stay
//! valid when the client is swapped on config reload.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock, Weak};

use serde_json::Value;

use crate::args::CallArgs;
use crate::client::SpecClient;
use crate::error::{Result, SdkError};
use crate::logic::{LogicOperation, LogicRegistry};

struct RouterInner {
    logic: LogicRegistry,
    client: RwLock<Arc<SpecClient>>,
    resources: Mutex<HashMap<String, Arc<ResourceNode>>>,
}

/// Entry point of the resource tree. Cloning shares the same tree.
#[derive(Clone)]
pub struct ResourceRouter {
    inner: Arc<RouterInner>,
}

impl fmt::Debug for ResourceRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceRouter")
            .field("logic", &self.inner.logic)
            .finish()
    }
}

impl ResourceRouter {
    /// Router with the built-in hand-written operations.
    pub fn new(client: Arc<SpecClient>) -> Self {
        Self::with_logic(client, LogicRegistry::builtin())
    }

    pub fn with_logic(client: Arc<SpecClient>, logic: LogicRegistry) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                logic,
                client: RwLock::new(client),
                resources: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn client(&self) -> Arc<SpecClient> {
        self.inner
            .client
            .read()
            .expect("router client lock poisoned")
            .clone()
    }

    /// Route remote calls through `client` from now on. Existing nodes keep
    /// their identity.
    pub fn set_client(&self, client: Arc<SpecClient>) {
        *self
            .inner
            .client
            .write()
            .expect("router client lock poisoned") = client;
    }

    pub fn logic(&self) -> &LogicRegistry {
        &self.inner.logic
    }

    /// Top-level resource node.
    pub fn resource(&self, name: &str) -> Arc<ResourceNode> {
        let mut resources = self
            .inner
            .resources
            .lock()
            .expect("router resources lock poisoned");
        resources
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ResourceNode::new(name.to_string(), None, &self.inner)))
            .clone()
    }

    /// Node for a full dotted path.
    pub fn node(&self, path: &str) -> Arc<ResourceNode> {
        let mut segments = path.split('.');
        let first = segments.next().unwrap_or_default();
        segments.fold(self.resource(first), |node, segment| node.child(segment))
    }

    pub async fn call(&self, path: &str, args: impl Into<CallArgs>) -> Result<Value> {
        self.node(path).call(args).await
    }

    fn from_inner(inner: Arc<RouterInner>) -> Self {
        Self { inner }
    }
}

/// One segment of the resource tree.
pub struct ResourceNode {
    path: String,
    logic: Option<Arc<dyn LogicOperation>>,
    children: Mutex<HashMap<String, Arc<ResourceNode>>>,
    router: Weak<RouterInner>,
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("path", &self.path)
            .field("logic", &self.logic.is_some())
            .finish()
    }
}

impl ResourceNode {
    fn new(path: String, logic: Option<Arc<dyn LogicOperation>>, router: &Arc<RouterInner>) -> Self {
        Self {
            path,
            logic,
            children: Mutex::new(HashMap::new()),
            router: Arc::downgrade(router),
        }
    }

    /// Full dotted path of this node.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether calls go to a hand-written operation.
    pub fn is_logic(&self) -> bool {
        self.logic.is_some()
    }

    pub fn child(&self, segment: &str) -> Arc<ResourceNode> {
        let mut children = self.children.lock().expect("node children lock poisoned");
        if let Some(child) = children.get(segment) {
            return child.clone();
        }

        let path = format!("{}.{}", self.path, segment);
        let logic = self
            .router
            .upgrade()
            .and_then(|router| router.logic.get(&path));
        if logic.is_some() {
            tracing::debug!("sdk.{} -- logic", path);
        }
        let child = Arc::new(ResourceNode {
            path,
            logic,
            children: Mutex::new(HashMap::new()),
            router: self.router.clone(),
        });
        children.insert(segment.to_string(), child.clone());
        child
    }

    pub async fn call(&self, args: impl Into<CallArgs>) -> Result<Value> {
        let router = self
            .router
            .upgrade()
            .map(ResourceRouter::from_inner)
            .ok_or_else(|| SdkError::NotConfigured("Resource router was dropped".to_string()))?;
        let args = args.into();
        match &self.logic {
            Some(operation) => operation.call(&router, args).await,
            None => router.client().resolve(&self.path, args).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::Value;

    use super::ResourceRouter;
    use crate::client::SpecClient;
    use crate::http::mock::MockTransport;
    use crate::http::{Http, RequestOptions};
    use crate::spec::SpecOptions;

    pub(crate) fn spec_client(transport: Arc<MockTransport>, spec: Value) -> Arc<SpecClient> {
        let http = Http::with_transport(
            transport,
            RequestOptions {
                base_url: Some("https://g.test".to_string()),
                ..Default::default()
            },
        );
        Arc::new(SpecClient::new(
            http,
            SpecOptions {
                json: Some(spec),
                ..Default::default()
            },
        ))
    }

    /// Router with the built-in logic over an inline document.
    pub(crate) fn router(transport: Arc<MockTransport>, spec: Value) -> ResourceRouter {
        ResourceRouter::new(spec_client(transport, spec))
    }
}
