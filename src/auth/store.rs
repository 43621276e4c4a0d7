//! Context store backed by the `.cfconfig` YAML file.
//!
//! One store is created per process and shared as `Arc<ContextStore>`.
//! In-memory operations are synchronous; only loading, persisting and
//! creating (validating) a context touch the disk or the network.
//! Persisting is last-writer-wins against other processes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Deserializer, Serialize};

use super::context::{Context, SerializedContext};
use super::whoami::User;
use crate::defaults;
use crate::error::{Result, SdkError};
use crate::http::{ReqwestTransport, Transport};
use crate::util::mask_token;

/// On-disk layout of the context file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: BTreeMap<String, SerializedContext>,
    #[serde(
        rename = "current-context",
        default,
        deserialize_with = "null_as_default"
    )]
    pub current_context: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Default)]
struct StoreState {
    contexts: BTreeMap<String, Context>,
    current: Option<String>,
    /// Set once a file has been loaded; persist writes back here
    config_path: Option<PathBuf>,
}

/// Process-wide registry of authentication contexts.
pub struct ContextStore {
    state: Mutex<StoreState>,
    transport: Arc<dyn Transport>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }
}

impl std::fmt::Debug for ContextStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("ContextStore")
            .field("contexts", &state.contexts.keys().collect::<Vec<_>>())
            .field("current", &state.current)
            .field("config_path", &state.config_path)
            .finish()
    }
}

impl ContextStore {
    /// Create an empty, unloaded store. `transport` is used to validate new contexts.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            transport,
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("context store mutex poisoned")
    }

    /// Context as seen by callers: `current` reflects the store's selection.
    fn view(state: &StoreState, context: &Context) -> Context {
        let mut context = context.clone();
        context.current = state.current.as_deref() == Some(context.name.as_str());
        context
    }

    pub fn get_context_by_name(&self, name: &str) -> Option<Context> {
        let state = self.lock();
        state.contexts.get(name).map(|c| Self::view(&state, c))
    }

    pub fn get_current_context(&self) -> Option<Context> {
        let state = self.lock();
        let name = state.current.as_deref()?;
        state.contexts.get(name).map(|c| Self::view(&state, c))
    }

    pub fn current_context_name(&self) -> Option<String> {
        self.lock().current.clone()
    }

    /// All contexts, ordered by name.
    pub fn get_all_contexts(&self) -> Vec<Context> {
        let state = self.lock();
        state
            .contexts
            .values()
            .map(|c| Self::view(&state, c))
            .collect()
    }

    /// Add or replace a context by name.
    pub fn add_context(&self, context: Context) {
        tracing::debug!("context added: {}", context.name);
        self.lock().contexts.insert(context.name.clone(), context);
    }

    pub fn remove_context(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if state.contexts.remove(name).is_none() {
            return Err(SdkError::InvalidContext(format!("No such context: '{}'", name)));
        }
        if state.current.as_deref() == Some(name) {
            state.current = None;
        }
        tracing::debug!("context removed: {}", name);
        Ok(())
    }

    /// Mark `context` current, adding it first when the store does not know it.
    pub fn set_current_context(&self, context: Context) {
        let mut state = self.lock();
        let name = context.name.clone();
        state.contexts.entry(name.clone()).or_insert(context);
        state.current = Some(name.clone());
        tracing::debug!("current context has been set: {}", name);
    }

    /// Mark an existing context current by name.
    pub fn use_context(&self, name: &str) -> Result<Context> {
        let mut state = self.lock();
        if !state.contexts.contains_key(name) {
            return Err(SdkError::InvalidContext(format!("No such context: '{}'", name)));
        }
        state.current = Some(name.to_string());
        tracing::debug!("using context: {}", name);
        let context = &state.contexts[name];
        Ok(Self::view(&state, context))
    }

    pub fn clear_config(&self) {
        let mut state = self.lock();
        state.contexts.clear();
        state.current = None;
    }

    pub fn is_config_loaded(&self) -> bool {
        self.lock().config_path.is_some()
    }

    pub fn has_contexts(&self) -> bool {
        !self.lock().contexts.is_empty()
    }

    pub fn config_path(&self) -> Option<PathBuf> {
        self.lock().config_path.clone()
    }

    /// Build a context from a token, validate it and derive `on_prem`.
    ///
    /// The context is returned, not added; the caller decides whether to keep it.
    pub async fn create_context(
        &self,
        api_key: &str,
        url: &str,
        name: Option<&str>,
    ) -> Result<Context> {
        tracing::debug!(
            "creating context: name={:?} apiKey={} url={}",
            name,
            mask_token(api_key),
            url
        );
        let mut context = Context::create_from_token(api_key, url);
        if let Some(name) = name {
            context.name = name.to_string();
        }

        tracing::debug!("validating context");
        let user = context.validate(self.transport.clone()).await?;
        context.on_prem = Some(User::from_payload(&user).is_admin());
        tracing::debug!("context is onPrem: {:?}", context.on_prem);
        Ok(context)
    }

    /// Load contexts from `path` (default `$HOME/.cfconfig`).
    ///
    /// Loading the same path again is a no-op unless `force_load` is set. A
    /// missing file is created with an empty skeleton.
    pub async fn load_config(&self, path: Option<&Path>, force_load: bool) -> Result<()> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(defaults::config_path);
        let path = resolve_path(path).await;

        {
            let mut state = self.lock();
            if !force_load && state.config_path.as_deref() == Some(path.as_path()) {
                tracing::debug!("config already loaded - using cache");
                return Ok(());
            }
            state.contexts.clear();
            state.current = None;
            state.config_path = None;
        }

        let file = read_config_file(&path).await?;

        let mut contexts = BTreeMap::new();
        for (key, mut raw) in file.contexts {
            if raw.name.is_empty() {
                raw.name = key;
            }
            let context = Context::create_from_serialized(raw)?;
            contexts.insert(context.name.clone(), context);
        }

        let mut state = self.lock();
        state.contexts = contexts;
        state.config_path = Some(path.clone());
        tracing::debug!("current context: '{}'", file.current_context);
        if state.contexts.contains_key(&file.current_context) {
            state.current = Some(file.current_context);
        } else if !file.current_context.is_empty() {
            tracing::warn!(
                "current-context '{}' does not exist in {}",
                file.current_context,
                path.display()
            );
        }
        Ok(())
    }

    /// Write every context and the current selection back to the loaded path.
    pub async fn persist_config(&self) -> Result<()> {
        let (path, file) = {
            let state = self.lock();
            let Some(path) = state.config_path.clone() else {
                return Err(SdkError::ConfigLoad {
                    message: "Could not persist config: .cfconfig is not loaded".to_string(),
                    source: None,
                });
            };
            let current_context = state
                .current
                .clone()
                .filter(|name| state.contexts.contains_key(name))
                .unwrap_or_default();
            let file = ConfigFile {
                contexts: state
                    .contexts
                    .values()
                    .map(|c| (c.name.clone(), c.serialize()))
                    .collect(),
                current_context,
            };
            (path, file)
        };

        tracing::info!("persisting config: {}", path.display());
        write_config_file(&path, &file).await
    }
}

/// Absolute form of `path` with its directory canonicalized, so different
/// spellings of one file share the load cache. The file itself may not exist.
async fn resolve_path(path: PathBuf) -> PathBuf {
    let absolute = if path.is_absolute() {
        path
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => return path,
        }
    };
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => match tokio::fs::canonicalize(parent).await {
            Ok(parent) => parent.join(name),
            Err(_) => absolute,
        },
        _ => absolute,
    }
}

async fn read_config_file(path: &Path) -> Result<ConfigFile> {
    tracing::debug!("loading config: {}", path.display());
    match tokio::fs::read_to_string(path).await {
        Ok(data) => {
            if data.trim().is_empty() {
                return Ok(ConfigFile::default());
            }
            serde_yaml::from_str(&data).map_err(|e| {
                SdkError::config_load(
                    format!("Failed to load configuration file from path: {}", path.display()),
                    e,
                )
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("config file does not exist - creating");
            let file = ConfigFile::default();
            write_config_file(path, &file).await?;
            Ok(file)
        }
        Err(e) => Err(SdkError::config_load(
            format!("Failed to load configuration file from path: {}", path.display()),
            e,
        )),
    }
}

async fn write_config_file(path: &Path, file: &ConfigFile) -> Result<()> {
    let write_error = |e: std::io::Error| {
        SdkError::config_load(
            format!("Failed to write configuration file to path: {}", path.display()),
            e,
        )
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }
    let contents = serde_yaml::to_string(file).map_err(|e| {
        SdkError::config_load("Failed to serialize configuration file", e)
    })?;
    tokio::fs::write(path, contents).await.map_err(write_error)
}
