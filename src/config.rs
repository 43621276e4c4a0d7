//! Layered configuration resolution.
//!
//! A [`Config`] binds one authentication context to a spec-driven client. It
//! is produced by one of three strategies, tried in this order by
//! [`ConfigResolver::load`]:
//!
//! 1. **Provided** - `api_key` (and optionally `url`) passed by the caller.
//! 2. **Env** - token and URL read from `CF_API_KEY` / `CF_URL` (names configurable).
//! 3. **File** - the named or current context of the `.cfconfig` file
//!    (`config_path` option, then `$CFCONFIG`, then `$HOME/.cfconfig`).
//!
//! The first strategy that succeeds wins. A config remembers its strategy and
//! options so [`Config::recreate`] can resolve it again without refetching the
//! OpenAPI document.

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::auth::{Context, ContextStore};
use crate::client::SpecClient;
use crate::defaults;
use crate::error::{Result, SdkError};
use crate::http::{Http, RequestOptions, Transport};
use crate::spec::{self, SpecLoader, SpecOptions};
use crate::util::mask_token;

/// Caller options shared by every strategy.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub api_key: Option<String>,
    /// `None`: omitted (platform default). `Some(None)`: explicitly null.
    pub url: Option<Option<String>>,
    /// Env var holding the token (default `CF_API_KEY`)
    pub api_key_env: Option<String>,
    /// Env var holding the URL (default `CF_URL`)
    pub url_env: Option<String>,
    /// Context to use from the config file instead of the current one
    pub context: Option<String>,
    pub config_path: Option<PathBuf>,
    pub spec: SpecOptions,
    pub request: RequestOptions,
}

impl ConfigOptions {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(Some(url.into()));
        self
    }

    pub fn with_context(mut self, name: impl Into<String>) -> Self {
        self.context = Some(name.into());
        self
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Explicit URL, ignoring an explicit null.
    fn given_url(&self) -> Option<&str> {
        self.url.as_ref().and_then(|u| u.as_deref())
    }
}

/// How a [`Config`] was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Provided,
    Env,
    File,
}

/// A resolved configuration: context, client and the options that made it.
#[derive(Debug)]
pub struct Config {
    context: Context,
    client: Arc<SpecClient>,
    spec_json: Value,
    options: ConfigOptions,
    http: Http,
    strategy: Strategy,
    resolver: ConfigResolver,
}

impl Config {
    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn client(&self) -> Arc<SpecClient> {
        self.client.clone()
    }

    pub fn spec_json(&self) -> &Value {
        &self.spec_json
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    /// Client for raw requests against the context's base URL.
    pub fn http(&self) -> &Http {
        &self.http
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Resolve again with the same strategy and options.
    pub async fn recreate(&self) -> Result<Config> {
        tracing::debug!("recreating config with {:?} strategy", self.strategy);
        let options = self.options.clone();
        match self.strategy {
            Strategy::Provided => self.resolver.from_provided(options).await,
            Strategy::Env => self.resolver.from_env(options).await,
            Strategy::File => self.resolver.from_file(options).await,
        }
    }
}

/// Builds [`Config`]s against a shared [`ContextStore`].
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    store: Arc<ContextStore>,
    spec_cache_dir: Option<PathBuf>,
}

impl Default for ConfigResolver {
    fn default() -> Self {
        Self::new(Arc::new(ContextStore::default()))
    }
}

impl ConfigResolver {
    pub fn new(store: Arc<ContextStore>) -> Self {
        Self {
            store,
            spec_cache_dir: None,
        }
    }

    /// Keep the daily spec cache somewhere other than `$HOME/.Codefresh`.
    pub fn with_spec_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec_cache_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> Arc<ContextStore> {
        self.store.clone()
    }

    fn transport(&self) -> Arc<dyn Transport> {
        self.store.transport()
    }

    /// Try provided, env and file in order; the first success wins.
    pub async fn load(&self, options: ConfigOptions) -> Result<Config> {
        tracing::debug!("auto detect config");
        match self.from_provided(options.clone()).await {
            Ok(config) => return Ok(config),
            Err(e) => tracing::debug!("not loaded from provided: {}", e.chain_message()),
        }
        match self.from_env(options.clone()).await {
            Ok(config) => return Ok(config),
            Err(e) => tracing::debug!("not loaded from env: {}", e.chain_message()),
        }
        self.from_file(options).await.map_err(|e| {
            tracing::debug!("not loaded from file: {}", e.chain_message());
            e.context("Could not load config")
        })
    }

    pub async fn auto_detect(&self, options: ConfigOptions) -> Result<Config> {
        self.load(options).await
    }

    /// Use the caller's `api_key` and `url`.
    pub async fn from_provided(&self, options: ConfigOptions) -> Result<Config> {
        self.provided(options, Strategy::Provided).await
    }

    async fn provided(&self, options: ConfigOptions, strategy: Strategy) -> Result<Config> {
        tracing::debug!("trying to load from provided");
        let Some(api_key) = options.api_key.clone().filter(|k| !k.is_empty()) else {
            return Err(SdkError::MissingCredential(
                "Config: apiKey is not provided".to_string(),
            ));
        };
        let url = match &options.url {
            None => defaults::URL.to_string(),
            Some(Some(url)) if !url.is_empty() => url.clone(),
            Some(_) => {
                return Err(SdkError::MissingCredential(
                    "Config: url is not provided".to_string(),
                ))
            }
        };

        let result = async {
            let context = self.store.create_context(&api_key, &url, None).await?;
            self.initialize_config(Some(context), options, strategy).await
        }
        .await;
        result.map_err(|e| e.context("Failed to create context from provided apiKey and url"))
    }

    /// Read the token and URL from environment variables.
    pub async fn from_env(&self, options: ConfigOptions) -> Result<Config> {
        tracing::debug!("trying to load from env");
        let token_env = options
            .api_key_env
            .clone()
            .unwrap_or_else(|| defaults::CF_TOKEN_ENV.to_string());
        let url_env = options
            .url_env
            .clone()
            .unwrap_or_else(|| defaults::CF_URL_ENV.to_string());

        let Some(api_key) = std::env::var(&token_env).ok().filter(|k| !k.is_empty()) else {
            return Err(SdkError::MissingCredential(format!(
                "Config: environment variable {} is not provided",
                token_env
            )));
        };
        let url = std::env::var(&url_env).ok().filter(|u| !u.is_empty());
        tracing::debug!("apiKey: {}, url: {:?}", mask_token(&api_key), url);

        let options = ConfigOptions {
            api_key: Some(api_key),
            url: url.map(Some).or(options.url.clone()),
            ..options
        };
        self.provided(options, Strategy::Env)
            .await
            .map_err(|e| e.context("Failed to create context from env"))
    }

    /// Use the named or current context of the config file.
    ///
    /// The file is read into a private store, so the shared store keeps any
    /// context added or selected but not yet persisted.
    pub async fn from_file(&self, options: ConfigOptions) -> Result<Config> {
        let config_path = options
            .config_path
            .clone()
            .or_else(|| std::env::var_os(defaults::CF_CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(defaults::config_path);
        tracing::debug!("trying to load from file: {}", config_path.display());

        let store = ContextStore::new(self.transport());
        store
            .load_config(Some(config_path.as_path()), false)
            .await
            .map_err(|e| e.context("Failed to create context from file"))?;

        let mut context = None;
        if let Some(name) = &options.context {
            tracing::debug!("trying to retrieve context: '{}'", name);
            context = store.get_context_by_name(name);
            if context.is_none() {
                return Err(SdkError::InvalidContext(format!(
                    "No such context '{}' at file {}",
                    name,
                    config_path.display()
                )));
            }
        }

        let context = if !store.has_contexts() {
            tracing::debug!("config file has no contexts - using NoAuthContext");
            Context::no_auth(options.given_url().unwrap_or(defaults::URL))
        } else {
            match context {
                Some(context) => context,
                None => {
                    tracing::debug!(
                        "using current context: '{}'",
                        store.current_context_name().unwrap_or_default()
                    );
                    store.get_current_context().ok_or_else(|| {
                        SdkError::InvalidContext(
                            "Failed to create context from file - no current context".to_string(),
                        )
                    })?
                }
            }
        };

        self.initialize_config(Some(context), options, Strategy::File)
            .await
            .map_err(|e| e.context("Failed to create context from file"))
    }

    /// Bind `context` to a spec client.
    ///
    /// Caller request headers win over the context's auth headers; the base
    /// URL is always the context's. The loaded spec is stored back into the
    /// options so a recreated config reuses it.
    pub async fn initialize_config(
        &self,
        context: Option<Context>,
        mut options: ConfigOptions,
        strategy: Strategy,
    ) -> Result<Config> {
        let Some(context) = context else {
            return Err(SdkError::InvalidContext("Context is not provided".to_string()));
        };
        tracing::debug!("initializing config for context -- {}", context);

        let mut request = options.request.clone();
        request.base_url = Some(context.url.clone());
        let http = Http::with_transport(
            self.transport(),
            request.with_defaults(&context.request_options()),
        );

        let spec_options = SpecOptions {
            url: options
                .spec
                .url
                .clone()
                .or_else(|| Some(format!("{}{}", context.url, defaults::SPEC_URL_SUFFIX))),
            ..options.spec.clone()
        };
        let loader = self.spec_loader(http.clone());
        let mut spec_json = loader.load_spec(&spec_options).await?;

        let server_url = format!("{}{}", context.url, defaults::API_SUFFIX);
        tracing::debug!("base url: {}", server_url);
        spec::set_server_url(&mut spec_json, &server_url);
        options.spec.json = Some(spec_json.clone());

        let client = SpecClient::new(
            http.clone(),
            SpecOptions {
                json: Some(spec_json.clone()),
                ..Default::default()
            },
        )
        .with_loader(loader);

        Ok(Config {
            context,
            client: Arc::new(client),
            spec_json,
            options,
            http,
            strategy,
            resolver: self.clone(),
        })
    }

    fn spec_loader(&self, http: Http) -> SpecLoader {
        let loader = SpecLoader::new(http);
        match &self.spec_cache_dir {
            Some(dir) => loader.with_cache_dir(dir),
            None => loader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::ContextType;
    use crate::error::ErrorKind;
    use crate::http::mock::MockTransport;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    fn document() -> Value {
        json!({
            "openapi": "3.0.0",
            "servers": [{"url": "https://elsewhere.test/api"}],
            "paths": {
                "/pipelines": {"get": {"x-sdk-interface": "pipelines.getAll"}}
            }
        })
    }

    fn platform(user_status: u16) -> Arc<MockTransport> {
        MockTransport::new(move |req| {
            if req.url.ends_with("/api/user") {
                Ok(MockTransport::json(
                    user_status,
                    json!({"activeAccountName": "acme", "account": [{"name": "acme", "roles": ["Admin"]}]}),
                ))
            } else if req.url.ends_with("/openapi.json") {
                Ok(MockTransport::json(200, document()))
            } else {
                Ok(MockTransport::json(200, json!([])))
            }
        })
    }

    fn resolver(transport: Arc<MockTransport>, dir: &TempDir) -> ConfigResolver {
        ConfigResolver::new(Arc::new(ContextStore::new(transport)))
            .with_spec_cache_dir(dir.path().join("openapi-cache"))
    }

    fn uncached() -> ConfigOptions {
        ConfigOptions {
            spec: SpecOptions {
                disable_cache: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn write_cfconfig(dir: &TempDir, current: &str) -> PathBuf {
        let path = dir.path().join(".cfconfig");
        std::fs::write(
            &path,
            format!(
                r#"contexts:
  prod:
    type: APIKeyContext
    name: prod
    url: https://prod.test
    token: prod-key
  staging:
    type: JWTContext
    name: staging
    url: https://staging.test
    token: a.b.c
current-context: {}
"#,
                current
            ),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn provided_requires_api_key_without_network() {
        let dir = TempDir::new().unwrap();
        let transport = platform(200);
        let err = resolver(transport.clone(), &dir)
            .from_provided(uncached())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn provided_rejects_explicit_null_url() {
        let dir = TempDir::new().unwrap();
        let options = ConfigOptions {
            url: Some(None),
            ..uncached().with_api_key("key")
        };
        let err = resolver(platform(200), &dir)
            .from_provided(options)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Config: url is not provided");
    }

    #[tokio::test]
    async fn provided_defaults_url_and_rewrites_servers() {
        let dir = TempDir::new().unwrap();
        let transport = platform(200);
        let config = resolver(transport.clone(), &dir)
            .from_provided(uncached().with_api_key("key-123"))
            .await
            .unwrap();

        assert_eq!(config.context().name, "default");
        assert_eq!(config.context().url, "https://g.codefresh.io");
        assert_eq!(config.context().context_type, ContextType::ApiKey);
        assert_eq!(config.context().on_prem, Some(true));
        assert_eq!(config.strategy(), Strategy::Provided);
        assert_eq!(
            config.spec_json()["servers"],
            json!([{"url": "https://g.codefresh.io/api"}])
        );
        assert_eq!(config.options().spec.json.as_ref(), Some(config.spec_json()));
        assert_eq!(transport.calls_to("https://g.codefresh.io/api/user"), 1);
        assert_eq!(transport.calls_to("https://g.codefresh.io/api/openapi.json"), 1);
    }

    #[tokio::test]
    async fn caller_headers_win_but_base_url_is_the_context() {
        let dir = TempDir::new().unwrap();
        let mut options = uncached().with_api_key("ctx-key").with_url("https://onprem.test");
        options.request.headers.insert("Authorization".into(), "caller-key".into());
        options.request.headers.insert("X-Client".into(), "cli".into());
        options.request.base_url = Some("https://ignored.test".into());

        let config = resolver(platform(200), &dir)
            .from_provided(options)
            .await
            .unwrap();

        let http = config.http().options();
        assert_eq!(http.base_url.as_deref(), Some("https://onprem.test"));
        assert_eq!(http.headers["Authorization"], "caller-key");
        assert_eq!(http.headers["X-Client"], "cli");
    }

    #[tokio::test]
    async fn provided_validation_failure_is_wrapped() {
        let dir = TempDir::new().unwrap();
        let err = resolver(platform(401), &dir)
            .from_provided(uncached().with_api_key("bad"))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to create context from provided apiKey and url"
        );
        assert_eq!(err.status(), Some(401));
    }

    #[tokio::test]
    async fn env_strategy_reads_configured_variables() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("CF_SDK_TEST_ENV_TOKEN_OK", "env-key");
        std::env::set_var("CF_SDK_TEST_ENV_URL_OK", "https://env.test");
        let options = ConfigOptions {
            api_key_env: Some("CF_SDK_TEST_ENV_TOKEN_OK".into()),
            url_env: Some("CF_SDK_TEST_ENV_URL_OK".into()),
            ..uncached()
        };

        let config = resolver(platform(200), &dir).from_env(options).await.unwrap();
        assert_eq!(config.context().url, "https://env.test");
        assert_eq!(config.context().token, "env-key");
        assert_eq!(config.strategy(), Strategy::Env);
    }

    #[tokio::test]
    async fn env_strategy_without_token_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let transport = platform(200);
        let options = ConfigOptions {
            api_key_env: Some("CF_SDK_TEST_ENV_TOKEN_UNSET".into()),
            ..uncached()
        };

        let err = resolver(transport.clone(), &dir).from_env(options).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);
        assert!(err.to_string().contains("CF_SDK_TEST_ENV_TOKEN_UNSET"));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn file_strategy_uses_current_or_named_context() {
        let dir = TempDir::new().unwrap();
        let path = write_cfconfig(&dir, "prod");
        let resolver = resolver(platform(200), &dir);

        let config = resolver
            .from_file(uncached().with_config_path(&path))
            .await
            .unwrap();
        assert_eq!(config.context().name, "prod");
        assert_eq!(config.http().options().headers["Authorization"], "prod-key");

        let config = resolver
            .from_file(uncached().with_config_path(&path).with_context("staging"))
            .await
            .unwrap();
        assert_eq!(config.context().context_type, ContextType::Jwt);
        assert_eq!(config.http().options().headers["x-access-token"], "a.b.c");
    }

    #[tokio::test]
    async fn file_strategy_unknown_context_or_no_current() {
        let dir = TempDir::new().unwrap();
        let path = write_cfconfig(&dir, "gone");
        let resolver = resolver(platform(200), &dir);

        let err = resolver
            .from_file(uncached().with_config_path(&path).with_context("qa"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidContext);
        assert!(err.to_string().starts_with("No such context 'qa' at file"));

        let err = resolver
            .from_file(uncached().with_config_path(&path))
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to create context from file - no current context"
        );
    }

    #[tokio::test]
    async fn file_without_contexts_falls_back_to_no_auth() {
        let dir = TempDir::new().unwrap();
        let transport = platform(200);
        let path = dir.path().join("nested").join(".cfconfig");

        let config = resolver(transport.clone(), &dir)
            .from_file(uncached().with_config_path(&path).with_url("https://public.test"))
            .await
            .unwrap();

        assert!(config.context().is_no_auth());
        assert_eq!(config.context().url, "https://public.test");
        assert!(config.http().options().headers.is_empty());
        assert!(Path::new(&path).exists());
        assert_eq!(transport.calls_to("/api/user"), 0);
    }

    #[tokio::test]
    async fn load_falls_through_to_file() {
        let dir = TempDir::new().unwrap();
        let path = write_cfconfig(&dir, "prod");
        let options = ConfigOptions {
            api_key_env: Some("CF_SDK_TEST_LOAD_TOKEN_UNSET".into()),
            ..uncached().with_config_path(&path)
        };

        let config = resolver(platform(200), &dir).load(options).await.unwrap();
        assert_eq!(config.strategy(), Strategy::File);
        assert_eq!(config.context().name, "prod");
    }

    #[tokio::test]
    async fn file_strategy_keeps_unsaved_store_changes() {
        let dir = TempDir::new().unwrap();
        let path = write_cfconfig(&dir, "prod");
        let resolver = resolver(platform(200), &dir);
        let store = resolver.store();
        store.load_config(Some(path.as_path()), false).await.unwrap();

        let added = Context::create_from_token("added-key", "https://added.test");
        let added = Context {
            name: "added".to_string(),
            ..added
        };
        store.set_current_context(added);

        let config = resolver
            .from_file(uncached().with_config_path(&path))
            .await
            .unwrap();
        assert_eq!(config.context().name, "prod");
        assert!(store.get_context_by_name("added").is_some());
        assert_eq!(store.current_context_name().as_deref(), Some("added"));

        resolver
            .from_file(uncached().with_config_path(&path).with_context("staging"))
            .await
            .unwrap();
        assert_eq!(store.current_context_name().as_deref(), Some("added"));
        assert_eq!(store.get_all_contexts().len(), 3);
    }

    #[tokio::test]
    async fn file_strategy_wraps_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".cfconfig");
        std::fs::write(&path, "contexts: [not, a, map\n").unwrap();

        let err = resolver(platform(200), &dir)
            .from_file(uncached().with_config_path(&path))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to create context from file");
        assert_eq!(err.kind(), ErrorKind::ConfigLoad);
        assert!(err.chain_message().contains("Failed to load configuration file from path"));
    }

    #[tokio::test]
    async fn load_stops_at_provided_credentials() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("CF_SDK_TEST_LOAD_TOKEN_SET", "env-key");
        let transport = platform(200);
        let options = ConfigOptions {
            api_key_env: Some("CF_SDK_TEST_LOAD_TOKEN_SET".into()),
            ..uncached().with_api_key("provided-key")
        };

        let config = resolver(transport.clone(), &dir).load(options).await.unwrap();
        assert_eq!(config.strategy(), Strategy::Provided);
        assert_eq!(config.context().token, "provided-key");

        let user_calls: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|req| req.url.ends_with("/api/user"))
            .collect();
        assert_eq!(user_calls.len(), 1);
        assert_eq!(user_calls[0].headers["Authorization"], "provided-key");
    }

    #[tokio::test]
    async fn load_chains_the_file_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_cfconfig(&dir, "gone");
        let options = ConfigOptions {
            api_key_env: Some("CF_SDK_TEST_LOAD_TOKEN_UNSET_2".into()),
            ..uncached().with_config_path(&path)
        };

        let err = resolver(platform(200), &dir).auto_detect(options).await.unwrap_err();
        assert_eq!(err.to_string(), "Could not load config");
        assert_eq!(err.kind(), ErrorKind::InvalidContext);
        assert!(err.chain_message().ends_with("no current context"));
    }

    #[tokio::test]
    async fn initialize_requires_a_context() {
        let dir = TempDir::new().unwrap();
        let err = resolver(platform(200), &dir)
            .initialize_config(None, uncached(), Strategy::File)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Context is not provided");
    }

    #[tokio::test]
    async fn recreate_reuses_loaded_spec() {
        let dir = TempDir::new().unwrap();
        let transport = platform(200);
        let config = resolver(transport.clone(), &dir)
            .from_provided(uncached().with_api_key("key").with_url("https://g.test"))
            .await
            .unwrap();

        let again = config.recreate().await.unwrap();
        assert_eq!(again.context(), config.context());
        assert_eq!(again.strategy(), Strategy::Provided);
        assert_eq!(transport.calls_to("/openapi.json"), 1);
        assert_eq!(transport.calls_to("/api/user"), 2);
    }
}
