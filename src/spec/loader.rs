//! OpenAPI document loading with a one-file-per-day disk cache.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;

use crate::defaults;
use crate::error::{Result, SdkError};
use crate::http::Http;

/// Where the OpenAPI document comes from and how the cache is used.
#[derive(Debug, Clone, Default)]
pub struct SpecOptions {
    /// Inline document: a JSON value, or a JSON string to be parsed
    pub json: Option<Value>,
    /// Explicit document URL (default: the platform's `/api/openapi.json`)
    pub url: Option<String>,
    /// Neither read nor write the cache
    pub disable_cache: bool,
    /// Skip a cache hit but still refresh the cache file
    pub force_refresh: bool,
}

/// Fetches OpenAPI documents, caching them per calendar day.
#[derive(Debug, Clone)]
pub struct SpecLoader {
    http: Http,
    cache_dir: PathBuf,
}

impl SpecLoader {
    pub fn new(http: Http) -> Self {
        Self {
            http,
            cache_dir: defaults::spec_cache_dir(),
        }
    }

    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache file for a given day: `openapi-YYYY-MM-DD.json`.
    pub fn cache_path_for(&self, date: NaiveDate) -> PathBuf {
        self.cache_dir
            .join(format!("openapi-{}.json", date.format("%Y-%m-%d")))
    }

    fn today_cache_path(&self) -> PathBuf {
        self.cache_path_for(chrono::Local::now().date_naive())
    }

    pub async fn load_spec(&self, options: &SpecOptions) -> Result<Value> {
        if let Some(inline) = &options.json {
            return parse_inline(inline);
        }

        let url = options.url.clone().unwrap_or_else(defaults::spec_url);
        if options.disable_cache {
            return self.download(&url).await;
        }

        let cache_path = self.today_cache_path();
        if !options.force_refresh {
            if let Some(spec) = read_cached(&cache_path).await {
                tracing::debug!("using cached spec: {}", cache_path.display());
                return Ok(spec);
            }
        }

        let spec = self.download(&url).await?;
        if let Err(e) = write_cached(&cache_path, &spec).await {
            tracing::warn!(
                "Could not write spec cache {}: {}",
                cache_path.display(),
                e
            );
        }
        Ok(spec)
    }

    async fn download(&self, url: &str) -> Result<Value> {
        tracing::debug!("loading spec: {}", url);
        let context = || format!("Sdk: Could not load openapi.json from url: {}", url);
        match self.http.get(url).await {
            Ok(spec @ Value::Object(_)) => Ok(spec),
            Ok(_) => Err(SdkError::Spec("response is not a JSON object".to_string()).context(context())),
            Err(e) => Err(e.context(context())),
        }
    }
}

fn parse_inline(inline: &Value) -> Result<Value> {
    match inline {
        Value::String(text) => serde_json::from_str(text)
            .map_err(|e| SdkError::Spec(format!("Could not parse inline openapi spec: {}", e))),
        other => Ok(other.clone()),
    }
}

async fn read_cached(path: &Path) -> Option<Value> {
    let data = tokio::fs::read_to_string(path).await.ok()?;
    match serde_json::from_str::<Value>(&data) {
        Ok(Value::Null) => None,
        Ok(spec) => Some(spec),
        Err(e) => {
            tracing::debug!("Could not read spec from cache -- refreshing: {}", e);
            None
        }
    }
}

async fn write_cached(path: &Path, spec: &Value) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let contents = serde_json::to_string_pretty(spec)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    tokio::fs::write(path, contents).await
}
