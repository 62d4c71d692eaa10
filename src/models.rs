//! Listing OpenRouter models that can produce images.

use crate::config::GraftConfig;
use crate::error::{sanitize_error_message, GraftError, Result};
use crate::image::providers::{http_client, DEFAULT_BASE_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// How long a cached catalog stays fresh.
pub const CACHE_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

const CACHE_FILE_NAME: &str = "graft_models_cache.json";
const DESCRIPTION_PREVIEW_LEN: usize = 100;

/// One entry of the `/models` catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model identifier, e.g. `google/gemini-2.5-flash-image-preview`.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub description: Option<String>,
    /// Context window in tokens.
    #[serde(default)]
    pub context_length: Option<u64>,
    /// Per-token prices, as decimal strings.
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
    /// Supported input and output modalities.
    #[serde(default)]
    pub architecture: Option<ModelArchitecture>,
}

/// Per-token pricing as reported by the API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per prompt token.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Price per completion token.
    #[serde(default)]
    pub completion: Option<String>,
}

/// Modalities a model accepts and produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    /// e.g. `["text", "image"]`.
    #[serde(default)]
    pub input_modalities: Vec<String>,
    /// Models listing `image` here can generate images.
    #[serde(default)]
    pub output_modalities: Vec<String>,
}

impl ModelInfo {
    /// True if the model lists `image` among its outputs.
    pub fn generates_images(&self) -> bool {
        self.architecture
            .as_ref()
            .is_some_and(|a| a.output_modalities.iter().any(|m| m == "image"))
    }

    /// Multi-line description used by the detailed listing.
    pub fn details(&self) -> String {
        let unknown = || "Unknown".to_string();
        let pricing = self.pricing.clone().unwrap_or_default();
        let description = self
            .description
            .as_deref()
            .unwrap_or("No description available");
        let preview: String = description.chars().take(DESCRIPTION_PREVIEW_LEN).collect();
        let modalities = self
            .architecture
            .as_ref()
            .map(|a| a.input_modalities.join(", "))
            .unwrap_or_default();

        format!(
            "ID: {}\nName: {}\nContext: {} tokens\nPricing: ${}/1K prompt, ${}/1K completion\n\
             Input modalities: [{}]\nDescription: {}...",
            self.id,
            self.name.clone().unwrap_or_else(unknown),
            self.context_length
                .map(|c| c.to_string())
                .unwrap_or_else(unknown),
            pricing.prompt.unwrap_or_else(unknown),
            pricing.completion.unwrap_or_else(unknown),
            modalities,
            preview,
        )
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelInfo>,
}

/// Fetches the model catalog, serving it from a temp-dir cache when fresh.
pub struct ModelCatalog {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    cache_path: Option<PathBuf>,
}

impl ModelCatalog {
    /// Catalog against the public OpenRouter API with the default cache.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            cache_path: Some(std::env::temp_dir().join(CACHE_FILE_NAME)),
        }
    }

    /// Catalog using the key and proxy from `config`, when there is one.
    pub fn from_config(config: Option<&GraftConfig>) -> Result<Self> {
        let proxy = config.and_then(|c| c.http_proxy.as_deref());
        let mut catalog = Self::new(http_client(proxy)?);
        if let Some(config) = config {
            catalog = catalog.with_api_key(config.api_key.clone());
        }
        Ok(catalog)
    }

    /// Overrides the API root.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sends the key with catalog requests.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the cache file; `None` disables caching.
    pub fn with_cache_path(mut self, path: Option<PathBuf>) -> Self {
        self.cache_path = path;
        self
    }

    /// Returns every model in the catalog.
    pub async fn fetch(&self) -> Result<Vec<ModelInfo>> {
        if let Some(models) = self.read_cache() {
            return Ok(models);
        }

        let mut request = self.client.get(format!("{}/models", self.base_url));
        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GraftError::Api {
                status: status.as_u16(),
                message: sanitize_error_message(&text),
            });
        }

        let text = response.text().await?;
        let parsed: ModelsResponse = serde_json::from_str(&text)?;
        self.write_cache(&text);
        Ok(parsed.data)
    }

    /// Returns only models that generate images.
    pub async fn image_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(self
            .fetch()
            .await?
            .into_iter()
            .filter(ModelInfo::generates_images)
            .collect())
    }

    fn read_cache(&self) -> Option<Vec<ModelInfo>> {
        let path = self.cache_path.as_ref()?;
        let modified = std::fs::metadata(path).ok()?.modified().ok()?;
        let age = SystemTime::now().duration_since(modified).unwrap_or_default();
        if age >= CACHE_MAX_AGE {
            return None;
        }
        let text = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<ModelsResponse>(&text) {
            Ok(parsed) => {
                tracing::debug!(path = %path.display(), "using cached model catalog");
                Some(parsed.data)
            }
            Err(e) => {
                tracing::debug!(error = %e, "ignoring unreadable model cache");
                None
            }
        }
    }

    fn write_cache(&self, text: &str) {
        if let Some(ref path) = self.cache_path {
            if let Err(e) = std::fs::write(path, text) {
                tracing::warn!(path = %path.display(), error = %e, "failed to cache model catalog");
            }
        }
    }
}
