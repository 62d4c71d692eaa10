//! Configuration loading from `~/.graft_cfg`.
//!
//! The file is INI with a single `[openrouter]` section:
//!
//! ```ini
//! [openrouter]
//! api_key = sk-or-...
//! model = google/gemini-2.5-flash-image-preview
//! temperature = 0.7
//! # optional
//! system_prompt = You are a concept artist.
//! http_proxy = http://proxy.internal:3128
//! ```

use crate::error::{GraftError, Result};
use crate::image::providers::{DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use ini::Ini;
use std::path::{Path, PathBuf};

/// File name of the config file inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".graft_cfg";

const SECTION: &str = "openrouter";
const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Settings loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct GraftConfig {
    /// OpenRouter API key.
    pub api_key: String,
    /// Default model identifier.
    pub model: String,
    /// Default sampling temperature.
    pub temperature: f32,
    /// Optional system prompt sent before the user message.
    pub system_prompt: Option<String>,
    /// Optional HTTP(S) proxy for all requests.
    pub http_proxy: Option<String>,
}

impl GraftConfig {
    /// Default config location: `~/.graft_cfg`.
    pub fn default_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or_else(|| GraftError::Config("cannot determine home directory".into()))
    }

    /// Loads the config from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Loads the config from `path`.
    ///
    /// A missing file is tolerated only when `OPENROUTER_API_KEY` is set;
    /// defaults are used for everything else.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return match std::env::var(API_KEY_ENV) {
                Ok(key) if !key.trim().is_empty() => {
                    tracing::debug!(path = %path.display(), "config file missing, using {API_KEY_ENV}");
                    Ok(Self::with_api_key(key))
                }
                _ => Err(GraftError::Config(format!(
                    "configuration file not found at {}. Create it with an [openrouter] section \
                     containing api_key, or set {API_KEY_ENV}",
                    path.display()
                ))),
            };
        }

        let ini = Ini::load_from_file(path)
            .map_err(|e| GraftError::Config(format!("cannot read {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Self::from_ini(&ini)
    }

    /// Parses config text.
    pub fn parse(text: &str) -> Result<Self> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| GraftError::Config(format!("invalid config: {e}")))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self> {
        let section = ini.section(Some(SECTION)).ok_or_else(|| {
            GraftError::Config(format!("missing [{SECTION}] section"))
        })?;

        let value = |key: &str| {
            section
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let api_key = value("api_key")
            .ok_or_else(|| GraftError::Config(format!("api_key missing from [{SECTION}]")))?;

        let temperature = match value("temperature") {
            Some(raw) => raw.parse::<f32>().map_err(|_| {
                GraftError::Config(format!("temperature must be a number, got '{raw}'"))
            })?,
            None => DEFAULT_TEMPERATURE,
        };

        Ok(Self {
            api_key,
            model: value("model").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature,
            system_prompt: value("system_prompt"),
            http_proxy: value("http_proxy"),
        })
    }

    /// Defaults plus the given key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: None,
            http_proxy: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let config = GraftConfig::parse(
            "[openrouter]\n\
             api_key = sk-or-abc\n\
             model = openai/gpt-5-image\n\
             temperature = 1.1\n\
             system_prompt = Draw in watercolor\n\
             http_proxy = http://proxy:8080\n",
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-or-abc");
        assert_eq!(config.model, "openai/gpt-5-image");
        assert_eq!(config.temperature, 1.1);
        assert_eq!(config.system_prompt.as_deref(), Some("Draw in watercolor"));
        assert_eq!(config.http_proxy.as_deref(), Some("http://proxy:8080"));
    }

    #[test]
    fn test_parse_defaults() {
        let config = GraftConfig::parse("[openrouter]\napi_key = k\n").unwrap();
        assert_eq!(config, GraftConfig::with_api_key("k"));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_missing_section() {
        let err = GraftConfig::parse("[other]\napi_key = k\n").unwrap_err();
        assert!(matches!(err, GraftError::Config(_)));
        assert!(err.to_string().contains("[openrouter]"));
    }

    #[test]
    fn test_missing_or_empty_api_key() {
        assert!(GraftConfig::parse("[openrouter]\nmodel = x\n").is_err());
        assert!(GraftConfig::parse("[openrouter]\napi_key =   \n").is_err());
    }

    #[test]
    fn test_bad_temperature() {
        let err = GraftConfig::parse("[openrouter]\napi_key = k\ntemperature = warm\n").unwrap_err();
        assert!(err.to_string().contains("warm"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[openrouter]\napi_key = from-file\n").unwrap();
        let config = GraftConfig::load_from(&path).unwrap();
        assert_eq!(config.api_key, "from-file");
    }
}
