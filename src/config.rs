//! Configuration management for Novelist.
//!
//! Configuration lives in a TOML file in the platform-specific config
//! directory. Credentials and the model name can be overridden from the
//! environment, which is how most deployments supply the API keys.

use crate::error::ConfigError;
use crate::model::ImageFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Application name used for config directory.
const APP_NAME: &str = "Novelist";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Placeholder value for unconfigured API keys.
const API_KEY_PLACEHOLDER: &str = "YOUR_API_KEY_HERE";

/// Environment variables read by [`Config::apply_env`].
pub const ENV_LLM_KEY: &str = "OPENAI_API_KEY";
pub const ENV_LLM_BASE_URL: &str = "OPENAI_BASE_URL";
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";
pub const ENV_MAX_TOKENS: &str = "MAX_TOKENS";
pub const ENV_IMAGE_KEY: &str = "STABILITY_API_KEY";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Language model endpoint.
    pub llm: LlmConfig,

    /// Image generation endpoint.
    pub image: ImageConfig,

    /// Chapter writing behavior.
    pub generation: GenerationConfig,

    /// Cover generation settings.
    pub cover: CoverConfig,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key (required).
    pub key: String,

    /// Base URL for the API.
    pub base_url: String,

    /// Model identifier.
    pub model: String,

    /// Upper bound on completion tokens.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,

    /// Number of attempts per request.
    pub retries: u32,

    /// Delay before every request in seconds.
    pub delay_between_requests_sec: f64,

    /// Per-request timeout in seconds.
    pub timeout_sec: u64,

    /// Stream responses and show a progress line.
    pub stream: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            key: API_KEY_PLACEHOLDER.to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 8192,
            temperature: 0.7,
            retries: 3,
            delay_between_requests_sec: 1.0,
            timeout_sec: 300,
            stream: true,
        }
    }
}

impl LlmConfig {
    /// Checks if the API key is configured (not placeholder).
    pub fn is_configured(&self) -> bool {
        is_real_key(&self.key)
    }
}

/// Stability AI image endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// API key (required while covers are enabled).
    pub key: String,

    /// Full URL of the generation endpoint.
    pub endpoint: String,

    /// Requested output format, `jpeg` or `png`.
    pub output_format: String,

    /// Number of attempts per request.
    pub retries: u32,

    /// Per-request timeout in seconds.
    pub timeout_sec: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            key: API_KEY_PLACEHOLDER.to_string(),
            endpoint: "https://api.stability.ai/v2beta/stable-image/generate/sd3".to_string(),
            output_format: "jpeg".to_string(),
            retries: 3,
            timeout_sec: 60,
        }
    }
}

impl ImageConfig {
    /// Checks if the API key is configured (not placeholder).
    pub fn is_configured(&self) -> bool {
        is_real_key(&self.key)
    }
}

/// Chapter writing behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Chapters shorter than this are re-requested.
    pub min_chapter_chars: usize,

    /// Attempts per chapter for the length check.
    pub chapter_attempts: u32,

    /// Characters of the previous chapter carried into the next prompt.
    pub context_chars: usize,

    /// Number of candidate premises drafted before selection.
    pub candidate_premises: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            min_chapter_chars: 1000,
            chapter_attempts: 3,
            context_chars: 4000,
            candidate_premises: 5,
        }
    }
}

/// Cover generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Generate a cover image at all.
    pub enabled: bool,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn is_real_key(key: &str) -> bool {
    !key.trim().is_empty() && key != API_KEY_PLACEHOLDER
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overrides values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overrides values using the given variable lookup.
    ///
    /// Empty values are ignored so an exported-but-blank variable doesn't
    /// clobber the file.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_LLM_KEY) {
            self.llm.key = key;
        }
        if let Some(url) = get(ENV_LLM_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(model) = get(ENV_LLM_MODEL) {
            self.llm.model = model;
        }
        if let Some(raw) = get(ENV_MAX_TOKENS) {
            self.llm.max_tokens = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: ENV_MAX_TOKENS.to_string(),
                message: format!("expected a positive integer, got '{}'", raw),
            })?;
        }
        if let Some(key) = get(ENV_IMAGE_KEY) {
            self.image.key = key;
        }
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Called before any API request so missing credentials fail fast.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.llm.is_configured() {
            return Err(ConfigError::MissingValue(format!(
                "llm.key (set {} or edit the config file)",
                ENV_LLM_KEY
            )));
        }

        if self.cover.enabled && !self.image.is_configured() {
            return Err(ConfigError::MissingValue(format!(
                "image.key (set {} or disable covers)",
                ENV_IMAGE_KEY
            )));
        }

        check_url("llm.base_url", &self.llm.base_url)?;
        if self.cover.enabled {
            check_url("image.endpoint", &self.image.endpoint)?;
            if ImageFormat::from_config(&self.image.output_format).is_none() {
                return Err(ConfigError::InvalidValue {
                    key: "image.output_format".to_string(),
                    message: "must be 'jpeg', 'jpg' or 'png'".to_string(),
                });
            }
        }

        if self.llm.retries == 0 {
            return Err(ConfigError::InvalidValue {
                key: "llm.retries".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.generation.chapter_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "generation.chapter_attempts".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn check_url(key: &str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        Ok(url) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn configured() -> Config {
        let mut config = Config::default();
        config.llm.key = "sk-real-key".to_string();
        config.image.key = "sk-image-key".to_string();
        config
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.llm.is_configured());
        assert!(!config.image.is_configured());
        assert_eq!(config.llm.model, "gpt-3.5-turbo");
        assert_eq!(config.llm.max_tokens, 8192);
        assert!(config.cover.enabled);
    }

    #[test]
    fn test_config_round_trip() {
        let config = configured();
        let file = NamedTempFile::new().unwrap();

        config.save_to(file.path()).unwrap();

        let loaded = Config::load_from(file.path()).unwrap();
        assert_eq!(loaded.llm.model, config.llm.model);
        assert_eq!(loaded.llm.key, "sk-real-key");
        assert_eq!(
            loaded.generation.context_chars,
            config.generation.context_chars
        );
    }

    #[test]
    fn test_missing_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert!(!config.llm.is_configured());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "[llm]\nmodel = \"gpt-4o\"\n").unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.retries, 3);
        assert_eq!(config.generation.min_chapter_chars, 1000);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_LLM_KEY, "sk-env"),
            (ENV_LLM_MODEL, "gpt-4o-mini"),
            (ENV_MAX_TOKENS, "4096"),
            (ENV_IMAGE_KEY, "sk-stability"),
            (ENV_LLM_BASE_URL, "  "),
        ]);

        let mut config = Config::default();
        config
            .apply_vars(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.llm.key, "sk-env");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.image.key, "sk-stability");
        // blank values are ignored
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_env_bad_max_tokens() {
        let mut config = Config::default();
        let result = config.apply_vars(|name| {
            (name == ENV_MAX_TOKENS).then(|| "lots".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::default().validate().is_err());
        assert!(configured().validate().is_ok());
    }

    #[test]
    fn test_image_key_only_required_with_covers() {
        let mut config = Config::default();
        config.llm.key = "sk-real-key".to_string();
        assert!(config.validate().is_err());

        config.cover.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_format_accepts_image_format_spellings() {
        let mut config = configured();
        for format in ["jpeg", "JPEG", "jpg", "png"] {
            config.image.output_format = format.to_string();
            assert!(config.validate().is_ok(), "rejected {}", format);
        }

        config.image.output_format = "webp".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "image.output_format"
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = configured();
        config.llm.base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        config.llm.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }
}
