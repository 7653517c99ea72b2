//! Configuration file parser for ~/.config/xfeed/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning for each so typos
//! do not go unnoticed.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::settings::ApiProvider;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Posts whose trimmed text is shorter than this are never sent to a backend.
    pub min_text_chars: usize,

    /// Upper bound on one classification request, in seconds.
    pub request_timeout_secs: u64,

    /// How many times the observer looks for a timeline before falling back to
    /// watching the whole document.
    pub observer_max_attempts: u32,

    /// Delay between timeline lookups, in milliseconds.
    pub observer_poll_interval_ms: u64,

    /// SQLite file holding the settings record. `None` → next to the config file.
    pub store_path: Option<PathBuf>,

    pub providers: ProvidersConfig,

    pub selectors: SelectorsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_text_chars: 10,
            request_timeout_secs: 30,
            observer_max_attempts: 10,
            observer_poll_interval_ms: 1000,
            store_path: None,
            providers: ProvidersConfig::default(),
            selectors: SelectorsConfig::default(),
        }
    }
}

/// Resolved chat-completions endpoint and model for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub base_url: String,
    pub model: String,
}

/// Per-provider overrides from `[providers.<name>]`. Unset fields keep the
/// built-in profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub base_url: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: ProviderOverride,
    pub deepseek: ProviderOverride,
}

impl ProvidersConfig {
    /// Built-in profile for `provider` with any configured overrides applied.
    pub fn profile(&self, provider: ApiProvider) -> ProviderProfile {
        let (base_url, model, overrides) = match provider {
            ApiProvider::OpenAi => (
                "https://api.openai.com/v1/chat/completions",
                "gpt-3.5-turbo",
                &self.openai,
            ),
            ApiProvider::DeepSeek => (
                "https://api.deepseek.com/v1/chat/completions",
                "deepseek-chat",
                &self.deepseek,
            ),
        };
        ProviderProfile {
            base_url: overrides
                .base_url
                .clone()
                .unwrap_or_else(|| base_url.to_string()),
            model: overrides.model.clone().unwrap_or_else(|| model.to_string()),
        }
    }
}

/// Selector priority lists used to find timelines, posts and post text.
///
/// Lists are tried in order; the first selector with a non-empty result wins.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorsConfig {
    pub timeline: Vec<String>,
    pub posts: Vec<String>,
    pub post_text: Vec<String>,
    pub alternate_text: Vec<String>,
    pub cell: String,
    pub author_name: String,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            timeline: strings(&[
                r#"[data-testid="primaryColumn"]"#,
                r#"main[role="main"]"#,
                r#"div[aria-label*="Timeline"]"#,
                r#"[data-testid="primaryColumn"] section"#,
                r#"div[data-testid="cellInnerDiv"]"#,
                r#"section[role="region"]"#,
            ]),
            posts: strings(&[
                r#"article[data-testid="tweet"]"#,
                "article",
                r#"div[data-testid="cellInnerDiv"]"#,
                r#"div[data-testid="Tweet"]"#,
            ]),
            post_text: strings(&[r#"[data-testid="tweetText"]"#]),
            alternate_text: strings(&["p", "div[lang]", r#"div[data-testid="postText"]"#]),
            cell: r#"[data-testid="cellInnerDiv"]"#.to_string(),
            author_name: r#"[data-testid="User-Name"]"#.to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: &'static [&'static str] = &[
        "min_text_chars",
        "request_timeout_secs",
        "observer_max_attempts",
        "observer_poll_interval_ms",
        "store_path",
        "providers",
        "selectors",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            min_text_chars = config.min_text_chars,
            "Loaded configuration"
        );
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("xfeed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.min_text_chars, 10);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.observer_max_attempts, 10);
        assert_eq!(config.observer_poll_interval_ms, 1000);
        assert!(config.store_path.is_none());
        assert_eq!(
            config.providers.profile(ApiProvider::OpenAi).model,
            "gpt-3.5-turbo"
        );
        assert_eq!(
            config.providers.profile(ApiProvider::DeepSeek).base_url,
            "https://api.deepseek.com/v1/chat/completions"
        );
        assert_eq!(config.selectors.posts.len(), 4);
        assert_eq!(config.selectors.timeline.len(), 6);
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/xfeed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.min_text_chars, 10);
    }

    #[test]
    fn test_whitespace_only_file_returns_default() {
        let (dir, path) = write_config("whitespace", "   \n  \n  ");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_provider_override_keeps_other_defaults() {
        let content = r#"
min_text_chars = 20

[providers.deepseek]
base_url = "http://127.0.0.1:9999/v1/chat/completions"
"#;
        let (dir, path) = write_config("partial_provider", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.min_text_chars, 20);
        let deepseek = config.providers.profile(ApiProvider::DeepSeek);
        assert_eq!(deepseek.base_url, "http://127.0.0.1:9999/v1/chat/completions");
        // unmentioned fields fall back to the built-in profile
        assert_eq!(deepseek.model, "deepseek-chat");
        assert_eq!(
            config.providers.profile(ApiProvider::OpenAi).model,
            "gpt-3.5-turbo"
        );
        assert_eq!(config.observer_max_attempts, 10);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_selector_overrides() {
        let content = r#"
store_path = "/tmp/xfeed.db"

[selectors]
posts = ["li.post"]
cell = "li"
"#;
        let (dir, path) = write_config("selectors", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.selectors.posts, vec!["li.post".to_string()]);
        assert_eq!(config.selectors.cell, "li");
        assert_eq!(config.selectors.author_name, r#"[data-testid="User-Name"]"#);
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/xfeed.db")));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let (dir, path) = write_config("wrongtype", "min_text_chars = \"ten\"\n");
        assert!(Config::load(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "theme = \"dark\"\nmin_text_chars = 5\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.min_text_chars, 5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = write_config("too_large", &"a".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
