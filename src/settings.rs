//! User settings record, control messages and the visibility rule.
//!
//! The settings record is persisted as JSON with the camelCase field names the
//! settings UI writes. A snapshot is immutable for the duration of a pass and
//! replaced wholesale when an update arrives.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::category::{Category, TOPIC_KEYS};

/// Storage key of the settings record.
pub const SETTINGS_KEY: &str = "feedSettings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationMethod {
    #[default]
    Keywords,
    Api,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiProvider {
    #[default]
    OpenAi,
    DeepSeek,
}

impl ApiProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiProvider::OpenAi => "openai",
            ApiProvider::DeepSeek => "deepseek",
        }
    }
}

impl std::str::FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ApiProvider::OpenAi),
            "deepseek" => Ok(ApiProvider::DeepSeek),
            other => Err(format!("unknown API provider '{other}' (expected openai or deepseek)")),
        }
    }
}

impl std::str::FromStr for ClassificationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keywords" => Ok(ClassificationMethod::Keywords),
            "api" => Ok(ClassificationMethod::Api),
            other => Err(format!("unknown classification method '{other}' (expected keywords or api)")),
        }
    }
}

/// Settings snapshot.
///
/// Missing fields deserialize to their defaults so records written by older
/// versions of the settings UI still load. `Debug` masks `api_key`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub enabled: bool,
    pub show_indicators: bool,
    pub classification_method: ClassificationMethod,
    pub api_provider: ApiProvider,
    pub api_key: String,
    /// Topic key → enabled. Absent keys count as enabled.
    pub topics: BTreeMap<String, bool>,
}

impl Default for Settings {
    /// Defaults seeded on first install: every topic on except entertainment,
    /// keyword classification, OpenAI selected, no credential.
    fn default() -> Self {
        let topics = TOPIC_KEYS
            .iter()
            .map(|key| (key.to_string(), *key != "entertainment"))
            .collect();
        Self {
            enabled: true,
            show_indicators: true,
            classification_method: ClassificationMethod::Keywords,
            api_provider: ApiProvider::OpenAi,
            api_key: String::new(),
            topics,
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("enabled", &self.enabled)
            .field("show_indicators", &self.show_indicators)
            .field("classification_method", &self.classification_method)
            .field("api_provider", &self.api_provider)
            .field(
                "api_key",
                &(!self.api_key.is_empty()).then_some("[REDACTED]"),
            )
            .field("topics", &self.topics)
            .finish()
    }
}

impl Settings {
    /// Preference for a topic key. `None` when the record has no entry.
    pub fn topic_preference(&self, topic_key: &str) -> Option<bool> {
        self.topics.get(topic_key).copied()
    }

    /// Whether a post in `category` should be hidden.
    ///
    /// Hidden iff the category's topic is explicitly disabled. `Error` is never
    /// hidden: a failed classification must not remove content.
    pub fn hides(&self, category: Category) -> bool {
        if category == Category::Error {
            return false;
        }
        self.topic_preference(category.topic_key()) == Some(false)
    }
}

/// Point-to-point message from the settings UI to a running page session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    UpdateSettings { settings: Settings },
    /// Any action this content side does not handle.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub success: bool,
}

/// Why the installation hook is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    Install,
    Update,
}
