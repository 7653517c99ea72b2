//! Classifier backends.
//!
//! A backend turns post text into a free-form label. Every variant sits behind
//! [`Classifier`] and is chosen from the settings snapshot by a
//! [`BackendFactory`], so callers never branch on the classification method.
//! Failures stop at [`classify_post`], which turns any [`ClassifyError`] into
//! [`Category::Error`].

mod keywords;
mod remote;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::category::Category;
use crate::config::Config;
use crate::settings::{ClassificationMethod, Settings};

pub use keywords::KeywordClassifier;
pub use remote::{ChatClassifier, SYSTEM_INSTRUCTION};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("No API key configured")]
    CredentialMissing,

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Request timed out after {0}s")]
    TimedOut(u64),

    #[error("HTTP error: status {0}")]
    NonSuccessStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The configured backend could not be built (e.g. its endpoint was rejected).
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// Classifier Trait
// ============================================================================

/// Contract shared by every backend.
///
/// Implementations hold only read-only state so one instance can serve
/// concurrent calls for different posts.
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Classify non-empty post text into a loose category label.
    async fn classify(&self, text: &str) -> Result<String, ClassifyError>;
}

/// Builds the backend for a settings snapshot.
pub type BackendFactory = Arc<dyn Fn(&Settings) -> Arc<dyn Classifier> + Send + Sync>;

/// Classify `text` and normalize the result. Never fails: backend errors are
/// logged and reported as [`Category::Error`].
pub async fn classify_post(backend: &dyn Classifier, text: &str) -> Category {
    match backend.classify(text).await {
        Ok(label) => {
            let category = Category::normalize(&label);
            tracing::debug!(backend = backend.name(), raw = %label, category = %category, "Post classified");
            category
        }
        Err(e) => {
            tracing::warn!(backend = backend.name(), error = %e, "Classification failed");
            Category::Error
        }
    }
}

/// Backend that fails every call. Stands in when the configured backend
/// cannot be constructed, so posts are still shown (as `Error`).
pub struct Unavailable {
    reason: String,
}

impl Unavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Classifier for Unavailable {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn classify(&self, _text: &str) -> Result<String, ClassifyError> {
        Err(ClassifyError::Unavailable(self.reason.clone()))
    }
}

/// Factory that picks the keyword backend or a chat backend for the selected
/// provider, using the endpoints and timeout from `config`.
pub fn backend_factory(config: &Config, client: reqwest::Client) -> BackendFactory {
    let providers = config.providers.clone();
    let timeout = Duration::from_secs(config.request_timeout_secs);

    Arc::new(move |settings: &Settings| -> Arc<dyn Classifier> {
        match settings.classification_method {
            ClassificationMethod::Keywords => Arc::new(KeywordClassifier::new()),
            ClassificationMethod::Api => {
                let profile = providers.profile(settings.api_provider);
                match ChatClassifier::new(
                    client.clone(),
                    settings.api_provider,
                    &profile,
                    &settings.api_key,
                    timeout,
                ) {
                    Ok(backend) => Arc::new(backend),
                    Err(e) => {
                        tracing::error!(
                            provider = settings.api_provider.as_str(),
                            error = %e,
                            "Rejecting classification endpoint"
                        );
                        Arc::new(Unavailable::new(e.to_string()))
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ApiProvider;

    struct Fixed(Result<&'static str, u16>);

    #[async_trait]
    impl Classifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn classify(&self, _text: &str) -> Result<String, ClassifyError> {
            self.0
                .map(str::to_string)
                .map_err(ClassifyError::NonSuccessStatus)
        }
    }

    #[tokio::test]
    async fn test_classify_post_normalizes_label() {
        let category = classify_post(&Fixed(Ok(" machine learning ")), "some text").await;
        assert_eq!(category, Category::AiMl);
    }

    #[tokio::test]
    async fn test_classify_post_maps_failure_to_error() {
        let category = classify_post(&Fixed(Err(500)), "some text").await;
        assert_eq!(category, Category::Error);
    }

    #[tokio::test]
    async fn test_unmapped_label_is_entertainment() {
        let category = classify_post(&Fixed(Ok("webinar")), "some text").await;
        assert_eq!(category, Category::Entertainment);
    }

    #[tokio::test]
    async fn test_factory_selects_by_method() {
        let factory = backend_factory(&Config::default(), reqwest::Client::new());

        let keywords = factory(&Settings::default());
        assert_eq!(keywords.name(), "keywords");

        let api = factory(&Settings {
            classification_method: ClassificationMethod::Api,
            api_provider: ApiProvider::DeepSeek,
            api_key: "sk-test".to_string(),
            ..Settings::default()
        });
        assert_eq!(api.name(), "deepseek");
    }

    #[tokio::test]
    async fn test_factory_rejects_insecure_endpoint() {
        let mut config = Config::default();
        config.providers.openai.base_url = Some("http://api.example.com/v1".to_string());
        let factory = backend_factory(&config, reqwest::Client::new());

        let backend = factory(&Settings {
            classification_method: ClassificationMethod::Api,
            api_key: "sk-test".to_string(),
            ..Settings::default()
        });
        assert_eq!(backend.name(), "unavailable");
        assert_eq!(classify_post(backend.as_ref(), "long enough text").await, Category::Error);
    }
}
