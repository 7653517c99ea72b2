//! Feed controller: settings, the processed-post cache and the per-post pipeline.
//!
//! Per identity a post moves `unseen → processing → classified`. Only a
//! settings update returns posts to `unseen`, by clearing the cache.

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::annotate::Annotator;
use crate::category::Category;
use crate::classify::{classify_post, BackendFactory, Classifier};
use crate::config::Config;
use crate::dom::{Document, NodeId, SelectorError};
use crate::extract::{Extractor, PostId};
use crate::settings::{ControlMessage, ControlResponse, Settings};
use crate::storage::Database;
use crate::util::trimmed_char_count;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Failed to load settings: {0:#}")]
    SettingsLoad(anyhow::Error),

    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Cache entry for one post identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostState {
    /// Classification in flight.
    Processing,
    Classified(Category),
}

/// Counters for one processing pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassSummary {
    /// Candidate posts found.
    pub seen: usize,
    /// Already in the cache.
    pub skipped: usize,
    /// Newly classified this pass.
    pub classified: usize,
    pub hidden: usize,
    /// Classified as `Error`.
    pub failed: usize,
}

enum PostOutcome {
    Skipped,
    Shown(Category),
    Hidden,
}

pub struct FeedController {
    settings: Option<Settings>,
    cache: HashMap<PostId, PostState>,
    backend: Option<Arc<dyn Classifier>>,
    factory: BackendFactory,
    extractor: Extractor,
    annotator: Annotator,
    min_text_chars: usize,
}

impl FeedController {
    /// Build an inactive controller. It has no settings until
    /// [`init`](Self::init) or [`apply_settings`](Self::apply_settings).
    pub fn new(config: &Config, factory: BackendFactory) -> Result<Self, ControllerError> {
        Ok(Self {
            settings: None,
            cache: HashMap::new(),
            backend: None,
            factory,
            extractor: Extractor::from_config(&config.selectors)?,
            annotator: Annotator::from_config(&config.selectors)?,
            min_text_chars: config.min_text_chars,
        })
    }

    /// Load settings from the store.
    ///
    /// Returns whether the controller is active. A missing record leaves it
    /// inactive; a store failure is fatal and is not retried.
    pub async fn init(&mut self, db: &Database) -> Result<bool, ControllerError> {
        let loaded = db.load_settings().await.map_err(ControllerError::SettingsLoad)?;
        match loaded {
            Some(settings) => {
                tracing::info!(
                    enabled = settings.enabled,
                    show_indicators = settings.show_indicators,
                    method = ?settings.classification_method,
                    provider = settings.api_provider.as_str(),
                    api_key_present = !settings.api_key.is_empty(),
                    "Loaded settings"
                );
                self.apply_settings(settings);
            }
            None => tracing::info!("No settings found, controller stays inactive"),
        }
        Ok(self.is_active())
    }

    /// Install a settings snapshot and rebuild the backend. The cache is kept.
    pub fn apply_settings(&mut self, settings: Settings) {
        let backend = (self.factory)(&settings);
        tracing::debug!(backend = backend.name(), "Classifier selected");
        self.backend = Some(backend);
        self.settings = Some(settings);
    }

    /// Settings loaded and enabled.
    pub fn is_active(&self) -> bool {
        self.settings.as_ref().is_some_and(|s| s.enabled)
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    pub fn post_state(&self, id: &PostId) -> Option<PostState> {
        self.cache.get(id).copied()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Replace the snapshot and forget every classification.
    ///
    /// When the new snapshot is disabled, every post hidden earlier is shown
    /// again and indicators are removed. The caller runs the follow-up pass.
    pub fn reset_settings(&mut self, doc: &mut Document, settings: Settings) {
        let cleared = self.cache.len();
        self.cache.clear();
        let enabled = settings.enabled;
        self.apply_settings(settings);
        tracing::info!(cleared, enabled, "Settings updated, cache cleared");

        if !enabled {
            let restored = self.restore_all(doc);
            tracing::info!(restored, "Filtering disabled, restored hidden posts");
        }
    }

    /// Handle a control message. `UpdateSettings` resets state; the pass over
    /// present posts is left to the caller so the reply can go out first.
    pub fn handle_message(&mut self, doc: &mut Document, message: ControlMessage) -> ControlResponse {
        match message {
            ControlMessage::UpdateSettings { settings } => {
                self.reset_settings(doc, settings);
                ControlResponse { success: true }
            }
            ControlMessage::Unknown => {
                tracing::debug!("Ignoring unknown control message");
                ControlResponse { success: false }
            }
        }
    }

    /// Show every post this crate hid and strip all indicators.
    fn restore_all(&self, doc: &mut Document) -> usize {
        let root = doc.root();
        let mut restored = 0;
        for post in self.extractor.find_posts(doc, root) {
            if self.annotator.is_hidden(doc, post) {
                self.annotator.show_post(doc, post);
                restored += 1;
            }
            self.annotator.remove_indicator(doc, post);
        }
        restored
    }

    /// Run the pipeline over every post under `scope`, sequentially.
    ///
    /// Posts already in the cache are skipped. Never fails: a post that cannot
    /// be classified is recorded as `Error` and shown.
    pub async fn process_all(&mut self, doc: &mut Document, scope: NodeId) -> PassSummary {
        let mut summary = PassSummary::default();
        let Some(settings) = self.settings.clone().filter(|s| s.enabled) else {
            tracing::debug!("Controller inactive, skipping pass");
            return summary;
        };

        let posts = self.extractor.find_posts(doc, scope);
        for post in posts {
            if !doc.is_connected(post) {
                continue;
            }
            summary.seen += 1;
            match self.process_post(doc, post, &settings).await {
                PostOutcome::Skipped => summary.skipped += 1,
                PostOutcome::Shown(category) => {
                    summary.classified += 1;
                    if category == Category::Error {
                        summary.failed += 1;
                    }
                }
                PostOutcome::Hidden => {
                    summary.classified += 1;
                    summary.hidden += 1;
                }
            }
        }

        tracing::info!(
            seen = summary.seen,
            skipped = summary.skipped,
            classified = summary.classified,
            hidden = summary.hidden,
            failed = summary.failed,
            "Processed posts"
        );
        summary
    }

    async fn process_post(&mut self, doc: &mut Document, post: NodeId, settings: &Settings) -> PostOutcome {
        let id = self.extractor.identify(doc, post);
        if self.cache.contains_key(&id) {
            tracing::trace!(post_id = %id, "Post already processed");
            return PostOutcome::Skipped;
        }

        self.cache.insert(id.clone(), PostState::Processing);
        self.annotator.show_post(doc, post);

        let text = self.extractor.extract_text(doc, post);
        if trimmed_char_count(&text) < self.min_text_chars {
            let category = Category::Entertainment;
            self.cache.insert(id.clone(), PostState::Classified(category));
            tracing::debug!(post_id = %id, "Short or empty text, classified as entertainment");
            self.refresh_indicator(doc, post, category, settings);
            return PostOutcome::Shown(category);
        }

        let category = match &self.backend {
            Some(backend) => {
                let backend = Arc::clone(backend);
                classify_post(backend.as_ref(), &text).await
            }
            None => Category::Error,
        };
        self.cache.insert(id.clone(), PostState::Classified(category));

        if settings.hides(category) {
            tracing::debug!(post_id = %id, category = %category, "Hiding post");
            self.annotator.hide_post(doc, post);
            self.annotator.remove_indicator(doc, post);
            PostOutcome::Hidden
        } else {
            tracing::debug!(post_id = %id, category = %category, "Showing post");
            self.refresh_indicator(doc, post, category, settings);
            PostOutcome::Shown(category)
        }
    }

    fn refresh_indicator(&self, doc: &mut Document, post: NodeId, category: Category, settings: &Settings) {
        if settings.show_indicators {
            self.annotator.attach_indicator(doc, post, category);
        } else {
            self.annotator.remove_indicator(doc, post);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifyError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        label: Result<&'static str, ()>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Classifier for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn classify(&self, _text: &str) -> Result<String, ClassifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.label
                .map(str::to_string)
                .map_err(|()| ClassifyError::CredentialMissing)
        }
    }

    fn controller(label: Result<&'static str, ()>) -> (FeedController, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory: BackendFactory = Arc::new(move |_: &Settings| -> Arc<dyn Classifier> {
            Arc::new(Scripted {
                label,
                calls: Arc::clone(&counter),
            })
        });
        let mut controller = FeedController::new(&Config::default(), factory).unwrap();
        controller.apply_settings(Settings::default());
        (controller, calls)
    }

    fn page(posts: &[(&str, &str)]) -> Document {
        let body: String = posts
            .iter()
            .map(|(id, text)| {
                format!(
                    r#"<article data-testid="tweet"><div><a href="/u/status/{id}"><time>1h</time></a></div><div data-testid="tweetText">{text}</div></article>"#
                )
            })
            .collect();
        Document::parse_html(&format!(r#"<main role="main">{body}</main>"#))
    }

    #[tokio::test]
    async fn test_pass_is_idempotent() {
        let (mut c, calls) = controller(Ok("Technology"));
        let mut doc = page(&[("1", "Rust 2.0 released with new borrow checker")]);
        let root = doc.root();

        let first = c.process_all(&mut doc, root).await;
        let second = c.process_all(&mut doc, root).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.classified, 1);
        assert_eq!(second, PassSummary { seen: 1, skipped: 1, ..PassSummary::default() });
        assert_eq!(
            c.post_state(&PostId::Status("1".into())),
            Some(PostState::Classified(Category::Technology))
        );
    }

    #[tokio::test]
    async fn test_inactive_controller_does_nothing() {
        let (mut c, calls) = controller(Ok("Technology"));
        c.apply_settings(Settings {
            enabled: false,
            ..Settings::default()
        });
        let mut doc = page(&[("1", "a long enough post body")]);
        let root = doc.root();
        assert_eq!(c.process_all(&mut doc, root).await, PassSummary::default());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_is_shown_as_error() {
        let (mut c, _) = controller(Err(()));
        let mut doc = page(&[("7", "this post will fail to classify")]);
        let root = doc.root();

        let summary = c.process_all(&mut doc, root).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.hidden, 0);

        let post = c.extractor().find_posts(&doc, root)[0];
        assert!(!c.annotator().is_hidden(&doc, post));
        let badge = c.annotator().indicator(&doc, post).unwrap();
        assert_eq!(doc.text_content(badge), "Error");
    }

    #[tokio::test]
    async fn test_unknown_message_is_rejected() {
        let (mut c, _) = controller(Ok("Food"));
        let mut doc = page(&[]);
        assert_eq!(
            c.handle_message(&mut doc, ControlMessage::Unknown),
            ControlResponse { success: false }
        );
    }

    #[tokio::test]
    async fn test_init_from_store() {
        let (mut c, _) = controller(Ok("Food"));
        let db = Database::open(":memory:").await.unwrap();

        // fresh controller semantics: nothing stored → inactive
        c.settings = None;
        assert!(!c.init(&db).await.unwrap());

        db.save_settings(&Settings::default()).await.unwrap();
        assert!(c.init(&db).await.unwrap());

        db.set_item(crate::settings::SETTINGS_KEY, "{\"enabled\": \"yes\"}").await.unwrap();
        assert!(matches!(c.init(&db).await, Err(ControllerError::SettingsLoad(_))));
    }
}
