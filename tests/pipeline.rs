//! End-to-end tests for the page session: discovery, classification, hiding,
//! indicators and settings updates.
//!
//! Backends are scripted per post text and count their calls, so each test can
//! assert exactly how many classifications a pass triggered.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use xfeed::annotate::HIDDEN_CLASS;
use xfeed::classify::{BackendFactory, Classifier, ClassifyError};
use xfeed::config::Config;
use xfeed::controller::FeedController;
use xfeed::dom::{Document, NodeId, Selector};
use xfeed::session::{HostEvent, Session};
use xfeed::settings::{ControlMessage, ControlResponse, Settings};

struct ByText {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Classifier for ByText {
    fn name(&self) -> &'static str {
        "by-text"
    }

    async fn classify(&self, text: &str) -> Result<String, ClassifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("LLM") {
            Ok("AI/ML".to_string())
        } else if text.contains("bitcoin") {
            Ok("  crypto\n".to_string())
        } else if text.contains("outage") {
            Err(ClassifyError::NonSuccessStatus(502))
        } else {
            Ok("webinar".to_string())
        }
    }
}

fn controller(settings: Settings) -> (FeedController, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let factory: BackendFactory = Arc::new(move |_: &Settings| -> Arc<dyn Classifier> {
        Arc::new(ByText {
            calls: Arc::clone(&counter),
        })
    });
    let mut controller = FeedController::new(&Config::default(), factory).unwrap();
    controller.apply_settings(settings);
    (controller, calls)
}

fn tweet(id: &str, text: &str) -> String {
    format!(
        r#"<div data-testid="cellInnerDiv"><article data-testid="tweet"><div class="head"><div class="names"><div data-testid="User-Name">someone</div><a href="/someone/status/{id}"><time>2h</time></a></div></div><div data-testid="tweetText">{text}</div></article></div>"#
    )
}

fn timeline(tweets: &[String]) -> Document {
    Document::parse_html(&format!(
        r#"<div data-testid="primaryColumn"><section>{}</section></div>"#,
        tweets.concat()
    ))
}

fn session(doc: Document, settings: Settings) -> (Session, Arc<AtomicUsize>) {
    let (controller, calls) = controller(settings);
    (Session::new(doc, controller, &Config::default()), calls)
}

/// The article whose status link carries `id`.
fn post(doc: &Document, id: &str) -> NodeId {
    let link = Selector::parse(&format!(r#"a[href="/someone/status/{id}"]"#)).unwrap();
    let article = Selector::parse("article").unwrap();
    let anchor = doc.query_selector(doc.root(), &link).unwrap();
    doc.closest(anchor, &article).unwrap()
}

fn badge_text(doc: &Document, post: NodeId) -> Option<String> {
    let badge = Selector::parse("div.xfc-topic-indicator").unwrap();
    doc.query_selector(post, &badge).map(|b| doc.text_content(b))
}

fn is_hidden(doc: &Document, post: NodeId) -> bool {
    doc.has_class(post, HIDDEN_CLASS)
}

#[tokio::test]
async fn test_recognised_topic_is_shown_with_indicator() {
    let doc = timeline(&[tweet("1", "Check out this new LLM architecture paper")]);
    let (mut session, calls) = session(doc, Settings::default());

    session.scan().await;

    let doc = session.document();
    let p = post(doc, "1");
    assert!(!is_hidden(doc, p));
    assert_eq!(badge_text(doc, p).as_deref(), Some("AI/ML"));
    let badge = Selector::parse("div.xfc-topic-indicator").unwrap();
    let badge = doc.query_selector(p, &badge).unwrap();
    assert_eq!(
        doc.style_property(badge, "background-color").as_deref(),
        Some("#7b61ff")
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_text_is_entertainment_and_shown_without_backend_call() {
    let doc = timeline(&[tweet("2", "")]);
    let (mut session, calls) = session(doc, Settings::default());

    session.scan().await;

    let doc = session.document();
    let p = post(doc, "2");
    // Entertainment is off by default, but short text is never hidden.
    assert!(!is_hidden(doc, p));
    assert_eq!(badge_text(doc, p).as_deref(), Some("Entertainment"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_failure_shows_error_indicator() {
    let doc = timeline(&[tweet("3", "Provider outage took everything down today")]);
    let (mut session, _) = session(doc, Settings::default());

    let summary = session.scan().await.unwrap();
    assert_eq!(summary.failed, 1);

    let doc = session.document();
    let p = post(doc, "3");
    assert!(!is_hidden(doc, p));
    assert_eq!(badge_text(doc, p).as_deref(), Some("Error"));
}

#[tokio::test]
async fn test_failed_post_does_not_stop_later_posts() {
    let doc = timeline(&[
        tweet("30", "Provider outage took everything down today"),
        tweet("31", "Check out this new LLM architecture paper"),
    ]);
    let (mut session, calls) = session(doc, Settings::default());

    let summary = session.scan().await.unwrap();
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.classified, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let doc = session.document();
    assert_eq!(badge_text(doc, post(doc, "30")).as_deref(), Some("Error"));
    let second = post(doc, "31");
    assert!(!is_hidden(doc, second));
    assert_eq!(badge_text(doc, second).as_deref(), Some("AI/ML"));
}

#[tokio::test]
async fn test_unmapped_label_falls_back_to_entertainment_and_hides() {
    let doc = timeline(&[
        tweet("4", "Join our webinar on quarterly synergy"),
        tweet("5", "Everyone is buying bitcoin again this week"),
    ]);
    let (mut session, _) = session(doc, Settings::default());

    let summary = session.scan().await.unwrap();
    assert_eq!(summary.hidden, 1);

    let doc = session.document();
    let hidden = post(doc, "4");
    assert!(is_hidden(doc, hidden));
    assert_eq!(badge_text(doc, hidden), None);
    let cell = doc.parent(hidden).unwrap();
    assert_eq!(doc.style_property(cell, "display").as_deref(), Some("none"));

    let shown = post(doc, "5");
    assert!(!is_hidden(doc, shown));
    assert_eq!(badge_text(doc, shown).as_deref(), Some("Crypto"));
}

#[tokio::test]
async fn test_indicators_off_leaves_no_badges() {
    let doc = timeline(&[tweet("6", "Everyone is buying bitcoin again this week")]);
    let settings = Settings {
        show_indicators: false,
        ..Settings::default()
    };
    let (mut session, _) = session(doc, settings);

    session.scan().await;
    let doc = session.document();
    assert_eq!(badge_text(doc, post(doc, "6")), None);
}

#[tokio::test]
async fn test_injected_posts_trigger_one_pass() {
    let doc = timeline(&[tweet("7", "Check out this new LLM architecture paper")]);
    let (mut session, calls) = session(doc, Settings::default());

    session.poll_attach().await;
    assert!(session.observer().is_attached());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    session
        .handle_event(HostEvent::Inject {
            target: Some("section".to_string()),
            html: tweet("8", "Everyone is buying bitcoin again this week"),
        })
        .await;

    // Only the new post is classified; the pass's own badges do not retrigger.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(session.controller().cache_len(), 2);
    let doc = session.document();
    assert_eq!(badge_text(doc, post(doc, "8")).as_deref(), Some("Crypto"));
}

#[tokio::test]
async fn test_disabled_filter_never_classifies() {
    let doc = timeline(&[tweet("9", "Check out this new LLM architecture paper")]);
    let settings = Settings {
        enabled: false,
        ..Settings::default()
    };
    let (mut session, calls) = session(doc, settings);

    session.scan().await;
    session
        .handle_event(HostEvent::Inject {
            target: Some("section".to_string()),
            html: tweet("10", "Everyone is buying bitcoin again this week"),
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(badge_text(session.document(), post(session.document(), "9")), None);
}

#[tokio::test]
async fn test_settings_update_reclassifies_and_unhides() {
    let doc = timeline(&[tweet("11", "Join our webinar on quarterly synergy")]);
    let (mut session, calls) = session(doc, Settings::default());

    session.scan().await;
    assert!(is_hidden(session.document(), post(session.document(), "11")));

    let mut settings = Settings::default();
    settings.topics.insert("entertainment".to_string(), true);
    let (reply, response) = oneshot::channel();
    session
        .handle_event(HostEvent::Message {
            message: ControlMessage::UpdateSettings { settings },
            reply,
        })
        .await;

    assert_eq!(response.await.unwrap(), ControlResponse { success: true });
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    let doc = session.document();
    let p = post(doc, "11");
    assert!(!is_hidden(doc, p));
    assert_eq!(badge_text(doc, p).as_deref(), Some("Entertainment"));
}

#[tokio::test]
async fn test_disabling_restores_hidden_posts() {
    let doc = timeline(&[
        tweet("12", "Join our webinar on quarterly synergy"),
        tweet("13", "Everyone is buying bitcoin again this week"),
    ]);
    let (mut session, _) = session(doc, Settings::default());
    session.scan().await;

    let (reply, response) = oneshot::channel();
    session
        .handle_event(HostEvent::Message {
            message: ControlMessage::UpdateSettings {
                settings: Settings {
                    enabled: false,
                    ..Settings::default()
                },
            },
            reply,
        })
        .await;
    assert!(response.await.unwrap().success);

    let doc = session.document();
    for id in ["12", "13"] {
        let p = post(doc, id);
        assert!(!is_hidden(doc, p), "post {id} still hidden");
        assert_eq!(badge_text(doc, p), None);
    }
}

#[tokio::test(start_paused = true)]
async fn test_run_attaches_late_timeline_and_follows_injections() {
    // The timeline is rendered after the session starts.
    let doc = Document::parse_html(r#"<div id="app"></div>"#);
    let (session, calls) = session(doc, Settings::default());
    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(session.run(rx));

    tx.send(HostEvent::Inject {
        target: Some("#app".to_string()),
        html: format!(
            r#"<div data-testid="primaryColumn"><section>{}</section></div>"#,
            tweet("20", "Check out this new LLM architecture paper")
        ),
    })
    .await
    .unwrap();

    // Give the poll ticker time to find the timeline.
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tx.send(HostEvent::Inject {
        target: None,
        html: tweet("21", "Everyone is buying bitcoin again this week"),
    })
    .await
    .unwrap();

    drop(tx);
    let doc = handle.await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(doc.to_html().contains("xfc-topic-indicator"));
    assert_eq!(badge_text(&doc, post(&doc, "20")).as_deref(), Some("AI/ML"));
    assert_eq!(badge_text(&doc, post(&doc, "21")).as_deref(), Some("Crypto"));
}
