//! Page session: one task owning the document, the controller and the observer.
//!
//! The host (a browser bridge, or the `filter` command) feeds the session
//! [`HostEvent`]s over a channel. Everything that touches the page runs on the
//! session task, so a pass is never interleaved with another pass or with a
//! settings update; events that arrive mid-pass wait in the channel.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::Config;
use crate::controller::{FeedController, PassSummary};
use crate::dom::{parse_selector, Document, NodeId};
use crate::observer::{AttachOutcome, Observer, WatchTarget};
use crate::settings::{ControlMessage, ControlResponse};

/// Page paths the filter runs on.
const HOME_PATHS: &[&str] = &["/", "/home", "/for-you", "/following"];

/// Whether a page path is a home timeline.
pub fn is_home_path(path: &str) -> bool {
    HOME_PATHS.contains(&path)
}

/// Input from the host page.
#[derive(Debug)]
pub enum HostEvent {
    /// Append markup to the first element matching `target`, as the page does
    /// when it renders more posts. `None` appends to the watch target, or to
    /// the body before the observer is attached.
    Inject { target: Option<String>, html: String },
    /// Point-to-point control message; the response goes back on `reply`.
    Message {
        message: ControlMessage,
        reply: oneshot::Sender<ControlResponse>,
    },
}

pub struct Session {
    doc: Document,
    controller: FeedController,
    observer: Observer,
    poll_interval: Duration,
}

impl Session {
    pub fn new(doc: Document, controller: FeedController, config: &Config) -> Self {
        Self {
            doc,
            controller,
            observer: Observer::new(config.observer_max_attempts),
            poll_interval: Duration::from_millis(config.observer_poll_interval_ms),
        }
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn controller(&self) -> &FeedController {
        &self.controller
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Root of the subtree a pass covers: the watch target once attached,
    /// the whole document before that.
    fn scope(&self) -> NodeId {
        self.observer
            .target()
            .map(|t| t.node())
            .unwrap_or_else(|| self.doc.root())
    }

    /// Run one pass unless one is already running.
    pub async fn scan(&mut self) -> Option<PassSummary> {
        if !self.observer.begin_scan() {
            return None;
        }
        Some(self.run_pass().await)
    }

    /// Body of a pass; the observer must already be `Scanning`.
    async fn run_pass(&mut self) -> PassSummary {
        let scope = self.scope();
        let summary = self.controller.process_all(&mut self.doc, scope).await;
        self.observer.finish_scan(&mut self.doc);
        summary
    }

    /// One bounded attempt to attach the observer. Existing posts are processed
    /// as soon as the timeline is found.
    pub async fn poll_attach(&mut self) -> Option<PassSummary> {
        match self
            .observer
            .try_attach(&self.doc, self.controller.extractor())
        {
            AttachOutcome::Attached(WatchTarget::Timeline(_)) => self.scan().await,
            AttachOutcome::Attached(WatchTarget::Document(_))
            | AttachOutcome::Pending { .. }
            | AttachOutcome::AlreadyAttached => None,
        }
    }

    pub async fn handle_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::Inject { target, html } => self.inject(target.as_deref(), &html).await,
            HostEvent::Message { message, reply } => {
                let response = self.controller.handle_message(&mut self.doc, message);
                // The reply means "pass initiated", so it goes out before the pass.
                if reply.send(response).is_err() {
                    tracing::debug!("Control message sender went away before the reply");
                }
                if response.success && self.controller.is_active() {
                    self.scan().await;
                }
            }
        }
    }

    async fn inject(&mut self, target: Option<&str>, html: &str) {
        let parent = match target {
            None => self
                .observer
                .target()
                .map(|t| t.node())
                .unwrap_or_else(|| self.doc.body()),
            Some(source) => {
                let found = parse_selector(source)
                    .map_err(|e| e.to_string())
                    .and_then(|s| {
                        self.doc
                            .query_selector(self.doc.root(), &s)
                            .ok_or_else(|| format!("no element matches '{source}'"))
                    });
                match found {
                    Ok(node) => node,
                    Err(e) => {
                        tracing::warn!(error = %e, "Dropping injected markup");
                        return;
                    }
                }
            }
        };

        let added = self.doc.append_html(parent, html);
        tracing::trace!(nodes = added.len(), "Injected markup");

        let records = self.doc.take_records();
        if self.controller.is_active() && self.observer.observe(&self.doc, &records) {
            self.run_pass().await;
        }
    }

    /// Drive the session until the host closes the channel, then hand back
    /// the page.
    pub async fn run(mut self, mut events: mpsc::Receiver<HostEvent>) -> Document {
        if self.controller.is_active() {
            self.scan().await;
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let polling = self.controller.is_active() && !self.observer.is_attached();

            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => {
                        tracing::debug!("Host closed the session");
                        break;
                    }
                },

                _ = ticker.tick(), if polling => {
                    self.poll_attach().await;
                }
            }
        }

        self.doc
    }
}
