//! Observation loop state: locating the watch target and coalescing scans.
//!
//! The observer is a plain state machine. The session loop drives it: it calls
//! [`Observer::try_attach`] on each poll tick until a target is found, hands it
//! the mutation records drained from the document, and brackets every
//! processing pass with [`Observer::begin_scan`] / [`Observer::finish_scan`].

use crate::dom::{Document, MutationRecord, NodeId};
use crate::extract::Extractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
}

/// What the observer is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchTarget {
    Timeline(NodeId),
    /// No timeline was found within the attempt cap; the whole body is watched.
    Document(NodeId),
}

impl WatchTarget {
    pub fn node(&self) -> NodeId {
        match self {
            WatchTarget::Timeline(node) | WatchTarget::Document(node) => *node,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    Attached(WatchTarget),
    /// Not found yet; `attempt` of the cap used so far.
    Pending { attempt: u32 },
    AlreadyAttached,
}

#[derive(Debug)]
pub struct Observer {
    max_attempts: u32,
    attempts: u32,
    target: Option<WatchTarget>,
    state: ScanState,
}

impl Observer {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempts: 0,
            target: None,
            state: ScanState::Idle,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn target(&self) -> Option<WatchTarget> {
        self.target
    }

    pub fn is_attached(&self) -> bool {
        self.target.is_some()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// One bounded lookup for the watch target.
    ///
    /// Falls back to watching the document body once the attempt cap is
    /// reached.
    pub fn try_attach(&mut self, doc: &Document, extractor: &Extractor) -> AttachOutcome {
        if self.target.is_some() {
            return AttachOutcome::AlreadyAttached;
        }

        self.attempts += 1;
        if let Some(timeline) = extractor.find_timeline(doc) {
            tracing::info!(attempt = self.attempts, "Observer attached to timeline");
            let target = WatchTarget::Timeline(timeline);
            self.target = Some(target);
            return AttachOutcome::Attached(target);
        }

        if self.attempts >= self.max_attempts {
            tracing::warn!(
                attempts = self.attempts,
                "Timeline not found, observing document body instead"
            );
            let target = WatchTarget::Document(doc.body());
            self.target = Some(target);
            return AttachOutcome::Attached(target);
        }

        tracing::debug!(
            attempt = self.attempts,
            max_attempts = self.max_attempts,
            "Timeline element not found"
        );
        AttachOutcome::Pending {
            attempt: self.attempts,
        }
    }

    /// Stop watching and restart the attempt budget.
    pub fn detach(&mut self) {
        self.target = None;
        self.attempts = 0;
        self.state = ScanState::Idle;
    }

    /// Inspect a batch of mutation records.
    ///
    /// Returns `true` when the batch adds nodes inside the watch target and no
    /// scan is running; the observer is then `Scanning` and the caller must run
    /// a pass and call [`finish_scan`](Self::finish_scan). A batch that arrives
    /// while scanning is dropped.
    pub fn observe(&mut self, doc: &Document, records: &[MutationRecord]) -> bool {
        let Some(target) = self.target else {
            return false;
        };

        if !doc.is_connected(target.node()) {
            tracing::warn!("Watch target left the document, looking for a new one");
            self.detach();
            return false;
        }

        let qualifying = records
            .iter()
            .any(|r| !r.added.is_empty() && doc.contains(target.node(), r.target));
        if !qualifying {
            return false;
        }

        if self.state == ScanState::Scanning {
            tracing::debug!("Still processing previous mutations, skipping this batch");
            return false;
        }

        tracing::debug!(records = records.len(), "Detected new nodes, scanning");
        self.state = ScanState::Scanning;
        true
    }

    /// Enter `Scanning` for a pass not triggered by mutations (initial scan,
    /// settings update). `false` when a pass is already running.
    pub fn begin_scan(&mut self) -> bool {
        if self.state == ScanState::Scanning {
            return false;
        }
        self.state = ScanState::Scanning;
        true
    }

    /// Leave `Scanning`. Mutations made during the pass (including the pass's
    /// own indicators) are drained and dropped.
    pub fn finish_scan(&mut self, doc: &mut Document) {
        let dropped = doc.take_records();
        if !dropped.is_empty() {
            tracing::trace!(records = dropped.len(), "Dropping mutations recorded during scan");
        }
        self.state = ScanState::Idle;
    }
}
