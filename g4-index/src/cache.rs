//! Per-document analysis cache
//!
//! Each document owns one slot. Updates only record the newest snapshot; the
//! analysis runs lazily on the first query that needs it, and at most one
//! analysis per document is in flight at a time. The thread that claims a
//! stale slot analyzes until the published result matches the newest
//! snapshot, so edits that land mid-analysis are coalesced into one more run.

use std::{sync::Arc, time::Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;

use crate::{
    DocumentId,
    analysis::{AnalysisContext, AnalysisResult, Snapshot, analyze},
};

/// Observable cache state of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CacheState {
    /// Nothing analyzed yet.
    Empty,
    /// The published result matches the newest text and dependencies.
    Fresh,
    /// The text or an imported grammar changed since the last analysis.
    Stale,
}

#[derive(Debug)]
struct SlotState {
    latest: Snapshot,
    /// Bumped whenever an imported grammar changes.
    dependency_epoch: u64,
    published: Option<Arc<AnalysisResult>>,
    in_flight: bool,
    closed: bool,
}

impl SlotState {
    fn is_fresh(&self) -> bool {
        self.published.as_ref().is_some_and(|published| {
            published.snapshot().fingerprint == self.latest.fingerprint
                && published.version() == self.latest.version
                && published.dependency_epoch() == self.dependency_epoch
        })
    }

    fn cache_state(&self) -> CacheState {
        if self.published.is_none() {
            CacheState::Empty
        } else if self.is_fresh() {
            CacheState::Fresh
        } else {
            CacheState::Stale
        }
    }

    fn published_or_empty(&self) -> Arc<AnalysisResult> {
        self.published.clone().unwrap_or_else(|| {
            Arc::new(AnalysisResult::empty(
                self.latest.clone(),
                self.dependency_epoch,
            ))
        })
    }

    /// Whether `candidate` would replace the published result.
    fn is_newer(&self, candidate: &AnalysisResult) -> bool {
        self.published.as_ref().is_none_or(|published| {
            (candidate.version(), candidate.dependency_epoch())
                > (published.version(), published.dependency_epoch())
        })
    }
}

/// What a caller gets back from [`DocumentSlot::ensure_fresh`].
#[derive(Debug, Clone)]
pub(crate) struct Refreshed {
    pub(crate) result: Arc<AnalysisResult>,
    /// A new result with a different symbol view was published.
    pub(crate) changed: bool,
}

impl Refreshed {
    fn unchanged(result: Arc<AnalysisResult>) -> Self {
        Self {
            result,
            changed: false,
        }
    }
}

/// How to behave when another thread is already analyzing the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    /// Wait for the first result, up to the configured timeout.
    Bounded,
    /// Return whatever is published right away. Used for imports, so that
    /// import cycles can never wait on each other.
    Never,
}

#[derive(Debug)]
pub(crate) struct DocumentSlot {
    id: DocumentId,
    state: Mutex<SlotState>,
    published_changed: Condvar,
}

impl DocumentSlot {
    pub(crate) fn new(id: DocumentId, text: &str) -> Self {
        Self {
            id,
            state: Mutex::new(SlotState {
                latest: Snapshot::new(text, 1),
                dependency_epoch: 0,
                published: None,
                in_flight: false,
                closed: false,
            }),
            published_changed: Condvar::new(),
        }
    }

    pub(crate) fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Record new text. Returns `false` when the text is unchanged, in which
    /// case the slot keeps its state.
    pub(crate) fn update(&self, text: &str) -> bool {
        let mut state = self.state.lock();
        if state.latest.matches(text) {
            return false;
        }
        let version = state.latest.version + 1;
        state.latest = Snapshot::new(text, version);
        tracing::trace!(document = %self.id, version, "recorded new snapshot");
        true
    }

    /// Mark the slot stale because something it imports changed.
    pub(crate) fn invalidate_dependencies(&self) {
        let mut state = self.state.lock();
        state.dependency_epoch += 1;
        tracing::trace!(
            document = %self.id,
            epoch = state.dependency_epoch,
            "dependencies changed"
        );
    }

    /// Discard the slot. An analysis in flight finishes but never
    /// publishes, and waiters are released.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        self.published_changed.notify_all();
    }

    pub(crate) fn cache_state(&self) -> CacheState {
        self.state.lock().cache_state()
    }

    pub(crate) fn published(&self) -> Option<Arc<AnalysisResult>> {
        self.state.lock().published.clone()
    }

    /// Return a result for the newest snapshot, analyzing if needed.
    ///
    /// When another thread is analyzing, the previously published result is
    /// returned immediately (stale but consistent). Only a document that
    /// has never been analyzed makes the caller wait, and only as long as
    /// `first_analysis_timeout`; after that an empty result is returned.
    pub(crate) fn ensure_fresh(&self, ctx: &AnalysisContext<'_>, wait: Wait) -> Refreshed {
        let mut state = self.state.lock();

        loop {
            if state.is_fresh() || state.closed {
                return Refreshed::unchanged(state.published_or_empty());
            }
            if !state.in_flight {
                break;
            }
            if state.published.is_some() || wait == Wait::Never {
                return Refreshed::unchanged(state.published_or_empty());
            }

            let deadline = Instant::now() + ctx.options.first_analysis_timeout;
            while state.in_flight && state.published.is_none() && !state.closed {
                if self
                    .published_changed
                    .wait_until(&mut state, deadline)
                    .timed_out()
                {
                    tracing::debug!(document = %self.id, "timed out waiting for first analysis");
                    return Refreshed::unchanged(state.published_or_empty());
                }
            }
            // Either a result arrived or the runner stopped without one;
            // re-check from the top.
        }

        state.in_flight = true;
        let changed = self.run(&mut state, ctx);
        state.in_flight = false;
        self.published_changed.notify_all();

        Refreshed {
            result: state.published_or_empty(),
            changed,
        }
    }

    /// Analyze until fresh, superseded by closing, or nothing newer can be
    /// published. The lock is released while the pipeline runs.
    fn run(&self, state: &mut MutexGuard<'_, SlotState>, ctx: &AnalysisContext<'_>) -> bool {
        let mut changed = false;

        while !state.closed && !state.is_fresh() {
            let snapshot = state.latest.clone();
            let epoch = state.dependency_epoch;

            let outcome = MutexGuard::unlocked(state, || {
                analyze(&snapshot, epoch, ctx, || self.is_superseded(&snapshot, epoch))
            });

            let Some(result) = outcome else {
                continue;
            };
            if state.closed {
                tracing::debug!(document = %self.id, "discarding analysis of closed document");
                break;
            }
            if !state.is_newer(&result) {
                continue;
            }

            changed |= state
                .published
                .as_ref()
                .is_none_or(|previous| !previous.same_view(&result));
            tracing::debug!(
                document = %self.id,
                version = result.version(),
                "published analysis"
            );
            state.published = Some(Arc::new(result));
            self.published_changed.notify_all();
        }

        changed
    }

    fn is_superseded(&self, snapshot: &Snapshot, epoch: u64) -> bool {
        let state = self.state.lock();
        state.closed || state.latest.version != snapshot.version || state.dependency_epoch != epoch
    }
}
