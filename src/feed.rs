use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::fetcher::{FeedFetcher, FetchError};
use crate::models::{Page, PageCursor, PostSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Idle,
    Fetching,
    /// Terminal: the cursor has no further page
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTrigger {
    /// The reader asked for more posts
    Explicit,
    /// The end of the feed scrolled into view
    Viewport,
}

/// Why a trigger was dropped without fetching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardViolation {
    InFlight,
    Exhausted,
    /// Viewport loading only starts after the first explicit load
    AwaitingManualLoad,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Appended { added: usize, exhausted: bool },
    Ignored(GuardViolation),
}

/// Posts loaded so far for one view, plus where to continue from.
///
/// `posts` only ever grows at the end. The phase is kept explicitly rather
/// than derived so that `Fetching` cannot be confused with an idle feed
/// whose cursor happens to be exhausted.
#[derive(Debug)]
pub struct FeedState {
    posts: Vec<PostSummary>,
    seen: HashSet<String>,
    cursor: PageCursor,
    has_loaded_more: bool,
    phase: FeedPhase,
    /// Bumped on every change, so views can skip redundant snapshots
    revision: u64,
}

impl FeedState {
    pub fn new(posts: Vec<PostSummary>, cursor: PageCursor) -> Self {
        let seen = posts.iter().map(|p| p.id.clone()).collect();
        let phase = Self::resting_phase(&cursor);
        Self {
            posts,
            seen,
            cursor,
            has_loaded_more: false,
            phase,
            revision: 0,
        }
    }

    /// Appends a fetched page and replaces the cursor. Ends any fetch in flight.
    pub fn append_page(&mut self, new_posts: Vec<PostSummary>, cursor: PageCursor) {
        for post in &new_posts {
            if !self.seen.insert(post.id.clone()) {
                warn!(post_id = %post.id, "content API repeated a post across pages");
            }
        }
        self.posts.extend(new_posts);
        self.cursor = cursor;
        self.clear_fetching();
    }

    pub fn mark_fetching(&mut self) {
        self.phase = FeedPhase::Fetching;
        self.revision += 1;
    }

    pub fn clear_fetching(&mut self) {
        self.phase = Self::resting_phase(&self.cursor);
        self.revision += 1;
    }

    pub fn mark_loaded_more_triggered(&mut self) {
        if !self.has_loaded_more {
            self.has_loaded_more = true;
            self.revision += 1;
        }
    }

    pub fn posts(&self) -> &[PostSummary] {
        &self.posts
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn has_loaded_more(&self) -> bool {
        self.has_loaded_more
    }

    pub fn is_fetching(&self) -> bool {
        self.phase == FeedPhase::Fetching
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn resting_phase(cursor: &PageCursor) -> FeedPhase {
        if cursor.is_advanceable() {
            FeedPhase::Idle
        } else {
            FeedPhase::Exhausted
        }
    }

    /// Checks the trigger against the guards and, if it passes, moves to
    /// `Fetching`. Returns the cursor to fetch after.
    fn begin_load(&mut self, trigger: LoadTrigger) -> Result<PageCursor, GuardViolation> {
        match self.phase {
            FeedPhase::Fetching => Err(GuardViolation::InFlight),
            FeedPhase::Exhausted => Err(GuardViolation::Exhausted),
            FeedPhase::Idle if trigger == LoadTrigger::Viewport && !self.has_loaded_more => {
                Err(GuardViolation::AwaitingManualLoad)
            }
            FeedPhase::Idle => {
                self.mark_fetching();
                Ok(self.cursor.clone())
            }
        }
    }

    fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            posts: self.posts.clone(),
            has_next_page: self.cursor.has_next_page,
            can_load_more: self.cursor.is_advanceable(),
            has_loaded_more: self.has_loaded_more,
            is_fetching: self.is_fetching(),
            phase: self.phase,
        }
    }
}

/// Read-only copy of the feed handed to the view layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub posts: Vec<PostSummary>,
    pub has_next_page: bool,
    pub can_load_more: bool,
    pub has_loaded_more: bool,
    pub is_fetching: bool,
    pub phase: FeedPhase,
}

/// Drives a `FeedState` through its fetcher.
///
/// At most one fetch is in flight per controller. The state lock is only
/// held to check-and-set the phase and to apply a result, never across the
/// fetch itself, so the controller can be shared between tasks behind an
/// `Arc`. Dropping a load future mid-fetch discards its result and returns
/// the feed to rest on the same cursor.
pub struct FeedController<F> {
    fetcher: F,
    page_size: u32,
    state: Mutex<FeedState>,
}

impl<F: FeedFetcher> FeedController<F> {
    pub fn new(fetcher: F, page_size: u32, initial: Page) -> Self {
        Self {
            fetcher,
            page_size,
            state: Mutex::new(FeedState::new(initial.posts, initial.cursor)),
        }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// The reader pressed "load more"
    pub async fn request_load_more(&self) -> Result<LoadOutcome, FetchError> {
        self.load(LoadTrigger::Explicit).await
    }

    /// The scroll sentinel at the end of the feed became visible
    pub async fn notify_viewport_entered(&self) -> Result<LoadOutcome, FetchError> {
        self.load(LoadTrigger::Viewport).await
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.lock().snapshot()
    }

    /// Changes whenever the feed does; compare before taking a new snapshot
    pub fn revision(&self) -> u64 {
        self.lock().revision()
    }

    /// A fresh snapshot and its revision, or `None` if nothing changed
    /// since `revision`.
    pub fn snapshot_since(&self, revision: u64) -> Option<(u64, FeedSnapshot)> {
        let state = self.lock();
        if state.revision() == revision {
            return None;
        }
        Some((state.revision(), state.snapshot()))
    }

    async fn load(&self, trigger: LoadTrigger) -> Result<LoadOutcome, FetchError> {
        let begun = self.lock().begin_load(trigger);
        let cursor = match begun {
            Ok(cursor) => cursor,
            Err(violation) => {
                debug!(?trigger, ?violation, "ignoring load trigger");
                return Ok(LoadOutcome::Ignored(violation));
            }
        };

        let mut in_flight = InFlight { state: &self.state, settled: false };
        let result = self.fetcher.fetch_page(Some(&cursor), self.page_size).await;

        let mut state = self.lock();
        in_flight.settled = true;
        match result {
            Ok(page) => {
                let added = page.posts.len();
                if trigger == LoadTrigger::Explicit {
                    state.mark_loaded_more_triggered();
                }
                state.append_page(page.posts, page.cursor);
                let exhausted = state.phase() == FeedPhase::Exhausted;
                let total = state.posts().len();
                info!(?trigger, added, total, exhausted, "appended page");
                Ok(LoadOutcome::Appended { added, exhausted })
            }
            Err(err) => {
                state.clear_fetching();
                warn!(?trigger, error = %err, "failed to load more posts");
                Err(err)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<FeedState>) -> MutexGuard<'_, FeedState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Puts the feed back to rest if a load future is dropped before its
/// result is applied.
struct InFlight<'a> {
    state: &'a Mutex<FeedState>,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!("load dropped mid-fetch, discarding its result");
            lock_state(self.state).clear_fetching();
        }
    }
}

#[cfg(test)]
#[path = "feed_tests.rs"]
mod tests;
