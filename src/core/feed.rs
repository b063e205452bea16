//! Incremental notification feed behind the menu.
//!
//! The controller owns the open/closed state, the active view mode and one
//! paging cursor per mode. At most one page fetch is in flight per
//! controller; every other fetch trigger arriving meanwhile is a no-op.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use indexmap::IndexMap;

use crate::core::error::{FeedError, FeedResult};
use crate::core::models::{
    CountUnreadRequest, FetchRequest, MarkAllReadRequest, MenuState, PagingCursor, ScrollMetrics,
    ViewMode, DEFAULT_PAGE_SIZE,
};
use crate::core::render::TemplateRenderer;
use crate::core::repository::NotificationRepository;
use crate::core::view::{ErrorReporter, MenuView};

#[derive(Debug, Clone, PartialEq)]
pub struct FeedOptions {
    /// The user whose notifications are shown.
    pub recipient_id: i64,
    pub page_size: u32,
    pub embed_user_from: bool,
    pub embed_user_to: bool,
    /// Distance from the bottom edge, in pixels, that counts as "at the bottom".
    pub scroll_threshold: f32,
}

impl FeedOptions {
    pub fn new(recipient_id: i64) -> Self {
        FeedOptions {
            recipient_id,
            page_size: DEFAULT_PAGE_SIZE,
            embed_user_from: true,
            embed_user_to: false,
            scroll_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another fetch is still outstanding.
    InFlight,
    /// The mode's cursor already reached the end of the feed.
    Exhausted,
    /// The mode was reset while the page was in flight; the page was dropped.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Skipped(SkipReason),
    Loaded { appended: usize, exhausted: bool },
}

/// Read-only copy of the controller state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub menu: MenuState,
    pub cursors: IndexMap<ViewMode, PagingCursor>,
    pub in_flight: bool,
}

impl FeedSnapshot {
    pub fn cursor(&self, mode: ViewMode) -> Option<PagingCursor> {
        self.cursors.get(&mode).copied()
    }
}

struct FeedState {
    menu: MenuState,
    cursors: IndexMap<ViewMode, PagingCursor>,
    /// Bumped whenever a mode's results are invalidated server-side.
    generations: IndexMap<ViewMode, u64>,
    page_size: u32,
    in_flight: bool,
}

impl FeedState {
    fn new(page_size: u32) -> Self {
        let mut cursors = IndexMap::new();
        cursors.insert(ViewMode::All, PagingCursor::new(page_size));
        cursors.insert(ViewMode::Unread, PagingCursor::new(page_size));
        FeedState {
            menu: MenuState::default(),
            cursors,
            generations: IndexMap::new(),
            page_size,
            in_flight: false,
        }
    }

    fn generation(&self, mode: ViewMode) -> u64 {
        self.generations.get(&mode).copied().unwrap_or(0)
    }

    fn invalidate(&mut self, mode: ViewMode) {
        *self.generations.entry(mode).or_insert(0) += 1;
        self.cursor_mut(mode).reset();
    }

    fn cursor_mut(&mut self, mode: ViewMode) -> &mut PagingCursor {
        let page_size = self.page_size;
        self.cursors
            .entry(mode)
            .or_insert_with(|| PagingCursor::new(page_size))
    }
}

/// Clears the in-flight flag and the loading indicator when dropped, on
/// every exit path of a fetch.
struct InFlightGuard<'a> {
    state: &'a Mutex<FeedState>,
    view: &'a dyn MenuView,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .in_flight = false;
        self.view.set_loading(false);
    }
}

fn badge(count: u32) -> Option<u32> {
    (count > 0).then_some(count)
}

pub struct NotificationFeedController<R, T> {
    repository: R,
    renderer: T,
    view: Arc<dyn MenuView>,
    reporter: Arc<dyn ErrorReporter>,
    options: FeedOptions,
    state: Mutex<FeedState>,
}

impl<R, T> NotificationFeedController<R, T>
where
    R: NotificationRepository,
    T: TemplateRenderer,
{
    pub fn new(
        repository: R,
        renderer: T,
        view: Arc<dyn MenuView>,
        reporter: Arc<dyn ErrorReporter>,
        options: FeedOptions,
    ) -> Self {
        let state = Mutex::new(FeedState::new(options.page_size));
        NotificationFeedController {
            repository,
            renderer,
            view,
            reporter,
            options,
            state,
        }
    }

    fn state(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        let st = self.state();
        FeedSnapshot {
            menu: st.menu,
            cursors: st.cursors.clone(),
            in_flight: st.in_flight,
        }
    }

    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    fn fail(&self, context: &str, error: &FeedError) {
        log::error!("{}: {}", context, error);
        self.reporter.report(error);
    }

    /// Open the menu. Loads the first page of the active mode if it was
    /// never loaded. Does nothing when already open.
    pub async fn open(&self) -> FeedResult<Option<LoadOutcome>> {
        let (mode, needs_load) = {
            let mut st = self.state();
            if st.menu.open {
                return Ok(None);
            }
            st.menu.open = true;
            let mode = st.menu.mode;
            (mode, !st.cursor_mut(mode).initial_load)
        };

        self.view.set_open(true);
        self.view.show_unread_count(None);

        if needs_load {
            self.load_more(mode).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Close the menu. Unread-only results are dropped since they go stale
    /// as soon as they are shown.
    pub fn close(&self) {
        let count = {
            let mut st = self.state();
            if !st.menu.open {
                return;
            }
            st.menu.open = false;
            st.cursor_mut(ViewMode::Unread).reset();
            st.menu.unread_count
        };

        self.view.set_open(false);
        self.view.show_unread_count(badge(count));
        self.view.clear(ViewMode::Unread);
    }

    pub async fn toggle(&self) -> FeedResult<Option<LoadOutcome>> {
        let open = self.state().menu.open;
        if open {
            self.close();
            Ok(None)
        } else {
            self.open().await
        }
    }

    /// Switch between all and unread-only. A mode entered for the first
    /// time starts from a fresh cursor; a mode that already loaded keeps
    /// what it has.
    pub async fn toggle_mode(&self) -> FeedResult<Option<LoadOutcome>> {
        let (target, fresh, open) = {
            let mut st = self.state();
            let target = st.menu.mode.other();
            st.menu.mode = target;
            let cursor = st.cursor_mut(target);
            let fresh = !cursor.initial_load;
            if fresh {
                cursor.reset();
            }
            (target, fresh, st.menu.open)
        };

        log::debug!("Notification menu mode -> {}", target);
        self.view.show_mode(target);

        if !fresh {
            return Ok(None);
        }
        self.view.clear(target);
        if open {
            self.load_more(target).await.map(Some)
        } else {
            Ok(None)
        }
    }

    fn request_for(&self, mode: ViewMode, cursor: PagingCursor) -> FetchRequest {
        FetchRequest {
            limit: cursor.limit,
            offset: cursor.offset,
            recipient_id: self.options.recipient_id,
            mark_as_read: true,
            mode,
            embed_user_from: self.options.embed_user_from,
            embed_user_to: self.options.embed_user_to,
        }
    }

    /// Fetch the next page of `mode` and append it to that mode's container.
    ///
    /// Returns `Skipped` without touching the network while another fetch is
    /// outstanding or once the cursor is exhausted. Fetch errors are
    /// reported and returned; the controller is idle again either way.
    /// In unread mode the offset stays at zero, which assumes the server
    /// marks returned items read.
    pub async fn load_more(&self, mode: ViewMode) -> FeedResult<LoadOutcome> {
        let (request, generation) = {
            let mut st = self.state();
            if st.in_flight {
                return Ok(LoadOutcome::Skipped(SkipReason::InFlight));
            }
            let cursor = *st.cursor_mut(mode);
            if cursor.loaded_all {
                return Ok(LoadOutcome::Skipped(SkipReason::Exhausted));
            }
            st.in_flight = true;
            (self.request_for(mode, cursor), st.generation(mode))
        };

        let _guard = InFlightGuard {
            state: &self.state,
            view: self.view.as_ref(),
        };
        self.view.set_loading(true);
        log::debug!(
            "Fetching {} notifications (limit={}, offset={})",
            mode,
            request.limit,
            request.offset
        );

        let response = match self.repository.query(&request).await {
            Ok(response) => response,
            Err(e) => {
                self.fail("Failed to load notifications", &e);
                return Err(e);
            }
        };

        let received = response.notifications.len();
        let (exhausted, open) = {
            let mut st = self.state();
            if st.generation(mode) != generation {
                log::debug!("Dropping stale {} page", mode);
                return Ok(LoadOutcome::Skipped(SkipReason::Superseded));
            }
            st.menu.unread_count = response.unread_count;
            let cursor = st.cursor_mut(mode);
            cursor.advance(mode, received);
            let exhausted = cursor.loaded_all;
            (exhausted, st.menu.open)
        };
        if !open {
            self.view.show_unread_count(badge(response.unread_count));
        }

        // join_all yields results in input order whatever order they finish in.
        let rendered = join_all(
            response
                .notifications
                .iter()
                .map(|n| self.renderer.render(n)),
        )
        .await;

        if self.state().generation(mode) != generation {
            log::debug!("Dropping {} page reset while rendering", mode);
            return Ok(LoadOutcome::Skipped(SkipReason::Superseded));
        }

        let mut appended = 0;
        for result in rendered {
            match result {
                Ok(item) => {
                    self.view.append(mode, item);
                    appended += 1;
                }
                Err(e) => self.fail("Failed to render notification", &e),
            }
        }

        log::debug!(
            "Loaded {} {} notifications ({} appended, exhausted={})",
            received,
            mode,
            appended,
            exhausted
        );
        Ok(LoadOutcome::Loaded {
            appended,
            exhausted,
        })
    }

    /// Load the next page of the active mode once the feed is scrolled to
    /// its bottom edge. Returns `None` when not at the bottom.
    pub async fn on_scroll_near_bottom(
        &self,
        metrics: ScrollMetrics,
    ) -> FeedResult<Option<LoadOutcome>> {
        let mode = {
            let st = self.state();
            if st.in_flight {
                return Ok(Some(LoadOutcome::Skipped(SkipReason::InFlight)));
            }
            st.menu.mode
        };
        if !metrics.is_near_bottom(self.options.scroll_threshold) {
            return Ok(None);
        }
        self.load_more(mode).await.map(Some)
    }

    /// Mark everything read on the server. Local state only changes once
    /// the server confirmed. An unread page still in flight at that point
    /// is dropped when it arrives.
    pub async fn mark_all_as_read(&self) -> FeedResult<()> {
        let request = MarkAllReadRequest {
            recipient_id: self.options.recipient_id,
        };

        match self.repository.mark_all_read(&request).await {
            Ok(response) if response.success => {}
            Ok(_) => {
                let e = FeedError::Rejected;
                self.fail("Failed to mark notifications as read", &e);
                return Err(e);
            }
            Err(e) => {
                self.fail("Failed to mark notifications as read", &e);
                return Err(e);
            }
        }

        let open = {
            let mut st = self.state();
            st.menu.unread_count = 0;
            st.invalidate(ViewMode::Unread);
            st.menu.open
        };
        self.view.clear(ViewMode::Unread);
        if !open {
            self.view.show_unread_count(None);
        }
        log::info!("All notifications marked as read");
        Ok(())
    }

    /// Ask the server for the unread count and update the badge.
    pub async fn refresh_unread_count(&self) -> FeedResult<u32> {
        let request = CountUnreadRequest {
            recipient_id: self.options.recipient_id,
        };
        let count = match self.repository.count_unread(&request).await {
            Ok(count) => count,
            Err(e) => {
                self.fail("Failed to load unread count", &e);
                return Err(e);
            }
        };

        let open = {
            let mut st = self.state();
            st.menu.unread_count = count;
            st.menu.open
        };
        if !open {
            self.view.show_unread_count(badge(count));
        }
        Ok(count)
    }
}
