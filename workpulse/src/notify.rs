//! Notification bell: recent notifications, unread count, chat badge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::watch;
use workpulse_proto::notification::NotificationRecord;

use crate::bus::{Domain, Subscription, TargetedKind, UpdateBus};
use crate::view::{DataView, Fetch, ViewState};

/// Default number of notifications kept for display.
pub const DEFAULT_WINDOW: usize = 10;

/// Notification list view plus the chat badge.
pub struct NotificationCenter<F> {
    view: DataView<NotificationRecord, F>,
    window: usize,
    has_new_chat: Arc<AtomicBool>,
    read_at_revision: AtomicU64,
    _chat: Subscription,
}

impl<F: Fetch<NotificationRecord>> NotificationCenter<F> {
    /// Mount over the notifications domain and start listening for chat
    /// messages.
    pub async fn mount(bus: &Arc<UpdateBus>, fetcher: F, window: usize) -> Self {
        let has_new_chat = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&has_new_chat);
        let chat = bus.subscribe_targeted(TargetedKind::ChatMessage, move |_| {
            flag.store(true, Ordering::Release);
        });
        let view = DataView::mount("notifications", bus, &[Domain::Notifications], fetcher).await;

        Self {
            view,
            window,
            has_new_chat,
            read_at_revision: AtomicU64::new(0),
            _chat: chat,
        }
    }

    /// Newest notifications first, at most `window` of them.
    #[must_use]
    pub fn recent(&self) -> Vec<NotificationRecord> {
        let mut records = self.view.records().as_ref().clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(self.window);
        records
    }

    /// Unread notifications in the full list.
    ///
    /// Zero after [`NotificationCenter::mark_all_read`] until the next
    /// snapshot arrives.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        let state = self.view.state();
        if state.revision == self.read_at_revision.load(Ordering::Acquire) {
            return 0;
        }
        state.records.iter().filter(|n| !n.read).count()
    }

    /// Zero the unread count locally.
    pub fn mark_all_read(&self) {
        self.read_at_revision
            .store(self.view.state().revision, Ordering::Release);
    }

    /// Whether a chat message arrived since the last [`NotificationCenter::clear_chat`].
    #[must_use]
    pub fn has_new_chat(&self) -> bool {
        self.has_new_chat.load(Ordering::Acquire)
    }

    /// Reset the chat badge.
    pub fn clear_chat(&self) {
        self.has_new_chat.store(false, Ordering::Release);
    }

    /// Refetch the list now.
    pub async fn refresh(&self) {
        self.view.refresh().await;
    }

    /// Receiver notified whenever the list view changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState<NotificationRecord>> {
        self.view.watch()
    }
}
