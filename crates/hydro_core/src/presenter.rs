use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;

use crate::{
    error::StoreError,
    notifications::{self, NotificationRecord},
    store::{NotificationStore, SubscriptionId},
};

pub const EMPTY_STATE: &str = "You're all caught up!";

/// Something that draws the notification log. Views only ever receive the
/// full, freshly read list.
pub trait NotificationView: Send + 'static {
    fn render(&mut self, records: &[NotificationRecord]);
}

/// Keeps one view in sync with a store for as long as it is alive.
///
/// A change that arrives while the view is borrowed (for example a
/// `mark_read` issued from inside `with_view`) cannot render right away.
/// It flags the view stale instead and the next `with_view` re-renders first.
pub struct Presenter<V: NotificationView> {
    store: Arc<NotificationStore>,
    slot: Arc<ViewSlot<V>>,
    subscription: SubscriptionId,
}

struct ViewSlot<V> {
    view: Mutex<V>,
    stale: AtomicBool,
}

impl<V: NotificationView> Presenter<V> {
    pub fn mount(store: Arc<NotificationStore>, view: V) -> Self {
        let slot = Arc::new(ViewSlot {
            view: Mutex::new(view),
            stale: AtomicBool::new(false),
        });
        slot.view.lock().render(&store.list());

        let source = Arc::downgrade(&store);
        let target = Arc::clone(&slot);
        let subscription = store.subscribe(move || {
            let Some(store) = source.upgrade() else {
                return;
            };
            match target.view.try_lock() {
                Some(mut view) => {
                    target.stale.store(false, Ordering::Release);
                    view.render(&store.list());
                }
                None => target.stale.store(true, Ordering::Release),
            }
        });

        Self {
            store,
            slot,
            subscription,
        }
    }

    pub fn with_view<R>(&self, read: impl FnOnce(&V) -> R) -> R {
        let mut view = self.slot.view.lock();
        if self.slot.stale.swap(false, Ordering::AcqRel) {
            view.render(&self.store.list());
        }
        read(&view)
    }

    pub fn mark_read(&self, id: &str) -> Result<bool, StoreError> {
        self.store.mark_read(id)
    }

    pub fn mark_all_read(&self) -> Result<usize, StoreError> {
        self.store.mark_all_read()
    }
}

impl<V: NotificationView> Drop for Presenter<V> {
    fn drop(&mut self) {
        self.store.unsubscribe(self.subscription);
    }
}

/// Header badge: unread count only.
#[derive(Debug, Default)]
pub struct UnreadBadge {
    unread: usize,
    renders: usize,
}

impl UnreadBadge {
    pub fn unread(&self) -> usize {
        self.unread
    }

    pub fn renders(&self) -> usize {
        self.renders
    }

    pub fn label(&self) -> Option<String> {
        match self.unread {
            0 => None,
            1..=99 => Some(self.unread.to_string()),
            _ => Some("99+".to_string()),
        }
    }
}

impl NotificationView for UnreadBadge {
    fn render(&mut self, records: &[NotificationRecord]) {
        self.unread = notifications::unread_count(records);
        self.renders += 1;
    }
}

#[derive(Debug, Default)]
pub struct NotificationList {
    snapshot: Vec<NotificationRecord>,
}

impl NotificationList {
    pub fn snapshot(&self) -> &[NotificationRecord] {
        &self.snapshot
    }

    /// Plain-text rendering, one block per record, unread ones starred.
    pub fn to_text(&self) -> String {
        if self.snapshot.is_empty() {
            return EMPTY_STATE.to_string();
        }
        let mut out = String::new();
        for record in &self.snapshot {
            let marker = if record.read { ' ' } else { '*' };
            let when = record.timestamp.with_timezone(&Local);
            let _ = writeln!(
                out,
                "{marker} [{}] {} ({})",
                record.category.label(),
                record.title,
                record.id
            );
            let _ = writeln!(out, "    {}", record.message);
            let _ = writeln!(out, "    {}", when.format("%Y-%m-%d %H:%M"));
        }
        out
    }
}

impl NotificationView for NotificationList {
    fn render(&mut self, records: &[NotificationRecord]) {
        self.snapshot = records.to_vec();
    }
}
