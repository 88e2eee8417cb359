use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};

use crate::{
    clock::{Clock, SystemClock},
    error::StoreError,
    notifications::{self, Category, NotificationRecord},
    storage::{MemoryStorage, Storage},
};

pub const NOTIFICATIONS_KEY: &str = "hydroponic_notifications";

pub type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Bounds on how much history the store keeps. Both limits are off by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Retention {
    pub max_records: Option<usize>,
    pub read_horizon: Option<Duration>,
}

impl Retention {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max.max(1));
        self
    }

    pub fn with_read_horizon(mut self, horizon: Duration) -> Self {
        self.read_horizon = Some(horizon);
        self
    }

    /// Drops read records older than the horizon, then keeps the newest
    /// `max_records`. Returns how many records were removed.
    fn apply(&self, records: &mut Vec<NotificationRecord>, now: DateTime<Utc>) -> usize {
        let before = records.len();
        if let Some(horizon) = self.read_horizon {
            records.retain(|record| !(record.read && now - record.timestamp > horizon));
        }
        if let Some(max) = self.max_records {
            records.truncate(max.max(1));
        }
        before - records.len()
    }
}

/// Persisted, newest-first notification log with change broadcast.
///
/// Every mutation reads the whole sequence, rewrites it in one storage write
/// and then calls each subscribed listener. Listeners run after the internal
/// locks are released, so they may call back into the store.
pub struct NotificationStore {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    key: String,
    retention: Retention,
    write_lock: Mutex<()>,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
}

pub struct NotificationStoreBuilder {
    storage: Option<Arc<dyn Storage>>,
    clock: Option<Arc<dyn Clock>>,
    key: String,
    retention: Retention,
}

impl NotificationStoreBuilder {
    pub fn new() -> Self {
        Self {
            storage: None,
            clock: None,
            key: NOTIFICATIONS_KEY.to_string(),
            retention: Retention::default(),
        }
    }

    pub fn with_storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }

    pub fn build(self) -> NotificationStore {
        NotificationStore {
            storage: self
                .storage
                .unwrap_or_else(|| Arc::new(MemoryStorage::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            key: self.key,
            retention: self.retention,
            write_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }
}

impl Default for NotificationStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore {
    pub fn builder() -> NotificationStoreBuilder {
        NotificationStoreBuilder::new()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Full history, newest first. Missing, unreadable or corrupt state
    /// reads as an empty log.
    pub fn list(&self) -> Vec<NotificationRecord> {
        self.load().unwrap_or_else(|err| {
            tracing::warn!(key = %self.key, error = %err, "notification log unreadable");
            Vec::new()
        })
    }

    pub fn unread_count(&self) -> usize {
        notifications::unread_count(&self.list())
    }

    pub fn create(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
        category: impl Into<Category>,
    ) -> Result<NotificationRecord, StoreError> {
        self.insert(None, title.into(), message.into(), category.into())
    }

    pub fn create_info(
        &self,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<NotificationRecord, StoreError> {
        self.create(title, message, Category::Info)
    }

    pub fn create_for_subject(
        &self,
        subject: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
        category: impl Into<Category>,
    ) -> Result<NotificationRecord, StoreError> {
        self.insert(
            Some(subject.into()),
            title.into(),
            message.into(),
            category.into(),
        )
    }

    /// Marks one record read. Returns whether the id was found; an unknown
    /// id still rewrites and broadcasts the unchanged log.
    pub fn mark_read(&self, id: &str) -> Result<bool, StoreError> {
        let found = {
            let _guard = self.write_lock.lock();
            let mut records = self.load()?;
            let mut found = false;
            for record in records.iter_mut().filter(|record| record.id == id) {
                record.read = true;
                found = true;
            }
            self.persist(&mut records)?;
            found
        };
        if !found {
            tracing::debug!(id, "mark_read on unknown notification");
        }
        self.broadcast();
        Ok(found)
    }

    /// Marks every record read. Returns how many were unread before.
    pub fn mark_all_read(&self) -> Result<usize, StoreError> {
        let changed = {
            let _guard = self.write_lock.lock();
            let mut records = self.load()?;
            let changed = notifications::unread_count(&records);
            records.iter_mut().for_each(|record| record.read = true);
            self.persist(&mut records)?;
            changed
        };
        self.broadcast();
        Ok(changed)
    }

    /// Deletes the persisted log. Returns how many records were dropped.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let dropped = {
            let _guard = self.write_lock.lock();
            let dropped = self.list().len();
            self.storage.remove(&self.key)?;
            dropped
        };
        tracing::info!(key = %self.key, dropped, "notification log cleared");
        self.broadcast();
        Ok(dropped)
    }

    pub fn subscribe(&self, listener: impl Fn() + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl NotificationStore {
    /// Strict read for the write paths: an unreadable log is an error so a
    /// mutation never replaces history it could not see. A payload that
    /// parses badly is still treated as empty and gets overwritten.
    fn load(&self) -> Result<Vec<NotificationRecord>, StoreError> {
        let Some(raw) = self.storage.read(&self.key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(records) => Ok(records),
            Err(err) => {
                tracing::warn!(
                    key = %self.key,
                    error = %err,
                    "notification log corrupt, treating as empty"
                );
                Ok(Vec::new())
            }
        }
    }

    fn insert(
        &self,
        subject: Option<String>,
        title: String,
        message: String,
        category: Category,
    ) -> Result<NotificationRecord, StoreError> {
        let record = {
            let _guard = self.write_lock.lock();
            let mut records = self.load()?;
            let now = self.clock.now();
            let record = NotificationRecord {
                id: next_id(&records, now),
                title,
                message,
                category,
                timestamp: now,
                read: false,
                subject,
            };
            records.insert(0, record.clone());
            self.persist(&mut records)?;
            record
        };
        tracing::debug!(id = %record.id, category = %record.category, "notification created");
        self.broadcast();
        Ok(record)
    }

    fn persist(&self, records: &mut Vec<NotificationRecord>) -> Result<(), StoreError> {
        let pruned = self.retention.apply(records, self.clock.now());
        if pruned > 0 {
            tracing::debug!(pruned, "retention dropped notifications");
        }
        let payload = serde_json::to_string(records).map_err(|source| StoreError::Encode {
            key: self.key.clone(),
            source,
        })?;
        self.storage.write(&self.key, &payload)?;
        tracing::debug!(key = %self.key, count = records.len(), "notification log persisted");
        Ok(())
    }

    fn broadcast(&self) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener();
        }
    }
}

/// Millisecond timestamp, bumped past the largest numeric id already stored
/// so records created within one millisecond stay distinct.
fn next_id(records: &[NotificationRecord], now: DateTime<Utc>) -> String {
    let candidate = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    let highest = records
        .iter()
        .filter_map(|record| record.id.parse::<u64>().ok())
        .max();
    match highest {
        Some(highest) if highest >= candidate => match highest.checked_add(1) {
            Some(next) => next.to_string(),
            None => suffixed_id(records, highest),
        },
        _ => candidate.to_string(),
    }
}

/// `<base>-<n>` with the smallest `n` not already taken. Only reached once
/// the numeric id space is exhausted.
fn suffixed_id(records: &[NotificationRecord], base: u64) -> String {
    (1..=records.len() + 1)
        .map(|n| format!("{base}-{n}"))
        .find(|id| records.iter().all(|record| record.id != *id))
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    use chrono::TimeZone;

    use super::*;
    use crate::clock::FixedClock;

    fn fixed_store(storage: Arc<dyn Storage>) -> NotificationStore {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        NotificationStore::builder()
            .with_storage(storage)
            .with_clock(Arc::new(FixedClock(now)))
            .build()
    }

    #[test]
    fn create_prepends_with_unique_ids() {
        let store = fixed_store(Arc::new(MemoryStorage::new()));
        for idx in 0..5 {
            store
                .create_info(format!("title {idx}"), "body")
                .expect("create");
        }
        let records = store.list();
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["title 4", "title 3", "title 2", "title 1", "title 0"]
        );
        let ids: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 5);
        assert!(records.iter().all(|r| !r.read && r.category == Category::Info));
    }

    #[test]
    fn mark_read_is_idempotent_and_ignores_unknown_ids() {
        let store = fixed_store(Arc::new(MemoryStorage::new()));
        let first = store.create_info("a", "a").expect("create");
        store.create_info("b", "b").expect("create");

        assert!(store.mark_read(&first.id).expect("mark"));
        let once = store.list();
        assert!(store.mark_read(&first.id).expect("mark again"));
        assert_eq!(store.list(), once);
        assert_eq!(store.unread_count(), 1);

        assert!(!store.mark_read("does-not-exist").expect("unknown id"));
        assert_eq!(store.list(), once);
    }

    #[test]
    fn mark_all_read_clears_unread() {
        let store = fixed_store(Arc::new(MemoryStorage::new()));
        store.create("Flush lines", "monthly", "irrigation").expect("create");
        store.create("Feed", "A+B", Category::Fertilizer).expect("create");
        assert_eq!(store.mark_all_read().expect("mark all"), 2);
        assert!(store.list().iter().all(|r| r.read));
        assert_eq!(store.unread_count(), 0);
        assert_eq!(store.mark_all_read().expect("mark all again"), 0);
    }

    #[test]
    fn corrupt_payload_reads_empty_and_is_overwritten() {
        let storage = Arc::new(MemoryStorage::new());
        storage.write(NOTIFICATIONS_KEY, "{not json").expect("seed");
        let store = fixed_store(storage.clone());
        assert!(store.list().is_empty());

        store.create_info("fresh", "start").expect("create");
        assert_eq!(store.list().len(), 1);
        let raw = storage.read(NOTIFICATIONS_KEY).expect("read").expect("present");
        assert!(raw.starts_with('['));
    }

    #[test]
    fn every_mutation_broadcasts_once() {
        let store = fixed_store(Arc::new(MemoryStorage::new()));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let record = store.create_info("x", "y").expect("create");
        store.mark_read(&record.id).expect("mark");
        store.mark_read("missing").expect("mark missing");
        store.mark_all_read().expect("mark all");
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
        store.create_info("x", "y").expect("create");
        assert_eq!(hits.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn listeners_may_read_the_store() {
        let store = Arc::new(fixed_store(Arc::new(MemoryStorage::new())));
        let seen = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&store);
        let seen_in = Arc::clone(&seen);
        store.subscribe(move || {
            if let Some(store) = weak.upgrade() {
                seen_in.store(store.list().len(), Ordering::SeqCst);
            }
        });
        store.create_info("one", "1").expect("create");
        store.create_info("two", "2").expect("create");
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn retention_caps_length_keeping_newest() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let store = NotificationStore::builder()
            .with_clock(Arc::new(FixedClock(now)))
            .with_retention(Retention::unbounded().with_max_records(2))
            .build();
        for title in ["a", "b", "c"] {
            store.create_info(title, "").expect("create");
        }
        let titles: Vec<String> = store.list().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }

    #[test]
    fn retention_drops_only_old_read_records() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap();
        let old = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let storage = Arc::new(MemoryStorage::new());
        let seeded = vec![
            NotificationRecord {
                id: "2".into(),
                title: "old unread".into(),
                message: String::new(),
                category: Category::Info,
                timestamp: old,
                read: false,
                subject: None,
            },
            NotificationRecord {
                id: "1".into(),
                title: "old read".into(),
                message: String::new(),
                category: Category::Info,
                timestamp: old,
                read: true,
                subject: None,
            },
        ];
        storage
            .write(NOTIFICATIONS_KEY, &serde_json::to_string(&seeded).unwrap())
            .expect("seed");
        let store = NotificationStore::builder()
            .with_storage(storage)
            .with_clock(Arc::new(FixedClock(now)))
            .with_retention(Retention::unbounded().with_read_horizon(Duration::days(7)))
            .build();

        store.create_info("new", "").expect("create");
        let titles: Vec<String> = store.list().into_iter().map(|r| r.title).collect();
        assert_eq!(titles, vec!["new", "old unread"]);
    }

    #[test]
    fn ids_follow_existing_numeric_ids() {
        let now = Utc.timestamp_millis_opt(1_000).unwrap();
        let records = vec![NotificationRecord {
            id: "5000".into(),
            title: String::new(),
            message: String::new(),
            category: Category::Info,
            timestamp: now,
            read: false,
            subject: None,
        }];
        assert_eq!(next_id(&records, now), "5001");
        assert_eq!(next_id(&[], now), "1000");
    }

    #[test]
    fn ids_stay_unique_when_numeric_space_is_exhausted() {
        let storage = Arc::new(MemoryStorage::new());
        let seeded = vec![NotificationRecord {
            id: u64::MAX.to_string(),
            title: "max".into(),
            message: String::new(),
            category: Category::Info,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            read: false,
            subject: None,
        }];
        storage
            .write(NOTIFICATIONS_KEY, &serde_json::to_string(&seeded).unwrap())
            .expect("seed");
        let store = fixed_store(storage);

        let first = store.create_info("after max", "").expect("create");
        let second = store.create_info("after that", "").expect("create");
        assert_eq!(first.id, format!("{}-1", u64::MAX));
        assert_eq!(second.id, format!("{}-2", u64::MAX));
        assert_eq!(store.list().len(), 3);
    }

    /// Reads always fail; writes are recorded.
    #[derive(Default)]
    struct UnreadableStorage {
        writes: AtomicUsize,
    }

    impl Storage for UnreadableStorage {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io {
                key: key.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            })
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn remove(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn unreadable_log_blocks_mutations_instead_of_overwriting() {
        let storage = Arc::new(UnreadableStorage::default());
        let store = fixed_store(storage.clone());
        assert!(store.list().is_empty());

        assert!(matches!(
            store.create_info("lost?", ""),
            Err(StoreError::Io { .. })
        ));
        assert!(store.mark_read("1").is_err());
        assert!(store.mark_all_read().is_err());
        assert_eq!(storage.writes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn clear_removes_the_log_and_broadcasts() {
        let storage = Arc::new(MemoryStorage::new());
        let store = fixed_store(storage.clone());
        store.create_info("a", "").expect("create");
        store.create_info("b", "").expect("create");

        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(store.clear().expect("clear"), 2);
        assert!(store.list().is_empty());
        assert!(storage.read(NOTIFICATIONS_KEY).expect("read").is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(store.clear().expect("clear again"), 0);
    }
}
