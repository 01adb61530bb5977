use super::store::{StatsStore, StoreError};
use super::{streak, StatsDocument};
use crate::clock::{Clock, SystemClock};
use crate::session::SessionRecord;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("stats document is corrupt: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of folding one session, as reported to the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// False when the document could not be persisted; the in-memory
    /// document still contains the session.
    pub success: bool,
    pub milestone: Option<u32>,
    pub milestone_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub success: bool,
    /// The stored document was unreadable and replaced by an empty one
    pub recovered_from_corruption: bool,
}

struct Inner<S> {
    doc: StatsDocument,
    store: S,
    /// `doc` reflects what the store holds, so it may be written back
    synced: bool,
    /// Sessions folded while the stored document could not be read
    pending: Vec<SessionRecord>,
}

/// Owns the process-wide stats document.
///
/// Every mutation takes the same lock for the whole read-modify-persist
/// cycle, works on a copy of the document, and swaps the copy in at the
/// end, so concurrent `record_session` calls (a user stop racing an
/// automatic completion) are applied one after the other and readers
/// never observe a half-updated document.
///
/// Nothing is written until the stored document has been read once;
/// sessions recorded before that are kept in memory and replayed over the
/// stored history when the store becomes readable.
pub struct StatsAggregator<S: StatsStore, C: Clock = SystemClock> {
    inner: Mutex<Inner<S>>,
    clock: C,
}

impl<S: StatsStore> StatsAggregator<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: StatsStore, C: Clock> StatsAggregator<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                doc: StatsDocument::default(),
                store,
                synced: false,
                pending: Vec::new(),
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<S>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(store: &S, doc: &StatsDocument) -> Result<(), StatsError> {
        let json = serde_json::to_string(doc)?;
        store.save(&json)?;
        Ok(())
    }

    /// Stored document with its streak brought up to `today`. The bool is
    /// set when an unreadable document was replaced by an empty one.
    fn read(store: &S, today: NaiveDate) -> Result<(StatsDocument, bool), StoreError> {
        let (mut doc, recovered) = match store.load()? {
            Some(json) => match serde_json::from_str::<StatsDocument>(&json) {
                Ok(doc) => (doc, false),
                Err(e) => {
                    warn!("discarding unreadable stats document: {e}");
                    (StatsDocument::default(), true)
                }
            },
            None => (StatsDocument::default(), false),
        };

        doc.streak = streak::current_streak(
            &doc.daily_stats,
            doc.last_session.map(|ts| ts.date_naive()),
            today,
        );
        // older documents carry no maxStreak
        doc.max_streak = doc.max_streak.max(doc.streak);
        Ok((doc, recovered))
    }

    /// Read the store if that has not happened yet and replay the sessions
    /// recorded meanwhile. On failure the in-memory document is untouched.
    fn sync(inner: &mut Inner<S>, today: NaiveDate) -> Result<bool, StoreError> {
        if inner.synced {
            return Ok(false);
        }
        let (mut doc, recovered) = Self::read(&inner.store, today)?;
        for record in inner.pending.drain(..) {
            doc.apply(record, today);
        }
        inner.doc = doc;
        inner.synced = true;
        Ok(recovered)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Replace the in-memory document with the stored one. A corrupt
    /// document is discarded in favour of an empty one; a failing store
    /// leaves the in-memory document untouched and blocks saving until a
    /// later read succeeds.
    pub fn load_from_storage(&self) -> LoadOutcome {
        let mut inner = self.lock();
        inner.synced = false;

        match Self::sync(&mut inner, self.clock.today()) {
            Ok(recovered) => {
                debug!(
                    "loaded stats: {} sessions, streak {}",
                    inner.doc.total_sessions, inner.doc.streak
                );
                LoadOutcome {
                    success: true,
                    recovered_from_corruption: recovered,
                }
            }
            Err(e) => {
                warn!("failed to load stats: {e}");
                LoadOutcome {
                    success: false,
                    recovered_from_corruption: false,
                }
            }
        }
    }

    /// Fold a finished session into the document and persist it.
    /// No minimum duration is enforced here.
    pub fn record_session(&self, record: SessionRecord) -> RecordOutcome {
        let mut inner = self.lock();
        let today = self.clock.today();

        if let Err(e) = Self::sync(&mut inner, today) {
            warn!("stats store unreadable, keeping session in memory: {e}");
        }

        let mut next = inner.doc.clone();
        let reached = next.apply(record.clone(), today);

        let success = if inner.synced {
            match Self::persist(&inner.store, &next) {
                Ok(()) => true,
                Err(e) => {
                    warn!("session recorded in memory but not saved: {e}");
                    false
                }
            }
        } else {
            inner.pending.push(record);
            false
        };
        inner.doc = next;

        if let Some(m) = reached {
            info!("streak milestone reached: {} days", m.days);
        }
        debug!(
            "recorded session #{} (streak {})",
            inner.doc.total_sessions, inner.doc.streak
        );

        RecordOutcome {
            success,
            milestone: reached.map(|m| m.days),
            milestone_message: reached.map(|m| m.message.to_string()),
        }
    }

    /// Write the current document again, after an earlier save failed
    pub fn retry_persist(&self) -> bool {
        let mut inner = self.lock();
        if let Err(e) = Self::sync(&mut inner, self.clock.today()) {
            warn!("stats store still unreadable: {e}");
            return false;
        }
        match Self::persist(&inner.store, &inner.doc) {
            Ok(()) => true,
            Err(e) => {
                warn!("retrying stats save failed: {e}");
                false
            }
        }
    }

    /// Drop all history. Idempotent.
    pub fn reset_stats(&self) -> bool {
        let mut inner = self.lock();
        inner.doc = StatsDocument::default();
        inner.pending.clear();
        inner.synced = true;
        match inner.store.delete() {
            Ok(()) => {
                info!("statistics reset");
                true
            }
            Err(e) => {
                warn!("statistics cleared in memory but not in storage: {e}");
                false
            }
        }
    }

    pub fn snapshot(&self) -> StatsDocument {
        self.lock().doc.clone()
    }

    /// Run a read-only projection without cloning the document
    pub fn with_document<R>(&self, f: impl FnOnce(&StatsDocument) -> R) -> R {
        f(&self.lock().doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::stats::store::MemoryStatsStore;
    use chrono::{DateTime, Local, TimeZone};
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn at(date: NaiveDate, hour: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
            .unwrap()
    }

    fn record(id: &str, secs: u64, date: NaiveDate) -> SessionRecord {
        SessionRecord::new(id, id, secs, at(date, 9), true)
    }

    fn setup(today: NaiveDate) -> (StatsAggregator<MemoryStatsStore, Arc<ManualClock>>, MemoryStatsStore, Arc<ManualClock>) {
        let store = MemoryStatsStore::new();
        let clock = Arc::new(ManualClock::new(today));
        let agg = StatsAggregator::with_clock(store.clone(), clock.clone());
        (agg, store, clock)
    }

    #[test]
    fn test_record_persists_document() {
        let (agg, store, _) = setup(day(1));
        let outcome = agg.record_session(record("478", 300, day(1)));

        assert!(outcome.success);
        assert_eq!(outcome.milestone, None);
        let saved: StatsDocument = serde_json::from_str(&store.contents().unwrap()).unwrap();
        assert_eq!(saved, agg.snapshot());
        assert_eq!(saved.total_sessions, 1);
    }

    #[test]
    fn test_three_day_streak_reports_milestone_once() {
        let (agg, _, clock) = setup(day(1));

        agg.record_session(record("box", 60, day(1)));
        clock.set(day(2));
        agg.record_session(record("box", 60, day(2)));
        clock.set(day(3));
        let outcome = agg.record_session(record("box", 60, day(3)));

        assert_eq!(outcome.milestone, Some(3));
        assert!(outcome.milestone_message.is_some());

        let again = agg.record_session(record("box", 60, day(3)));
        assert_eq!(again.milestone, None);

        let doc = agg.snapshot();
        assert_eq!(doc.streak, 3);
        assert_eq!(doc.last_streak_milestone, Some(3));
    }

    #[test]
    fn test_skipped_day_resets_streak_but_not_max() {
        let (agg, _, clock) = setup(day(1));
        for d in 1..=4 {
            clock.set(day(d));
            agg.record_session(record("box", 60, day(d)));
        }
        assert_eq!(agg.snapshot().streak, 4);

        clock.set(day(6));
        agg.record_session(record("box", 60, day(6)));

        let doc = agg.snapshot();
        assert_eq!(doc.streak, 1);
        assert_eq!(doc.max_streak, 4);
    }

    #[test]
    fn test_failed_save_keeps_session_in_memory() {
        let (agg, store, _) = setup(day(1));
        store.set_failing(true);

        let outcome = agg.record_session(record("box", 60, day(1)));
        assert!(!outcome.success);
        assert_eq!(agg.snapshot().total_sessions, 1);
        assert!(!agg.retry_persist());

        store.set_failing(false);
        assert!(agg.retry_persist());
        assert!(store.contents().unwrap().contains("\"totalSessions\":1"));
    }

    #[test]
    fn test_load_corrupt_document_falls_back_to_default() {
        let store = MemoryStatsStore::with_document("{not json");
        let agg = StatsAggregator::new(store);

        let outcome = agg.load_from_storage();
        assert!(outcome.success);
        assert!(outcome.recovered_from_corruption);
        assert_eq!(agg.snapshot(), StatsDocument::default());
    }

    #[test]
    fn test_load_failure_keeps_memory() {
        let (agg, store, _) = setup(day(1));
        agg.record_session(record("box", 60, day(1)));
        store.set_failing(true);

        let outcome = agg.load_from_storage();
        assert!(!outcome.success);
        assert_eq!(agg.snapshot().total_sessions, 1);
    }

    #[test]
    fn test_load_refreshes_stale_streak() {
        let (agg, store, clock) = setup(day(1));
        agg.record_session(record("box", 60, day(1)));
        clock.set(day(2));
        agg.record_session(record("box", 60, day(2)));

        clock.set(day(9));
        let reloaded = StatsAggregator::with_clock(store, clock);
        assert!(reloaded.load_from_storage().success);

        let doc = reloaded.snapshot();
        assert_eq!(doc.streak, 0);
        assert_eq!(doc.max_streak, 2);
        assert_eq!(doc.total_sessions, 2);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let (agg, store, _) = setup(day(1));
        agg.record_session(record("box", 60, day(1)));

        assert!(agg.reset_stats());
        assert!(agg.reset_stats());
        assert_eq!(agg.snapshot(), StatsDocument::default());
        assert!(store.contents().is_none());
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let (agg, store, _) = setup(day(1));
        let agg = Arc::new(agg);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agg = Arc::clone(&agg);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        agg.record_session(record(if i % 2 == 0 { "box" } else { "478" }, 30, day(1)));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let doc = agg.snapshot();
        assert_eq!(doc.total_sessions, 80);
        assert_eq!(doc.daily_stats[&day(1)].sessions_count, 80);
        assert_eq!(store.save_count(), 80);
        assert!(doc.is_consistent());
    }

    #[test]
    fn test_with_document_reads_current_state() {
        let (agg, _, _) = setup(day(1));
        agg.record_session(record("box", 45, day(1)));
        let total = agg.with_document(|doc| doc.total_duration_seconds);
        assert_eq!(total, 45);
    }

    #[test]
    fn test_unreadable_store_never_overwrites_history() {
        let (agg, store, clock) = setup(day(1));
        for d in 1..=5 {
            clock.set(day(d));
            agg.record_session(record("box", 60, day(d)));
        }

        let fresh = StatsAggregator::with_clock(store.clone(), clock.clone());
        store.set_failing(true);
        assert!(!fresh.load_from_storage().success);
        store.set_failing(false);

        clock.set(day(6));
        let outcome = fresh.record_session(record("box", 60, day(6)));
        assert!(outcome.success);

        let saved: StatsDocument = serde_json::from_str(&store.contents().unwrap()).unwrap();
        assert_eq!(saved.total_sessions, 6);
        assert_eq!(saved.streak, 6);
        assert!(saved.is_consistent());
    }

    #[test]
    fn test_sessions_wait_in_memory_while_store_is_unreadable() {
        let (agg, store, _) = setup(day(1));
        agg.record_session(record("478", 120, day(1)));

        let fresh = StatsAggregator::with_clock(store.clone(), Arc::new(ManualClock::new(day(1))));
        store.set_failing(true);
        assert!(!fresh.load_from_storage().success);

        let outcome = fresh.record_session(record("box", 60, day(1)));
        assert!(!outcome.success);
        assert_eq!(fresh.snapshot().total_sessions, 1);
        assert_eq!(store.save_count(), 1);
        assert!(!fresh.retry_persist());

        store.set_failing(false);
        assert!(fresh.retry_persist());
        let saved: StatsDocument = serde_json::from_str(&store.contents().unwrap()).unwrap();
        assert_eq!(saved.total_sessions, 2);
        assert_eq!(saved.favorite_techniques.len(), 2);
        assert_eq!(fresh.snapshot(), saved);
    }

    #[test]
    fn test_load_without_max_streak_raises_it_to_streak() {
        let mut doc = StatsDocument::default();
        for d in 1..=3 {
            doc.apply(record("box", 60, day(d)), day(d));
        }
        let mut json = serde_json::to_value(&doc).unwrap();
        let fields = json.as_object_mut().unwrap();
        fields.remove("maxStreak");
        fields.remove("streak");

        let store = MemoryStatsStore::with_document(&json.to_string());
        let agg = StatsAggregator::with_clock(store, Arc::new(ManualClock::new(day(3))));
        assert!(agg.load_from_storage().success);

        let loaded = agg.snapshot();
        assert_eq!(loaded.streak, 3);
        assert_eq!(loaded.max_streak, 3);
        assert!(loaded.is_consistent());
    }
}
