//! Roster store: the global ordered collection, its fetch status and change notification.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use roster_core::{FetchStatus, Record, RecordId, RecordSource, RosterError, RosterResult, Snapshot};
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Index at which a record removed from `from` must be reinserted so that it
/// lands immediately before the record that sat at `target` before removal.
///
/// Removing an earlier element shifts every later index down by one, so a
/// forward move inserts at `target - 1`.
pub fn insertion_index(from: usize, target: usize) -> usize {
    if from < target { target - 1 } else { target }
}

/// Move-before on a plain vector. Returns false when the order did not change.
/// Both indices must be in bounds.
pub fn splice_before<T>(items: &mut Vec<T>, from: usize, target: usize) -> bool {
    if from == target { return false; }
    let at = insertion_index(from, target);
    if at == from { return false; }
    let item = items.remove(from);
    items.insert(at, item);
    true
}

/// Result of `OrderedStore::initialize`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Sequence replaced; subscribers notified.
    Replaced,
    /// Input matched the current sequence; nothing emitted.
    Unchanged,
    /// Empty input against a populated store; existing records kept.
    IgnoredEmpty,
}

/// Canonical ordered collection. Single owner mutates; readers go through `StoreHandle`.
pub struct OrderedStore<R: Record> {
    items: Vec<R>,
    index: FxHashMap<RecordId, usize>,
    epoch: u64,
    status: FetchStatus,
    last_error: Option<String>,
    snap: Arc<ArcSwap<Snapshot<R>>>,
    epoch_tx: watch::Sender<u64>,
    epoch_rx: watch::Receiver<u64>,
    status_tx: watch::Sender<FetchStatus>,
    status_rx: watch::Receiver<FetchStatus>,
}

impl<R: Record> Default for OrderedStore<R> {
    fn default() -> Self { Self::new() }
}

impl<R: Record> OrderedStore<R> {
    pub fn new() -> Self {
        let (epoch_tx, epoch_rx) = watch::channel(0u64);
        let (status_tx, status_rx) = watch::channel(FetchStatus::Idle);
        Self {
            items: Vec::new(),
            index: FxHashMap::default(),
            epoch: 0,
            status: FetchStatus::Idle,
            last_error: None,
            snap: Arc::new(ArcSwap::from_pointee(Snapshot::default())),
            epoch_tx,
            epoch_rx,
            status_tx,
            status_rx,
        }
    }

    pub fn len(&self) -> usize { self.items.len() }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn epoch(&self) -> u64 { self.epoch }
    pub fn status(&self) -> FetchStatus { self.status }
    pub fn last_error(&self) -> Option<&str> { self.last_error.as_deref() }
    pub fn items(&self) -> &[R] { &self.items }

    pub fn position(&self, id: RecordId) -> Option<usize> { self.index.get(&id).copied() }

    pub fn get(&self, id: RecordId) -> Option<&R> { self.position(id).map(|i| &self.items[i]) }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot<R>> { self.snap.load_full() }

    /// Read handle for consumers living outside the owner.
    pub fn handle(&self) -> StoreHandle<R> {
        StoreHandle {
            snap: Arc::clone(&self.snap),
            epoch_rx: self.epoch_rx.clone(),
            status_rx: self.status_rx.clone(),
        }
    }

    /// Replace the entire sequence. Duplicate ids collapse to their first
    /// occurrence; identical input is a no-op; empty input never clears a
    /// populated store.
    pub fn initialize(&mut self, records: Vec<R>) -> InitOutcome {
        let total_in = records.len();
        let mut seen: FxHashSet<RecordId> = FxHashSet::default();
        let deduped: Vec<R> = records.into_iter().filter(|r| seen.insert(r.id())).collect();
        if deduped.len() != total_in {
            warn!(dropped = total_in - deduped.len(), "store: duplicate ids collapsed on initialize");
        }
        if deduped.is_empty() && !self.items.is_empty() {
            warn!(kept = self.items.len(), "store: ignoring empty initialize; keeping existing records");
            return InitOutcome::IgnoredEmpty;
        }
        if deduped == self.items {
            debug!(len = deduped.len(), "store: initialize with identical records");
            return InitOutcome::Unchanged;
        }
        self.items = deduped;
        self.commit();
        info!(len = self.items.len(), epoch = self.epoch, "store: initialized");
        InitOutcome::Replaced
    }

    /// Remove `dragged` and reinsert it immediately before `target`.
    ///
    /// Returns `Ok(false)` when the order is unchanged (same id, or already in place).
    /// Fails with `NotFound` before touching the sequence if either id is absent.
    pub fn move_before(&mut self, dragged: RecordId, target: RecordId) -> RosterResult<bool> {
        if dragged == target {
            debug!(id = dragged, "store: move onto itself ignored");
            return Ok(false);
        }
        let from = self.position(dragged).ok_or(RosterError::NotFound(dragged))?;
        let to = self.position(target).ok_or(RosterError::NotFound(target))?;
        if !splice_before(&mut self.items, from, to) {
            debug!(dragged, target, "store: record already before target");
            return Ok(false);
        }
        self.commit();
        metrics::counter!("store_moves_total", 1u64);
        info!(dragged, target, from, to = insertion_index(from, to), epoch = self.epoch, "store: moved");
        Ok(true)
    }

    /// Fetch from an external source and replace the sequence on success.
    /// A failure marks the store `Failed` and keeps the current records.
    pub async fn load_from(&mut self, source: &dyn RecordSource<R>) -> RosterResult<InitOutcome> {
        let t0 = Instant::now();
        let origin = source.describe();
        info!(source = %origin, "store: fetch start");
        self.set_status(FetchStatus::Loading, None);
        match source.fetch_all().await {
            Ok(records) => {
                let fetched = records.len();
                let outcome = self.initialize(records);
                self.set_status(FetchStatus::Succeeded, None);
                metrics::counter!("store_fetch_total", 1u64, "outcome" => "ok");
                metrics::histogram!("store_fetch_ms", t0.elapsed().as_secs_f64() * 1_000.0);
                info!(source = %origin, fetched, outcome = ?outcome, took_ms = %t0.elapsed().as_millis(), "store: fetch ok");
                Ok(outcome)
            }
            Err(e) => {
                let msg = format!("{e:#}");
                metrics::counter!("store_fetch_total", 1u64, "outcome" => "error");
                warn!(source = %origin, error = %msg, kept = self.items.len(), "store: fetch failed");
                self.set_status(FetchStatus::Failed, Some(msg.clone()));
                Err(RosterError::FetchFailed(msg))
            }
        }
    }

    fn set_status(&mut self, status: FetchStatus, error: Option<String>) {
        self.status = status;
        self.last_error = error;
        let _ = self.status_tx.send(status);
    }

    fn commit(&mut self) {
        self.index = self.items.iter().enumerate().map(|(i, r)| (r.id(), i)).collect();
        self.epoch = self.epoch.saturating_add(1);
        self.snap.store(Arc::new(Snapshot { epoch: self.epoch, items: self.items.clone() }));
        let _ = self.epoch_tx.send(self.epoch);
        metrics::gauge!("store_records", self.items.len() as f64);
    }
}

/// Handle for readers to access the current snapshot and subscribe to changes.
pub struct StoreHandle<R> {
    snap: Arc<ArcSwap<Snapshot<R>>>,
    epoch_rx: watch::Receiver<u64>,
    status_rx: watch::Receiver<FetchStatus>,
}

impl<R> Clone for StoreHandle<R> {
    fn clone(&self) -> Self {
        Self { snap: Arc::clone(&self.snap), epoch_rx: self.epoch_rx.clone(), status_rx: self.status_rx.clone() }
    }
}

impl<R> StoreHandle<R> {
    pub fn current(&self) -> Arc<Snapshot<R>> { self.snap.load_full() }
    pub fn subscribe_epoch(&self) -> watch::Receiver<u64> { self.epoch_rx.clone() }
    pub fn subscribe_status(&self) -> watch::Receiver<FetchStatus> { self.status_rx.clone() }
    pub fn status(&self) -> FetchStatus { *self.status_rx.borrow() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::User;

    fn user(id: u64, name: &str) -> User {
        User { id, name: name.to_string(), email: format!("{}@example.com", name.to_lowercase()), ..Default::default() }
    }

    fn abcde() -> Vec<User> {
        vec![user(1, "A"), user(2, "B"), user(3, "C"), user(4, "D"), user(5, "E")]
    }

    fn names(store: &OrderedStore<User>) -> String {
        store.items().iter().map(|u| u.name.as_str()).collect::<Vec<_>>().join("")
    }

    #[test]
    fn insertion_index_adjusts_forward_moves() {
        assert_eq!(insertion_index(1, 4), 3);
        assert_eq!(insertion_index(3, 1), 1);
        assert_eq!(insertion_index(2, 3), 2);
        assert_eq!(insertion_index(3, 2), 2);
    }

    #[test]
    fn move_before_examples() {
        let mut s = OrderedStore::new();
        s.initialize(abcde());
        assert_eq!(s.move_before(4, 2), Ok(true));
        assert_eq!(names(&s), "ADBCE");

        let mut s = OrderedStore::new();
        s.initialize(abcde());
        assert_eq!(s.move_before(2, 5), Ok(true));
        assert_eq!(names(&s), "ACDBE");

        let mut s = OrderedStore::new();
        s.initialize(abcde());
        let epoch = s.epoch();
        assert_eq!(s.move_before(1, 1), Ok(false));
        assert_eq!(names(&s), "ABCDE");
        assert_eq!(s.epoch(), epoch);
    }

    #[test]
    fn move_onto_next_neighbour_keeps_order() {
        let mut s = OrderedStore::new();
        s.initialize(abcde());
        let epoch = s.epoch();
        assert_eq!(s.move_before(2, 3), Ok(false));
        assert_eq!(names(&s), "ABCDE");
        assert_eq!(s.epoch(), epoch);
    }

    #[test]
    fn move_with_missing_id_leaves_sequence_alone() {
        let mut s = OrderedStore::new();
        s.initialize(abcde());
        assert_eq!(s.move_before(9, 2), Err(RosterError::NotFound(9)));
        assert_eq!(s.move_before(2, 9), Err(RosterError::NotFound(9)));
        assert_eq!(names(&s), "ABCDE");
        assert_eq!(s.epoch(), 1);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut s = OrderedStore::new();
        assert_eq!(s.initialize(abcde()), InitOutcome::Replaced);
        assert_eq!(s.initialize(abcde()), InitOutcome::Unchanged);
        assert_eq!(s.len(), 5);
        assert_eq!(s.epoch(), 1);
    }

    #[test]
    fn initialize_collapses_duplicate_ids() {
        let mut s = OrderedStore::new();
        let mut input = abcde();
        input.push(user(2, "B-dup"));
        s.initialize(input);
        assert_eq!(names(&s), "ABCDE");
        assert_eq!(s.get(2).map(|u| u.name.as_str()), Some("B"));
    }

    #[test]
    fn empty_initialize_keeps_existing_records() {
        let mut s = OrderedStore::new();
        s.initialize(abcde());
        assert_eq!(s.initialize(Vec::new()), InitOutcome::IgnoredEmpty);
        assert_eq!(s.len(), 5);

        let mut fresh: OrderedStore<User> = OrderedStore::new();
        assert_eq!(fresh.initialize(Vec::new()), InitOutcome::Unchanged);
        assert!(fresh.is_empty());
    }

    #[test]
    fn stale_id_after_replace_is_not_found() {
        let mut s = OrderedStore::new();
        s.initialize(abcde());
        s.initialize(vec![user(11, "K"), user(12, "L"), user(13, "M")]);
        assert_eq!(s.move_before(1, 12), Err(RosterError::NotFound(1)));
        assert_eq!(names(&s), "KLM");
    }

    #[test]
    fn snapshot_and_notification_follow_commits() {
        let mut s = OrderedStore::new();
        let handle = s.handle();
        let mut rx = handle.subscribe_epoch();
        assert_eq!(*rx.borrow_and_update(), 0);
        s.initialize(abcde());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
        s.move_before(5, 1).unwrap();
        let snap = handle.current();
        assert_eq!(snap.epoch, 2);
        assert_eq!(snap.ids(), vec![5, 1, 2, 3, 4]);
        assert_eq!(s.position(5), Some(0));
    }
}
