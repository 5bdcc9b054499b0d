//! Reorder reconciliation: a drag inside one rendered page becomes a move-before
//! on the global collection, and the view is re-derived from the result.

use roster_core::{Record, RecordId, RosterError, RosterResult};
use roster_store::{splice_before, OrderedStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ViewState;

/// A completed drag gesture: put `dragged` immediately before `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderIntent {
    pub dragged: RecordId,
    pub target: RecordId,
}

impl ReorderIntent {
    pub fn new(dragged: RecordId, target: RecordId) -> Self { Self { dragged, target } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReorderOutcome {
    Moved,
    Unchanged,
}

impl<R: Record> ViewState<R> {
    /// Local positions of both ids in the rendered page. Drags only ever
    /// originate inside one page, so an id outside it is `NotFound`.
    pub fn locate(&self, intent: ReorderIntent) -> RosterResult<(usize, usize)> {
        let items = &self.page().items;
        let from = items.iter().position(|r| r.id() == intent.dragged).ok_or(RosterError::NotFound(intent.dragged))?;
        let to = items.iter().position(|r| r.id() == intent.target).ok_or(RosterError::NotFound(intent.target))?;
        Ok((from, to))
    }

    /// Optimistically reorder the rendered page only. The next `refresh`
    /// replaces this order with whatever the store holds.
    pub fn preview_move(&mut self, intent: ReorderIntent) -> RosterResult<bool> {
        let (from, to) = self.locate(intent)?;
        Ok(splice_before(&mut self.rendered_mut().items, from, to))
    }
}

/// Write the move to the store and re-derive the view, whether the write
/// succeeded or not.
pub fn commit<R: Record>(store: &mut OrderedStore<R>, view: &mut ViewState<R>, intent: ReorderIntent) -> RosterResult<ReorderOutcome> {
    let res = store.move_before(intent.dragged, intent.target);
    view.refresh(&store.snapshot());
    match res {
        Ok(true) => {
            metrics::counter!("reorder_total", 1u64, "outcome" => "moved");
            info!(dragged = intent.dragged, target = intent.target, epoch = store.epoch(), "reorder: committed");
            Ok(ReorderOutcome::Moved)
        }
        Ok(false) => {
            metrics::counter!("reorder_total", 1u64, "outcome" => "unchanged");
            Ok(ReorderOutcome::Unchanged)
        }
        Err(e) => {
            metrics::counter!("reorder_total", 1u64, "outcome" => "rejected");
            warn!(dragged = intent.dragged, target = intent.target, error = %e, "reorder: rejected; view re-derived from store");
            Err(e)
        }
    }
}

/// Full gesture: validate against the rendered page, preview locally, commit globally.
/// Both ids must be rendered; a drag onto itself or within a one-row page is a no-op.
pub fn reorder<R: Record>(store: &mut OrderedStore<R>, view: &mut ViewState<R>, intent: ReorderIntent) -> RosterResult<ReorderOutcome> {
    let (from, to) = view.locate(intent)?;
    if from == to || view.page().items.len() <= 1 {
        debug!(dragged = intent.dragged, target = intent.target, "reorder: nothing to move");
        return Ok(ReorderOutcome::Unchanged);
    }
    view.preview_move(intent)?;
    commit(store, view, intent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::User;

    fn users(n: u64) -> Vec<User> {
        (1..=n).map(|id| User { id, name: format!("u{id}"), ..Default::default() }).collect()
    }

    fn page_ids(view: &ViewState<User>) -> Vec<u64> { view.page().items.iter().map(|u| u.id).collect() }

    #[test]
    fn preview_touches_only_the_rendered_page() {
        let mut store = OrderedStore::new();
        store.initialize(users(5));
        let mut view = ViewState::new(5).unwrap();
        view.refresh(&store.snapshot());
        assert!(view.preview_move(ReorderIntent::new(5, 1)).unwrap());
        assert_eq!(page_ids(&view), vec![5, 1, 2, 3, 4]);
        assert_eq!(store.snapshot().ids(), vec![1, 2, 3, 4, 5]);
        view.refresh(&store.snapshot());
        assert_eq!(page_ids(&view), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn single_row_page_is_a_no_op() {
        let mut store = OrderedStore::new();
        store.initialize(users(6));
        let mut view = ViewState::new(5).unwrap();
        view.set_page(&store.snapshot(), 2).unwrap();
        assert_eq!(page_ids(&view), vec![6]);
        assert_eq!(reorder(&mut store, &mut view, ReorderIntent::new(6, 6)), Ok(ReorderOutcome::Unchanged));
        assert_eq!(reorder(&mut store, &mut view, ReorderIntent::new(6, 1)), Err(RosterError::NotFound(1)));
        assert_eq!(store.epoch(), 1);
        assert_eq!(store.snapshot().ids(), (1..=6).collect::<Vec<_>>());
    }

    #[test]
    fn empty_page_rejects_every_drag() {
        let mut store = OrderedStore::new();
        store.initialize(users(6));
        let mut view = ViewState::new(5).unwrap();
        view.set_page(&store.snapshot(), 9).unwrap();
        assert!(view.page().items.is_empty());
        assert_eq!(reorder(&mut store, &mut view, ReorderIntent::new(777, 888)), Err(RosterError::NotFound(777)));
        assert_eq!(reorder(&mut store, &mut view, ReorderIntent::new(3, 3)), Err(RosterError::NotFound(3)));
        assert_eq!(store.epoch(), 1);
    }

    #[test]
    fn target_outside_rendered_page_is_rejected_without_mutation() {
        let mut store = OrderedStore::new();
        store.initialize(users(10));
        let mut view = ViewState::new(5).unwrap();
        view.refresh(&store.snapshot());
        assert_eq!(reorder(&mut store, &mut view, ReorderIntent::new(2, 8)), Err(RosterError::NotFound(8)));
        assert_eq!(store.snapshot().ids(), (1..=10).collect::<Vec<_>>());
        assert_eq!(page_ids(&view), vec![1, 2, 3, 4, 5]);
    }
}
