//! Roster views: stable filtering and pagination over a store snapshot.
//! A view only ever holds copies; order is always re-derived from the snapshot.

#![forbid(unsafe_code)]

use std::sync::Arc;

use roster_core::{Record, RosterError, RosterResult, Snapshot};
use serde::Serialize;
use tracing::debug;

pub mod query;
pub mod reorder;

pub use query::{Query, QueryExplain};
pub use reorder::{ReorderIntent, ReorderOutcome};

/// Typed filter predicate over a record.
pub type Predicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

pub fn match_all<R: Record>() -> Predicate<R> { Arc::new(|_: &R| true) }

/// Keep records matching `pred`, preserving their relative order.
pub fn stable_filter<R: Record>(items: &[R], pred: &(dyn Fn(&R) -> bool + Send + Sync)) -> Vec<R> {
    items.iter().filter(|r| pred(*r)).cloned().collect()
}

/// One bounded window of a filtered sequence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// 1-based page number.
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<R> Page<R> {
    pub fn is_empty(&self) -> bool { self.items.is_empty() }
    pub fn has_next(&self) -> bool { self.page < self.total_pages }
    pub fn has_prev(&self) -> bool { self.page > 1 }
}

/// `filtered[(page-1)*size .. page*size]`. Pages past the end are empty, not errors.
pub fn paginate<R: Clone>(filtered: &[R], page: usize, page_size: usize) -> RosterResult<Page<R>> {
    if page_size == 0 {
        return Err(RosterError::InvalidArgument("page size must be positive".into()));
    }
    if page == 0 {
        return Err(RosterError::InvalidArgument("page numbers start at 1".into()));
    }
    let total_items = filtered.len();
    let total_pages = total_items.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size).min(total_items);
    let end = page.saturating_mul(page_size).min(total_items);
    Ok(Page { items: filtered[start..end].to_vec(), page, page_size, total_pages, total_items })
}

/// Filtered, paginated projection of one store.
pub struct ViewState<R: Record> {
    predicate: Predicate<R>,
    filter_label: Option<String>,
    page: usize,
    page_size: usize,
    epoch: u64,
    filtered: Vec<R>,
    rendered: Page<R>,
}

impl<R: Record> ViewState<R> {
    pub fn new(page_size: usize) -> RosterResult<Self> {
        let rendered = paginate::<R>(&[], 1, page_size)?;
        Ok(Self { predicate: match_all(), filter_label: None, page: 1, page_size, epoch: 0, filtered: Vec::new(), rendered })
    }

    pub fn page_number(&self) -> usize { self.page }
    pub fn page_size(&self) -> usize { self.page_size }
    pub fn epoch(&self) -> u64 { self.epoch }
    pub fn filter_label(&self) -> Option<&str> { self.filter_label.as_deref() }

    /// Currently rendered page.
    pub fn page(&self) -> &Page<R> { &self.rendered }

    /// Full filtered subsequence, in collection order.
    pub fn filtered(&self) -> &[R] { &self.filtered }

    /// True when the view was derived from an older snapshot than `epoch`.
    pub fn is_stale(&self, epoch: u64) -> bool { self.epoch != epoch }

    /// Any page of the current filtered sequence, without moving the view.
    pub fn get_page(&self, page: usize, page_size: usize) -> RosterResult<Page<R>> {
        paginate(&self.filtered, page, page_size)
    }

    /// Install a new predicate and go back to page 1.
    pub fn apply_filter(&mut self, snap: &Snapshot<R>, predicate: Predicate<R>, label: Option<String>) {
        self.predicate = predicate;
        self.filter_label = label;
        self.page = 1;
        self.refresh(snap);
    }

    /// Parse a query string and apply it. An empty query clears the filter.
    pub fn apply_query(&mut self, snap: &Snapshot<R>, q: &str) -> RosterResult<()> {
        if q.trim().is_empty() {
            self.clear_filter(snap);
            return Ok(());
        }
        let query = Query::parse::<R>(q)?;
        self.apply_filter(snap, query.into_predicate::<R>(), Some(q.trim().to_string()));
        Ok(())
    }

    pub fn clear_filter(&mut self, snap: &Snapshot<R>) {
        self.apply_filter(snap, match_all(), None);
    }

    pub fn set_page(&mut self, snap: &Snapshot<R>, page: usize) -> RosterResult<()> {
        if page == 0 {
            return Err(RosterError::InvalidArgument("page numbers start at 1".into()));
        }
        self.page = page;
        self.refresh(snap);
        Ok(())
    }

    pub fn set_page_size(&mut self, snap: &Snapshot<R>, page_size: usize) -> RosterResult<()> {
        if page_size == 0 {
            return Err(RosterError::InvalidArgument("page size must be positive".into()));
        }
        self.page_size = page_size;
        self.page = 1;
        self.refresh(snap);
        Ok(())
    }

    /// Recompute filtered sequence and rendered page from the snapshot.
    pub fn refresh(&mut self, snap: &Snapshot<R>) {
        let started = std::time::Instant::now();
        self.filtered = stable_filter(&snap.items, self.predicate.as_ref());
        self.epoch = snap.epoch;
        // page and page_size are validated on every setter
        self.rendered = match paginate(&self.filtered, self.page, self.page_size) {
            Ok(p) => p,
            Err(_) => Page { items: Vec::new(), page: self.page, page_size: self.page_size, total_pages: 0, total_items: self.filtered.len() },
        };
        metrics::gauge!("view_filtered", self.filtered.len() as f64);
        metrics::histogram!("view_recompute_ms", started.elapsed().as_secs_f64() * 1_000.0);
        debug!(epoch = self.epoch, filtered = self.filtered.len(), page = self.page, rendered = self.rendered.items.len(), "view: refreshed");
    }

    pub(crate) fn rendered_mut(&mut self) -> &mut Page<R> { &mut self.rendered }
}
