//! Roster public API façade (in-process).
//!
//! Frontends (the CLI, tests) depend on this crate: it wires record sources into
//! the ordered stores, keeps one view per store, and gates fetching on the session.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use roster_core::{FetchStatus, Post, RecordId, RecordSource, RosterResult, User};
use roster_source::{FileSource, HttpSource, DEFAULT_API_BASE};
use roster_store::{OrderedStore, StoreHandle};
use roster_view::{Page, QueryExplain, ReorderIntent, ReorderOutcome, ViewState};
use serde::{Deserialize, Serialize};
use tracing::info;

pub mod accounts;
pub mod cards;

pub use accounts::{Account, AccountDirectory, OAuthProfile, Session};
pub use cards::{MetricCard, Trend};

pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Where records come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Http,
    Fixtures { users: PathBuf, posts: PathBuf },
}

/// Runtime configuration, read once from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub api_base: String,
    pub users_per_page: usize,
    pub posts_per_page: usize,
    pub fetch_timeout_secs: u64,
    pub source: SourceKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            users_per_page: 5,
            posts_per_page: 10,
            fetch_timeout_secs: 10,
            source: SourceKind::Http,
        }
    }
}

impl Config {
    pub fn from_env() -> Self { Self::from_lookup(|k| std::env::var(k).ok()) }

    /// Same as `from_env` with an injectable lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            api_base: lookup("ROSTER_API_BASE").filter(|s| !s.is_empty()).unwrap_or(d.api_base),
            users_per_page: lookup("ROSTER_USERS_PER_PAGE").and_then(|s| s.parse().ok()).unwrap_or(d.users_per_page),
            posts_per_page: lookup("ROSTER_POSTS_PER_PAGE").and_then(|s| s.parse().ok()).unwrap_or(d.posts_per_page),
            fetch_timeout_secs: lookup("ROSTER_FETCH_TIMEOUT_SECS").and_then(|s| s.parse().ok()).unwrap_or(d.fetch_timeout_secs),
            source: d.source,
        }
    }
}

/// Outcome of a `Dashboard::load` round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// True when the session was not authenticated and nothing was fetched.
    pub skipped: bool,
    pub users: FetchStatus,
    pub posts: FetchStatus,
    pub errors: Vec<String>,
    pub fetched_at: Option<String>,
}

impl LoadReport {
    pub fn failed(&self) -> bool { self.users == FetchStatus::Failed || self.posts == FetchStatus::Failed }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsersPage {
    pub page: Page<User>,
    pub filter: Option<String>,
    pub status: FetchStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRow {
    pub post: Post,
    pub author: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostsPage {
    pub rows: Vec<PostRow>,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub filter: Option<String>,
    pub status: FetchStatus,
    pub error: Option<String>,
}

/// Users and posts collections with their views.
pub struct Dashboard {
    users_src: Box<dyn RecordSource<User>>,
    posts_src: Box<dyn RecordSource<Post>>,
    users: OrderedStore<User>,
    posts: OrderedStore<Post>,
    users_view: ViewState<User>,
    posts_view: ViewState<Post>,
    last_response_secs: Option<f64>,
}

impl Dashboard {
    pub fn new(
        users_src: Box<dyn RecordSource<User>>,
        posts_src: Box<dyn RecordSource<Post>>,
        users_per_page: usize,
        posts_per_page: usize,
    ) -> RosterResult<Self> {
        Ok(Self {
            users_src,
            posts_src,
            users: OrderedStore::new(),
            posts: OrderedStore::new(),
            users_view: ViewState::new(users_per_page)?,
            posts_view: ViewState::new(posts_per_page)?,
            last_response_secs: None,
        })
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let users_src: Box<dyn RecordSource<User>>;
        let posts_src: Box<dyn RecordSource<Post>>;
        match &cfg.source {
            SourceKind::Http => {
                let timeout = Duration::from_secs(cfg.fetch_timeout_secs);
                users_src = Box::new(HttpSource::<User>::new(&cfg.api_base, timeout)?);
                posts_src = Box::new(HttpSource::<Post>::new(&cfg.api_base, timeout)?);
            }
            SourceKind::Fixtures { users, posts } => {
                users_src = Box::new(FileSource::<User>::new(users.clone()));
                posts_src = Box::new(FileSource::<Post>::new(posts.clone()));
            }
        }
        info!(users = %users_src.describe(), posts = %posts_src.describe(), "api: dashboard configured");
        Ok(Self::new(users_src, posts_src, cfg.users_per_page, cfg.posts_per_page)?)
    }

    /// Fetch both collections. Unauthenticated sessions fetch nothing.
    /// Failures are reported through the statuses; existing records stay.
    pub async fn load(&mut self, session: &Session) -> LoadReport {
        if !session.authenticated {
            info!("api: load skipped; session not authenticated");
            metrics::counter!("dashboard_loads_total", 1u64, "outcome" => "skipped");
            return LoadReport { skipped: true, users: self.users.status(), posts: self.posts.status(), errors: Vec::new(), fetched_at: None };
        }
        let mut errors = Vec::new();
        let t0 = Instant::now();
        if let Err(e) = self.users.load_from(self.users_src.as_ref()).await {
            errors.push(e.to_string());
        }
        self.last_response_secs = Some(t0.elapsed().as_secs_f64());
        if let Err(e) = self.posts.load_from(self.posts_src.as_ref()).await {
            errors.push(e.to_string());
        }
        self.users_view.refresh(&self.users.snapshot());
        self.posts_view.refresh(&self.posts.snapshot());
        let outcome = if errors.is_empty() { "ok" } else { "partial" };
        metrics::counter!("dashboard_loads_total", 1u64, "outcome" => outcome);
        metrics::histogram!("dashboard_load_ms", t0.elapsed().as_secs_f64() * 1_000.0);
        info!(
            user = %session.display_name.as_deref().unwrap_or("-"),
            users = self.users.len(),
            posts = self.posts.len(),
            errors = errors.len(),
            took_ms = %t0.elapsed().as_millis(),
            "api: load done"
        );
        LoadReport {
            skipped: false,
            users: self.users.status(),
            posts: self.posts.status(),
            errors,
            fetched_at: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    pub fn users(&self) -> &OrderedStore<User> { &self.users }
    pub fn posts(&self) -> &OrderedStore<Post> { &self.posts }
    pub fn users_handle(&self) -> StoreHandle<User> { self.users.handle() }

    /// Replace the users collection directly (used by demos and tests).
    pub fn seed_users(&mut self, records: Vec<User>) {
        self.users.initialize(records);
        self.users_view.refresh(&self.users.snapshot());
    }

    pub fn seed_posts(&mut self, records: Vec<Post>) {
        self.posts.initialize(records);
        self.posts_view.refresh(&self.posts.snapshot());
    }

    pub fn users_page(&self) -> UsersPage {
        UsersPage {
            page: self.users_view.page().clone(),
            filter: self.users_view.filter_label().map(str::to_string),
            status: self.users.status(),
            error: self.users.last_error().map(str::to_string),
        }
    }

    pub fn posts_page(&self) -> PostsPage {
        let page = self.posts_view.page();
        let rows = page
            .items
            .iter()
            .map(|p| PostRow {
                post: p.clone(),
                author: self.users.get(p.user_id).map(|u| u.name.clone()).unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            })
            .collect();
        PostsPage {
            rows,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            total_items: page.total_items,
            filter: self.posts_view.filter_label().map(str::to_string),
            status: self.posts.status(),
            error: self.posts.last_error().map(str::to_string),
        }
    }

    pub fn filter_users(&mut self, query: &str) -> RosterResult<()> {
        self.users_view.apply_query(&self.users.snapshot(), query)
    }

    pub fn filter_posts(&mut self, query: &str) -> RosterResult<()> {
        self.posts_view.apply_query(&self.posts.snapshot(), query)
    }

    pub fn explain_users(&self, query: &str) -> RosterResult<QueryExplain> {
        let q = roster_view::Query::parse::<User>(query)?;
        Ok(q.explain(self.users.items()))
    }

    pub fn users_goto(&mut self, page: usize) -> RosterResult<()> {
        self.users_view.set_page(&self.users.snapshot(), page)
    }

    pub fn posts_goto(&mut self, page: usize) -> RosterResult<()> {
        self.posts_view.set_page(&self.posts.snapshot(), page)
    }

    /// Drag `dragged` onto `target` within the rendered users page.
    pub fn reorder_users(&mut self, dragged: RecordId, target: RecordId) -> RosterResult<ReorderOutcome> {
        roster_view::reorder::reorder(&mut self.users, &mut self.users_view, ReorderIntent::new(dragged, target))
    }

    pub fn overview(&self) -> RosterResult<Vec<MetricCard>> {
        cards::overview(self.users.len(), self.posts.len(), self.last_response_secs.unwrap_or(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn config_defaults_and_overrides() {
        let d = Config::from_lookup(|_| None);
        assert_eq!(d, Config::default());
        assert_eq!(d.users_per_page, 5);
        assert_eq!(d.posts_per_page, 10);

        let env: HashMap<&str, &str> = [
            ("ROSTER_API_BASE", "http://127.0.0.1:9999"),
            ("ROSTER_USERS_PER_PAGE", "3"),
            ("ROSTER_POSTS_PER_PAGE", "many"),
        ]
        .into_iter()
        .collect();
        let c = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.api_base, "http://127.0.0.1:9999");
        assert_eq!(c.users_per_page, 3);
        assert_eq!(c.posts_per_page, 10, "unparseable values fall back to defaults");
    }
}
