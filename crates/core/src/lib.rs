//! Roster core types: records, snapshots, fetch status and errors.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Stable record identifier, unique within one collection.
pub type RecordId = u64;

/// Entry representing a projected field: `(field name, rendered value)`
pub type ProjectedEntry = (&'static str, String);

/// Projected fields of a record, used by typed filters and free-text search.
pub type Fields = SmallVec<[ProjectedEntry; 8]>;

/// A record held in an ordered collection. Order is positional; the record
/// itself carries no ordering field.
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    /// Field names accepted by `fields()` and by `name:value` query filters.
    const FIELD_NAMES: &'static [&'static str];

    /// Subset of `FIELD_NAMES` matched by whole value instead of substring (ids, keys).
    const EXACT_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> RecordId;

    /// Primary display text (user name, post title).
    fn title(&self) -> &str;

    fn fields(&self) -> Fields;

    /// Text used for free-text matching: title followed by every projected value.
    fn search_text(&self) -> String {
        let mut text = String::from(self.title());
        for (_name, val) in self.fields().iter() {
            if val.is_empty() { continue; }
            text.push(' ');
            text.push_str(val);
        }
        text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    #[serde(default)]
    pub catch_phrase: String,
    #[serde(default)]
    pub bs: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub suite: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zipcode: String,
}

/// A user row as served by the mock API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub name: String,
    #[serde(default)]
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub company: Company,
    #[serde(default)]
    pub address: Address,
}

impl Record for User {
    const FIELD_NAMES: &'static [&'static str] = &["name", "username", "email", "phone", "website", "company", "city"];

    fn id(&self) -> RecordId { self.id }
    fn title(&self) -> &str { &self.name }

    fn fields(&self) -> Fields {
        let mut out = Fields::new();
        out.push(("name", self.name.clone()));
        out.push(("username", self.username.clone()));
        out.push(("email", self.email.clone()));
        out.push(("phone", self.phone.clone()));
        out.push(("website", self.website.clone()));
        out.push(("company", self.company.name.clone()));
        out.push(("city", self.address.city.clone()));
        out
    }
}

/// A post as served by the mock API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: RecordId,
    pub user_id: RecordId,
    pub title: String,
    #[serde(default)]
    pub body: String,
}

impl Record for Post {
    const FIELD_NAMES: &'static [&'static str] = &["title", "body", "user_id"];
    const EXACT_FIELDS: &'static [&'static str] = &["user_id"];

    fn id(&self) -> RecordId { self.id }
    fn title(&self) -> &str { &self.title }

    fn fields(&self) -> Fields {
        let mut out = Fields::new();
        out.push(("title", self.title.clone()));
        out.push(("body", self.body.clone()));
        out.push(("user_id", self.user_id.to_string()));
        out
    }
}

/// Immutable frozen copy of an ordered collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot<R> {
    /// Bumped on every mutation that changed the sequence.
    pub epoch: u64,
    pub items: Vec<R>,
}

impl<R> Default for Snapshot<R> {
    fn default() -> Self { Self { epoch: 0, items: Vec::new() } }
}

impl<R: Record> Snapshot<R> {
    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.items.iter().position(|r| r.id() == id)
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.items.iter().map(|r| r.id()).collect()
    }
}

/// Status of the most recent fetch into a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Loading => "loading",
            FetchStatus::Succeeded => "succeeded",
            FetchStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Errors surfaced to callers of the collection, view and account APIs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RosterError {
    #[error("not_found: record {0}")]
    NotFound(RecordId),
    #[error("invalid_argument: {0}")]
    InvalidArgument(String),
    #[error("fetch_failed: {0}")]
    FetchFailed(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

pub type RosterResult<T> = Result<T, RosterError>;

/// External provider of the full record sequence (mock API, fixture file, ...).
#[async_trait::async_trait]
pub trait RecordSource<R: Record>: Send + Sync {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    async fn fetch_all(&self) -> anyhow::Result<Vec<R>>;
}

pub mod prelude {
    pub use super::{
        FetchStatus, Fields, Post, ProjectedEntry, Record, RecordId, RecordSource, RosterError, RosterResult,
        Snapshot, User,
    };
}
