//! Roster sources: where the full record sequence comes from.

#![forbid(unsafe_code)]

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use roster_core::{Post, Record, RecordSource, User};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

pub const DEFAULT_API_BASE: &str = "https://jsonplaceholder.typicode.com";

/// Endpoint path of a record type on the mock API.
pub trait Endpoint {
    const PATH: &'static str;
}

impl Endpoint for User { const PATH: &'static str = "users"; }
impl Endpoint for Post { const PATH: &'static str = "posts"; }

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// GET `{base}/{endpoint}` and decode a JSON array.
pub struct HttpSource<R> {
    client: reqwest::Client,
    url: String,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Endpoint> HttpSource<R> {
    pub fn new(base: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("roster/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, url: join_url(base, R::PATH), _marker: PhantomData })
    }

    pub fn url(&self) -> &str { &self.url }
}

#[async_trait::async_trait]
impl<R> RecordSource<R> for HttpSource<R>
where
    R: Record + Endpoint + DeserializeOwned,
{
    fn describe(&self) -> String { self.url.clone() }

    async fn fetch_all(&self) -> Result<Vec<R>> {
        let t0 = Instant::now();
        debug!(url = %self.url, "source: GET");
        let resp = self
            .client
            .get(&self.url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("sending request to {}", self.url))?;
        let resp = resp
            .error_for_status()
            .with_context(|| format!("{} returned error status", self.url))?;
        let records = resp
            .json::<Vec<R>>()
            .await
            .with_context(|| format!("decoding records from {}", self.url))?;
        metrics::histogram!("source_http_ms", t0.elapsed().as_secs_f64() * 1_000.0);
        info!(url = %self.url, count = records.len(), took_ms = %t0.elapsed().as_millis(), "source: fetched");
        Ok(records)
    }
}

/// Reads a JSON array of records from disk.
pub struct FileSource<R> {
    path: PathBuf,
    _marker: PhantomData<fn() -> R>,
}

impl<R> FileSource<R> {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), _marker: PhantomData } }
}

#[async_trait::async_trait]
impl<R> RecordSource<R> for FileSource<R>
where
    R: Record + DeserializeOwned,
{
    fn describe(&self) -> String { format!("file:{}", self.path.display()) }

    async fn fetch_all(&self) -> Result<Vec<R>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("reading fixture {}", self.path.display()))?;
        let records: Vec<R> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing fixture {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = records.len(), "source: fixture loaded");
        Ok(records)
    }
}

/// Fixed in-memory records, or a source that always fails.
pub struct StaticSource<R> {
    records: Vec<R>,
    failure: Option<String>,
}

impl<R> StaticSource<R> {
    pub fn new(records: Vec<R>) -> Self { Self { records, failure: None } }

    pub fn failing(message: impl Into<String>) -> Self { Self { records: Vec::new(), failure: Some(message.into()) } }
}

#[async_trait::async_trait]
impl<R: Record> RecordSource<R> for StaticSource<R> {
    fn describe(&self) -> String { format!("static:{}", self.records.len()) }

    async fn fetch_all(&self) -> Result<Vec<R>> {
        match &self.failure {
            Some(msg) => Err(anyhow!("{}", msg)),
            None => Ok(self.records.clone()),
        }
    }
}
