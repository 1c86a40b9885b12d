//! Conditional-refresh polling client
//!
//! A [`Poller`] owns a name-keyed collection of artifacts. Registration
//! performs a synchronous initial fetch; a background loop then re-fetches
//! each tracked artifact on an interval, applying new content only when the
//! remote reports a modification time strictly after the artifact's own.
//! Failures inside a cycle are isolated per entry: one unreachable source
//! never halts the cycle or the loop.

use crate::artifact::{Artifact, ArtifactCell};
use crate::clock::{Clock, SystemClock};
use crate::config::PollerConfig;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::Url;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Default seconds between refresh cycles
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Default response header carrying the last-modified timestamp
pub const DEFAULT_MODIFIED_HEADER: &str = "Modified-At";

/// Builder for [`Poller`]
pub struct PollerBuilder {
    base_url: String,
    interval: Duration,
    modified_header: String,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
}

impl PollerBuilder {
    fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            modified_header: DEFAULT_MODIFIED_HEADER.to_string(),
            clock: Arc::new(SystemClock),
            http: reqwest::Client::new(),
        }
    }

    /// Time between refresh cycles (default 10s)
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Response header carrying the last-modified timestamp
    /// (default `Modified-At`)
    pub fn modified_header(mut self, header: impl Into<String>) -> Self {
        self.modified_header = header.into();
        self
    }

    /// Time source used to stamp artifact modification times
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// HTTP client used for all fetches
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    /// Validate the configuration and build the poller
    pub fn build(self) -> Result<Poller> {
        let base = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base URL {:?}: {}", self.base_url, e)))?;

        if self.interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".to_string()));
        }

        Ok(Poller {
            base,
            interval: self.interval,
            modified_header: self.modified_header,
            clock: self.clock,
            http: self.http,
            artifacts: RwLock::new(HashMap::new()),
        })
    }
}

/// Polling client that keeps registered artifacts in sync with their remotes
///
/// Each poller is self-contained: it owns its HTTP client, its clock, and
/// the lock over its tracked collection, so independently configured pollers
/// coexist safely in one process. The collection's lock is distinct from
/// every artifact's own lock; contention on one artifact never blocks access
/// to another.
pub struct Poller {
    base: Url,
    interval: Duration,
    modified_header: String,
    clock: Arc<dyn Clock>,
    http: reqwest::Client,
    artifacts: RwLock<HashMap<String, ArtifactCell>>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("base", &self.base)
            .field("interval", &self.interval)
            .field("modified_header", &self.modified_header)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Start building a poller against the given base address
    pub fn builder(base_url: impl Into<String>) -> PollerBuilder {
        PollerBuilder::new(base_url)
    }

    /// Build a poller from a [`PollerConfig`]
    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        Self::builder(config.base_url.clone())
            .interval(Duration::from_secs(config.interval_secs))
            .modified_header(config.modified_header.clone())
            .build()
    }

    /// Logical names currently tracked by this poller
    pub async fn tracked(&self) -> Vec<String> {
        self.artifacts.read().await.keys().cloned().collect()
    }

    fn endpoint(&self, name: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(name);
        url
    }

    /// Fetch `name` once and start tracking `artifact` on success
    ///
    /// The initial fetch and update run synchronously; any transport or
    /// update failure fails the whole registration and the artifact is not
    /// tracked. On success the artifact's listeners are notified and the
    /// `(name, artifact)` pair joins the tracked collection, replacing any
    /// previous entry under the same name.
    pub async fn register<A>(&self, name: &str, artifact: &ArtifactCell<A>) -> Result<()>
    where
        A: Artifact + 'static,
    {
        let url = self.endpoint(name);
        let resp = self.http.get(url).send().await?;
        let body = resp.bytes().await?;

        artifact.apply(&body).await?;
        artifact.notify_updated(self.clock.as_ref()).await;

        self.artifacts
            .write()
            .await
            .insert(name.to_string(), artifact.as_dyn());

        tracing::info!(name, "artifact registered");
        Ok(())
    }

    /// Run the refresh loop until `cancel` is triggered
    ///
    /// Ticks at the configured interval. Every failure inside a cycle is
    /// logged and isolated to its entry; the loop only ends through
    /// cancellation, which also aborts any in-flight fetch.
    pub async fn monitor_updates(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        // The first tick completes immediately; registration already did the
        // initial fetch, so consume it and wait a full interval.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("update monitor stopped");
                    return;
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("update monitor stopped");
                    return;
                }
                _ = self.poll_cycle() => {}
            }
        }
    }

    /// Run one refresh cycle over a snapshot of the tracked collection
    ///
    /// The snapshot is taken so the collection lock is not held across
    /// network I/O; concurrent `register` calls stay unblocked for the
    /// whole cycle.
    async fn poll_cycle(&self) {
        tracing::debug!("checking tracked artifacts for changes");

        let entries: Vec<(String, ArtifactCell)> = {
            let artifacts = self.artifacts.read().await;
            artifacts
                .iter()
                .map(|(name, cell)| (name.clone(), cell.clone()))
                .collect()
        };

        for (name, artifact) in entries {
            self.refresh(&name, &artifact).await;
        }
    }

    /// Conditionally re-fetch one artifact, confining every failure to it
    async fn refresh(&self, name: &str, artifact: &ArtifactCell) {
        let url = self.endpoint(name);

        let resp = match self.http.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::warn!(name, %url, "failed to reach source: {}", err);
                return;
            }
        };

        if !resp.status().is_success() {
            tracing::debug!(name, status = %resp.status(), "skipping non-success response");
            return;
        }

        // A missing or malformed timestamp header is "no new information",
        // not an error.
        let Some(modified) = resp
            .headers()
            .get(&self.modified_header)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
            .map(|value| value.with_timezone(&Utc))
        else {
            tracing::debug!(name, "no usable modification timestamp, skipping");
            return;
        };

        if modified <= artifact.modified_at().await {
            tracing::debug!(name, "artifact unchanged");
            return;
        }

        let body = match resp.bytes().await {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(name, "failed to read response body: {}", err);
                return;
            }
        };

        match artifact.apply(&body).await {
            Ok(()) => {
                artifact.notify_updated(self.clock.as_ref()).await;
                tracing::info!(name, "artifact updated");
            }
            Err(err) => {
                // Payload left as it was; the next tick retries this entry.
                tracing::error!(name, "failed to update artifact: {}", err);
            }
        }
    }
}
