//! Apache Livy job-engine probe.
//!
//! Counts batch sessions that are queued or executing on the cluster.
//! Livy pages `/batches`, so the listing is walked with `from`/`size`
//! until `total` sessions have been seen.

use http::Method;
use serde::Deserialize;
use tracing::debug;

use tidepool_core::{BoxFuture, JobEngine};

use crate::client::{HttpClient, HttpError, join_url};

/// Session states that count as active work.
const ACTIVE_STATES: &[&str] = &["not_started", "starting", "running", "busy", "recovering"];

/// Sessions requested per page.
const PAGE_SIZE: usize = 100;

#[derive(Debug, Deserialize)]
struct Batches {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    sessions: Vec<Session>,
}

#[derive(Debug, Deserialize)]
struct Session {
    state: String,
}

#[derive(Debug, Clone)]
pub struct LivyJobEngine {
    client: HttpClient,
    base: String,
}

impl LivyJobEngine {
    pub fn new(client: HttpClient, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }

    pub async fn count_active(&self) -> Result<u64, HttpError> {
        let base = join_url(&self.base, "batches");
        let mut from = 0;
        let mut active = 0;

        loop {
            let url = format!("{base}?from={from}&size={PAGE_SIZE}");
            let resp = self.client.get(&url).await?.error_for_status(Method::GET, &url)?;
            let page: Batches = resp.json(&url)?;

            active += page
                .sessions
                .iter()
                .filter(|s| ACTIVE_STATES.contains(&s.state.as_str()))
                .count() as u64;
            from += page.sessions.len();

            // An empty page ends the walk even if `total` says otherwise.
            if page.sessions.is_empty() || from >= page.total {
                break;
            }
        }

        debug!(active, seen = from, "livy batches counted");
        Ok(active)
    }
}

impl JobEngine for LivyJobEngine {
    fn active_jobs(&self) -> BoxFuture<'_, anyhow::Result<u64>> {
        Box::pin(async move { Ok(self.count_active().await?) })
    }
}
