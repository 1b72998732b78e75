// src/ingest/liveness.rs
//! Link-liveness filter: drop events whose outbound link does not answer.
//!
//! One `HEAD` per linked event, all in flight together, each bounded by the
//! configured timeout. A dead link is not an error; the event just goes away.

use anyhow::{Context, Result};
use metrics::counter;
use std::time::Duration;

use crate::config::LivenessConfig;
use crate::ingest::types::Event;

pub struct LinkChecker {
    client: reqwest::Client,
}

impl LinkChecker {
    pub fn new(cfg: &LivenessConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building liveness http client")?;
        Ok(Self { client })
    }

    /// True when `url` answers a HEAD with a success status (after redirects).
    pub async fn is_reachable(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(url, error = %e, "liveness check failed");
                false
            }
        }
    }

    /// Keep events without a link and events whose link answers. Order is preserved.
    pub async fn retain_live(&self, events: Vec<Event>) -> Vec<Event> {
        let checks = events.iter().map(|ev| async move {
            match ev.url.as_deref() {
                Some(u) => self.is_reachable(u).await,
                None => true,
            }
        });
        let verdicts = futures::future::join_all(checks).await;

        let before = events.len();
        let kept: Vec<Event> = events
            .into_iter()
            .zip(verdicts)
            .filter_map(|(ev, alive)| alive.then_some(ev))
            .collect();

        let dropped = before - kept.len();
        if dropped > 0 {
            counter!("digest_liveness_dropped_total").increment(dropped as u64);
            tracing::info!(target: "digest", dropped, kept = kept.len(), "dropped dead links");
        }
        kept
    }
}
