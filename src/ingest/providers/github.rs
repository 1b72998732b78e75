// src/ingest/providers/github.rs
use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::counter;
use reqwest::header::ACCEPT;
use serde::{de::IgnoredAny, Deserialize};
use std::time::Duration;

use crate::config::GithubConfig;
use crate::ingest::types::{Event, EventProvider, Platform};
use crate::ingest::{normalize_text, truncate_chars};
use crate::window::Window;

const BODY_MAX_CHARS: usize = 500;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: String,
    #[serde(default)]
    body: Option<String>,
    html_url: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    closed_at: Option<DateTime<Utc>>,
    /// Present only on pull requests.
    #[serde(default)]
    pull_request: Option<IgnoredAny>,
}

/// Closed issues and merged PRs of one repository, via the search API.
pub struct GithubProvider {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    token: String,
}

impl GithubProvider {
    pub fn new(cfg: &GithubConfig) -> Result<Self> {
        ensure!(!cfg.token.trim().is_empty(), "missing GitHub token");
        ensure!(
            !cfg.owner.trim().is_empty() && !cfg.repo.trim().is_empty(),
            "missing GitHub owner/repo"
        );
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building GitHub http client")?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            owner: cfg.owner.trim().to_string(),
            repo: cfg.repo.trim().to_string(),
            token: cfg.token.trim().to_string(),
        })
    }

    /// Search query for everything completed inside the window.
    pub fn search_query(&self, window: &Window) -> String {
        format!(
            "repo:{}/{} is:closed reason:completed -is:unmerged closed:{}..{}",
            self.owner,
            self.repo,
            window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub async fn try_fetch(&self, window: &Window) -> Result<Vec<Event>> {
        let query = self.search_query(window);
        let resp = self
            .client
            .get(format!("{}/search/issues", self.api_base))
            .query(&[("q", query.as_str()), ("per_page", "100")])
            .header(ACCEPT, "application/vnd.github.v3+json")
            .bearer_auth(&self.token)
            .send()
            .await
            .context("github search request")?
            .error_for_status()
            .context("github search status")?;

        let body: SearchResponse = resp.json().await.context("github search json")?;
        let events = body
            .items
            .into_iter()
            .filter_map(|it| {
                let timestamp = it.closed_at.unwrap_or(it.created_at);
                if !window.contains(timestamp) {
                    return None;
                }
                let prefix = if it.pull_request.is_some() {
                    "Merged PR: "
                } else {
                    "Closed issue: "
                };
                Some(Event {
                    source: Platform::Github,
                    title: format!("{prefix}{}", normalize_text(&it.title)),
                    description: truncate_chars(
                        &normalize_text(it.body.as_deref().unwrap_or_default()),
                        BODY_MAX_CHARS,
                    ),
                    url: Some(it.html_url),
                    timestamp,
                })
            })
            .collect();
        Ok(events)
    }
}

#[async_trait]
impl EventProvider for GithubProvider {
    async fn fetch_window(&self, window: &Window) -> Vec<Event> {
        match self.try_fetch(window).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, provider = "github", "provider error");
                counter!("digest_provider_errors_total", "provider" => "github").increment(1);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "github"
    }
}
