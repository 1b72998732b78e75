// src/ingest/providers/bluesky.rs
//! Author-feed reader for one Bluesky handle (public AppView, no auth).
//!
//! Pages newest-first until a page reaches back past `window.start`, the
//! cursor runs out, or `max_pages` is hit. Only items inside the window are
//! kept. Reposts are dated by the repost itself and tagged with the origin
//! author. Pinned posts are ignored for the stop check, since they can be
//! arbitrarily old and sit at the top of the first page.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Deserialize;
use std::time::Duration;

use crate::config::BlueskyConfig;
use crate::ingest::types::{Event, EventProvider, Platform};
use crate::ingest::{normalize_text, truncate_chars};
use crate::window::Window;

const TITLE_MAX_CHARS: usize = 80;
const REASON_REPOST: &str = "app.bsky.feed.defs#reasonRepost";
const REASON_PIN: &str = "app.bsky.feed.defs#reasonPin";

#[derive(Debug, Deserialize)]
struct ResolveHandle {
    did: String,
}

#[derive(Debug, Deserialize)]
struct FeedPage {
    #[serde(default)]
    feed: Vec<FeedItem>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    post: PostView,
    #[serde(default)]
    reason: Option<Reason>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostView {
    uri: String,
    author: Author,
    #[serde(default)]
    record: Record,
    #[serde(default)]
    indexed_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Author {
    handle: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Record {
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reason {
    #[serde(rename = "$type")]
    kind: String,
    #[serde(default)]
    indexed_at: Option<String>,
}

fn parse_ts(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

impl FeedItem {
    fn is_repost(&self) -> bool {
        self.reason.as_ref().is_some_and(|r| r.kind == REASON_REPOST)
    }

    fn is_pinned(&self) -> bool {
        self.reason.as_ref().is_some_and(|r| r.kind == REASON_PIN)
    }

    /// Repost instant for reposts, authoring instant otherwise.
    fn timestamp(&self) -> Option<DateTime<Utc>> {
        if self.is_repost() {
            let repost_at = self.reason.as_ref().and_then(|r| r.indexed_at.as_deref());
            return parse_ts(repost_at).or_else(|| parse_ts(self.post.indexed_at.as_deref()));
        }
        parse_ts(self.post.record.created_at.as_deref())
            .or_else(|| parse_ts(self.post.indexed_at.as_deref()))
    }

    fn web_url(&self) -> Option<String> {
        let rkey = self.post.uri.rsplit('/').next().filter(|k| !k.is_empty())?;
        Some(format!(
            "https://bsky.app/profile/{}/post/{}",
            self.post.author.handle, rkey
        ))
    }

    fn into_event(self, timestamp: DateTime<Utc>) -> Event {
        let text = normalize_text(&self.post.record.text);
        let short = truncate_chars(&text, TITLE_MAX_CHARS);
        let title = if self.is_repost() {
            format!("Repost of @{}: {}", self.post.author.handle, short)
        } else {
            short
        };
        let url = self.web_url();
        Event {
            source: Platform::Bluesky,
            title,
            description: text,
            url,
            timestamp,
        }
    }
}

pub struct BlueskyProvider {
    client: reqwest::Client,
    api_base: String,
    handle: String,
    page_limit: u32,
    max_pages: u32,
}

impl BlueskyProvider {
    pub fn new(cfg: &BlueskyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building Bluesky http client")?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            handle: cfg.handle.trim().trim_start_matches('@').to_string(),
            page_limit: cfg.page_limit.clamp(1, 100),
            max_pages: cfg.max_pages.max(1),
        })
    }

    async fn resolve_did(&self) -> Result<String> {
        let resolved: ResolveHandle = self
            .client
            .get(format!(
                "{}/com.atproto.identity.resolveHandle",
                self.api_base
            ))
            .query(&[("handle", self.handle.as_str())])
            .send()
            .await
            .context("bluesky resolveHandle request")?
            .error_for_status()
            .context("bluesky resolveHandle status")?
            .json()
            .await
            .context("bluesky resolveHandle json")?;
        Ok(resolved.did)
    }

    async fn fetch_page(&self, did: &str, cursor: Option<&str>) -> Result<FeedPage> {
        let limit = self.page_limit.to_string();
        let mut params = vec![
            ("actor", did),
            ("limit", limit.as_str()),
            ("filter", "posts_with_replies"),
        ];
        if let Some(c) = cursor {
            params.push(("cursor", c));
        }
        self.client
            .get(format!("{}/app.bsky.feed.getAuthorFeed", self.api_base))
            .query(&params)
            .send()
            .await
            .context("bluesky getAuthorFeed request")?
            .error_for_status()
            .context("bluesky getAuthorFeed status")?
            .json()
            .await
            .context("bluesky getAuthorFeed json")
    }

    pub async fn try_fetch(&self, window: &Window) -> Result<Vec<Event>> {
        let did = self.resolve_did().await?;
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        for page_no in 0..self.max_pages {
            let page = self.fetch_page(&did, cursor.as_deref()).await?;
            if page.feed.is_empty() {
                break;
            }

            let mut oldest: Option<DateTime<Utc>> = None;
            for item in page.feed {
                let Some(ts) = item.timestamp() else {
                    tracing::debug!(uri = %item.post.uri, "bluesky item without timestamp");
                    continue;
                };
                if !item.is_pinned() {
                    oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
                }
                if window.contains(ts) {
                    out.push(item.into_event(ts));
                }
            }

            if oldest.is_some_and(|o| o < window.start) {
                break;
            }
            match page.cursor {
                Some(c) if !c.is_empty() => cursor = Some(c),
                _ => break,
            }
            if page_no + 1 == self.max_pages {
                tracing::debug!(max_pages = self.max_pages, "bluesky page cap reached");
            }
        }

        Ok(out)
    }
}

#[async_trait]
impl EventProvider for BlueskyProvider {
    async fn fetch_window(&self, window: &Window) -> Vec<Event> {
        match self.try_fetch(window).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = ?e, provider = "bluesky", "provider error");
                counter!("digest_provider_errors_total", "provider" => "bluesky").increment(1);
                Vec::new()
            }
        }
    }

    fn name(&self) -> &'static str {
        "bluesky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(json: serde_json::Value) -> FeedItem {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn repost_uses_repost_time_and_origin_author() {
        let it = item(serde_json::json!({
            "post": {
                "uri": "at://did:plc:origin/app.bsky.feed.post/3kabc",
                "author": {"handle": "origin.bsky.social"},
                "record": {"text": "hello\nworld", "createdAt": "2026-01-01T00:00:00Z"}
            },
            "reason": {
                "$type": "app.bsky.feed.defs#reasonRepost",
                "indexedAt": "2026-03-10T08:00:00.000Z"
            }
        }));
        let ts = it.timestamp().unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-03-10T08:00:00+00:00");
        let ev = it.into_event(ts);
        assert_eq!(ev.title, "Repost of @origin.bsky.social: hello world");
        assert_eq!(
            ev.url.as_deref(),
            Some("https://bsky.app/profile/origin.bsky.social/post/3kabc")
        );
    }

    #[test]
    fn title_is_truncated_to_80_chars() {
        let long = "x".repeat(200);
        let it = item(serde_json::json!({
            "post": {
                "uri": "at://did:plc:me/app.bsky.feed.post/1",
                "author": {"handle": "me.bsky.social"},
                "record": {"text": long, "createdAt": "2026-03-10T08:00:00Z"}
            }
        }));
        let ts = it.timestamp().unwrap();
        let ev = it.into_event(ts);
        assert_eq!(ev.title.chars().count(), 80);
        assert_eq!(ev.description.chars().count(), 200);
    }
}
