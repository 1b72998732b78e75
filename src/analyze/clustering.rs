//! Topic clustering: one structured chat call that groups events into topics.
//!
//! The reply must be `{"topics": [...]}` (a bare array is tolerated). Every
//! topic is shape-checked; a single bad topic rejects the whole reply. Any
//! failure degrades to "no topics" so the run ends with nothing to publish.

use anyhow::{anyhow, Context, Result};
use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::analyze::ai_adapter::{ChatModel, ChatRequest};
use crate::analyze::rerank::rank_topics;
use crate::ingest::types::{Event, Platform};
use crate::post::validate_topic;

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicSource {
    pub platform: Platform,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub title: String,
    pub summary: String,
    pub relevance_score: f64,
    pub sources: Vec<TopicSource>,
}

impl Topic {
    pub fn has_platform(&self, platform: Platform) -> bool {
        self.sources.iter().any(|s| s.platform == platform)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClusterOptions {
    pub temperature: f32,
    pub max_events: usize,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_events: 150,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are an editor writing a short activity digest for a software project. \
You receive a JSON array of recent events from GitHub and Bluesky. \
Group related events into 5 or 6 topics. For each topic return: \
\"title\" (short, specific), \
\"summary\" (about 50 words, plain prose), \
\"relevanceScore\" (number from 1 to 10, higher means more important to users), \
\"sources\" (one or more objects {\"platform\": \"github\" | \"bluesky\", \"url\": <the event url>}). \
Only cite URLs that appear in the input. \
Respond with a JSON object of the form {\"topics\": [...]} and nothing else.";

#[derive(Serialize)]
struct PromptEvent<'a> {
    platform: Platform,
    title: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<&'a str>,
    timestamp: String,
}

/// Build the clustering request. Events past `max_events` are left out.
pub fn build_cluster_request(events: &[Event], opts: &ClusterOptions) -> Result<ChatRequest> {
    let view: Vec<PromptEvent<'_>> = events
        .iter()
        .take(opts.max_events)
        .map(|e| PromptEvent {
            platform: e.source,
            title: &e.title,
            description: &e.description,
            url: e.url.as_deref(),
            timestamp: e.timestamp.to_rfc3339(),
        })
        .collect();
    let user = serde_json::to_string(&view).context("serializing events for prompt")?;
    Ok(ChatRequest {
        system: SYSTEM_PROMPT.to_string(),
        user,
        temperature: opts.temperature,
        json_mode: true,
    })
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(raw: &str) -> &str {
    let t = raw.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse and shape-check a clustering reply. All-or-nothing.
pub fn parse_topics(raw: &str) -> Result<Vec<Topic>> {
    let value: serde_json::Value =
        serde_json::from_str(strip_code_fence(raw)).context("reply is not JSON")?;
    let list = match value {
        serde_json::Value::Object(mut map) => map
            .remove("topics")
            .ok_or_else(|| anyhow!("reply object has no \"topics\" field"))?,
        arr @ serde_json::Value::Array(_) => arr,
        other => return Err(anyhow!("unexpected reply shape: {}", type_name(&other))),
    };
    let topics: Vec<Topic> =
        serde_json::from_value(list).context("topics do not match the expected shape")?;
    for (i, t) in topics.iter().enumerate() {
        validate_topic(t, &format!("topics[{i}]"))?;
    }
    Ok(topics)
}

fn type_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Cluster `events` into ranked topics. Empty on empty input or on any failure.
pub async fn cluster_events(
    model: &dyn ChatModel,
    events: &[Event],
    opts: &ClusterOptions,
) -> Vec<Topic> {
    if events.is_empty() {
        return Vec::new();
    }
    if events.len() > opts.max_events {
        tracing::warn!(
            total = events.len(),
            max = opts.max_events,
            "too many events for one prompt, truncating"
        );
    }

    let result = async {
        let req = build_cluster_request(events, opts)?;
        let raw = model.complete(&req).await?;
        parse_topics(&raw)
    }
    .await;

    match result {
        Ok(topics) => {
            let ranked = rank_topics(topics);
            counter!("digest_topics_total").increment(ranked.len() as u64);
            tracing::info!(
                target: "digest",
                provider = model.provider_name(),
                topics = ranked.len(),
                "clustered events"
            );
            ranked
        }
        Err(e) => {
            counter!("digest_cluster_failures_total").increment(1);
            tracing::error!(error = ?e, provider = model.provider_name(), "clustering failed");
            Vec::new()
        }
    }
}
