//! AI adapter: chat-completion seam shared by clustering and headline generation.
//!
//! `OpenAiChat` talks to any OpenAI-compatible `/chat/completions` endpoint.
//! `ScriptedChat` replays canned replies for tests and offline runs.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::LlmConfig;

// ------------------------------------------------------------
// Public surface
// ------------------------------------------------------------

/// One system+user exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the endpoint for a JSON object response.
    pub json_mode: bool,
}

pub type ChatFuture<'a> = Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;

/// Trait object used by the pipeline (and swapped out in tests).
pub trait ChatModel: Send + Sync {
    /// Return the assistant message content.
    fn complete<'a>(&'a self, req: &'a ChatRequest) -> ChatFuture<'a>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynChatModel = Arc<dyn ChatModel>;

// ------------------------------------------------------------
// OpenAI-compatible provider
// ------------------------------------------------------------

pub struct OpenAiChat {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        ensure!(!cfg.api_key.trim().is_empty(), "missing LLM API key");
        ensure!(!cfg.model.trim().is_empty(), "missing LLM model name");
        let http = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building LLM http client")?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", cfg.api_base.trim_end_matches('/')),
            api_key: cfg.api_key.trim().to_string(),
            model: cfg.model.trim().to_string(),
        })
    }

    async fn complete_impl(&self, req: &ChatRequest) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            #[serde(default)]
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &req.system,
                },
                Msg {
                    role: "user",
                    content: &req.user,
                },
            ],
            temperature: req.temperature,
            response_format: req
                .json_mode
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!(
                "chat completion HTTP {status}: {}",
                sanitize_line(&text, 200)
            );
        }

        let parsed: Resp = resp.json().await.context("chat completion json")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow!("chat completion returned no content"))
    }
}

impl ChatModel for OpenAiChat {
    fn complete<'a>(&'a self, req: &'a ChatRequest) -> ChatFuture<'a> {
        Box::pin(self.complete_impl(req))
    }
    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

// ------------------------------------------------------------
// Scripted provider
// ------------------------------------------------------------

/// Replays queued replies in order; `Err` entries simulate provider failures.
/// Records every request it receives.
#[derive(Default)]
pub struct ScriptedChat {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|s| Ok(s.into())).collect()),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .expect("poisoned replies")
            .push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, msg: impl Into<String>) {
        self.replies
            .lock()
            .expect("poisoned replies")
            .push_back(Err(msg.into()));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().expect("poisoned requests").clone()
    }
}

impl ChatModel for ScriptedChat {
    fn complete<'a>(&'a self, req: &'a ChatRequest) -> ChatFuture<'a> {
        self.seen.lock().expect("poisoned requests").push(req.clone());
        let next = self.replies.lock().expect("poisoned replies").pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(s)) => Ok(s),
                Some(Err(e)) => Err(anyhow!(e)),
                None => Err(anyhow!("scripted chat has no replies left")),
            }
        })
    }
    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

// ------------------------------------------------------------
// Sanitization
// ------------------------------------------------------------

/// Single line, collapsed whitespace, at most `max` chars.
pub fn sanitize_line(input: &str, max: usize) -> String {
    let mut out = String::with_capacity(max.min(input.len()));
    let mut prev_space = false;
    let mut count = 0usize;
    for ch in input.chars() {
        let c = if ch.is_whitespace() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
                count += 1;
            }
            prev_space = true;
        } else {
            out.push(c);
            count += 1;
            prev_space = false;
        }
        if count >= max {
            break;
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_line_flattens() {
        assert_eq!(sanitize_line("  a\n\n b\tc  ", 100), "a b c");
        assert_eq!(sanitize_line("abcdef", 3), "abc");
    }

    #[tokio::test]
    async fn scripted_chat_replays_in_order() {
        let chat = ScriptedChat::new(["one"]);
        chat.push_failure("boom");
        let req = ChatRequest {
            system: "s".into(),
            user: "u".into(),
            temperature: 0.0,
            json_mode: false,
        };
        assert_eq!(chat.complete(&req).await.unwrap(), "one");
        assert!(chat.complete(&req).await.is_err());
        assert!(chat.complete(&req).await.is_err());
        assert_eq!(chat.requests().len(), 3);
    }

    #[test]
    fn openai_requires_key() {
        let cfg = LlmConfig {
            api_key: " ".into(),
            ..LlmConfig::default()
        };
        assert!(OpenAiChat::new(&cfg).is_err());
    }
}
