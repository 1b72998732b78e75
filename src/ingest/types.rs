// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::window::Window;

/// Platform an event (or a topic source) came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Bluesky,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Bluesky => "bluesky",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    pub source: Platform,
    pub title: String,
    pub description: String,
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// A source of activity for one window. Implementations swallow their own
/// transport errors (log + empty list); a failing source never aborts siblings.
#[async_trait::async_trait]
pub trait EventProvider: Send + Sync {
    async fn fetch_window(&self, window: &Window) -> Vec<Event>;
    fn name(&self) -> &'static str;
}
