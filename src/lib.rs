// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod history;
pub mod ingest;
pub mod metrics;
pub mod pipeline;
pub mod post;
pub mod window;

/// `User-Agent` for every outbound HTTP client.
pub(crate) const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// ---- Re-exports for stable public API ----
pub use crate::analyze::{ChatModel, ScriptedChat, Topic, TopicSource};
pub use crate::config::DigestConfig;
pub use crate::ingest::types::{Event, EventProvider, Platform};
pub use crate::pipeline::{Pipeline, RunOutcome, WriteMode};
pub use crate::post::{Post, SchemaViolation};
pub use crate::window::{select_window, PostType, Window, WindowPolicy};
