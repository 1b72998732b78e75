// src/analyze/mod.rs
//! Model-driven stages: clustering, re-ranking, hero pick, headline.

pub mod ai_adapter;
pub mod clustering;
pub mod headline;
pub mod rerank;
pub mod weights;

// Re-export convenient types.
pub use crate::analyze::ai_adapter::{
    ChatModel, ChatRequest, DynChatModel, OpenAiChat, ScriptedChat,
};
pub use crate::analyze::clustering::{cluster_events, ClusterOptions, Topic, TopicSource};
pub use crate::analyze::headline::{generate_headline, BrandNormalizer};
pub use crate::analyze::rerank::rank_topics;
pub use crate::analyze::weights::pick_weighted;
