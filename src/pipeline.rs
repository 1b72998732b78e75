//! One generation cycle:
//! window → fetch (parallel) → liveness → cluster → hero pick → headline → post.
//!
//! Upstream failures degrade to "nothing to publish". Only configuration and
//! the final artifact (schema/write) can fail the run.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rand::Rng;

use crate::analyze::ai_adapter::{DynChatModel, OpenAiChat};
use crate::analyze::clustering::{cluster_events, ClusterOptions, Topic};
use crate::analyze::headline::{generate_headline, BrandNormalizer};
use crate::analyze::weights::pick_weighted;
use crate::config::DigestConfig;
use crate::history;
use crate::ingest::liveness::LinkChecker;
use crate::ingest::providers::{BlueskyProvider, GithubProvider};
use crate::ingest::types::EventProvider;
use crate::ingest::{collect_events, ensure_metrics_described};
use crate::post::Post;
use crate::window::{select_window, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Write,
    DryRun,
}

#[derive(Debug)]
pub enum RunOutcome {
    /// `path` is `None` on a dry run.
    Published { post: Post, path: Option<PathBuf> },
    NothingToPublish { window: Window, reason: &'static str },
}

pub struct Pipeline {
    cfg: DigestConfig,
    providers: Vec<Box<dyn EventProvider>>,
    checker: Option<LinkChecker>,
    model: DynChatModel,
    brand: BrandNormalizer,
}

impl Pipeline {
    /// Production wiring from a validated config.
    pub fn from_config(cfg: DigestConfig) -> Result<Self> {
        cfg.validate()?;
        let mut providers: Vec<Box<dyn EventProvider>> =
            vec![Box::new(GithubProvider::new(&cfg.github)?)];
        if cfg.bluesky.enabled {
            providers.push(Box::new(BlueskyProvider::new(&cfg.bluesky)?));
        }
        let model: DynChatModel = std::sync::Arc::new(OpenAiChat::new(&cfg.llm)?);
        Self::with_parts(cfg, providers, model)
    }

    /// Wiring with caller-supplied providers and model (tests, alternate backends).
    pub fn with_parts(
        cfg: DigestConfig,
        providers: Vec<Box<dyn EventProvider>>,
        model: DynChatModel,
    ) -> Result<Self> {
        let checker = if cfg.liveness.enabled {
            Some(LinkChecker::new(&cfg.liveness)?)
        } else {
            None
        };
        let brand = BrandNormalizer::new(cfg.brand.name.as_deref())?;
        Ok(Self {
            cfg,
            providers,
            checker,
            model,
            brand,
        })
    }

    pub fn config(&self) -> &DigestConfig {
        &self.cfg
    }

    fn normalize_topic_brand(&self, mut topics: Vec<Topic>) -> Vec<Topic> {
        for t in topics.iter_mut() {
            t.title = self.brand.apply(&t.title);
            t.summary = self.brand.apply(&t.summary);
        }
        topics
    }

    pub async fn run<R: Rng>(
        &self,
        now: DateTime<Utc>,
        rng: &mut R,
        mode: WriteMode,
    ) -> Result<RunOutcome> {
        ensure_metrics_described();

        let policy = self.cfg.schedule.policy()?;
        let window = select_window(now, &policy).context("selecting window")?;

        let mut events = collect_events(&self.providers, &window).await;
        if let Some(checker) = &self.checker {
            events = checker.retain_live(events).await;
        }
        if events.is_empty() {
            tracing::info!(target: "digest", "no events in window, nothing to publish");
            return Ok(RunOutcome::NothingToPublish {
                window,
                reason: "no events in window",
            });
        }

        let opts = ClusterOptions {
            temperature: self.cfg.llm.cluster_temperature,
            max_events: self.cfg.llm.max_events,
        };
        let topics = cluster_events(self.model.as_ref(), &events, &opts).await;
        if topics.is_empty() {
            tracing::info!(target: "digest", "clustering produced no topics, nothing to publish");
            return Ok(RunOutcome::NothingToPublish {
                window,
                reason: "clustering produced no topics",
            });
        }
        let topics = self.normalize_topic_brand(topics);

        let Some(hero) = pick_weighted(&topics, rng) else {
            return Ok(RunOutcome::NothingToPublish {
                window,
                reason: "clustering produced no topics",
            });
        };
        let prior = history::recent_titles(&self.cfg.output.dir, self.cfg.output.recent_titles);
        let title = generate_headline(
            self.model.as_ref(),
            hero,
            &prior,
            self.cfg.llm.title_temperature,
            &self.brand,
        )
        .await;

        let post = Post::assemble(title, window.mark, window.kind, topics)
            .context("assembled post is invalid")?;

        let path = match mode {
            WriteMode::DryRun => None,
            WriteMode::Write => Some(post.write_to_dir(&self.cfg.output.dir)?),
        };
        tracing::info!(
            target: "digest",
            outcome = "success",
            slug = %post.slug(),
            topics = post.topics.len(),
            title = %post.title,
            "digest generated"
        );
        Ok(RunOutcome::Published { post, path })
    }
}
