//! Post artifact: assembly, schema validation, and the atomic write.
//!
//! One JSON file per generation cycle, `<YYYY-MM-DD>-<type>.json`. Field order
//! is fixed by the struct definitions, so identical inputs serialize to
//! identical bytes.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::clustering::{Topic, MAX_SCORE, MIN_SCORE};
use crate::ingest::is_absolute_http_url;
use crate::window::PostType;

/// A field that breaks the post schema. `path` is JSON-ish, e.g. `topics[1].sources[0].url`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("schema violation at {path}: {reason}")]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Shape check shared by the clustering reply and the final post.
pub fn validate_topic(t: &Topic, path: &str) -> Result<(), SchemaViolation> {
    if t.title.trim().is_empty() {
        return Err(SchemaViolation::new(format!("{path}.title"), "empty"));
    }
    if t.summary.trim().is_empty() {
        return Err(SchemaViolation::new(format!("{path}.summary"), "empty"));
    }
    if !t.relevance_score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&t.relevance_score) {
        return Err(SchemaViolation::new(
            format!("{path}.relevanceScore"),
            format!("{} is outside {MIN_SCORE}..={MAX_SCORE}", t.relevance_score),
        ));
    }
    if t.sources.is_empty() {
        return Err(SchemaViolation::new(format!("{path}.sources"), "no sources"));
    }
    for (j, s) in t.sources.iter().enumerate() {
        if !is_absolute_http_url(&s.url) {
            return Err(SchemaViolation::new(
                format!("{path}.sources[{j}].url"),
                format!("malformed URL {:?}", s.url),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub title: String,
    pub date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: PostType,
    pub topics: Vec<Topic>,
}

impl Post {
    /// Build and validate in one step.
    pub fn assemble(
        title: impl Into<String>,
        date: DateTime<Utc>,
        kind: PostType,
        topics: Vec<Topic>,
    ) -> Result<Self, SchemaViolation> {
        let post = Self {
            title: title.into(),
            date,
            kind,
            topics,
        };
        post.validate()?;
        Ok(post)
    }

    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if self.title.trim().is_empty() {
            return Err(SchemaViolation::new("title", "empty"));
        }
        for (i, t) in self.topics.iter().enumerate() {
            validate_topic(t, &format!("topics[{i}]"))?;
        }
        Ok(())
    }

    /// `YYYY-MM-DD-<type>`.
    pub fn slug(&self) -> String {
        format!("{}-{}", self.date.format("%Y-%m-%d"), self.kind)
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.slug())
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut s = serde_json::to_string_pretty(self).context("serializing post")?;
        s.push('\n');
        Ok(s)
    }

    /// Validate, then write atomically into `dir`. Re-running a slot overwrites.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        self.validate()?;
        fs::create_dir_all(dir)
            .with_context(|| format!("creating output dir {}", dir.display()))?;

        let path = dir.join(self.file_name());
        let tmp = path.with_extension("json.tmp");
        let json = self.to_json()?;

        let write = || -> std::io::Result<()> {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(json.as_bytes())?;
            f.sync_all()?;
            fs::rename(&tmp, &path)
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("writing post to {}", path.display()));
        }

        metrics::counter!("digest_posts_written_total").increment(1);
        Ok(path)
    }
}
