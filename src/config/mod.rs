// src/config/mod.rs
//! Run configuration, loaded once at startup and passed into every component.
//!
//! Lookup order for the file: `$DIGEST_CONFIG_PATH`, then `config/digest.toml`,
//! then built-in defaults. Secrets set to `"ENV"` (the default) or left empty
//! are read from `GITHUB_TOKEN` / `OPENAI_API_KEY`.

use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::{Duration, Timelike};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashSet,
    env, fs,
    path::{Path, PathBuf},
};

use crate::window::{PostType, Slot, WindowPolicy};

pub const ENV_CONFIG_PATH: &str = "DIGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/digest.toml";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

const ENV_SENTINEL: &str = "ENV";

/// Upper bound for `schedule.lookback_hours` (one week).
pub const MAX_LOOKBACK_HOURS: i64 = 7 * 24;
/// Upper bound for `schedule.snap_threshold_minutes` (one day).
pub const MAX_SNAP_THRESHOLD_MINUTES: i64 = 24 * 60;

fn env_sentinel() -> String {
    ENV_SENTINEL.to_string()
}
fn default_true() -> bool {
    true
}
fn default_http_timeout() -> u64 {
    15
}

// ---------------------------------------------------------------------------
// [schedule]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotConfig {
    /// "HH:MM", UTC.
    pub at: String,
    pub kind: PostType,
}

fn default_slots() -> Vec<SlotConfig> {
    [
        ("06:00", PostType::Daily),
        ("14:00", PostType::Midday),
        ("22:00", PostType::Nightly),
    ]
    .into_iter()
    .map(|(at, kind)| SlotConfig {
        at: at.to_string(),
        kind,
    })
    .collect()
}
fn default_lookback_hours() -> i64 {
    8
}
fn default_snap_threshold_minutes() -> i64 {
    120
}
fn default_trigger_skew_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
    #[serde(default = "default_snap_threshold_minutes")]
    pub snap_threshold_minutes: i64,
    #[serde(default = "default_trigger_skew_minutes")]
    pub trigger_skew_minutes: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            slots: default_slots(),
            lookback_hours: default_lookback_hours(),
            snap_threshold_minutes: default_snap_threshold_minutes(),
            trigger_skew_minutes: default_trigger_skew_minutes(),
        }
    }
}

impl ScheduleConfig {
    /// Checked conversion into a `WindowPolicy`.
    ///
    /// Post types are bucketed by the hour of their slot, so two slots in the
    /// same hour are rejected.
    pub fn policy(&self) -> Result<WindowPolicy> {
        ensure!(
            (1..=MAX_LOOKBACK_HOURS).contains(&self.lookback_hours),
            "schedule.lookback_hours must be within 1..={MAX_LOOKBACK_HOURS}, got {}",
            self.lookback_hours
        );
        ensure!(
            (1..=MAX_SNAP_THRESHOLD_MINUTES).contains(&self.snap_threshold_minutes),
            "schedule.snap_threshold_minutes must be within 1..={MAX_SNAP_THRESHOLD_MINUTES}, got {}",
            self.snap_threshold_minutes
        );
        ensure!(
            self.trigger_skew_minutes >= 0
                && self.trigger_skew_minutes < self.snap_threshold_minutes,
            "schedule.trigger_skew_minutes must be >= 0 and below snap_threshold_minutes, got {}",
            self.trigger_skew_minutes
        );

        let slots = self
            .slots
            .iter()
            .map(|s| Slot::parse(&s.at, s.kind))
            .collect::<Result<Vec<_>>>()?;
        let mut hours = HashSet::new();
        for s in &slots {
            ensure!(
                hours.insert(s.at.hour()),
                "schedule.slots has more than one slot in hour {:02}",
                s.at.hour()
            );
        }

        let lookback = Duration::try_hours(self.lookback_hours)
            .ok_or_else(|| anyhow!("schedule.lookback_hours out of range"))?;
        let snap_threshold = Duration::try_minutes(self.snap_threshold_minutes)
            .ok_or_else(|| anyhow!("schedule.snap_threshold_minutes out of range"))?;
        let trigger_skew = Duration::try_minutes(self.trigger_skew_minutes)
            .ok_or_else(|| anyhow!("schedule.trigger_skew_minutes out of range"))?;
        Ok(WindowPolicy {
            slots,
            lookback,
            snap_threshold,
            trigger_skew,
        })
    }
}

// ---------------------------------------------------------------------------
// [github]
// ---------------------------------------------------------------------------

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    /// "ENV" means: read from GITHUB_TOKEN.
    #[serde(default = "env_sentinel")]
    pub token: String,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            token: env_sentinel(),
            api_base: default_github_api(),
            timeout_secs: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// [bluesky]
// ---------------------------------------------------------------------------

fn default_bluesky_api() -> String {
    "https://public.api.bsky.app/xrpc".to_string()
}
fn default_page_limit() -> u32 {
    50
}
fn default_max_pages() -> u32 {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueskyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub handle: String,
    #[serde(default = "default_bluesky_api")]
    pub api_base: String,
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for BlueskyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            handle: String::new(),
            api_base: default_bluesky_api(),
            page_limit: default_page_limit(),
            max_pages: default_max_pages(),
            timeout_secs: default_http_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// [liveness]
// ---------------------------------------------------------------------------

fn default_check_timeout() -> u64 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivenessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_check_timeout")]
    pub timeout_secs: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_check_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// [llm]
// ---------------------------------------------------------------------------

fn default_llm_api() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_cluster_temperature() -> f32 {
    0.3
}
fn default_title_temperature() -> f32 {
    0.7
}
fn default_llm_timeout() -> u64 {
    60
}
fn default_max_events() -> usize {
    150
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_api")]
    pub api_base: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    #[serde(default = "env_sentinel")]
    pub api_key: String,
    #[serde(default = "default_cluster_temperature")]
    pub cluster_temperature: f32,
    #[serde(default = "default_title_temperature")]
    pub title_temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Events beyond this are not sent to the model.
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api(),
            model: default_model(),
            api_key: env_sentinel(),
            cluster_temperature: default_cluster_temperature(),
            title_temperature: default_title_temperature(),
            timeout_secs: default_llm_timeout(),
            max_events: default_max_events(),
        }
    }
}

// ---------------------------------------------------------------------------
// [output] / [brand]
// ---------------------------------------------------------------------------

fn default_output_dir() -> PathBuf {
    PathBuf::from("content/digest")
}
fn default_recent_titles() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
    /// How many prior headlines are shown to the title model as "avoid these".
    #[serde(default = "default_recent_titles")]
    pub recent_titles: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            recent_titles: default_recent_titles(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandConfig {
    /// Canonical spelling of the project name, e.g. "OpenCode".
    #[serde(default)]
    pub name: Option<String>,
}

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestConfig {
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub bluesky: BlueskyConfig,
    #[serde(default)]
    pub liveness: LivenessConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub brand: BrandConfig,
}

impl DigestConfig {
    /// Parse TOML without touching the environment.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("parsing digest config")
    }

    /// Read, resolve secrets, validate.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&data)?;
        cfg.resolve_secrets()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// $DIGEST_CONFIG_PATH, then config/digest.toml, then defaults.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path");
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        tracing::warn!("no config file found, using built-in defaults");
        let mut cfg = Self::default();
        cfg.resolve_secrets()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Replace "ENV"/empty secrets with their environment variables.
    pub fn resolve_secrets(&mut self) -> Result<()> {
        self.github.token = resolve_secret(&self.github.token, ENV_GITHUB_TOKEN)?;
        self.llm.api_key = resolve_secret(&self.llm.api_key, ENV_OPENAI_API_KEY)?;
        Ok(())
    }

    /// Fail fast on anything that would only blow up mid-run.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.github.owner.trim().is_empty() && !self.github.repo.trim().is_empty(),
            "github.owner and github.repo are required"
        );
        ensure!(
            !self.bluesky.enabled || !self.bluesky.handle.trim().is_empty(),
            "bluesky.handle is required when bluesky is enabled"
        );
        ensure!(
            !is_unresolved(&self.github.token),
            "github.token is missing (set {ENV_GITHUB_TOKEN})"
        );
        ensure!(
            !is_unresolved(&self.llm.api_key),
            "llm.api_key is missing (set {ENV_OPENAI_API_KEY})"
        );
        ensure!(
            !self.schedule.slots.is_empty(),
            "schedule.slots must not be empty"
        );
        self.schedule.policy().context("invalid schedule")?;
        ensure!(
            (0.0..=2.0).contains(&self.llm.cluster_temperature)
                && (0.0..=2.0).contains(&self.llm.title_temperature),
            "llm temperatures must be within 0.0..=2.0"
        );
        ensure!(!self.llm.model.trim().is_empty(), "llm.model is required");
        Ok(())
    }
}

/// Empty, or still the `"ENV"` placeholder.
fn is_unresolved(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case(ENV_SENTINEL)
}

fn resolve_secret(value: &str, var: &str) -> Result<String> {
    let v = value.trim();
    if is_unresolved(v) {
        let from_env = env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
        if from_env.trim().is_empty() {
            bail!("{var} is set but empty");
        }
        return Ok(from_env.trim().to_string());
    }
    Ok(v.to_string())
}
