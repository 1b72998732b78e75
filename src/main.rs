//! Digest job entrypoint: one generation cycle per invocation.
//! Meant to be fired by cron / a CI schedule shortly before each slot.

use std::path::PathBuf;

use activity_digest::metrics::Metrics;
use activity_digest::{DigestConfig, Pipeline, RunOutcome, WriteMode};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "activity-digest", version, about = "Generate one activity digest post")]
struct Cli {
    /// Config file (TOML). Defaults to $DIGEST_CONFIG_PATH, then config/digest.toml.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Pretend the current time is this RFC 3339 instant.
    #[arg(long, value_parser = parse_now)]
    now: Option<DateTime<Utc>>,

    /// Override `output.dir`.
    #[arg(long, env = "DIGEST_OUT_DIR")]
    out_dir: Option<PathBuf>,

    /// Print the post JSON instead of writing it.
    #[arg(long)]
    dry_run: bool,

    /// Emit JSON log lines.
    #[arg(long, env = "DIGEST_LOG_JSON")]
    log_json: bool,

    /// Write Prometheus text metrics here when the run ends.
    #[arg(long, env = "DIGEST_METRICS_OUT")]
    metrics_out: Option<PathBuf>,
}

fn parse_now(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("expected RFC 3339 timestamp: {e}"))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("activity_digest=info,digest=info,warn"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn load_config(cli: &Cli) -> Result<DigestConfig> {
    let mut cfg = match &cli.config {
        Some(p) => DigestConfig::load_from_file(p)?,
        None => DigestConfig::load_default()?,
    };
    if let Some(dir) = &cli.out_dir {
        cfg.output.dir = dir.clone();
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let metrics = match &cli.metrics_out {
        Some(_) => Some(Metrics::install()?),
        None => None,
    };

    // Missing credentials fail here, before any network activity.
    let cfg = load_config(&cli).context("loading configuration")?;
    let pipeline = Pipeline::from_config(cfg)?;

    let now = cli.now.unwrap_or_else(Utc::now);
    let mode = if cli.dry_run {
        WriteMode::DryRun
    } else {
        WriteMode::Write
    };
    let outcome = pipeline.run(now, &mut rand::rng(), mode).await;

    if let (Some(m), Some(path)) = (&metrics, &cli.metrics_out) {
        if let Err(e) = m.write_textfile(path) {
            tracing::warn!(error = ?e, "could not write metrics");
        }
    }

    match outcome? {
        RunOutcome::Published { post, path } => match path {
            Some(p) => tracing::info!(path = %p.display(), "post written"),
            None => print!("{}", post.to_json()?),
        },
        RunOutcome::NothingToPublish { window, reason } => {
            tracing::info!(
                start = %window.start,
                end = %window.end,
                reason,
                "nothing to publish"
            );
        }
    }
    Ok(())
}
