use anyhow::{Context, Result};
use metrics::gauge;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::path::Path;

/// Prometheus recorder for a single batch run. The job is short-lived, so
/// instead of serving `/metrics` it dumps the exposition text to a file at exit
/// (node-exporter textfile style).
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the global recorder. Call once, before the pipeline runs.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        Ok(Self { handle })
    }

    /// Stamp the run time and write the rendered metrics to `path`.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        gauge!("digest_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.handle.render())
            .with_context(|| format!("writing metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("moving metrics into {}", path.display()))?;
        Ok(())
    }
}
