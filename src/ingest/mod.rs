// src/ingest/mod.rs
pub mod liveness;
pub mod providers;
pub mod types;

use crate::ingest::types::{Event, EventProvider};
use crate::window::Window;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

/// One-time metrics registration (so series show up in the textfile export).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("digest_events_total", "Events returned by providers.");
        describe_counter!(
            "digest_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!(
            "digest_filtered_total",
            "Events dropped as empty or outside the window."
        );
        describe_counter!("digest_dedup_total", "Events removed as duplicates.");
        describe_counter!(
            "digest_liveness_dropped_total",
            "Events dropped because their link did not answer."
        );
        describe_counter!(
            "digest_cluster_failures_total",
            "Clustering requests that failed or returned an invalid shape."
        );
        describe_counter!("digest_topics_total", "Topics produced by clustering.");
        describe_counter!("digest_posts_written_total", "Post artifacts written.");
        describe_histogram!("digest_fetch_ms", "Provider fetch time in milliseconds.");
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    out
}

/// Cut to at most `max` chars (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Absolute http(s) URL check shared by ingest and the post schema.
pub fn is_absolute_http_url(s: &str) -> bool {
    url::Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

/// Normalize, validate and deduplicate a merged event list.
///
/// - titles/descriptions are normalized; empty titles are dropped
/// - malformed URLs are cleared, not fatal
/// - events outside `window` are dropped
/// - duplicates by `(source, url)` (or `(source, title)` without URL) are dropped
///
/// Returns (kept, filtered_count, dedup_count).
pub fn normalize_filter_dedup(
    window: &Window,
    raw_events: Vec<Event>,
) -> (Vec<Event>, usize, usize) {
    let mut filtered_out = 0usize;
    let mut filtered = Vec::with_capacity(raw_events.len());
    for mut ev in raw_events {
        ev.title = normalize_text(&ev.title);
        ev.description = normalize_text(&ev.description);
        if let Some(u) = ev.url.as_deref() {
            if !is_absolute_http_url(u) {
                tracing::debug!(url = u, "dropping malformed event url");
                ev.url = None;
            }
        }
        if ev.title.is_empty() || !window.contains(ev.timestamp) {
            filtered_out += 1;
            continue;
        }
        filtered.push(ev);
    }

    let mut seen: HashSet<(types::Platform, String)> = HashSet::new();
    let mut keep = Vec::with_capacity(filtered.len());
    let mut dedup_out = 0usize;
    for ev in filtered {
        let key = ev.url.clone().unwrap_or_else(|| ev.title.to_lowercase());
        if !seen.insert((ev.source, key)) {
            dedup_out += 1;
            continue;
        }
        keep.push(ev);
    }

    (keep, filtered_out, dedup_out)
}

/// Run every provider concurrently and concatenate their output in provider
/// order. Providers never fail the batch; a broken one contributes nothing.
pub async fn fetch_all(providers: &[Box<dyn EventProvider>], window: &Window) -> Vec<Event> {
    ensure_metrics_described();

    let runs = providers.iter().map(|p| async move {
        let t0 = std::time::Instant::now();
        let events = p.fetch_window(window).await;
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        metrics::histogram!("digest_fetch_ms", "provider" => p.name()).record(ms);
        counter!("digest_events_total", "provider" => p.name()).increment(events.len() as u64);
        tracing::info!(
            target: "digest",
            provider = p.name(),
            events = events.len(),
            ms = ms as u64,
            "provider fetched"
        );
        events
    });

    futures::future::join_all(runs)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Fetch, then normalize/validate/dedup.
pub async fn collect_events(providers: &[Box<dyn EventProvider>], window: &Window) -> Vec<Event> {
    let raw = fetch_all(providers, window).await;
    let (kept, filtered, dedup) = normalize_filter_dedup(window, raw);

    counter!("digest_filtered_total").increment(filtered as u64);
    counter!("digest_dedup_total").increment(dedup as u64);
    tracing::info!(
        target: "digest",
        kept = kept.len(),
        filtered = filtered,
        dedup = dedup,
        "events collected"
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::Platform;
    use crate::window::PostType;
    use chrono::{DateTime, TimeZone, Utc};

    fn window() -> Window {
        Window {
            start: Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap(),
            mark: Utc.with_ymd_and_hms(2026, 3, 10, 14, 0, 0).unwrap(),
            kind: PostType::Midday,
        }
    }

    fn ev(source: Platform, title: &str, url: Option<&str>, ts: DateTime<Utc>) -> Event {
        Event {
            source,
            title: title.into(),
            description: String::new(),
            url: url.map(str::to_string),
            timestamp: ts,
        }
    }

    #[test]
    fn normalize_text_strips_tags_and_ws() {
        let out = normalize_text("  <p>Fix&nbsp;&nbsp;the   <b>parser</b></p>\n ");
        assert_eq!(out, "Fix the parser");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
    }

    #[test]
    fn drops_out_of_window_and_duplicates() {
        let w = window();
        let inside = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(2026, 3, 10, 5, 59, 59).unwrap();
        let raw = vec![
            ev(Platform::Github, "A", Some("https://github.com/o/r/pull/1"), inside),
            ev(Platform::Github, "A again", Some("https://github.com/o/r/pull/1"), inside),
            ev(Platform::Bluesky, "A", Some("https://github.com/o/r/pull/1"), inside),
            ev(Platform::Bluesky, "old", None, before),
            ev(Platform::Bluesky, "   ", None, inside),
        ];
        let (kept, filtered, dedup) = normalize_filter_dedup(&w, raw);
        assert_eq!(kept.len(), 2);
        assert_eq!(filtered, 2);
        assert_eq!(dedup, 1);
    }

    #[test]
    fn malformed_url_is_cleared() {
        let w = window();
        let ts = Utc.with_ymd_and_hms(2026, 3, 10, 9, 0, 0).unwrap();
        let (kept, _, _) =
            normalize_filter_dedup(&w, vec![ev(Platform::Github, "x", Some("not a url"), ts)]);
        assert_eq!(kept[0].url, None);
    }
}
