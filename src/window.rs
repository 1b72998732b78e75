//! Time-window selection: which publication slot a run belongs to, and which
//! slice of activity it should query.
//!
//! A run looks at the slot marks of the previous, current and next UTC day.
//! The nearest *future* mark is claimed only while it is still comfortably
//! ahead of `now` (`mark - now + trigger_skew < snap_threshold`); otherwise the
//! nearest past mark wins. The window is `[mark - lookback, mark]`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of post a slot produces. Serialized lowercase into the artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostType {
    Daily,
    Midday,
    Nightly,
}

impl PostType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Midday => "midday",
            Self::Nightly => "nightly",
        }
    }
}

impl fmt::Display for PostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One publication slot: a fixed UTC time of day and the post type it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub at: NaiveTime,
    pub kind: PostType,
}

impl Slot {
    pub fn new(hour: u32, minute: u32, kind: PostType) -> Result<Self> {
        let at = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("invalid slot time {hour:02}:{minute:02}"))?;
        Ok(Self { at, kind })
    }

    /// Parse `"HH:MM"`.
    pub fn parse(at: &str, kind: PostType) -> Result<Self> {
        let at = NaiveTime::parse_from_str(at.trim(), "%H:%M")
            .with_context(|| format!("slot time {at:?} is not HH:MM"))?;
        Ok(Self { at, kind })
    }
}

/// Schedule policy. Built from `[schedule]` in the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPolicy {
    pub slots: Vec<Slot>,
    pub lookback: Duration,
    pub snap_threshold: Duration,
    pub trigger_skew: Duration,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        let slot = |h, kind| Slot {
            at: NaiveTime::from_hms_opt(h, 0, 0).unwrap_or_default(),
            kind,
        };
        Self {
            slots: vec![
                slot(6, PostType::Daily),
                slot(14, PostType::Midday),
                slot(22, PostType::Nightly),
            ],
            lookback: Duration::hours(8),
            snap_threshold: Duration::hours(2),
            trigger_skew: Duration::hours(1),
        }
    }
}

/// The selected query window and the slot it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// The mark that was selected; equal to `end`.
    pub mark: DateTime<Utc>,
    pub kind: PostType,
}

impl Window {
    /// Inclusive on both ends.
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

/// Build every candidate mark for yesterday, today and tomorrow, sorted.
fn candidate_marks(now: DateTime<Utc>, slots: &[Slot]) -> Vec<DateTime<Utc>> {
    let today = now.date_naive();
    let mut marks: Vec<DateTime<Utc>> = [-1i64, 0, 1]
        .iter()
        .filter_map(|off| today.checked_add_signed(Duration::days(*off)))
        .flat_map(|day| {
            slots
                .iter()
                .map(move |s| Utc.from_utc_datetime(&day.and_time(s.at)))
        })
        .collect();
    marks.sort();
    marks.dedup();
    marks
}

/// Pick the mark for `now` under `policy`.
pub fn select_mark(now: DateTime<Utc>, policy: &WindowPolicy) -> Result<DateTime<Utc>> {
    let marks = candidate_marks(now, &policy.slots);
    if marks.is_empty() {
        bail!("no candidate marks: schedule has no slots");
    }

    let effective_snap = policy
        .snap_threshold
        .checked_sub(&policy.trigger_skew)
        .ok_or_else(|| anyhow!("snap threshold minus trigger skew overflows"))?;
    if let Some(next) = marks.iter().copied().find(|m| *m > now) {
        if next - now < effective_snap {
            return Ok(next);
        }
    }

    marks
        .iter()
        .copied()
        .filter(|m| *m <= now)
        .max()
        .ok_or_else(|| anyhow!("no past mark found for {now}"))
}

/// Map a mark hour to a post type. Each slot's bucket opens one hour before
/// the slot, so a run fired slightly early still lands in the right bucket.
pub fn post_type_for_hour(hour: u32, slots: &[Slot]) -> Option<PostType> {
    let mut starts: Vec<(u32, PostType)> = slots
        .iter()
        .map(|s| ((s.at.hour() + 23) % 24, s.kind))
        .collect();
    starts.sort_by_key(|(h, _)| *h);

    starts
        .iter()
        .rev()
        .find(|(start, _)| *start <= hour)
        .or_else(|| starts.last())
        .map(|(_, kind)| *kind)
}

/// Select the window for a run at `now`.
pub fn select_window(now: DateTime<Utc>, policy: &WindowPolicy) -> Result<Window> {
    let mark = select_mark(now, policy)?;
    let kind = post_type_for_hour(mark.hour(), &policy.slots)
        .ok_or_else(|| anyhow!("no post type bucket for hour {}", mark.hour()))?;

    let start = mark
        .checked_sub_signed(policy.lookback)
        .ok_or_else(|| anyhow!("lookback {} is out of range", policy.lookback))?;
    let window = Window {
        start,
        end: mark,
        mark,
        kind,
    };
    tracing::info!(
        target: "digest",
        start = %window.start,
        end = %window.end,
        kind = %window.kind,
        "selected activity window"
    );
    Ok(window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn snaps_to_future_mark_when_close() {
        let w = select_window(at("2026-03-10T05:15:00Z"), &WindowPolicy::default()).unwrap();
        assert_eq!(w.mark, at("2026-03-10T06:00:00Z"));
        assert_eq!(w.start, at("2026-03-09T22:00:00Z"));
        assert_eq!(w.kind, PostType::Daily);
    }

    #[test]
    fn falls_back_to_previous_day_mark() {
        let w = select_window(at("2026-03-10T05:00:00Z"), &WindowPolicy::default()).unwrap();
        assert_eq!(w.mark, at("2026-03-09T22:00:00Z"));
        assert_eq!(w.kind, PostType::Nightly);
    }

    #[test]
    fn exact_mark_is_selected_as_past() {
        let w = select_window(at("2026-03-10T14:00:00Z"), &WindowPolicy::default()).unwrap();
        assert_eq!(w.mark, at("2026-03-10T14:00:00Z"));
        assert_eq!(w.kind, PostType::Midday);
    }

    #[test]
    fn buckets_open_one_hour_early() {
        let slots = WindowPolicy::default().slots;
        assert_eq!(post_type_for_hour(4, &slots), Some(PostType::Nightly));
        assert_eq!(post_type_for_hour(5, &slots), Some(PostType::Daily));
        assert_eq!(post_type_for_hour(12, &slots), Some(PostType::Daily));
        assert_eq!(post_type_for_hour(13, &slots), Some(PostType::Midday));
        assert_eq!(post_type_for_hour(21, &slots), Some(PostType::Nightly));
        assert_eq!(post_type_for_hour(23, &slots), Some(PostType::Nightly));
    }

    #[test]
    fn empty_schedule_is_an_error() {
        let policy = WindowPolicy {
            slots: vec![],
            ..WindowPolicy::default()
        };
        assert!(select_window(at("2026-03-10T05:00:00Z"), &policy).is_err());
    }

    #[test]
    fn oversized_lookback_is_an_error() {
        let policy = WindowPolicy {
            lookback: Duration::try_days(200_000_000).unwrap(),
            ..WindowPolicy::default()
        };
        assert!(select_window(at("2026-03-10T14:00:00Z"), &policy).is_err());
    }

    #[test]
    fn slot_parse_rejects_garbage() {
        assert!(Slot::parse("25:00", PostType::Daily).is_err());
        assert!(Slot::parse("noon", PostType::Daily).is_err());
        let s = Slot::parse(" 06:30 ", PostType::Daily).unwrap();
        assert_eq!(s.at, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
    }
}
