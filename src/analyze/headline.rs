//! Headline generation for the hero topic.
//!
//! Recent headlines go into the prompt as examples to avoid. The topic's own
//! title is the fallback whenever the model fails, answers with nothing, or
//! repeats a recent headline. Brand casing is fixed on whatever comes out.

use anyhow::{Context, Result};
use regex::Regex;
use strsim::normalized_levenshtein;

use crate::analyze::ai_adapter::{sanitize_line, ChatModel, ChatRequest};
use crate::analyze::clustering::Topic;

/// Similarity at or above which a headline counts as a repeat.
pub const NEAR_DUPLICATE_THRESHOLD: f64 = 0.9;
const HEADLINE_MAX_CHARS: usize = 120;

/// Canonicalizes the project name's casing (`opencode` -> `OpenCode`).
#[derive(Debug, Clone)]
pub struct BrandNormalizer {
    pattern: Option<(Regex, String)>,
}

impl BrandNormalizer {
    pub fn new(name: Option<&str>) -> Result<Self> {
        let pattern = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(n)))
                    .context("building brand pattern")?;
                Some((re, n.to_string()))
            }
            None => None,
        };
        Ok(Self { pattern })
    }

    pub fn apply(&self, text: &str) -> String {
        match &self.pattern {
            Some((re, canonical)) => re
                .replace_all(text, regex::NoExpand(canonical.as_str()))
                .into_owned(),
            None => text.to_string(),
        }
    }
}

/// Strip labels, quotes and trailing periods; flatten to one line.
pub fn clean_headline(raw: &str) -> String {
    let mut s = sanitize_line(raw, HEADLINE_MAX_CHARS);
    for label in ["Headline:", "Title:"] {
        if s.get(..label.len()).is_some_and(|h| h.eq_ignore_ascii_case(label)) {
            s = s[label.len()..].trim().to_string();
        }
    }
    let s = s.trim_matches(|c: char| matches!(c, '"' | '\'' | '*' | '`' | '\u{201C}' | '\u{201D}'));
    s.trim().trim_end_matches('.').trim().to_string()
}

/// True when `candidate` is (almost) one of `prior`.
pub fn is_near_duplicate(candidate: &str, prior: &[String]) -> bool {
    let c = candidate.to_lowercase();
    prior
        .iter()
        .any(|p| normalized_levenshtein(&c, &p.to_lowercase()) >= NEAR_DUPLICATE_THRESHOLD)
}

pub fn build_headline_request(topic: &Topic, prior: &[String], temperature: f32) -> ChatRequest {
    let mut system = String::from(
        "You write headlines for a software project's activity digest. \
         Reply with a single headline of 5 to 7 words. \
         No quotes, no trailing period, no emojis.",
    );
    if !prior.is_empty() {
        system.push_str(" Do not reuse the wording or structure of these recent headlines:");
        for p in prior {
            system.push_str("\n- ");
            system.push_str(p);
        }
    }
    ChatRequest {
        system,
        user: format!("Topic: {}\nSummary: {}", topic.title, topic.summary),
        temperature,
        json_mode: false,
    }
}

/// Generate a headline for `topic`. Never fails.
pub async fn generate_headline(
    model: &dyn ChatModel,
    topic: &Topic,
    prior: &[String],
    temperature: f32,
    brand: &BrandNormalizer,
) -> String {
    let req = build_headline_request(topic, prior, temperature);
    let generated = match model.complete(&req).await {
        Ok(raw) => {
            let h = clean_headline(&raw);
            if h.is_empty() {
                tracing::warn!("headline model returned nothing usable");
                None
            } else if is_near_duplicate(&h, prior) {
                tracing::warn!(headline = %h, "headline repeats a recent one");
                None
            } else {
                Some(h)
            }
        }
        Err(e) => {
            tracing::warn!(error = ?e, provider = model.provider_name(), "headline request failed");
            None
        }
    };

    let headline = generated.unwrap_or_else(|| topic.title.clone());
    brand.apply(&headline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brand_casing_is_canonicalized_on_word_boundaries() {
        let b = BrandNormalizer::new(Some("OpenCode")).unwrap();
        assert_eq!(
            b.apply("opencode ships faster OPENCODE builds"),
            "OpenCode ships faster OpenCode builds"
        );
        assert_eq!(b.apply("myopencodex"), "myopencodex");
    }

    #[test]
    fn no_brand_is_identity() {
        let b = BrandNormalizer::new(None).unwrap();
        assert_eq!(b.apply("anything Goes"), "anything Goes");
    }

    #[test]
    fn clean_headline_strips_noise() {
        assert_eq!(clean_headline("\"Parser Gets Faster Today.\"\n"), "Parser Gets Faster Today");
        assert_eq!(clean_headline("Title: New CLI Lands"), "New CLI Lands");
        assert_eq!(clean_headline("   "), "");
    }

    #[test]
    fn near_duplicates_are_detected() {
        let prior = vec!["Parser Gets Much Faster".to_string()];
        assert!(is_near_duplicate("parser gets much faster", &prior));
        assert!(!is_near_duplicate("Plugin API Finally Stabilizes", &prior));
    }
}
