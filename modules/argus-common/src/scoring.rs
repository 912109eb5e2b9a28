//! Magnitude and confidence scoring for enriched events.
//!
//! Both scorers are pure so the lifecycle manager can recompute them for
//! novel-facts spawns without another model call.

use chrono::{DateTime, Utc};

use crate::types::{Confidence, ConfidenceLevel, EventCategory, Source, SourceType};

/// Weight of each confidence component. Must sum to 1.0.
const W_CREDIBILITY: f64 = 0.30;
const W_SOURCE_TYPE: f64 = 0.20;
const W_ENTITY_CONFIDENCE: f64 = 0.15;
const W_CONTENT_QUALITY: f64 = 0.15;
const W_RECENCY: f64 = 0.10;
const W_METADATA: f64 = 0.10;

/// Phrases that indicate an urgent, still-unfolding report.
const URGENCY_CUES: &[&str] = &[
    "breaking",
    "urgent",
    "emergency",
    "just in",
    "developing",
    "immediate",
];

/// Phrases that indicate scope beyond a single locality.
const SCOPE_CUES: &[&str] = &[
    "nationwide",
    "international",
    "global",
    "worldwide",
    "mass ",
    "large-scale",
    "region-wide",
];

/// Base magnitude by category, before modifiers.
fn category_base(category: EventCategory) -> f64 {
    match category {
        EventCategory::Terrorism => 7.0,
        EventCategory::Military => 6.0,
        EventCategory::Disaster => 6.0,
        EventCategory::Geopolitics => 5.0,
        EventCategory::Cyber => 5.0,
        EventCategory::Intelligence => 5.0,
        EventCategory::Humanitarian => 5.0,
        EventCategory::Diplomacy => 4.0,
        EventCategory::Economic => 4.0,
        EventCategory::Other => 3.0,
    }
}

/// Compute an event's magnitude: category base plus modifiers for entity
/// count, urgency cues, and scope indicators. Clamped to [0, 10].
pub fn compute_magnitude(category: EventCategory, entity_count: usize, text: &str) -> f64 {
    let mut magnitude = category_base(category);

    // More named entities generally means a better-sourced, wider event
    magnitude += (entity_count as f64 * 0.2).min(1.0);

    let lowered = text.to_lowercase();
    if URGENCY_CUES.iter().any(|cue| lowered.contains(cue)) {
        magnitude += 1.0;
    }
    if SCOPE_CUES.iter().any(|cue| lowered.contains(cue)) {
        magnitude += 0.5;
    }

    magnitude.clamp(0.0, 10.0)
}

fn source_type_score(source_type: SourceType) -> f64 {
    match source_type {
        SourceType::Government => 0.9,
        SourceType::NewsMedia => 0.8,
        SourceType::Blog => 0.5,
        SourceType::Other => 0.5,
        SourceType::Twitter => 0.4,
        SourceType::Telegram => 0.35,
    }
}

fn content_quality_score(raw_content: &str) -> f64 {
    match raw_content.len() {
        0..=19 => 0.1,
        20..=99 => 0.3,
        100..=299 => 0.5,
        300..=799 => 0.7,
        800..=1999 => 0.85,
        _ => 1.0,
    }
}

fn recency_score(published_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_hours = (now - published_at).num_hours();
    if age_hours <= 6 {
        1.0
    } else if age_hours <= 24 {
        0.8
    } else if age_hours <= 72 {
        0.6
    } else if age_hours <= 24 * 7 {
        0.4
    } else {
        0.2
    }
}

fn metadata_richness_score(source: &Source) -> f64 {
    let mut present = 0u32;
    if source.author.as_deref().is_some_and(|a| !a.is_empty()) {
        present += 1;
    }
    if !source.title.is_empty() {
        present += 1;
    }
    if source
        .metadata
        .as_object()
        .is_some_and(|m| !m.is_empty())
    {
        present += 1;
    }
    present as f64 / 3.0
}

/// Compute event confidence from a single source: a weighted combination of
/// source credibility, source type, mean entity confidence, content quality,
/// recency, and metadata richness. Clamped to [0, 1].
pub fn compute_confidence(
    source: &Source,
    mean_entity_confidence: f64,
    now: DateTime<Utc>,
) -> Confidence {
    let credibility = source.credibility.clamp(0.0, 1.0);
    let type_score = source_type_score(source.source_type);
    let entity_score = mean_entity_confidence.clamp(0.0, 1.0);
    let quality = content_quality_score(&source.raw_content);
    let recency = recency_score(source.published_at, now);
    let metadata = metadata_richness_score(source);

    let score = (credibility * W_CREDIBILITY
        + type_score * W_SOURCE_TYPE
        + entity_score * W_ENTITY_CONFIDENCE
        + quality * W_CONTENT_QUALITY
        + recency * W_RECENCY
        + metadata * W_METADATA)
        .clamp(0.0, 1.0);

    let reasoning = format!(
        "credibility {credibility:.2}, source type {type_score:.2}, \
         entities {entity_score:.2}, content {quality:.2}, \
         recency {recency:.2}, metadata {metadata:.2}"
    );

    Confidence {
        score,
        level: ConfidenceLevel::from_score(score),
        reasoning,
        source_count: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn source(source_type: SourceType, credibility: f64, content: &str) -> Source {
        let now = Utc::now();
        Source {
            id: Uuid::new_v4(),
            source_type,
            url: "https://example.com/article".to_string(),
            title: "Title".to_string(),
            author: Some("author".to_string()),
            published_at: now,
            retrieved_at: now,
            raw_content: content.to_string(),
            content_hash: "0".repeat(16),
            credibility,
            metadata: serde_json::json!({"feed_url": "https://example.com/rss"}),
            scrape_status: crate::types::ScrapeStatus::Completed,
            scrape_error: None,
            scraped_at: None,
            enrichment_status: crate::types::EnrichmentStatus::Pending,
            enrichment_claimed_at: None,
            enrichment_error: None,
            event_id: None,
            created_at: now,
        }
    }

    #[test]
    fn magnitude_stays_in_range() {
        let m = compute_magnitude(
            EventCategory::Terrorism,
            20,
            "BREAKING: large-scale international emergency",
        );
        assert!(m <= 10.0);
        assert!(compute_magnitude(EventCategory::Other, 0, "quiet note") >= 0.0);
    }

    #[test]
    fn urgency_and_scope_raise_magnitude() {
        let base = compute_magnitude(EventCategory::Military, 0, "troops moved");
        let urgent = compute_magnitude(EventCategory::Military, 0, "Breaking: troops moved");
        let scoped =
            compute_magnitude(EventCategory::Military, 0, "nationwide mobilization of troops");
        assert!(urgent > base);
        assert!(scoped > base);
    }

    #[test]
    fn entities_raise_magnitude_with_a_cap() {
        let none = compute_magnitude(EventCategory::Economic, 0, "markets fell");
        let some = compute_magnitude(EventCategory::Economic, 3, "markets fell");
        let many = compute_magnitude(EventCategory::Economic, 50, "markets fell");
        assert!(some > none);
        assert!((many - none - 1.0).abs() < 1e-9);
    }

    #[test]
    fn government_source_outscores_telegram() {
        let now = Utc::now();
        let gov = compute_confidence(&source(SourceType::Government, 0.9, &"x".repeat(900)), 0.8, now);
        let tg = compute_confidence(&source(SourceType::Telegram, 0.35, &"x".repeat(900)), 0.8, now);
        assert!(gov.score > tg.score);
    }

    #[test]
    fn confidence_is_clamped_and_banded() {
        let now = Utc::now();
        let c = compute_confidence(&source(SourceType::Government, 1.0, &"x".repeat(5000)), 1.0, now);
        assert!(c.score <= 1.0);
        assert_eq!(c.level, ConfidenceLevel::from_score(c.score));
        assert_eq!(c.source_count, 1);
    }

    #[test]
    fn stale_sources_score_lower() {
        let now = Utc::now();
        let fresh = source(SourceType::NewsMedia, 0.7, &"x".repeat(500));
        let mut old = fresh.clone();
        old.published_at = now - chrono::Duration::days(30);
        let fresh_conf = compute_confidence(&fresh, 0.5, now);
        let old_conf = compute_confidence(&old, 0.5, now);
        assert!(fresh_conf.score > old_conf.score);
    }
}
