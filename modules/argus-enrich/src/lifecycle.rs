//! Event lifecycle: existence check, correlation, merge and novel-facts
//! spawning, and the threshold gate that decides publish vs reject.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use argus_common::scoring::compute_confidence;
use argus_common::types::{Event, EventStatus, Source, ThresholdConfig};
use argus_store::{Store, StoreError};

use crate::correlator::Correlator;
use crate::enricher::{EnrichedEvent, ExtractedEntity};

/// Minimum source count for publication.
const MIN_SOURCES: usize = 1;

/// Correlation candidate window.
const LOOKBACK_DAYS: i64 = 7;
const CANDIDATE_LIMIT: i64 = 100;

/// Novel-facts spawns inherit a discounted magnitude from the parent.
const NOVEL_MAGNITUDE_FACTOR: f64 = 0.7;
const NOVEL_SUMMARY_MAX_CHARS: usize = 300;

/// Terminal disposition of one processed event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// A new event row was written with this status.
    Created { id: String, status: EventStatus },
    /// The event already existed; its source set was extended.
    Updated { id: String },
    /// Merged into a correlated event, possibly spawning a novel-facts event.
    Merged {
        into: String,
        spawned: Option<String>,
    },
}

/// The threshold gate's verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Publish,
    Reject(String),
}

pub struct LifecycleManager {
    store: Store,
    correlator: Correlator,
    auto_publish: bool,
}

impl LifecycleManager {
    pub fn new(store: Store, correlator: Correlator, auto_publish: bool) -> Self {
        Self {
            store,
            correlator,
            auto_publish,
        }
    }

    /// Drive one enriched event to its terminal state.
    pub async fn process_event(
        &self,
        enriched: EnrichedEvent,
        source: &Source,
    ) -> anyhow::Result<ProcessOutcome> {
        let EnrichedEvent { mut event, entities } = enriched;
        let mean_entity_confidence = mean_confidence(&entities);

        event.entity_ids = self.resolve_entities(&entities).await?;

        // 1. Existence check: a reprocessed source takes the update path.
        if let Some(existing) = self.store.get_event(&event.id).await? {
            let merged = self.merge_sources_into(existing, &event.source_ids).await?;
            self.store.set_source_event_id(source.id, &merged.id).await?;
            return Ok(ProcessOutcome::Updated { id: merged.id });
        }

        // 2. Correlation against recent history.
        let since = Utc::now() - Duration::days(LOOKBACK_DAYS);
        let candidates: Vec<Event> = self
            .store
            .list_recent_events(since, CANDIDATE_LIMIT)
            .await?
            .into_iter()
            .filter(|c| c.id != event.id)
            .collect();
        let decision = self.correlator.correlate(source, &candidates).await;

        // 3. Merge branch.
        if decision.result.should_merge {
            if let Some(parent) = decision.best_match {
                info!(
                    source_id = %source.id,
                    parent = %parent.id,
                    similarity = decision.result.similarity,
                    "merging source into correlated event"
                );
                let parent = self.merge_sources_into(parent, &event.source_ids).await?;
                self.store.set_source_event_id(source.id, &parent.id).await?;

                let spawned = if decision.result.has_novel_facts {
                    let novel = build_novel_event(
                        &parent,
                        &decision.result.novel_facts,
                        source,
                        mean_entity_confidence,
                        Utc::now(),
                    );
                    let (novel_id, _) = self.gate_and_persist(novel, source).await?;
                    Some(novel_id)
                } else {
                    None
                };

                return Ok(ProcessOutcome::Merged {
                    into: parent.id,
                    spawned,
                });
            }
        }

        // 4-5. Threshold gate + persist.
        let (id, status) = self.gate_and_persist(event, source).await?;
        self.store.set_source_event_id(source.id, &id).await?;
        Ok(ProcessOutcome::Created { id, status })
    }

    /// Upsert extracted entities and return their ids.
    async fn resolve_entities(&self, entities: &[ExtractedEntity]) -> anyhow::Result<Vec<Uuid>> {
        let mut ids = Vec::with_capacity(entities.len());
        for entity in entities {
            let stored = self
                .store
                .upsert_entity(
                    entity.entity_type,
                    &entity.name,
                    &normalized_entity_name(&entity.name),
                    entity.confidence,
                    serde_json::json!({}),
                )
                .await?;
            ids.push(stored.id);
        }
        Ok(ids)
    }

    /// Union new sources into an existing event, recompute the source count,
    /// and re-check the gate for a rejected event that may now qualify.
    /// Published events never regress here.
    async fn merge_sources_into(
        &self,
        mut event: Event,
        new_source_ids: &[Uuid],
    ) -> anyhow::Result<Event> {
        for id in new_source_ids {
            if !event.source_ids.contains(id) {
                event.source_ids.push(*id);
            }
        }
        event.confidence.source_count = event.source_ids.len() as u32;
        event.updated_at = Utc::now();

        if event.status == EventStatus::Rejected {
            let thresholds = self.store.get_thresholds().await?;
            let ages = self.source_published_ats(&event.source_ids).await?;
            let decision = evaluate_gate(
                self.auto_publish,
                &thresholds,
                event.confidence.score,
                event.magnitude,
                event.source_ids.len(),
                &ages,
                Utc::now(),
            );
            if decision == GateDecision::Publish {
                info!(event_id = %event.id, "promoting rejected event to published");
                event.status = EventStatus::Published;
                event.rejection_reason = None;
            }
        }

        self.store.update_event(&event).await?;
        Ok(event)
    }

    /// Apply the threshold gate and persist. An id collision means another
    /// worker created the same event concurrently; fall through to the
    /// update path.
    async fn gate_and_persist(
        &self,
        mut event: Event,
        source: &Source,
    ) -> anyhow::Result<(String, EventStatus)> {
        // Fresh snapshot per decision so admin updates apply immediately
        let thresholds = self.store.get_thresholds().await?;
        let ages = self.source_published_ats(&event.source_ids).await?;
        let decision = evaluate_gate(
            self.auto_publish,
            &thresholds,
            event.confidence.score,
            event.magnitude,
            event.source_ids.len(),
            &ages,
            Utc::now(),
        );

        match decision {
            GateDecision::Publish => {
                event.status = EventStatus::Published;
                event.rejection_reason = None;
            }
            GateDecision::Reject(reason) => {
                info!(event_id = %event.id, reason = %reason, "event rejected by threshold gate");
                event.status = EventStatus::Rejected;
                event.rejection_reason = Some(reason);
            }
        }

        match self.store.create_event(&event).await {
            Ok(()) => Ok((event.id, event.status)),
            Err(StoreError::EventConflict(id)) => {
                warn!(event_id = %id, "concurrent create detected, taking update path");
                let existing = self
                    .store
                    .get_event(&id)
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("event {id} vanished after conflict"))?;
                let merged = self.merge_sources_into(existing, &event.source_ids).await?;
                self.store.set_source_event_id(source.id, &merged.id).await?;
                Ok((merged.id, merged.status))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn source_published_ats(
        &self,
        source_ids: &[Uuid],
    ) -> anyhow::Result<Vec<DateTime<Utc>>> {
        let sources = self.store.get_sources_by_ids(source_ids).await?;
        Ok(sources.into_iter().map(|s| s.published_at).collect())
    }
}

fn mean_confidence(entities: &[ExtractedEntity]) -> f64 {
    if entities.is_empty() {
        0.5
    } else {
        entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64
    }
}

fn normalized_entity_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// The publish/reject decision. Pure so every rule is testable.
pub fn evaluate_gate(
    auto_publish: bool,
    thresholds: &ThresholdConfig,
    confidence_score: f64,
    magnitude: f64,
    source_count: usize,
    source_published_ats: &[DateTime<Utc>],
    now: DateTime<Utc>,
) -> GateDecision {
    if !auto_publish {
        return GateDecision::Reject("auto-publish disabled".to_string());
    }
    if confidence_score < thresholds.min_confidence {
        return GateDecision::Reject(format!(
            "confidence {:.2} < {:.2}",
            confidence_score, thresholds.min_confidence
        ));
    }
    if magnitude < thresholds.min_magnitude {
        return GateDecision::Reject(format!(
            "magnitude {:.1} < {:.1}",
            magnitude, thresholds.min_magnitude
        ));
    }
    if source_count < MIN_SOURCES {
        return GateDecision::Reject(format!(
            "source count {source_count} < {MIN_SOURCES}"
        ));
    }
    if thresholds.max_source_age_hours > 0 {
        let max_age = Duration::hours(thresholds.max_source_age_hours);
        if source_published_ats.iter().any(|&at| now - at > max_age) {
            return GateDecision::Reject(format!(
                "source older than {}h",
                thresholds.max_source_age_hours
            ));
        }
    }
    GateDecision::Publish
}

/// Build a novel-facts event from a merge: the parent's framing with only
/// the new information, discounted magnitude, and confidence recomputed
/// from the spawning source.
pub fn build_novel_event(
    parent: &Event,
    novel_facts: &[String],
    source: &Source,
    mean_entity_confidence: f64,
    now: DateTime<Utc>,
) -> Event {
    let mut summary = novel_facts.join("; ");
    if summary.len() > NOVEL_SUMMARY_MAX_CHARS {
        let mut end = NOVEL_SUMMARY_MAX_CHARS;
        while !summary.is_char_boundary(end) {
            end -= 1;
        }
        summary.truncate(end);
    }

    let mut source_ids = parent.source_ids.clone();
    if !source_ids.contains(&source.id) {
        source_ids.push(source.id);
    }

    let mut confidence = compute_confidence(source, mean_entity_confidence, now);
    confidence.source_count = source_ids.len() as u32;

    Event {
        id: Event::novel_id(&parent.id),
        timestamp: source.published_at,
        title: format!("{} - Additional Details", parent.title),
        summary,
        raw_content: source.raw_content.clone(),
        category: parent.category,
        status: EventStatus::Enriched,
        magnitude: (parent.magnitude * NOVEL_MAGNITUDE_FACTOR).clamp(0.0, 10.0),
        confidence,
        tags: parent.tags.clone(),
        location: parent.location.clone(),
        source_ids,
        entity_ids: parent.entity_ids.clone(),
        parent_event_id: Some(parent.id.clone()),
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_common::types::{
        Confidence, ConfidenceLevel, EnrichmentStatus, EventCategory, ScrapeStatus, SourceType,
    };

    fn thresholds(min_confidence: f64, min_magnitude: f64, max_age: i64) -> ThresholdConfig {
        ThresholdConfig {
            min_confidence,
            min_magnitude,
            max_source_age_hours: max_age,
        }
    }

    #[test]
    fn gate_rejects_with_the_recorded_reason() {
        let now = Utc::now();
        let decision = evaluate_gate(
            true,
            &thresholds(0.30, 1.0, 0),
            0.29,
            7.0,
            1,
            &[now],
            now,
        );
        assert_eq!(
            decision,
            GateDecision::Reject("confidence 0.29 < 0.30".to_string())
        );
    }

    #[test]
    fn gate_publishes_when_everything_clears() {
        let now = Utc::now();
        let decision = evaluate_gate(true, &thresholds(0.30, 1.0, 0), 0.31, 7.0, 1, &[now], now);
        assert_eq!(decision, GateDecision::Publish);
    }

    #[test]
    fn gate_rejects_low_magnitude_and_stale_sources() {
        let now = Utc::now();
        assert!(matches!(
            evaluate_gate(true, &thresholds(0.1, 5.0, 0), 0.9, 4.9, 1, &[now], now),
            GateDecision::Reject(reason) if reason.starts_with("magnitude")
        ));

        let old = now - Duration::hours(49);
        assert!(matches!(
            evaluate_gate(true, &thresholds(0.1, 1.0, 48), 0.9, 7.0, 1, &[old], now),
            GateDecision::Reject(reason) if reason.contains("older than 48h")
        ));

        // max_source_age_hours = 0 means unlimited
        assert_eq!(
            evaluate_gate(true, &thresholds(0.1, 1.0, 0), 0.9, 7.0, 1, &[old], now),
            GateDecision::Publish
        );
    }

    #[test]
    fn gate_respects_auto_publish() {
        let now = Utc::now();
        assert!(matches!(
            evaluate_gate(false, &thresholds(0.1, 1.0, 0), 0.9, 9.0, 1, &[now], now),
            GateDecision::Reject(_)
        ));
    }

    fn parent_event() -> Event {
        let now = Utc::now();
        Event {
            id: "evt-abc".to_string(),
            timestamp: now,
            title: "Strike on Kyiv".to_string(),
            summary: "A strike hit the city center.".to_string(),
            raw_content: String::new(),
            category: EventCategory::Military,
            status: EventStatus::Published,
            magnitude: 8.0,
            confidence: Confidence {
                score: 0.8,
                level: ConfidenceLevel::Confirmed,
                reasoning: "test".to_string(),
                source_count: 2,
            },
            tags: vec!["strike".to_string(), "kyiv".to_string()],
            location: None,
            source_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            entity_ids: vec![Uuid::new_v4()],
            parent_event_id: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn spawning_source() -> Source {
        let now = Utc::now();
        Source {
            id: Uuid::new_v4(),
            source_type: SourceType::NewsMedia,
            url: "https://example.com/news/followup".to_string(),
            title: "Follow-up".to_string(),
            author: None,
            published_at: now,
            retrieved_at: now,
            raw_content: "Officials now report casualties and infrastructure damage.".to_string(),
            content_hash: "1".repeat(16),
            credibility: 0.7,
            metadata: serde_json::json!({}),
            scrape_status: ScrapeStatus::Completed,
            scrape_error: None,
            scraped_at: None,
            enrichment_status: EnrichmentStatus::Enriching,
            enrichment_claimed_at: Some(now),
            enrichment_error: None,
            event_id: None,
            created_at: now,
        }
    }

    #[test]
    fn novel_event_carries_parent_framing_and_new_facts() {
        let parent = parent_event();
        let source = spawning_source();
        let facts = vec!["15 injured".to_string(), "power station damaged".to_string()];

        let novel = build_novel_event(&parent, &facts, &source, 0.5, Utc::now());

        assert_eq!(novel.id, "novel-evt-abc");
        assert_eq!(novel.title, "Strike on Kyiv - Additional Details");
        assert_eq!(novel.summary, "15 injured; power station damaged");
        assert_eq!(novel.category, parent.category);
        assert_eq!(novel.tags, parent.tags);
        assert_eq!(novel.parent_event_id.as_deref(), Some("evt-abc"));
        assert!((novel.magnitude - 8.0 * 0.7).abs() < 1e-9);
        // Parent's sources plus the spawning source
        assert_eq!(novel.source_ids.len(), 3);
        assert!(novel.source_ids.contains(&source.id));
        assert_eq!(novel.confidence.source_count, 3);
    }

    #[test]
    fn novel_summary_is_truncated() {
        let parent = parent_event();
        let source = spawning_source();
        let facts = vec!["x".repeat(400)];
        let novel = build_novel_event(&parent, &facts, &source, 0.5, Utc::now());
        assert_eq!(novel.summary.len(), NOVEL_SUMMARY_MAX_CHARS);
    }
}
