//! Integration tests for the enrichment lifecycle against a real store,
//! with the mock enricher and a fixed-verdict correlator standing in for
//! the model.
//!
//! Requirements: Docker (for Postgres via testcontainers)
//!
//! Run with: cargo test -p argus-enrich --test pipeline_test

use chrono::{Duration, Utc};
use uuid::Uuid;

use argus_common::types::{
    Confidence, ConfidenceLevel, EnrichmentStatus, Event, EventCategory, EventStatus,
    ScrapeStatus, SourceType, ThresholdConfig,
};
use argus_enrich::{
    CorrelationResult, Correlator, EnrichedEvent, Enricher, LifecycleManager, MockCorrelator,
    MockEnricher, ProcessOutcome,
};
use argus_store::{NewSource, Store};

fn seed_source(title: &str, url: &str, hash: &str) -> NewSource {
    NewSource {
        source_type: SourceType::NewsMedia,
        url: url.to_string(),
        title: title.to_string(),
        author: Some("wire".to_string()),
        published_at: Utc::now(),
        raw_content: format!(
            "{title}. Officials confirmed the incident this morning and released further detail."
        ),
        content_hash: hash.to_string(),
        credibility: 0.7,
        metadata: serde_json::json!({"feed_url": "https://example.com/rss"}),
        scrape_status: ScrapeStatus::Completed,
    }
}

fn lenient_thresholds() -> ThresholdConfig {
    ThresholdConfig {
        min_confidence: 0.3,
        min_magnitude: 1.0,
        max_source_age_hours: 0,
    }
}

fn no_match_lifecycle(store: &Store) -> LifecycleManager {
    LifecycleManager::new(store.clone(), Correlator::Mock(MockCorrelator::no_match()), true)
}

#[tokio::test]
async fn claim_enrich_publish_end_to_end() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    store.set_thresholds(lenient_thresholds()).await.unwrap();

    store
        .store_source(seed_source(
            "Missile strike reported near border",
            "https://example.com/news/strike",
            "1111000000000001",
        ))
        .await
        .unwrap();

    let claimed = store
        .claim_for_enrichment(1, Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    let source = claimed.into_iter().next().unwrap();

    let enricher = Enricher::Mock(MockEnricher::new(EventCategory::Military));
    let enriched = enricher.enrich(&source).await.unwrap();
    let expected_id = enriched.event.id.clone();

    store
        .update_enrichment_status(source.id, EnrichmentStatus::Completed, None)
        .await
        .unwrap();

    let outcome = no_match_lifecycle(&store)
        .process_event(enriched, &source)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Created {
            id: expected_id.clone(),
            status: EventStatus::Published,
        }
    );

    let event = store.get_event(&expected_id).await.unwrap().unwrap();
    assert_eq!(event.status, EventStatus::Published);
    assert_eq!(event.source_ids, vec![source.id]);
    assert_eq!(event.confidence.source_count, 1);

    // The back-reference landed on the source
    let reloaded = store.get_source(source.id).await.unwrap().unwrap();
    assert_eq!(reloaded.event_id.as_deref(), Some(expected_id.as_str()));
    assert_eq!(reloaded.enrichment_status, EnrichmentStatus::Completed);
}

#[tokio::test]
async fn reprocessing_takes_the_update_path() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    store.set_thresholds(lenient_thresholds()).await.unwrap();

    store
        .store_source(seed_source(
            "Port closure announced",
            "https://example.com/news/port",
            "2222000000000001",
        ))
        .await
        .unwrap();
    let source = store
        .claim_for_enrichment(1, Duration::minutes(15))
        .await
        .unwrap()
        .remove(0);

    let enricher = Enricher::Mock(MockEnricher::new(EventCategory::Economic));
    let lifecycle = no_match_lifecycle(&store);

    let first = enricher.enrich(&source).await.unwrap();
    let id = first.event.id.clone();
    let first_outcome = lifecycle.process_event(first, &source).await.unwrap();
    assert!(matches!(first_outcome, ProcessOutcome::Created { .. }));
    let after_first = store.get_event(&id).await.unwrap().unwrap();

    // Same source again: the event id is deterministic, so this must merge
    let second = enricher.enrich(&source).await.unwrap();
    let second_outcome = lifecycle.process_event(second, &source).await.unwrap();
    assert_eq!(second_outcome, ProcessOutcome::Updated { id: id.clone() });

    let after_second = store.get_event(&id).await.unwrap().unwrap();
    assert_eq!(after_second.source_ids, after_first.source_ids);
    assert_eq!(
        after_second.confidence.source_count as usize,
        after_second.source_ids.len()
    );
    assert_eq!(after_second.status, after_first.status);
}

#[tokio::test]
async fn merge_spawns_a_novel_facts_event() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    store.set_thresholds(lenient_thresholds()).await.unwrap();

    // Parent event already on file
    let parent_source = store
        .store_source(seed_source(
            "Strike on Kyiv",
            "https://example.com/news/kyiv",
            "3333000000000001",
        ))
        .await
        .unwrap();
    let now = Utc::now();
    let parent = Event {
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
            reasoning: "seeded".to_string(),
            source_count: 1,
        },
        tags: vec!["strike".to_string(), "kyiv".to_string()],
        location: None,
        source_ids: vec![parent_source.id],
        entity_ids: Vec::new(),
        parent_event_id: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };
    store.create_event(&parent).await.unwrap();

    // A follow-up source arrives with new facts
    store
        .store_source(seed_source(
            "Casualties reported after Kyiv strike",
            "https://example.com/news/kyiv-followup",
            "3333000000000002",
        ))
        .await
        .unwrap();
    let followup = store
        .claim_for_enrichment(1, Duration::minutes(15))
        .await
        .unwrap()
        .remove(0);

    let correlator = Correlator::Mock(MockCorrelator {
        result: CorrelationResult {
            similarity: 0.9,
            should_merge: true,
            has_novel_facts: true,
            novel_facts: vec!["15 injured".to_string(), "power station damaged".to_string()],
            reasoning: "same incident, new casualty figures".to_string(),
        },
        match_first: true,
    });
    let lifecycle = LifecycleManager::new(store.clone(), correlator, true);

    let enriched = Enricher::Mock(MockEnricher::new(EventCategory::Military))
        .enrich(&followup)
        .await
        .unwrap();
    let outcome = lifecycle.process_event(enriched, &followup).await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Merged {
            into: "evt-abc".to_string(),
            spawned: Some("novel-evt-abc".to_string()),
        }
    );

    // Parent gained the follow-up source
    let merged = store.get_event("evt-abc").await.unwrap().unwrap();
    assert!(merged.source_ids.contains(&followup.id));
    assert_eq!(merged.confidence.source_count, 2);

    // The spawn carries the parent's framing and only the new facts
    let novel = store.get_event("novel-evt-abc").await.unwrap().unwrap();
    assert_eq!(novel.title, "Strike on Kyiv - Additional Details");
    assert_eq!(novel.summary, "15 injured; power station damaged");
    assert_eq!(novel.parent_event_id.as_deref(), Some("evt-abc"));
    assert!((novel.magnitude - 8.0 * 0.7).abs() < 1e-9);
    assert!(novel.source_ids.contains(&parent_source.id));
    assert!(novel.source_ids.contains(&followup.id));
}

#[tokio::test]
async fn threshold_gate_rejects_and_records_the_reason() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    store
        .set_thresholds(ThresholdConfig {
            min_confidence: 0.30,
            min_magnitude: 1.0,
            max_source_age_hours: 0,
        })
        .await
        .unwrap();

    store
        .store_source(seed_source(
            "Minor advisory issued",
            "https://example.com/news/advisory",
            "4444000000000001",
        ))
        .await
        .unwrap();
    let source = store
        .claim_for_enrichment(1, Duration::minutes(15))
        .await
        .unwrap()
        .remove(0);

    // Hand-built enrichment so the gate sees an exact borderline score
    let now = Utc::now();
    let event = Event {
        id: Event::id_for_source(source.id),
        timestamp: source.published_at,
        title: "Minor advisory issued".to_string(),
        summary: "An advisory of limited scope.".to_string(),
        raw_content: source.raw_content.clone(),
        category: EventCategory::Other,
        status: EventStatus::Enriched,
        magnitude: 7.0,
        confidence: Confidence {
            score: 0.29,
            level: ConfidenceLevel::Unconfirmed,
            reasoning: "weak sourcing".to_string(),
            source_count: 1,
        },
        tags: vec!["advisory".to_string()],
        location: None,
        source_ids: vec![source.id],
        entity_ids: Vec::new(),
        parent_event_id: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };
    let enriched = EnrichedEvent {
        event,
        entities: Vec::new(),
    };

    let outcome = no_match_lifecycle(&store)
        .process_event(enriched, &source)
        .await
        .unwrap();
    let id = Event::id_for_source(source.id);
    assert_eq!(
        outcome,
        ProcessOutcome::Created {
            id: id.clone(),
            status: EventStatus::Rejected,
        }
    );

    let rejected = store.get_event(&id).await.unwrap().unwrap();
    assert_eq!(rejected.status, EventStatus::Rejected);
    assert_eq!(rejected.rejection_reason.as_deref(), Some("confidence 0.29 < 0.30"));
}

#[tokio::test]
async fn rejected_events_can_be_promoted_on_merge() {
    let (_container, store) = argus_store::testutil::postgres_container().await;

    // Strict thresholds to start: the first pass rejects
    store
        .set_thresholds(ThresholdConfig {
            min_confidence: 0.95,
            min_magnitude: 1.0,
            max_source_age_hours: 0,
        })
        .await
        .unwrap();

    store
        .store_source(seed_source(
            "Pipeline disruption reported",
            "https://example.com/news/pipeline",
            "5555000000000001",
        ))
        .await
        .unwrap();
    let source = store
        .claim_for_enrichment(1, Duration::minutes(15))
        .await
        .unwrap()
        .remove(0);

    let enricher = Enricher::Mock(MockEnricher::new(EventCategory::Economic));
    let lifecycle = no_match_lifecycle(&store);

    let enriched = enricher.enrich(&source).await.unwrap();
    let id = enriched.event.id.clone();
    let outcome = lifecycle.process_event(enriched, &source).await.unwrap();
    assert_eq!(
        outcome,
        ProcessOutcome::Created {
            id: id.clone(),
            status: EventStatus::Rejected,
        }
    );

    // Thresholds relax, then the same source is reprocessed: the update
    // path re-checks the gate and promotes
    store.set_thresholds(lenient_thresholds()).await.unwrap();

    let enriched = enricher.enrich(&source).await.unwrap();
    let outcome = lifecycle.process_event(enriched, &source).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Updated { id: id.clone() });

    let promoted = store.get_event(&id).await.unwrap().unwrap();
    assert_eq!(promoted.status, EventStatus::Published);
    assert!(promoted.rejection_reason.is_none());
}
