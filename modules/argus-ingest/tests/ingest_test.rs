//! Integration tests for the ingestion dedup path against a real store.
//!
//! Requirements: Docker (for Postgres via testcontainers)
//!
//! Run with: cargo test -p argus-ingest --test ingest_test

use std::time::Duration;

use chrono::Utc;

use argus_common::text::feed_item_hash;
use argus_common::types::{CandidateSource, EnrichmentStatus, ScrapeStatus};
use argus_ingest::{FeedConnector, IngestScheduler};

fn candidate(title: &str, url: &str) -> CandidateSource {
    let raw_content = format!("{title}. A body long enough to clear the content filter.");
    CandidateSource {
        url: url.to_string(),
        title: title.to_string(),
        content_hash: feed_item_hash(url, title, &raw_content),
        raw_content,
        published_at: Utc::now(),
        feed_url: "https://example.com/rss".to_string(),
        reddit_url: None,
    }
}

#[tokio::test]
async fn identical_items_in_one_tick_store_once() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    let feed = store
        .add_tracked_feed("rss", "https://example.com/rss", "Example", 30)
        .await
        .unwrap();

    let scheduler = IngestScheduler::new(store.clone(), FeedConnector::new(), Duration::from_secs(60));

    let outcome = scheduler
        .ingest_candidates(
            &feed,
            vec![
                candidate("Breaking report", "https://example.com/news/1"),
                candidate("Breaking report", "https://example.com/news/1"),
            ],
        )
        .await
        .unwrap();

    assert_eq!(outcome.stored, 1);
    assert_eq!(outcome.duplicates, 1);
    assert_eq!(store.count_sources().await.unwrap(), 1);
}

#[tokio::test]
async fn items_seen_on_a_previous_tick_are_skipped() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    let feed = store
        .add_tracked_feed("rss", "https://example.com/rss", "Example", 30)
        .await
        .unwrap();

    let scheduler = IngestScheduler::new(store.clone(), FeedConnector::new(), Duration::from_secs(60));

    let first = scheduler
        .ingest_candidates(&feed, vec![candidate("Initial report", "https://example.com/news/2")])
        .await
        .unwrap();
    assert_eq!(first.stored, 1);

    let second = scheduler
        .ingest_candidates(&feed, vec![candidate("Initial report", "https://example.com/news/2")])
        .await
        .unwrap();
    assert_eq!(second.stored, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.count_sources().await.unwrap(), 1);
}

#[tokio::test]
async fn stored_sources_are_ready_for_enrichment() {
    let (_container, store) = argus_store::testutil::postgres_container().await;
    let feed = store
        .add_tracked_feed("rss", "https://example.com/rss", "Example", 30)
        .await
        .unwrap();

    let scheduler = IngestScheduler::new(store.clone(), FeedConnector::new(), Duration::from_secs(60));
    scheduler
        .ingest_candidates(&feed, vec![candidate("Enrichable report", "https://example.com/news/3")])
        .await
        .unwrap();

    let sources = store
        .list_recent_sources(Utc::now() - chrono::Duration::hours(1), 10)
        .await
        .unwrap();
    assert_eq!(sources.len(), 1);
    let source = &sources[0];
    // Feed description is final content: no scrape phase, enrichment pending
    assert_eq!(source.scrape_status, ScrapeStatus::Completed);
    assert_eq!(source.enrichment_status, EnrichmentStatus::Pending);
    assert_eq!(
        source.metadata["feed_url"].as_str(),
        Some("https://example.com/rss")
    );

    // The watermark advanced to the stored source
    let feeds = store.list_enabled_feeds().await.unwrap();
    assert_eq!(feeds[0].last_fetched_id.as_deref(), Some(source.id.to_string().as_str()));
    assert!(feeds[0].last_fetched_at.is_some());
}
