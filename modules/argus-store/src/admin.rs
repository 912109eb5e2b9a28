//! Runtime configuration, tracked feeds, the ingestion error log, and
//! aggregate stats.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use argus_common::types::{IngestStage, ThresholdConfig, TrackedFeed};

use crate::error::Result;
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
struct TrackedFeedRow {
    id: Uuid,
    platform: String,
    account_identifier: String,
    display_name: String,
    enabled: bool,
    fetch_interval_minutes: i64,
    last_fetched_id: Option<String>,
    last_fetched_at: Option<DateTime<Utc>>,
}

impl From<TrackedFeedRow> for TrackedFeed {
    fn from(row: TrackedFeedRow) -> Self {
        TrackedFeed {
            id: row.id,
            platform: row.platform,
            account_identifier: row.account_identifier,
            display_name: row.display_name,
            enabled: row.enabled,
            fetch_interval_minutes: row.fetch_interval_minutes,
            last_fetched_id: row.last_fetched_id,
            last_fetched_at: row.last_fetched_at,
        }
    }
}

/// Aggregate pipeline counters for the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub sources_total: u64,
    pub sources_by_enrichment_status: Vec<(String, i64)>,
    pub events_by_status: Vec<(String, i64)>,
}

impl Store {
    /// Read the single-row threshold config. Always a consistent snapshot.
    pub async fn get_thresholds(&self) -> Result<ThresholdConfig> {
        let (min_confidence, min_magnitude, max_source_age_hours): (f64, f64, i64) =
            sqlx::query_as(
                "SELECT min_confidence, min_magnitude, max_source_age_hours \
                 FROM threshold_config WHERE id = TRUE",
            )
            .fetch_one(self.pool())
            .await?;
        Ok(ThresholdConfig {
            min_confidence,
            min_magnitude,
            max_source_age_hours,
        })
    }

    /// Replace the threshold config. Takes effect at the next read.
    pub async fn set_thresholds(&self, thresholds: ThresholdConfig) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE threshold_config
            SET min_confidence = $1, min_magnitude = $2,
                max_source_age_hours = $3, updated_at = NOW()
            WHERE id = TRUE
            "#,
        )
        .bind(thresholds.min_confidence)
        .bind(thresholds.min_magnitude)
        .bind(thresholds.max_source_age_hours)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn list_enabled_feeds(&self) -> Result<Vec<TrackedFeed>> {
        let rows = sqlx::query_as::<_, TrackedFeedRow>(
            "SELECT id, platform, account_identifier, display_name, enabled, \
                    fetch_interval_minutes, last_fetched_id, last_fetched_at \
             FROM tracked_accounts WHERE enabled = TRUE ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(TrackedFeed::from).collect())
    }

    /// Register a feed to poll. Administrative seam; idempotent on
    /// (platform, account_identifier).
    pub async fn add_tracked_feed(
        &self,
        platform: &str,
        account_identifier: &str,
        display_name: &str,
        fetch_interval_minutes: i64,
    ) -> Result<TrackedFeed> {
        let row = sqlx::query_as::<_, TrackedFeedRow>(
            r#"
            INSERT INTO tracked_accounts
                (id, platform, account_identifier, display_name, fetch_interval_minutes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (platform, account_identifier) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                fetch_interval_minutes = EXCLUDED.fetch_interval_minutes
            RETURNING id, platform, account_identifier, display_name, enabled,
                      fetch_interval_minutes, last_fetched_id, last_fetched_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(platform)
        .bind(account_identifier)
        .bind(display_name)
        .bind(fetch_interval_minutes)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    /// Advance a feed's poll watermark after a completed fetch.
    pub async fn update_feed_watermark(
        &self,
        feed_id: Uuid,
        last_fetched_id: Option<&str>,
        last_fetched_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE tracked_accounts \
             SET last_fetched_id = COALESCE($2, last_fetched_id), last_fetched_at = $3 \
             WHERE id = $1",
        )
        .bind(feed_id)
        .bind(last_fetched_id)
        .bind(last_fetched_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Record a per-incident ingestion error. Logs a warning on failure
    /// rather than propagating; a failed log write shouldn't abort the
    /// pipeline step that produced it.
    pub async fn record_ingestion_error(&self, stage: IngestStage, reference: &str, message: &str) {
        let result = sqlx::query(
            "INSERT INTO ingestion_errors (stage, reference, message) VALUES ($1, $2, $3)",
        )
        .bind(stage.to_string())
        .bind(reference)
        .bind(message)
        .execute(self.pool())
        .await;

        if let Err(e) = result {
            warn!(%stage, reference, error = %e, "Failed to record ingestion error");
        }
    }

    pub async fn stats(&self) -> Result<StatsSnapshot> {
        Ok(StatsSnapshot {
            sources_total: self.count_sources().await?,
            sources_by_enrichment_status: self.source_status_counts().await?,
            events_by_status: self.event_status_counts().await?,
        })
    }
}
