//! Source persistence, including the atomic claim primitive.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use argus_common::types::{EnrichmentStatus, ScrapeStatus, Source, SourceType};

use crate::error::{Result, StoreError};
use crate::Store;

/// A row from the sources table, before enum parsing.
#[derive(Debug, Clone, sqlx::FromRow)]
struct SourceRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    source_type: String,
    url: String,
    title: String,
    author: Option<String>,
    published_at: DateTime<Utc>,
    retrieved_at: DateTime<Utc>,
    raw_content: String,
    content_hash: String,
    credibility: f64,
    metadata: serde_json::Value,
    scrape_status: String,
    scrape_error: Option<String>,
    scraped_at: Option<DateTime<Utc>>,
    enrichment_status: String,
    enrichment_claimed_at: Option<DateTime<Utc>>,
    enrichment_error: Option<String>,
    event_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SourceRow> for Source {
    type Error = StoreError;

    fn try_from(row: SourceRow) -> Result<Self> {
        Ok(Source {
            id: row.id,
            source_type: row.source_type.parse().map_err(StoreError::Decode)?,
            url: row.url,
            title: row.title,
            author: row.author,
            published_at: row.published_at,
            retrieved_at: row.retrieved_at,
            raw_content: row.raw_content,
            content_hash: row.content_hash,
            credibility: row.credibility,
            metadata: row.metadata,
            scrape_status: row.scrape_status.parse().map_err(StoreError::Decode)?,
            scrape_error: row.scrape_error,
            scraped_at: row.scraped_at,
            enrichment_status: row.enrichment_status.parse().map_err(StoreError::Decode)?,
            enrichment_claimed_at: row.enrichment_claimed_at,
            enrichment_error: row.enrichment_error,
            event_id: row.event_id,
            created_at: row.created_at,
        })
    }
}

/// Parameters for inserting a new source.
#[derive(Debug, Clone)]
pub struct NewSource {
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub raw_content: String,
    pub content_hash: String,
    pub credibility: f64,
    pub metadata: serde_json::Value,
    pub scrape_status: ScrapeStatus,
}

const INSERT_SOURCE: &str = r#"
    INSERT INTO sources
        (id, type, url, title, author, published_at, retrieved_at,
         raw_content, content_hash, credibility, metadata, scrape_status)
    VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7, $8, $9, $10, $11)
    RETURNING *
"#;

impl Store {
    /// Insert one source. Fails with a unique violation when the content
    /// hash is already present.
    pub async fn store_source(&self, source: NewSource) -> Result<Source> {
        let row = sqlx::query_as::<_, SourceRow>(INSERT_SOURCE)
            .bind(Uuid::new_v4())
            .bind(source.source_type.to_string())
            .bind(&source.url)
            .bind(&source.title)
            .bind(&source.author)
            .bind(source.published_at)
            .bind(&source.raw_content)
            .bind(&source.content_hash)
            .bind(source.credibility)
            .bind(&source.metadata)
            .bind(source.scrape_status.to_string())
            .fetch_one(self.pool())
            .await?;
        row.try_into()
    }

    /// Insert a batch of sources in one transaction. All-or-nothing: any
    /// failed row aborts the whole batch.
    pub async fn batch_store_sources(&self, sources: Vec<NewSource>) -> Result<Vec<Source>> {
        let mut tx = self.pool().begin().await?;
        let mut stored = Vec::with_capacity(sources.len());
        for source in sources {
            let row = sqlx::query_as::<_, SourceRow>(INSERT_SOURCE)
                .bind(Uuid::new_v4())
                .bind(source.source_type.to_string())
                .bind(&source.url)
                .bind(&source.title)
                .bind(&source.author)
                .bind(source.published_at)
                .bind(&source.raw_content)
                .bind(&source.content_hash)
                .bind(source.credibility)
                .bind(&source.metadata)
                .bind(source.scrape_status.to_string())
                .fetch_one(&mut *tx)
                .await?;
            stored.push(Source::try_from(row)?);
        }
        tx.commit().await?;
        Ok(stored)
    }

    pub async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.map(Source::try_from).transpose()
    }

    /// Exact-duplicate lookup used by the ingestion scheduler.
    pub async fn get_source_by_title_and_url(
        &self,
        title: &str,
        url: &str,
    ) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE title = $1 AND url = $2 LIMIT 1",
        )
        .bind(title)
        .bind(url)
        .fetch_optional(self.pool())
        .await?;
        row.map(Source::try_from).transpose()
    }

    pub async fn get_sources_by_scrape_status(
        &self,
        status: ScrapeStatus,
        limit: i64,
    ) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE scrape_status = $1 ORDER BY created_at ASC LIMIT $2",
        )
        .bind(status.to_string())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Source::try_from).collect()
    }

    pub async fn list_recent_sources(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Source>> {
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE created_at >= $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Source::try_from).collect()
    }

    /// Set a source's enrichment status. Any transition away from
    /// `enriching` releases the claim timestamp.
    pub async fn update_enrichment_status(
        &self,
        id: Uuid,
        status: EnrichmentStatus,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sources
            SET enrichment_status = $2,
                enrichment_error = $3,
                enrichment_claimed_at = CASE WHEN $2 = 'enriching'
                                             THEN enrichment_claimed_at
                                             ELSE NULL END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status.to_string())
        .bind(error)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Back-fill the owning event onto a source for traceability.
    pub async fn set_source_event_id(&self, source_id: Uuid, event_id: &str) -> Result<()> {
        sqlx::query("UPDATE sources SET event_id = $2 WHERE id = $1")
            .bind(source_id)
            .bind(event_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Atomically claim up to `n` sources for enrichment.
    ///
    /// Selects pending sources — or `enriching` ones whose claim is older
    /// than `stale_after` — with non-empty content, oldest first, and flips
    /// them to `enriching` in one statement. `FOR UPDATE SKIP LOCKED`
    /// guarantees no two concurrent callers receive the same row, in this
    /// process or any other.
    pub async fn claim_for_enrichment(
        &self,
        n: i64,
        stale_after: Duration,
    ) -> Result<Vec<Source>> {
        let stale_cutoff = Utc::now() - stale_after;
        let rows = sqlx::query_as::<_, SourceRow>(
            r#"
            UPDATE sources
            SET enrichment_status = 'enriching', enrichment_claimed_at = NOW()
            WHERE id IN (
                SELECT id FROM sources
                WHERE raw_content <> ''
                  AND (enrichment_status = 'pending'
                       OR (enrichment_status = 'enriching'
                           AND enrichment_claimed_at < $2))
                ORDER BY created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(n)
        .bind(stale_cutoff)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Source::try_from).collect()
    }

    pub async fn count_sources(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sources")
            .fetch_one(self.pool())
            .await?;
        Ok(count as u64)
    }

    /// Source counts grouped by enrichment status, for the stats surface.
    pub async fn source_status_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT enrichment_status, COUNT(*) FROM sources GROUP BY enrichment_status",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Fetch several sources by id; used when assembling event detail views
    /// and threshold-gate age checks.
    pub async fn get_sources_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Source>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, SourceRow>(
            "SELECT * FROM sources WHERE id = ANY($1) ORDER BY created_at ASC",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Source::try_from).collect()
    }
}
