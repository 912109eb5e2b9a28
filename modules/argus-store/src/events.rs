//! Event persistence and the parameterized read path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use argus_common::query::{EventQuery, EventResponse, EventSort, SortOrder};
use argus_common::types::{Confidence, Event, EventStatus, Location};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: String,
    timestamp: DateTime<Utc>,
    title: String,
    summary: String,
    raw_content: String,
    magnitude: f64,
    confidence: serde_json::Value,
    category: String,
    status: String,
    tags: Vec<String>,
    location: Option<serde_json::Value>,
    parent_event_id: Option<String>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self, source_ids: Vec<Uuid>, entity_ids: Vec<Uuid>) -> Result<Event> {
        let confidence: Confidence = serde_json::from_value(self.confidence)
            .map_err(|e| StoreError::Decode(format!("confidence for {}: {e}", self.id)))?;
        let location: Option<Location> = match self.location {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StoreError::Decode(format!("location for {}: {e}", self.id)))?,
            None => None,
        };
        Ok(Event {
            id: self.id,
            timestamp: self.timestamp,
            title: self.title,
            summary: self.summary,
            raw_content: self.raw_content,
            category: self.category.parse().map_err(StoreError::Decode)?,
            status: self.status.parse().map_err(StoreError::Decode)?,
            magnitude: self.magnitude,
            confidence,
            tags: self.tags,
            location,
            source_ids,
            entity_ids,
            parent_event_id: self.parent_event_id,
            rejection_reason: self.rejection_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn sort_column(sort: EventSort) -> &'static str {
    match sort {
        EventSort::Timestamp => "e.timestamp",
        EventSort::Magnitude => "e.magnitude",
        EventSort::Confidence => "(e.confidence->>'score')::float8",
        EventSort::CreatedAt => "e.created_at",
        EventSort::UpdatedAt => "e.updated_at",
    }
}

/// Append the WHERE clause for an EventQuery. Used by both the page query
/// and the count query so the two always agree.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &EventQuery) {
    qb.push(" WHERE TRUE");

    if let Some(status) = q.status {
        qb.push(" AND e.status = ").push_bind(status.to_string());
    }
    if let Some(search) = q.search_query.as_deref().filter(|s| !s.trim().is_empty()) {
        qb.push(
            " AND to_tsvector('english', e.title || ' ' || e.summary) \
             @@ plainto_tsquery('english', ",
        )
        .push_bind(search.to_string())
        .push(")");
    }
    if let Some(since) = q.since_timestamp {
        qb.push(" AND e.timestamp >= ").push_bind(since);
    }
    if let Some(until) = q.until_timestamp {
        qb.push(" AND e.timestamp <= ").push_bind(until);
    }
    if let Some(min_magnitude) = q.min_magnitude {
        qb.push(" AND e.magnitude >= ").push_bind(min_magnitude);
    }
    if let Some(min_confidence) = q.min_confidence {
        qb.push(" AND (e.confidence->>'score')::float8 >= ")
            .push_bind(min_confidence);
    }
    if !q.categories.is_empty() {
        let categories: Vec<String> = q.categories.iter().map(|c| c.to_string()).collect();
        qb.push(" AND e.category = ANY(").push_bind(categories).push(")");
    }
    if !q.tags.is_empty() {
        qb.push(" AND e.tags && ").push_bind(q.tags.clone());
    }
    if !q.source_types.is_empty() {
        let types: Vec<String> = q.source_types.iter().map(|t| t.to_string()).collect();
        qb.push(
            " AND EXISTS (SELECT 1 FROM event_sources es \
             JOIN sources s ON s.id = es.source_id \
             WHERE es.event_id = e.id AND s.type = ANY(",
        )
        .push_bind(types)
        .push("))");
    }
    if !q.entity_types.is_empty() {
        let types: Vec<String> = q.entity_types.iter().map(|t| t.to_string()).collect();
        qb.push(
            " AND EXISTS (SELECT 1 FROM event_entities ee \
             JOIN entities n ON n.id = ee.entity_id \
             WHERE ee.event_id = e.id AND n.type = ANY(",
        )
        .push_bind(types)
        .push("))");
    }
}

impl Store {
    /// Create an event with its source and entity links, in one transaction.
    /// An id collision surfaces as `EventConflict` so callers can take the
    /// update path.
    pub async fn create_event(&self, event: &Event) -> Result<()> {
        let confidence = serde_json::to_value(&event.confidence)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let location = event
            .location
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let mut tx = self.pool().begin().await?;

        let insert = sqlx::query(
            r#"
            INSERT INTO events
                (id, timestamp, title, summary, raw_content, magnitude,
                 confidence, category, status, tags, location,
                 parent_event_id, rejection_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
            "#,
        )
        .bind(&event.id)
        .bind(event.timestamp)
        .bind(&event.title)
        .bind(&event.summary)
        .bind(&event.raw_content)
        .bind(event.magnitude)
        .bind(&confidence)
        .bind(event.category.to_string())
        .bind(event.status.to_string())
        .bind(&event.tags)
        .bind(&location)
        .bind(&event.parent_event_id)
        .bind(&event.rejection_reason)
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            let err = StoreError::Database(e);
            if err.is_unique_violation() {
                return Err(StoreError::EventConflict(event.id.clone()));
            }
            return Err(err);
        }

        for source_id in &event.source_ids {
            sqlx::query(
                "INSERT INTO event_sources (event_id, source_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&event.id)
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        }
        for entity_id in &event.entity_ids {
            sqlx::query(
                "INSERT INTO event_entities (event_id, entity_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&event.id)
            .bind(entity_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Update an event in place and union in any new source/entity links.
    pub async fn update_event(&self, event: &Event) -> Result<()> {
        let confidence = serde_json::to_value(&event.confidence)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let location = event
            .location
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE events
            SET timestamp = $2, title = $3, summary = $4, raw_content = $5,
                magnitude = $6, confidence = $7, category = $8, status = $9,
                tags = $10, location = $11, parent_event_id = $12,
                rejection_reason = $13, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(&event.id)
        .bind(event.timestamp)
        .bind(&event.title)
        .bind(&event.summary)
        .bind(&event.raw_content)
        .bind(event.magnitude)
        .bind(&confidence)
        .bind(event.category.to_string())
        .bind(event.status.to_string())
        .bind(&event.tags)
        .bind(&location)
        .bind(&event.parent_event_id)
        .bind(&event.rejection_reason)
        .execute(&mut *tx)
        .await?;

        for source_id in &event.source_ids {
            sqlx::query(
                "INSERT INTO event_sources (event_id, source_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&event.id)
            .bind(source_id)
            .execute(&mut *tx)
            .await?;
        }
        for entity_id in &event.entity_ids {
            sqlx::query(
                "INSERT INTO event_entities (event_id, entity_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(&event.id)
            .bind(entity_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>("SELECT * FROM events e WHERE e.id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Execute a validated read query. Sorting is total (tie broken by id
    /// ascending) so pagination is stable.
    pub async fn query_events(&self, query: &EventQuery) -> Result<EventResponse> {
        let total = self.count_events(query).await?;

        let mut qb = QueryBuilder::new("SELECT e.* FROM events e");
        push_filters(&mut qb, query);
        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {} {}, e.id ASC",
            sort_column(query.sort_by),
            direction
        ));
        qb.push(" LIMIT ")
            .push_bind(query.limit as i64)
            .push(" OFFSET ")
            .push_bind(query.offset());

        let rows = qb.build_query_as::<EventRow>().fetch_all(self.pool()).await?;
        let events = self.hydrate(rows).await?;

        Ok(EventResponse::new(events, total, query.page, query.limit))
    }

    pub async fn count_events(&self, query: &EventQuery) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM events e");
        push_filters(&mut qb, query);
        let count: i64 = qb.build_query_scalar().fetch_one(self.pool()).await?;
        Ok(count as u64)
    }

    pub async fn update_event_status(&self, id: &str, status: EventStatus) -> Result<()> {
        let updated = sqlx::query(
            "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.to_string())
        .execute(self.pool())
        .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {id}")));
        }
        Ok(())
    }

    /// Whether any event already references this source.
    pub async fn has_source_events(&self, source_id: Uuid) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM event_sources WHERE source_id = $1)",
        )
        .bind(source_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    /// Correlation candidate set: enriched or published events since the
    /// cutoff, most recent first, ties broken by id so the set is
    /// reproducible.
    pub async fn list_recent_events(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT e.* FROM events e
            WHERE e.status IN ('enriched', 'published') AND e.timestamp >= $1
            ORDER BY e.timestamp DESC, e.id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        self.hydrate(rows).await
    }

    /// Event counts grouped by status, for the stats surface.
    pub async fn event_status_counts(&self) -> Result<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM events GROUP BY status")
                .fetch_all(self.pool())
                .await?;
        Ok(rows)
    }

    /// Attach source and entity id sets to raw event rows.
    async fn hydrate(&self, rows: Vec<EventRow>) -> Result<Vec<Event>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();

        let source_links: Vec<(String, Uuid)> = sqlx::query_as(
            "SELECT event_id, source_id FROM event_sources WHERE event_id = ANY($1) \
             ORDER BY source_id",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;
        let entity_links: Vec<(String, Uuid)> = sqlx::query_as(
            "SELECT event_id, entity_id FROM event_entities WHERE event_id = ANY($1) \
             ORDER BY entity_id",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;

        let mut sources_by_event: HashMap<String, Vec<Uuid>> = HashMap::new();
        for (event_id, source_id) in source_links {
            sources_by_event.entry(event_id).or_default().push(source_id);
        }
        let mut entities_by_event: HashMap<String, Vec<Uuid>> = HashMap::new();
        for (event_id, entity_id) in entity_links {
            entities_by_event.entry(event_id).or_default().push(entity_id);
        }

        rows.into_iter()
            .map(|row| {
                let source_ids = sources_by_event.remove(&row.id).unwrap_or_default();
                let entity_ids = entities_by_event.remove(&row.id).unwrap_or_default();
                row.into_event(source_ids, entity_ids)
            })
            .collect()
    }
}
