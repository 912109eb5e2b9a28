//! Entity persistence. Entities are deduplicated by (type, normalized_name)
//! and never deleted.

use uuid::Uuid;

use argus_common::types::{Entity, EntityType};

use crate::error::{Result, StoreError};
use crate::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    #[sqlx(rename = "type")]
    entity_type: String,
    name: String,
    normalized_name: String,
    confidence: f64,
    attributes: serde_json::Value,
}

impl TryFrom<EntityRow> for Entity {
    type Error = StoreError;

    fn try_from(row: EntityRow) -> Result<Self> {
        Ok(Entity {
            id: row.id,
            entity_type: row.entity_type.parse().map_err(StoreError::Decode)?,
            name: row.name,
            normalized_name: row.normalized_name,
            confidence: row.confidence,
            attributes: row.attributes,
        })
    }
}

impl Store {
    /// Insert or refresh an entity keyed by (type, normalized_name). The
    /// display name follows the latest sighting; confidence only ratchets up.
    pub async fn upsert_entity(
        &self,
        entity_type: EntityType,
        name: &str,
        normalized_name: &str,
        confidence: f64,
        attributes: serde_json::Value,
    ) -> Result<Entity> {
        let row = sqlx::query_as::<_, EntityRow>(
            r#"
            INSERT INTO entities (id, type, name, normalized_name, confidence, attributes)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (type, normalized_name) DO UPDATE
            SET name = EXCLUDED.name,
                confidence = GREATEST(entities.confidence, EXCLUDED.confidence),
                attributes = entities.attributes || EXCLUDED.attributes
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(entity_type.to_string())
        .bind(name)
        .bind(normalized_name)
        .bind(confidence.clamp(0.0, 1.0))
        .bind(&attributes)
        .fetch_one(self.pool())
        .await?;
        row.try_into()
    }

    pub async fn link_event_entity(&self, event_id: &str, entity_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT INTO event_entities (event_id, entity_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING",
        )
        .bind(event_id)
        .bind(entity_id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn get_entities_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT * FROM entities WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await?;
        rows.into_iter().map(Entity::try_from).collect()
    }
}
