//! Source enrichment: one LLM call turns a claimed source into a structured
//! event with entities, magnitude, and confidence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ai_client::Claude;
use argus_common::scoring::{compute_confidence, compute_magnitude};
use argus_common::types::{EntityType, Event, EventCategory, EventStatus, Location, Source};

use crate::error::EnrichError;
use crate::prompts::ENRICH_SYSTEM_PROMPT;

/// Content beyond this is truncated before the model call.
const MAX_CONTENT_CHARS: usize = 30_000;

const MAX_TITLE_CHARS: usize = 100;
const MIN_TAGS: usize = 3;
const MAX_TAGS: usize = 7;
const MIN_KEY_FACTS: usize = 3;
const MAX_KEY_FACTS: usize = 10;

/// Neutral entity confidence when the model names no entities at all.
const NEUTRAL_ENTITY_CONFIDENCE: f64 = 0.5;

// --- Model output schema ---

/// What the LLM returns for one source.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EnrichedOutput {
    /// Factual headline, at most 100 characters
    pub title: String,
    /// 2-3 sentence summary
    pub summary: String,
    /// One of the event categories
    pub category: String,
    /// 3-7 short keywords
    pub tags: Vec<String>,
    /// Null unless the event is geographic; country required when set
    pub location: Option<OutputLocation>,
    /// 3-10 discrete factual claims
    pub key_facts: Vec<String>,
    /// Named entities mentioned by the source
    pub entities: Vec<OutputEntity>,
    /// Why this matters, or null
    pub implications: Option<String>,
    /// Caveats about sourcing quality, or null
    pub confidence_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutputLocation {
    pub country: String,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OutputEntity {
    pub name: String,
    /// "country", "person", "organization", "military", "location",
    /// "infrastructure", or "other"
    pub entity_type: String,
    /// Confidence the reference is real, 0.0-1.0
    pub confidence: Option<f64>,
}

// --- Enricher ---

/// An entity extracted alongside an event, before it is resolved against
/// the entity table.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedEntity {
    pub name: String,
    pub entity_type: EntityType,
    pub confidence: f64,
}

/// The result of enriching one source: the event plus its unresolved
/// entities. Entity ids are filled in by the lifecycle manager after upsert.
#[derive(Debug, Clone)]
pub struct EnrichedEvent {
    pub event: Event,
    pub entities: Vec<ExtractedEntity>,
}

/// The enrichment strategies as a closed set, so the worker never branches
/// on enricher identity.
pub enum Enricher {
    Llm(LlmEnricher),
    Mock(MockEnricher),
}

impl Enricher {
    pub async fn enrich(&self, source: &Source) -> Result<EnrichedEvent, EnrichError> {
        match self {
            Enricher::Llm(inner) => inner.enrich(source).await,
            Enricher::Mock(inner) => inner.enrich(source),
        }
    }
}

pub struct LlmEnricher {
    claude: Claude,
    system_prompt: String,
    deadline: Duration,
}

impl LlmEnricher {
    pub fn new(claude: Claude, system_prompt: Option<String>, deadline: Duration) -> Self {
        Self {
            claude,
            system_prompt: system_prompt.unwrap_or_else(|| ENRICH_SYSTEM_PROMPT.to_string()),
            deadline,
        }
    }

    async fn enrich(&self, source: &Source) -> Result<EnrichedEvent, EnrichError> {
        let content = truncate_at_char_boundary(&source.raw_content, MAX_CONTENT_CHARS);
        let user_prompt = format!(
            "Convert this source into an event record.\n\n\
             Source type: {}\nURL: {}\nTitle: {}\nAuthor: {}\nPublished: {}\n\n---\n\n{}",
            source.source_type,
            source.url,
            source.title,
            source.author.as_deref().unwrap_or("unknown"),
            source.published_at.to_rfc3339(),
            content,
        );

        let output = tokio::time::timeout(
            self.deadline,
            self.claude
                .extract::<EnrichedOutput>(&self.system_prompt, &user_prompt),
        )
        .await
        .map_err(|_| EnrichError::Timeout(self.deadline.as_secs()))?
        .map_err(EnrichError::from_ai)?;

        build_enriched_event(output, source, Utc::now())
    }
}

/// Deterministic enricher for tests and offline runs: derives the event
/// directly from the source without a model call.
pub struct MockEnricher {
    pub category: EventCategory,
}

impl MockEnricher {
    pub fn new(category: EventCategory) -> Self {
        Self { category }
    }

    fn enrich(&self, source: &Source) -> Result<EnrichedEvent, EnrichError> {
        let output = EnrichedOutput {
            title: truncate_at_char_boundary(&source.title, MAX_TITLE_CHARS),
            summary: truncate_at_char_boundary(&source.raw_content, 200),
            category: self.category.to_string(),
            tags: vec![
                "mock".to_string(),
                self.category.to_string(),
                source.source_type.to_string(),
            ],
            location: None,
            key_facts: vec![
                "derived from source title".to_string(),
                "derived from source body".to_string(),
                "no model call was made".to_string(),
            ],
            entities: Vec::new(),
            implications: None,
            confidence_notes: None,
        };
        build_enriched_event(output, source, Utc::now())
    }
}

/// Validate model output and assemble the event. Pure, so the schema rules
/// are testable without a model.
pub fn build_enriched_event(
    output: EnrichedOutput,
    source: &Source,
    now: DateTime<Utc>,
) -> Result<EnrichedEvent, EnrichError> {
    let title = output.title.trim().to_string();
    if title.is_empty() {
        return Err(EnrichError::InvalidOutput("empty title".to_string()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(EnrichError::InvalidOutput(format!(
            "title exceeds {MAX_TITLE_CHARS} chars"
        )));
    }

    let summary = output.summary.trim().to_string();
    if summary.is_empty() {
        return Err(EnrichError::InvalidOutput("empty summary".to_string()));
    }

    let category: EventCategory = output
        .category
        .parse()
        .map_err(EnrichError::InvalidOutput)?;

    let tags = clean_string_list(output.tags);
    if tags.len() < MIN_TAGS {
        return Err(EnrichError::InvalidOutput(format!(
            "fewer than {MIN_TAGS} tags"
        )));
    }
    let tags: Vec<String> = tags.into_iter().take(MAX_TAGS).collect();

    let key_facts = clean_string_list(output.key_facts);
    if key_facts.len() < MIN_KEY_FACTS {
        return Err(EnrichError::InvalidOutput(format!(
            "fewer than {MIN_KEY_FACTS} key facts"
        )));
    }
    let key_facts: Vec<String> = key_facts.into_iter().take(MAX_KEY_FACTS).collect();

    let location = match output.location {
        Some(loc) => {
            if loc.country.trim().is_empty() {
                return Err(EnrichError::InvalidOutput(
                    "location present without a country".to_string(),
                ));
            }
            Some(Location {
                country: Some(loc.country.trim().to_string()),
                city: loc.city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
                latitude: loc.latitude,
                longitude: loc.longitude,
            })
        }
        None => None,
    };

    let entities: Vec<ExtractedEntity> = output
        .entities
        .into_iter()
        .filter(|e| !e.name.trim().is_empty())
        .map(|e| {
            // Unknown entity labels degrade to Other rather than failing the
            // whole extraction
            let entity_type = e.entity_type.parse().unwrap_or_else(|_| {
                warn!(name = %e.name, label = %e.entity_type, "unknown entity type");
                EntityType::Other
            });
            ExtractedEntity {
                name: e.name.trim().to_string(),
                entity_type,
                confidence: e.confidence.unwrap_or(NEUTRAL_ENTITY_CONFIDENCE).clamp(0.0, 1.0),
            }
        })
        .collect();

    let mean_entity_confidence = if entities.is_empty() {
        NEUTRAL_ENTITY_CONFIDENCE
    } else {
        entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64
    };

    let magnitude_text = format!("{title} {summary} {}", key_facts.join(" "));
    let magnitude = compute_magnitude(category, entities.len(), &magnitude_text);
    let confidence = compute_confidence(source, mean_entity_confidence, now);

    let event = Event {
        id: Event::id_for_source(source.id),
        timestamp: source.published_at,
        title,
        summary,
        raw_content: source.raw_content.clone(),
        category,
        status: EventStatus::Enriched,
        magnitude,
        confidence,
        tags,
        location,
        source_ids: vec![source.id],
        entity_ids: Vec::new(),
        parent_event_id: None,
        rejection_reason: None,
        created_at: now,
        updated_at: now,
    };

    Ok(EnrichedEvent { event, entities })
}

/// Trim, drop empties, and dedupe case-insensitively, keeping first
/// occurrences in order.
fn clean_string_list(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.to_lowercase()))
        .collect()
}

fn truncate_at_char_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
