use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Source Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    NewsMedia,
    Twitter,
    Telegram,
    Government,
    Blog,
    Other,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::NewsMedia => write!(f, "news_media"),
            SourceType::Twitter => write!(f, "twitter"),
            SourceType::Telegram => write!(f, "telegram"),
            SourceType::Government => write!(f, "government"),
            SourceType::Blog => write!(f, "blog"),
            SourceType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "news_media" => Ok(Self::NewsMedia),
            "twitter" => Ok(Self::Twitter),
            "telegram" => Ok(Self::Telegram),
            "government" => Ok(Self::Government),
            "blog" => Ok(Self::Blog),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown SourceType: {other}")),
        }
    }
}

impl SourceType {
    /// Default credibility assigned to newly ingested sources of this type.
    pub fn default_credibility(&self) -> f64 {
        match self {
            SourceType::Government => 0.9,
            SourceType::NewsMedia => 0.7,
            SourceType::Blog => 0.5,
            SourceType::Twitter => 0.4,
            SourceType::Telegram => 0.35,
            SourceType::Other => 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrapeStatus::Pending => write!(f, "pending"),
            ScrapeStatus::InProgress => write!(f, "in_progress"),
            ScrapeStatus::Completed => write!(f, "completed"),
            ScrapeStatus::Failed => write!(f, "failed"),
            ScrapeStatus::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ScrapeStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown ScrapeStatus: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentStatus {
    Pending,
    Enriching,
    Completed,
    Failed,
}

impl std::fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrichmentStatus::Pending => write!(f, "pending"),
            EnrichmentStatus::Enriching => write!(f, "enriching"),
            EnrichmentStatus::Completed => write!(f, "completed"),
            EnrichmentStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for EnrichmentStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "enriching" => Ok(Self::Enriching),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown EnrichmentStatus: {other}")),
        }
    }
}

/// One retrieved item from one feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub source_type: SourceType,
    pub url: String,
    pub title: String,
    pub author: Option<String>,
    pub published_at: DateTime<Utc>,
    pub retrieved_at: DateTime<Utc>,
    pub raw_content: String,
    /// Deterministic over the normalized (type, url, author, raw_content) key.
    pub content_hash: String,
    pub credibility: f64,
    pub metadata: serde_json::Value,
    pub scrape_status: ScrapeStatus,
    pub scrape_error: Option<String>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub enrichment_status: EnrichmentStatus,
    pub enrichment_claimed_at: Option<DateTime<Utc>>,
    pub enrichment_error: Option<String>,
    /// Back-reference filled in once the source has been folded into an event.
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A parsed feed item before deduplication; not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSource {
    pub url: String,
    pub title: String,
    pub raw_content: String,
    pub published_at: DateTime<Utc>,
    pub content_hash: String,
    pub feed_url: String,
    /// Original Reddit entry URL when the article link was pulled out of a
    /// Reddit Atom entry body.
    pub reddit_url: Option<String>,
}

// --- Event Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Geopolitics,
    Military,
    Economic,
    Cyber,
    Disaster,
    Terrorism,
    Diplomacy,
    Intelligence,
    Humanitarian,
    Other,
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Geopolitics => write!(f, "geopolitics"),
            EventCategory::Military => write!(f, "military"),
            EventCategory::Economic => write!(f, "economic"),
            EventCategory::Cyber => write!(f, "cyber"),
            EventCategory::Disaster => write!(f, "disaster"),
            EventCategory::Terrorism => write!(f, "terrorism"),
            EventCategory::Diplomacy => write!(f, "diplomacy"),
            EventCategory::Intelligence => write!(f, "intelligence"),
            EventCategory::Humanitarian => write!(f, "humanitarian"),
            EventCategory::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "geopolitics" => Ok(Self::Geopolitics),
            "military" => Ok(Self::Military),
            "economic" => Ok(Self::Economic),
            "cyber" => Ok(Self::Cyber),
            "disaster" => Ok(Self::Disaster),
            "terrorism" => Ok(Self::Terrorism),
            "diplomacy" => Ok(Self::Diplomacy),
            "intelligence" => Ok(Self::Intelligence),
            "humanitarian" => Ok(Self::Humanitarian),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown EventCategory: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Pending,
    Enriched,
    Published,
    Rejected,
    Archived,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventStatus::Pending => write!(f, "pending"),
            EventStatus::Enriched => write!(f, "enriched"),
            EventStatus::Published => write!(f, "published"),
            EventStatus::Rejected => write!(f, "rejected"),
            EventStatus::Archived => write!(f, "archived"),
        }
    }
}

impl std::str::FromStr for EventStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "enriched" => Ok(Self::Enriched),
            "published" => Ok(Self::Published),
            "rejected" => Ok(Self::Rejected),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown EventStatus: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Confirmed,
    Probable,
    Possible,
    Unconfirmed,
    Speculative,
}

impl ConfidenceLevel {
    /// Band a raw confidence score into a display level.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::Confirmed
        } else if score >= 0.6 {
            Self::Probable
        } else if score >= 0.4 {
            Self::Possible
        } else if score >= 0.2 {
            Self::Unconfirmed
        } else {
            Self::Speculative
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceLevel::Confirmed => write!(f, "confirmed"),
            ConfidenceLevel::Probable => write!(f, "probable"),
            ConfidenceLevel::Possible => write!(f, "possible"),
            ConfidenceLevel::Unconfirmed => write!(f, "unconfirmed"),
            ConfidenceLevel::Speculative => write!(f, "speculative"),
        }
    }
}

/// Confidence record attached to every event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Confidence {
    pub score: f64,
    pub level: ConfidenceLevel,
    pub reasoning: String,
    pub source_count: u32,
}

/// Optional geographic anchor for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub country: Option<String>,
    pub city: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One semantic occurrence; may have many sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Deterministic function of the originating source id (`evt-<uuid>`),
    /// or `novel-<parent id>` for a novel-facts spawn.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub summary: String,
    pub raw_content: String,
    pub category: EventCategory,
    pub status: EventStatus,
    pub magnitude: f64,
    pub confidence: Confidence,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub source_ids: Vec<Uuid>,
    pub entity_ids: Vec<Uuid>,
    /// Set on novel-facts spawns; the id prefix carries the same reference
    /// for compatibility with existing data.
    pub parent_event_id: Option<String>,
    /// Why the threshold gate rejected this event, when it did.
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    /// The deterministic event id for a source, so reprocessing is idempotent.
    pub fn id_for_source(source_id: Uuid) -> String {
        format!("evt-{source_id}")
    }

    /// The id of a novel-facts event spawned off a parent.
    pub fn novel_id(parent_id: &str) -> String {
        format!("novel-{parent_id}")
    }
}

// --- Entity Types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Country,
    Person,
    Organization,
    Military,
    Location,
    Infrastructure,
    Other,
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityType::Country => write!(f, "country"),
            EntityType::Person => write!(f, "person"),
            EntityType::Organization => write!(f, "organization"),
            EntityType::Military => write!(f, "military"),
            EntityType::Location => write!(f, "location"),
            EntityType::Infrastructure => write!(f, "infrastructure"),
            EntityType::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EntityType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "country" => Ok(Self::Country),
            "person" => Ok(Self::Person),
            "organization" => Ok(Self::Organization),
            "military" => Ok(Self::Military),
            "location" => Ok(Self::Location),
            "infrastructure" => Ok(Self::Infrastructure),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown EntityType: {other}")),
        }
    }
}

/// A named referent. Deduplicated by (type, normalized_name); never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub name: String,
    pub normalized_name: String,
    pub confidence: f64,
    pub attributes: serde_json::Value,
}

// --- Runtime Configuration ---

/// Process-wide publish thresholds. Single row, mutable at runtime; readers
/// take a fresh snapshot per publish decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub min_confidence: f64,
    pub min_magnitude: f64,
    /// 0 = unlimited.
    pub max_source_age_hours: i64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            min_magnitude: 3.0,
            max_source_age_hours: 0,
        }
    }
}

/// One monitored feed URL. Administrative; immutable from the pipeline's view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedFeed {
    pub id: Uuid,
    pub platform: String,
    /// Feed URL for RSS/Atom, account handle for social platforms.
    pub account_identifier: String,
    pub display_name: String,
    pub enabled: bool,
    pub fetch_interval_minutes: i64,
    pub last_fetched_id: Option<String>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

impl TrackedFeed {
    /// Whether this feed is due for a poll at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_fetched_at {
            None => true,
            Some(last) => now >= last + chrono::Duration::minutes(self.fetch_interval_minutes),
        }
    }
}

// --- Ingestion error log ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    FeedFetch,
    Enrichment,
    Correlation,
    Lifecycle,
}

impl std::fmt::Display for IngestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestStage::FeedFetch => write!(f, "feed_fetch"),
            IngestStage::Enrichment => write!(f, "enrichment"),
            IngestStage::Correlation => write!(f, "correlation"),
            IngestStage::Lifecycle => write!(f, "lifecycle"),
        }
    }
}

impl std::str::FromStr for IngestStage {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "feed_fetch" => Ok(Self::FeedFetch),
            "enrichment" => Ok(Self::Enrichment),
            "correlation" => Ok(Self::Correlation),
            "lifecycle" => Ok(Self::Lifecycle),
            other => Err(format!("unknown IngestStage: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_round_trips() {
        for s in [
            SourceType::NewsMedia,
            SourceType::Twitter,
            SourceType::Telegram,
            SourceType::Government,
            SourceType::Blog,
            SourceType::Other,
        ] {
            assert_eq!(s.to_string().parse::<SourceType>().unwrap(), s);
        }
        for c in [
            EventCategory::Geopolitics,
            EventCategory::Military,
            EventCategory::Cyber,
            EventCategory::Other,
        ] {
            assert_eq!(c.to_string().parse::<EventCategory>().unwrap(), c);
        }
    }

    #[test]
    fn confidence_level_bands() {
        assert_eq!(ConfidenceLevel::from_score(0.95), ConfidenceLevel::Confirmed);
        assert_eq!(ConfidenceLevel::from_score(0.8), ConfidenceLevel::Confirmed);
        assert_eq!(ConfidenceLevel::from_score(0.65), ConfidenceLevel::Probable);
        assert_eq!(ConfidenceLevel::from_score(0.45), ConfidenceLevel::Possible);
        assert_eq!(ConfidenceLevel::from_score(0.25), ConfidenceLevel::Unconfirmed);
        assert_eq!(ConfidenceLevel::from_score(0.1), ConfidenceLevel::Speculative);
    }

    #[test]
    fn novel_event_id_carries_parent() {
        let parent = Event::id_for_source(Uuid::nil());
        assert_eq!(
            Event::novel_id(&parent),
            "novel-evt-00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn feed_due_computation() {
        let now = Utc::now();
        let feed = TrackedFeed {
            id: Uuid::new_v4(),
            platform: "rss".to_string(),
            account_identifier: "https://example.org/feed".to_string(),
            display_name: "Example".to_string(),
            enabled: true,
            fetch_interval_minutes: 30,
            last_fetched_id: None,
            last_fetched_at: None,
        };
        assert!(feed.is_due(now));

        let fetched = TrackedFeed {
            last_fetched_at: Some(now - chrono::Duration::minutes(10)),
            ..feed.clone()
        };
        assert!(!fetched.is_due(now));

        let stale = TrackedFeed {
            last_fetched_at: Some(now - chrono::Duration::minutes(31)),
            ..feed
        };
        assert!(stale.is_due(now));
    }
}
