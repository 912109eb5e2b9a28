//! Read-query types shared by the store and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ArgusError;
use crate::types::{Event, EventCategory, EventStatus, EntityType, SourceType};

pub const QUERY_DEFAULT_LIMIT: u32 = 20;
pub const QUERY_MAX_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSort {
    Timestamp,
    Magnitude,
    Confidence,
    CreatedAt,
    UpdatedAt,
}

impl std::str::FromStr for EventSort {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "timestamp" => Ok(Self::Timestamp),
            "magnitude" => Ok(Self::Magnitude),
            "confidence" => Ok(Self::Confidence),
            "created_at" => Ok(Self::CreatedAt),
            "updated_at" => Ok(Self::UpdatedAt),
            other => Err(format!("unknown sort_by: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort_order: {other}")),
        }
    }
}

/// A validated read query over events. All filters optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQuery {
    pub search_query: Option<String>,
    pub since_timestamp: Option<DateTime<Utc>>,
    pub until_timestamp: Option<DateTime<Utc>>,
    pub min_magnitude: Option<f64>,
    pub min_confidence: Option<f64>,
    pub categories: Vec<EventCategory>,
    pub source_types: Vec<SourceType>,
    pub tags: Vec<String>,
    pub entity_types: Vec<EntityType>,
    pub status: Option<EventStatus>,
    pub page: u32,
    pub limit: u32,
    pub sort_by: EventSort,
    pub sort_order: SortOrder,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            search_query: None,
            since_timestamp: None,
            until_timestamp: None,
            min_magnitude: None,
            min_confidence: None,
            categories: Vec::new(),
            source_types: Vec::new(),
            tags: Vec::new(),
            entity_types: Vec::new(),
            status: None,
            page: 1,
            limit: QUERY_DEFAULT_LIMIT,
            sort_by: EventSort::Timestamp,
            sort_order: SortOrder::Desc,
        }
    }
}

impl EventQuery {
    /// Validate range constraints. Enum values are rejected earlier, at parse
    /// time. The error carries the machine-readable reason.
    pub fn validate(&self) -> Result<(), ArgusError> {
        if self.page < 1 {
            return Err(ArgusError::Validation("page must be >= 1".to_string()));
        }
        if self.limit < 1 || self.limit > QUERY_MAX_LIMIT {
            return Err(ArgusError::Validation(format!(
                "limit must be in [1, {QUERY_MAX_LIMIT}]"
            )));
        }
        if let Some(m) = self.min_magnitude {
            if !(0.0..=10.0).contains(&m) {
                return Err(ArgusError::Validation(
                    "min_magnitude must be in [0, 10]".to_string(),
                ));
            }
        }
        if let Some(c) = self.min_confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(ArgusError::Validation(
                    "min_confidence must be in [0, 1]".to_string(),
                ));
            }
        }
        if let (Some(since), Some(until)) = (self.since_timestamp, self.until_timestamp) {
            if until < since {
                return Err(ArgusError::Validation(
                    "until_timestamp precedes since_timestamp".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * (self.limit as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResponse {
    pub events: Vec<Event>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl EventResponse {
    pub fn new(events: Vec<Event>, total: u64, page: u32, limit: u32) -> Self {
        let has_more = (page as u64) * (limit as u64) < total;
        Self {
            events,
            total,
            page,
            limit,
            has_more,
        }
    }
}
