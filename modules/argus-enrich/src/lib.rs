//! Enrichment pipeline: the LLM-backed enricher, the correlator, the event
//! lifecycle manager, and the worker loop that drains claimed sources.

pub mod correlator;
pub mod enricher;
pub mod error;
pub mod lifecycle;
pub mod prompts;
pub mod worker;

pub use correlator::{Correlator, CorrelationDecision, CorrelationResult, LlmCorrelator, MockCorrelator};
pub use enricher::{EnrichedEvent, Enricher, ExtractedEntity, LlmEnricher, MockEnricher};
pub use error::EnrichError;
pub use lifecycle::{LifecycleManager, ProcessOutcome};
pub use worker::EnrichmentWorker;
