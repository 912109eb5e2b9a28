//! Event correlation: decide whether a new source duplicates a recent
//! event, and pull out whatever facts it adds.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use ai_client::Claude;
use argus_common::types::{Event, Source};

use crate::prompts::CORRELATE_SYSTEM_PROMPT;

/// Below this similarity a merge is never performed, whatever the model says.
pub const MERGE_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Candidate content sent to the model is truncated per event.
const CANDIDATE_SUMMARY_CHARS: usize = 400;

/// New-source content is truncated before the model call.
const MAX_CONTENT_CHARS: usize = 20_000;

/// What the LLM returns for a correlation check.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CorrelationOutput {
    /// Id of the best-matching candidate event, or null
    pub matched_event_id: Option<String>,
    /// 0.0-1.0 likelihood the source describes that candidate's incident
    pub similarity: f64,
    /// True only for same-incident reports with similarity >= 0.6
    pub should_merge: bool,
    /// True when the source adds concrete facts the match lacks
    pub has_novel_facts: bool,
    /// The new facts, one short sentence each
    pub novel_facts: Vec<String>,
    /// One or two sentences for the decision
    pub reasoning: String,
}

/// The codified correlation verdict.
#[derive(Debug, Clone)]
pub struct CorrelationResult {
    pub similarity: f64,
    pub should_merge: bool,
    pub has_novel_facts: bool,
    pub novel_facts: Vec<String>,
    pub reasoning: String,
}

impl CorrelationResult {
    /// The "no match" verdict, also used when correlation soft-fails.
    pub fn no_match(reasoning: impl Into<String>) -> Self {
        Self {
            similarity: 0.0,
            should_merge: false,
            has_novel_facts: false,
            novel_facts: Vec::new(),
            reasoning: reasoning.into(),
        }
    }
}

/// A correlation decision: the matched event (if any) and the verdict.
#[derive(Debug, Clone)]
pub struct CorrelationDecision {
    pub best_match: Option<Event>,
    pub result: CorrelationResult,
}

pub enum Correlator {
    Llm(LlmCorrelator),
    Mock(MockCorrelator),
}

impl Correlator {
    /// Correlate a new source against candidate events. Never fails: an
    /// unusable model response degrades to "no match".
    pub async fn correlate(&self, source: &Source, candidates: &[Event]) -> CorrelationDecision {
        match self {
            Correlator::Llm(inner) => inner.correlate(source, candidates).await,
            Correlator::Mock(inner) => inner.correlate(candidates),
        }
    }
}

pub struct LlmCorrelator {
    claude: Claude,
    deadline: Duration,
}

impl LlmCorrelator {
    pub fn new(claude: Claude, deadline: Duration) -> Self {
        Self { claude, deadline }
    }

    async fn correlate(&self, source: &Source, candidates: &[Event]) -> CorrelationDecision {
        if candidates.is_empty() {
            return CorrelationDecision {
                best_match: None,
                result: CorrelationResult::no_match("no recent candidates"),
            };
        }

        let user_prompt = build_user_prompt(source, candidates);
        let outcome = tokio::time::timeout(
            self.deadline,
            self.claude
                .extract::<CorrelationOutput>(CORRELATE_SYSTEM_PROMPT, &user_prompt),
        )
        .await;

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                // Soft failure: the event proceeds as new
                warn!(source_id = %source.id, error = %e, "correlation failed, treating as no match");
                return CorrelationDecision {
                    best_match: None,
                    result: CorrelationResult::no_match(format!("correlation failed: {e}")),
                };
            }
            Err(_) => {
                warn!(source_id = %source.id, "correlation timed out, treating as no match");
                return CorrelationDecision {
                    best_match: None,
                    result: CorrelationResult::no_match("correlation timed out"),
                };
            }
        };

        resolve_verdict(output, candidates)
    }
}

/// Fixed-verdict correlator for tests: matches the first candidate (when
/// told to) with a preset result.
pub struct MockCorrelator {
    pub result: CorrelationResult,
    pub match_first: bool,
}

impl MockCorrelator {
    pub fn no_match() -> Self {
        Self {
            result: CorrelationResult::no_match("mock"),
            match_first: false,
        }
    }

    fn correlate(&self, candidates: &[Event]) -> CorrelationDecision {
        let best_match = if self.match_first {
            candidates.first().cloned()
        } else {
            None
        };
        let mut result = self.result.clone();
        if best_match.is_none() {
            result.should_merge = false;
        }
        CorrelationDecision { best_match, result }
    }
}

fn build_user_prompt(source: &Source, candidates: &[Event]) -> String {
    let mut prompt = String::new();
    prompt.push_str("New source:\n");
    prompt.push_str(&format!(
        "Title: {}\nURL: {}\nPublished: {}\n\n{}\n\n",
        source.title,
        source.url,
        source.published_at.to_rfc3339(),
        truncate(&source.raw_content, MAX_CONTENT_CHARS),
    ));
    prompt.push_str("Candidate events:\n");
    for event in candidates {
        prompt.push_str(&format!(
            "- id: {}\n  timestamp: {}\n  title: {}\n  summary: {}\n",
            event.id,
            event.timestamp.to_rfc3339(),
            event.title,
            truncate(&event.summary, CANDIDATE_SUMMARY_CHARS),
        ));
    }
    prompt
}

/// Turn raw model output into a decision, enforcing the policy rules in
/// code: the matched id must exist in the candidate set, and a merge
/// requires similarity at or above the threshold.
pub fn resolve_verdict(output: CorrelationOutput, candidates: &[Event]) -> CorrelationDecision {
    let best_match = output
        .matched_event_id
        .as_deref()
        .and_then(|id| candidates.iter().find(|e| e.id == id))
        .cloned();

    let similarity = output.similarity.clamp(0.0, 1.0);
    let mut should_merge = output.should_merge && best_match.is_some();
    if similarity < MERGE_SIMILARITY_THRESHOLD {
        should_merge = false;
    }

    let has_novel_facts = output.has_novel_facts && !output.novel_facts.is_empty();
    let novel_facts = if has_novel_facts {
        output.novel_facts
    } else {
        Vec::new()
    };

    CorrelationDecision {
        best_match,
        result: CorrelationResult {
            similarity,
            should_merge,
            has_novel_facts,
            novel_facts,
            reasoning: output.reasoning,
        },
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
