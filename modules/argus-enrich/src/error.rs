use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// The model returned unparseable content or violated the output schema.
    #[error("invalid enrichment output: {0}")]
    InvalidOutput(String),

    /// The LLM call itself failed.
    #[error("enrichment upstream error: {0}")]
    Upstream(String),

    /// The per-call deadline elapsed.
    #[error("enrichment timed out after {0}s")]
    Timeout(u64),
}

impl EnrichError {
    pub fn from_ai(err: ai_client::AiClientError) -> Self {
        if err.is_upstream() {
            EnrichError::Upstream(err.to_string())
        } else {
            EnrichError::InvalidOutput(err.to_string())
        }
    }
}
