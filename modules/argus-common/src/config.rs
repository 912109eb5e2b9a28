use std::env;

use crate::error::ArgusError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // LLM provider
    pub anthropic_api_key: String,
    /// Model used for source enrichment.
    pub enrich_model: String,
    /// Model used for event correlation.
    pub correlate_model: String,
    /// Per-LLM-call deadline in seconds.
    pub llm_timeout_secs: u64,
    /// Override for the enrichment system prompt; the built-in default is
    /// used when unset.
    pub enrich_system_prompt: Option<String>,

    // Web server
    pub server_host: String,
    pub server_port: u16,

    // Pipeline
    /// Number of enrichment workers spawned in this process.
    pub worker_count: usize,
    /// Seconds between ingestion scheduler ticks.
    pub ingest_tick_secs: u64,
    /// Minutes after which an `enriching` claim is considered stale.
    pub claim_stale_after_minutes: i64,
    /// Whether the threshold gate publishes automatically.
    pub auto_publish: bool,
}

const DEFAULT_ENRICH_MODEL: &str = "claude-haiku-4-5-20251001";
const DEFAULT_CORRELATE_MODEL: &str = "claude-haiku-4-5-20251001";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ArgusError> {
        Ok(Self {
            database_url: required_env("DATABASE_URL")?,
            anthropic_api_key: required_env("ANTHROPIC_API_KEY")?,
            enrich_model: env::var("ENRICH_MODEL")
                .unwrap_or_else(|_| DEFAULT_ENRICH_MODEL.to_string()),
            correlate_model: env::var("CORRELATE_MODEL")
                .unwrap_or_else(|_| DEFAULT_CORRELATE_MODEL.to_string()),
            llm_timeout_secs: env_parse("LLM_TIMEOUT_SECS", 120),
            enrich_system_prompt: env::var("ENRICH_SYSTEM_PROMPT").ok(),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| ArgusError::Config("SERVER_PORT must be a number".to_string()))?,
            worker_count: env_parse("WORKER_COUNT", 1),
            ingest_tick_secs: env_parse("INGEST_TICK_SECS", 60),
            claim_stale_after_minutes: env_parse("CLAIM_STALE_AFTER_MINUTES", 15),
            auto_publish: env::var("AUTO_PUBLISH")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        })
    }

    /// Log the shape of each sensitive env var for debugging, never the value.
    pub fn log_redacted(&self) {
        let vars = [
            ("DATABASE_URL", &self.database_url),
            ("ANTHROPIC_API_KEY", &self.anthropic_api_key),
        ];
        for (name, value) in vars {
            if value.is_empty() {
                tracing::info!("{name} = (empty)");
            } else {
                tracing::info!("{name} = ({} chars)", value.len());
            }
        }
    }
}

fn required_env(key: &str) -> Result<String, ArgusError> {
    env::var(key)
        .map_err(|_| ArgusError::Config(format!("{key} environment variable is required")))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
