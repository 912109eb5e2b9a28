//! Minimal Anthropic Messages API client.
//!
//! Two call shapes: `extract` for schema-constrained structured output via
//! forced tool use, and `complete` for plain text. Errors are typed so
//! callers can tell an upstream failure from unusable model output.

mod client;
pub mod schema;

use std::time::Duration;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use thiserror::Error;

use client::{ChatRequest, HttpTransport, ToolDefinitionWire, WireMessage};

#[derive(Debug, Error)]
pub enum AiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("API key contains invalid header characters")]
    InvalidApiKey,

    #[error("no structured output block in response")]
    MissingOutput,

    #[error("failed to deserialize structured output: {0}")]
    Deserialize(#[from] serde_json::Error),
}

impl AiClientError {
    /// True when the failure is on the provider side (network, 5xx, rate
    /// limit) rather than in the shape of what the model returned.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            AiClientError::Http(_) | AiClientError::Api { .. } | AiClientError::InvalidApiKey
        )
    }
}

#[derive(Clone)]
pub struct Claude {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Duration,
}

impl Claude {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: Duration::from_secs(120),
        }
    }

    /// Point the client at a different server. Used by tests to talk to a stub.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Transport-level timeout for a single call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn transport(&self) -> HttpTransport {
        let transport = HttpTransport::new(&self.api_key, self.timeout);
        if let Some(ref url) = self.base_url {
            transport.with_base_url(url)
        } else {
            transport
        }
    }

    /// Ask the model for a `T`, constrained by its JSON schema via forced
    /// tool use.
    pub async fn extract<T: JsonSchema + DeserializeOwned>(
        &self,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Result<T, AiClientError> {
        let tool_name = "structured_response";
        let mut request = ChatRequest::new(&self.model);
        request.system = Some(system_prompt.into());
        request.messages.push(WireMessage::user(user_prompt));
        request.tools.push(ToolDefinitionWire {
            name: tool_name.to_string(),
            description: "Report the extraction result.".to_string(),
            input_schema: schema::tool_input_schema::<T>(),
        });
        request.tool_choice = Some(serde_json::json!({
            "type": "tool",
            "name": tool_name,
        }));

        let response = self.transport().chat(&request).await?;
        let input = response.tool_input().ok_or(AiClientError::MissingOutput)?;
        Ok(serde_json::from_value(input.clone())?)
    }

    /// Plain text completion.
    pub async fn complete(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<String, AiClientError> {
        let mut request = ChatRequest::new(&self.model);
        request.system = Some(system.into());
        request.messages.push(WireMessage::user(user));

        let response = self.transport().chat(&request).await?;
        response.text().ok_or(AiClientError::MissingOutput)
    }
}
