use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AstoundError, Result};

/// Request settings that vary by use: field discovery wants a tiny,
/// deterministic answer; summaries get a larger budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl GenerationSettings {
    pub fn field_query() -> Self {
        Self {
            max_tokens: 50,
            temperature: 0.0,
        }
    }

    pub fn summary() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.0,
        }
    }
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self::summary()
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: String,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new(model: &str, settings: &GenerationSettings, system: &str, prompt: String) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            system: system.to_string(),
            prompt,
        }
    }
}

/// Blocking prompt → text service.
pub trait TextGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API client over `ureq`.
pub struct AnthropicClient {
    api_base: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl AnthropicClient {
    pub fn new(api_base: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a client from the key stored in `env_var`, if set and non-empty.
    pub fn from_env(api_base: &str, env_var: &str) -> Option<Self> {
        let key = std::env::var(env_var).ok()?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        Some(Self::new(api_base, key))
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}

impl TextGenerator for AnthropicClient {
    fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": request.system,
            "messages": [{ "role": "user", "content": request.prompt }],
        });

        tracing::debug!(model = %request.model, max_tokens = request.max_tokens, "sending generation request");

        let response = ureq::post(&self.endpoint())
            .set("x-api-key", &self.api_key)
            .set("anthropic-version", ANTHROPIC_VERSION)
            .set("content-type", "application/json")
            .send_json(body)
            .map_err(|e| AstoundError::Generation(e.to_string()))?;

        let parsed: MessagesResponse = response
            .into_json()
            .map_err(|e| AstoundError::Generation(format!("malformed response: {e}")))?;

        parsed
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| AstoundError::Generation("response has no text content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = AnthropicClient::new("https://api.example.com/", "k");
        assert_eq!(client.endpoint(), "https://api.example.com/v1/messages");
    }

    #[test]
    fn response_text_block_is_extracted() {
        let raw = r#"{"content":[{"type":"text","text":"targets, value"}],"model":"m"}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content[0].kind, "text");
        assert_eq!(parsed.content[0].text.as_deref(), Some("targets, value"));
    }

    #[test]
    fn field_queries_are_deterministic() {
        let settings = GenerationSettings::field_query();
        assert_eq!(settings.temperature, 0.0);
        assert!(settings.max_tokens < GenerationSettings::summary().max_tokens);
    }
}
