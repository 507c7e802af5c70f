//! Generation provider seam.
//!
//! The engine treats language generation as a black box: prompt messages
//! in, text plus optional tool calls out. The trait keeps the engine
//! testable with a scripted provider and lets the backing model change
//! without touching orchestration code.

use async_trait::async_trait;
use groq::{ChatMessage, Request, ResponseFormat, ToolCall, ToolDef};
use serde_json::Value;
use thiserror::Error;

/// Errors from the generation capability.
///
/// Not recoverable locally; a failed generation call terminates the turn.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Generation unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed generation output: {0}")]
    Malformed(String),
}

impl From<groq::Error> for GenerationError {
    fn from(e: groq::Error) -> Self {
        GenerationError::Unavailable(e.to_string())
    }
}

/// A generation result: free text plus any requested tool calls.
#[derive(Debug, Clone, Default)]
pub struct Generation {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// The language-generation capability consumed by the engine.
#[async_trait]
pub trait Generate: Send + Sync {
    /// Complete a prompt, optionally offering tools.
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
    ) -> Result<Generation, GenerationError>;

    /// Complete a prompt constrained to a JSON object matching `schema`.
    async fn complete_structured(
        &self,
        messages: Vec<ChatMessage>,
        schema: &Value,
    ) -> Result<Value, GenerationError>;
}

/// Tunables forwarded to the backing model on every call.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.8),
        }
    }
}

/// Groq-backed provider.
pub struct GroqProvider {
    client: groq::Groq,
    config: ProviderConfig,
}

impl GroqProvider {
    pub fn new(client: groq::Groq) -> Self {
        Self {
            client,
            config: ProviderConfig::default(),
        }
    }

    /// Build from the GROQ_API_KEY environment variable.
    pub fn from_env() -> Result<Self, groq::Error> {
        Ok(Self::new(groq::Groq::from_env()?))
    }

    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    fn apply_config(&self, mut request: Request) -> Request {
        if let Some(ref model) = self.config.model {
            request = request.with_model(model);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request.with_max_tokens(self.config.max_tokens)
    }
}

#[async_trait]
impl Generate for GroqProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDef>,
    ) -> Result<Generation, GenerationError> {
        let mut request = self.apply_config(Request::new(messages));
        if !tools.is_empty() {
            request = request
                .with_tools(tools)
                .with_tool_choice(groq::ToolChoice::Auto);
        }

        let response = self.client.complete(request).await?;
        Ok(Generation {
            text: response.content,
            tool_calls: response.tool_calls,
        })
    }

    async fn complete_structured(
        &self,
        mut messages: Vec<ChatMessage>,
        schema: &Value,
    ) -> Result<Value, GenerationError> {
        messages.push(ChatMessage::user(format!(
            "Respond with ONLY a JSON object matching this schema (no markdown, no \
             commentary):\n{schema}"
        )));

        let request = self
            .apply_config(Request::new(messages))
            .with_response_format(ResponseFormat::JsonObject);

        let response = self.client.complete(request).await?;
        parse_json_output(&response.content)
    }
}

/// Extract a JSON object from model output that may be fenced in markdown.
pub fn parse_json_output(text: &str) -> Result<Value, GenerationError> {
    let candidate = extract_json(text);
    serde_json::from_str(candidate)
        .map_err(|e| GenerationError::Malformed(format!("{e}: {candidate}")))
}

fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_plain() {
        let text = r#"{"compliance": "comply"}"#;
        assert_eq!(extract_json(text), text);
    }

    #[test]
    fn test_extract_json_markdown() {
        let text = "```json\n{\"compliance\": \"comply\"}\n```";
        assert_eq!(extract_json(text), r#"{"compliance": "comply"}"#);
    }

    #[test]
    fn test_extract_json_markdown_no_specifier() {
        let text = "```\n{\"feedback\": \"ok\"}\n```";
        assert_eq!(extract_json(text), r#"{"feedback": "ok"}"#);
    }

    #[test]
    fn test_parse_json_output_rejects_garbage() {
        assert!(parse_json_output("not json at all").is_err());
    }
}
