//! Session configuration.

use crate::provider::ProviderConfig;

/// Configuration for a game session.
///
/// The compaction and retrieval constants are tunables, not contract;
/// the defaults follow the values the engine was developed against.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model override for the generation client.
    pub model: Option<String>,

    /// Maximum tokens per generation call.
    pub max_tokens: usize,

    /// Temperature for generation.
    pub temperature: Option<f32>,

    /// Messages kept verbatim in the prompt's recent window.
    pub recent_window: usize,

    /// Foldable messages consumed per compaction trigger.
    pub compaction_batch: usize,

    /// Turns between compaction triggers.
    pub compaction_every: usize,

    /// Chunk size (characters) for indexing folded transcript.
    pub chunk_size: usize,

    /// Overlap (characters) between consecutive chunks.
    pub chunk_overlap: usize,

    /// Fragments retrieved into the prompt per turn.
    pub retrieval_top_k: usize,

    /// Generation attempts per setup task before giving up.
    pub retry_ceiling: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            temperature: Some(0.8),
            recent_window: 10,
            compaction_batch: 2,
            compaction_every: 4,
            chunk_size: 500,
            chunk_overlap: 100,
            retrieval_top_k: 3,
            retry_ceiling: 3,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_recent_window(mut self, messages: usize) -> Self {
        self.recent_window = messages;
        self
    }

    pub fn with_compaction_batch(mut self, messages: usize) -> Self {
        self.compaction_batch = messages;
        self
    }

    pub fn with_compaction_every(mut self, turns: usize) -> Self {
        self.compaction_every = turns;
        self
    }

    pub fn with_retrieval_top_k(mut self, k: usize) -> Self {
        self.retrieval_top_k = k;
        self
    }

    pub fn with_retry_ceiling(mut self, attempts: usize) -> Self {
        self.retry_ceiling = attempts.max(1);
        self
    }

    /// Provider tunables derived from this config.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = SessionConfig::new()
            .with_model("llama-3.1-8b-instant")
            .with_recent_window(6)
            .with_compaction_every(2)
            .with_retry_ceiling(5);

        assert_eq!(config.model.as_deref(), Some("llama-3.1-8b-instant"));
        assert_eq!(config.recent_window, 6);
        assert_eq!(config.compaction_every, 2);
        assert_eq!(config.retry_ceiling, 5);
    }

    #[test]
    fn test_retry_ceiling_floor() {
        let config = SessionConfig::new().with_retry_ceiling(0);
        assert_eq!(config.retry_ceiling, 1);
    }
}
