//! Scripted provider for tests.
//!
//! Responses are queued ahead of time and popped in order, so a test can
//! describe a whole turn (narration, tool decision, validation verdicts)
//! without any network access.

use crate::config::SessionConfig;
use crate::gm::TurnReport;
use crate::provider::{Generate, Generation, GenerationError};
use crate::session::{GameSession, SessionError};
use crate::world::WorldState;
use async_trait::async_trait;
use groq::{ChatMessage, ToolCall, ToolDef};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A `Generate` implementation that replays queued responses.
///
/// When a queue runs dry the provider falls back to a harmless default
/// instead of failing, so tests only script the calls they care about.
#[derive(Debug, Default)]
pub struct MockProvider {
    completions: Mutex<VecDeque<Generation>>,
    structured: Mutex<VecDeque<Value>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text completion.
    pub fn queue_text(&self, text: impl Into<String>) {
        self.completions.lock().unwrap().push_back(Generation {
            text: text.into(),
            tool_calls: Vec::new(),
        });
    }

    /// Queue a completion carrying tool calls.
    pub fn queue_tool_calls(&self, text: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.completions.lock().unwrap().push_back(Generation {
            text: text.into(),
            tool_calls,
        });
    }

    /// Queue a structured (JSON) completion.
    pub fn queue_structured(&self, value: Value) {
        self.structured.lock().unwrap().push_back(value);
    }

    /// Completions still queued and unconsumed.
    pub fn pending(&self) -> usize {
        self.completions.lock().unwrap().len() + self.structured.lock().unwrap().len()
    }
}

#[async_trait]
impl Generate for MockProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _tools: Vec<ToolDef>,
    ) -> Result<Generation, GenerationError> {
        Ok(self
            .completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Generation {
                text: "The story continues.".to_string(),
                tool_calls: Vec::new(),
            }))
    }

    async fn complete_structured(
        &self,
        _messages: Vec<ChatMessage>,
        _schema: &Value,
    ) -> Result<Value, GenerationError> {
        Ok(self
            .structured
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"format_comply_or_not": "comply", "feedback": ""})))
    }
}

/// A session wired to a scripted provider, with shortcuts for the state
/// assertions most tests make.
pub struct TestHarness {
    pub provider: Arc<MockProvider>,
    pub session: GameSession,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        let provider = Arc::new(MockProvider::new());
        let session = GameSession::new(provider.clone(), config);
        Self { provider, session }
    }

    /// Seed the world and designate the player's character.
    pub fn with_player(mut self, name: &str, money: i64) -> Self {
        let mut world = WorldState::new();
        world
            .upsert_character(name, "the player's character", Default::default(), money)
            .unwrap_or_else(|e| panic!("player setup failed: {e}"));
        self.session = self.session.with_world(world);
        self.session
            .begin(name)
            .unwrap_or_else(|e| panic!("player setup failed: {e}"));
        self
    }

    /// Queue a turn that narrates and reports no world action.
    pub fn queue_quiet_turn(&self, narration: &str) {
        self.provider.queue_text(narration);
        self.provider.queue_tool_calls(
            "",
            vec![ToolCall {
                id: "report".to_string(),
                name: "report_action".to_string(),
                arguments: json!({
                    "performed_world_action": false,
                    "reason": "narration only",
                    "summary": "No action"
                }),
            }],
        );
    }

    pub async fn play(&mut self, input: &str) -> Result<TurnReport, SessionError> {
        self.session.player_action(input).await
    }

    pub fn balance_of(&self, name: &str) -> Option<i64> {
        self.session.world().character(name).map(|c| c.money())
    }

    pub fn inventory_len(&self, name: &str) -> Option<usize> {
        self.session.world().character(name).map(|c| c.inventory.len())
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
