//! Conversation messages and history filtering.
//!
//! Messages are append-only within a session. Context injections and raw
//! tool results are never edited in place; they are tombstoned by kind and
//! dropped when the working history is filtered before prompt assembly.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for messages.
///
/// Stable across repeated emission, so a presentation layer can deduplicate
/// messages it has already rendered while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The participant at the keyboard.
    Player,
    /// The game master agent.
    Gm,
    /// The result of a tool invocation.
    Tool,
}

/// How a message participates in context filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Regular dialogue; kept in the working history.
    Dialogue,
    /// Repeated rule/context injection; tombstoned before prompt assembly.
    ContextInjection,
    /// Raw tool output; tombstoned before prompt assembly and skipped by
    /// the compactor.
    ToolResult,
}

/// An immutable record in the session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub kind: MessageKind,
    pub content: String,
}

impl Message {
    pub fn player(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Player,
            kind: MessageKind::Dialogue,
            content: content.into(),
        }
    }

    pub fn gm(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Gm,
            kind: MessageKind::Dialogue,
            content: content.into(),
        }
    }

    pub fn tool_result(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Tool,
            kind: MessageKind::ToolResult,
            content: content.into(),
        }
    }

    pub fn injection(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Player,
            kind: MessageKind::ContextInjection,
            content: content.into(),
        }
    }

    /// Speaker tag used when rendering transcript lines for compaction.
    pub fn speaker_label(&self) -> &'static str {
        match self.role {
            Role::Player => "Player",
            Role::Gm => "GM",
            Role::Tool => "Tool",
        }
    }

    /// Whether the compactor folds this message into the rolling summary.
    /// Tombstoned kinds are skipped; only dialogue is summarized.
    pub fn is_foldable(&self) -> bool {
        self.kind == MessageKind::Dialogue
    }
}

/// Filter tombstoned messages out of the working history.
///
/// Pure function over the message sequence; the raw transcript is left
/// untouched.
pub fn filter_working(history: &[Message]) -> Vec<&Message> {
    history
        .iter()
        .filter(|m| m.kind == MessageKind::Dialogue)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_drops_tombstones() {
        let history = vec![
            Message::player("I enter the bar"),
            Message::injection("The main story of my game is..."),
            Message::gm("The bar is dim and crowded."),
            Message::tool_result("balance is 150"),
        ];

        let working = filter_working(&history);
        assert_eq!(working.len(), 2);
        assert_eq!(working[0].content, "I enter the bar");
        assert_eq!(working[1].content, "The bar is dim and crowded.");
    }

    #[test]
    fn test_filter_is_pure() {
        let history = vec![Message::tool_result("x"), Message::player("y")];
        let _ = filter_working(&history);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_message_ids_are_stable() {
        let msg = Message::player("hello");
        let id = msg.id;
        assert_eq!(msg.id, id);
        assert_ne!(Message::player("hello").id, id);
    }

    #[test]
    fn test_foldable() {
        assert!(Message::player("a").is_foldable());
        assert!(Message::gm("b").is_foldable());
        assert!(!Message::tool_result("c").is_foldable());
        assert!(!Message::injection("d").is_foldable());
    }
}
