//! Turn orchestration engine for an LLM-driven FRPG game master.
//!
//! This crate provides:
//! - A turn pipeline: history filtering, context compaction, prompt
//!   assembly, narration, tool routing and tool execution
//! - A world-creation flow with structured-output validation and bounded
//!   retry
//! - A tool registry mutating the shared world state
//! - Session persistence as versioned JSON snapshots
//!
//! # Quick Start
//!
//! ```ignore
//! use frpg_core::{GameSession, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SessionConfig::new().with_model("llama-3.3-70b-versatile");
//!     let mut session = GameSession::from_env(config)?;
//!
//!     session.create_world("cyberpunk").await?;
//!     session.begin("Neon")?;
//!
//!     let report = session.player_action("I enter the bar").await?;
//!     println!("{}", report.narrative);
//!
//!     session.save("game.json").await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dice;
pub mod gm;
pub mod message;
pub mod persist;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod testing;
pub mod tools;
pub mod world;

// Re-export the client types that appear in the public API
pub use groq::{ChatMessage, ToolCall, ToolDef};

// Primary public API
pub use config::SessionConfig;
pub use gm::{EngineError, GameMaster, SetupReport, SetupTarget, TurnReport};
pub use message::{filter_working, Message, MessageId, MessageKind, Role};
pub use provider::{Generate, Generation, GenerationError, GroqProvider, ProviderConfig};
pub use retrieval::{Fragment, LexicalStore, RetrievalStore};
pub use session::{GameSession, SessionError};
pub use testing::{MockProvider, TestHarness};
pub use tools::{ToolError, ToolOutcome, ToolRegistry};
pub use world::{Character, CharacterRole, Item, MoneyOutcome, WorldError, WorldState};
