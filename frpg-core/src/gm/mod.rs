//! The game master: turn orchestration, context compaction and setup
//! validation.

pub mod compactor;
pub mod engine;
pub mod validator;

pub use compactor::{Compactor, FoldReport};
pub use engine::{EngineError, GameMaster, SetupReport, SetupTarget, TurnReport};
pub use validator::{Compliance, Verdict};
