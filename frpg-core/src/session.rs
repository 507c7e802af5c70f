//! A playable game session: world creation, play, save and load.
//!
//! The session glues the engine to a world and exposes the lifecycle a
//! front end drives: create a world from a theme, pick the player's
//! character, exchange turns, and snapshot to disk.

use crate::config::SessionConfig;
use crate::gm::{EngineError, GameMaster, SetupReport, SetupTarget, TurnReport};
use crate::message::Message;
use crate::persist::{self, PersistError, SavedGame};
use crate::provider::{Generate, GroqProvider};
use crate::retrieval::LexicalStore;
use crate::world::{WorldError, WorldState};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("Provider setup failed: {0}")]
    Provider(#[from] groq::Error),
}

/// The rule skeleton world creation asks the designer to flesh out.
const RULE_FORMAT: &str = "There are Players and a Game Master (GM). Ability checks \
use 2d10 (two ten-sided dice), summing the results. To succeed, you must meet or \
exceed the Difficulty Rating (DR) set by the GM: Easy DR 12, Medium DR 16, Hard DR 20, \
Very Hard DR 24. Relevant expertise adds +3; mastery adds +5. Characters have three \
core attributes distributed from 8 points at creation, plus one expertise, one \
motivation and one flaw. For initiative, roll 2d10 plus the relevant attribute, \
highest first. Each character has hit points derived from their physique attribute; \
at zero they are critically injured and roll a death die. At the end of each \
adventure the GM awards advancement points spent on attributes or new expertise.";

/// The ordered world-creation tasks and the artifact each must produce.
fn setup_tasks(theme: &str) -> Vec<(String, SetupTarget)> {
    vec![
        (
            format!("Create an outline for the game's story in theme: {theme}. Store it \
                with the define_story tool."),
            SetupTarget::Story,
        ),
        (
            format!(
                "Write a clear set of game rules for a {theme} game, following this \
                 format: {RULE_FORMAT}\n\nThe rules must be simple, unambiguous, \
                 written in plain language so another evaluator can enforce \
                 compliance, and cover combat, movement, inventory and interaction \
                 with NPCs. Once the rules are ready, store them with the \
                 define_rules tool."
            ),
            SetupTarget::Rules,
        ),
        (
            "Create the main NPC characters. Write a short description of each NPC \
             including their personality or backstory, assign stats in map form \
             (e.g. {\"strength\": 8, \"intelligence\": 6}), and add each NPC to the \
             game with the upsert_character tool."
                .to_string(),
            SetupTarget::Characters,
        ),
        (
            "For each NPC, create appropriate items or weapons with a description \
             and stats where applicable, and add them to the corresponding NPC's \
             inventory with the upsert_inventory_item tool."
                .to_string(),
            SetupTarget::Characters,
        ),
        (
            "Provide the user with a set of choices to design their own starting \
             character. Include options for appearance, initial stats, and a brief \
             backstory."
                .to_string(),
            SetupTarget::Narrative,
        ),
    ]
}

/// One playable game.
pub struct GameSession {
    gm: GameMaster,
    world: WorldState,
    config: SessionConfig,
}

impl GameSession {
    pub fn new(provider: Arc<dyn Generate>, config: SessionConfig) -> Self {
        let gm = GameMaster::new(
            provider,
            Box::new(LexicalStore::new()),
            config.clone(),
        );
        Self {
            gm,
            world: WorldState::new(),
            config,
        }
    }

    /// Build a session backed by the Groq API, keyed from the environment.
    pub fn from_env(config: SessionConfig) -> Result<Self, SessionError> {
        let provider = GroqProvider::from_env()?.with_config(config.provider_config());
        Ok(Self::new(Arc::new(provider), config))
    }

    /// Resume a session over an already-populated world.
    pub fn with_world(mut self, world: WorldState) -> Self {
        self.world = world;
        self
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn history(&self) -> &[Message] {
        self.gm.history()
    }

    pub fn summary(&self) -> Option<&str> {
        self.gm.summary()
    }

    pub fn round(&self) -> usize {
        self.gm.round()
    }

    /// Run the world-creation tasks for a theme, in order.
    ///
    /// The final task's artifact is the character-creation choices shown
    /// to the player; all earlier artifacts land in the world itself.
    pub async fn create_world(&mut self, theme: &str) -> Result<Vec<SetupReport>, SessionError> {
        let mut reports = Vec::new();
        for (index, (task, target)) in setup_tasks(theme).into_iter().enumerate() {
            // Later tasks build on earlier artifacts, so thread the world
            // produced so far into the task text.
            let task = if index == 0 {
                task
            } else {
                format!(
                    "{task}\n\nCurrent game context:\nStory: {}\nCharacters: {}",
                    self.world.story,
                    self.world.roster_json()
                )
            };
            log::info!("world setup: running {target:?} task");
            let report = self.gm.run_setup_task(&task, target, &mut self.world).await?;
            reports.push(report);
        }
        Ok(reports)
    }

    /// Record the player's own character, written directly rather than
    /// through the tool flow.
    pub fn add_player_character(
        &mut self,
        name: &str,
        details: &str,
        money: i64,
    ) -> Result<(), SessionError> {
        self.world
            .upsert_character(name, details, Default::default(), money)?;
        Ok(())
    }

    /// Designate the player's character and begin play.
    pub fn begin(&mut self, player: &str) -> Result<(), SessionError> {
        self.world.assign_roles(player)?;
        Ok(())
    }

    /// Play one round from the player's input.
    pub async fn player_action(&mut self, input: &str) -> Result<TurnReport, SessionError> {
        Ok(self.gm.run_turn(input, &mut self.world).await?)
    }

    /// Snapshot the session to disk.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let snapshot = SavedGame::new(
            self.world.clone(),
            self.gm.history().to_vec(),
            self.gm.summary().map(str::to_string),
            self.gm.fold_cursor(),
            self.gm.round(),
            self.gm.last_actions().map(str::to_string).collect(),
        );
        persist::save(path, &snapshot).await?;
        Ok(())
    }

    /// Load a snapshot from disk and resume it on the given provider.
    pub async fn load(
        path: impl AsRef<Path>,
        provider: Arc<dyn Generate>,
        config: SessionConfig,
    ) -> Result<Self, SessionError> {
        let snapshot = persist::load(path).await?;
        let mut session = Self::new(provider, config);
        session.world = snapshot.world;
        session
            .gm
            .restore(
                snapshot.history,
                snapshot.round,
                snapshot.fold_cursor,
                snapshot.summary,
                snapshot.last_actions,
            )
            .await;
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProvider;
    use serde_json::json;

    fn comply() -> serde_json::Value {
        json!({"format_comply_or_not": "comply", "feedback": ""})
    }

    #[tokio::test]
    async fn test_create_world_runs_all_tasks() {
        let provider = Arc::new(MockProvider::new());

        // Story task.
        provider.queue_tool_calls(
            "",
            vec![groq::ToolCall {
                id: "c1".to_string(),
                name: "define_story".to_string(),
                arguments: json!({"text": "A heist in the undercity."}),
            }],
        );
        provider.queue_structured(comply());
        // Rules task.
        provider.queue_tool_calls(
            "",
            vec![groq::ToolCall {
                id: "c2".to_string(),
                name: "define_rules".to_string(),
                arguments: json!({"text": "Roll 2d10 against the DR."}),
            }],
        );
        provider.queue_structured(comply());
        // NPC task.
        provider.queue_tool_calls(
            "",
            vec![groq::ToolCall {
                id: "c3".to_string(),
                name: "upsert_character".to_string(),
                arguments: json!({
                    "name": "Vex",
                    "details": "a fixer",
                    "stats": {"mind": 5},
                    "money": 500
                }),
            }],
        );
        provider.queue_structured(comply());
        // NPC items task.
        provider.queue_tool_calls(
            "",
            vec![groq::ToolCall {
                id: "c4".to_string(),
                name: "upsert_inventory_item".to_string(),
                arguments: json!({
                    "character_key": "vex",
                    "is_weapon": false,
                    "item_name": "Ledger",
                    "details": "everyone's debts",
                    "value": 100
                }),
            }],
        );
        provider.queue_structured(comply());
        // Player options task.
        provider.queue_text("Choose a background: ganger, netrunner or medtech.");
        provider.queue_structured(comply());

        let mut session = GameSession::new(provider.clone(), SessionConfig::default());
        let reports = session.create_world("cyberpunk").await.unwrap();

        assert_eq!(reports.len(), 5);
        assert_eq!(session.world().story, "A heist in the undercity.");
        assert_eq!(session.world().rules, "Roll 2d10 against the DR.");
        assert!(session.world().character("vex").is_some());
        assert!(session.world().character("vex").unwrap().item("Ledger").is_some());
        assert!(reports[4].artifact.contains("netrunner"));
        assert_eq!(provider.pending(), 0);
    }

    #[tokio::test]
    async fn test_begin_requires_known_character() {
        let provider = Arc::new(MockProvider::new());
        let mut session = GameSession::new(provider, SessionConfig::default());

        assert!(matches!(
            session.begin("ghost"),
            Err(SessionError::World(WorldError::CharacterNotFound(_)))
        ));

        let mut world = WorldState::new();
        world
            .upsert_character("Neon", "a hacker", Default::default(), 100)
            .unwrap();
        session = session.with_world(world);
        session.begin("Neon").unwrap();
        assert_eq!(session.world().primary_character().unwrap().name, "Neon");
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let provider = Arc::new(MockProvider::new());
        provider.queue_text("The bar is dim.");
        provider.queue_tool_calls(
            "",
            vec![groq::ToolCall {
                id: "r1".to_string(),
                name: "report_action".to_string(),
                arguments: json!({
                    "performed_world_action": false,
                    "reason": "nothing happened",
                    "summary": "No action"
                }),
            }],
        );

        let mut session = GameSession::new(provider.clone(), SessionConfig::default());
        let mut world = WorldState::new();
        world
            .upsert_character("Neon", "a hacker", Default::default(), 100)
            .unwrap();
        session = session.with_world(world);
        session.begin("Neon").unwrap();
        session.player_action("I enter the bar").await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("save.json");
        session.save(&path).await.unwrap();

        let restored = GameSession::load(&path, provider, SessionConfig::default())
            .await
            .unwrap();

        assert_eq!(restored.round(), 1);
        assert_eq!(restored.world().character("neon").unwrap().money(), 100);
        assert_eq!(
            restored.history().len(),
            session.history().len()
        );
    }
}
