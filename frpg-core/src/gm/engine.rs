//! The game master engine: turn orchestration and world setup.
//!
//! A turn moves through fixed stages: record the player's input, compact
//! old transcript if due, assemble the prompt from world state plus
//! retrieved and summarized context, narrate, then run a separate
//! tool-decision pass whose calls mutate the world through the registry.
//! Setup tasks run a narrower loop: generate with tools, snapshot the
//! target artifact, validate, and retry with feedback up to a ceiling.

use crate::config::SessionConfig;
use crate::gm::compactor::Compactor;
use crate::gm::validator::{self, Verdict};
use crate::message::{filter_working, Message, Role};
use crate::provider::{Generate, GenerationError};
use crate::retrieval::RetrievalStore;
use crate::tools::ToolRegistry;
use crate::world::WorldState;
use groq::{ChatMessage, ToolCall, ToolDef};
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

const GM_BASE_PROMPT: &str = include_str!("prompts/gm_base.txt");
const DESIGNER_PROMPT: &str = include_str!("prompts/designer.txt");
const TOOL_DECIDER_PROMPT: &str = include_str!("prompts/tool_decider.txt");

/// Actions remembered to suppress duplicate tool application.
const LAST_ACTIONS_KEPT: usize = 2;

/// Errors that terminate a turn or a setup task.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Setup task failed validation after {attempts} attempts: {last_feedback}")]
    ConvergenceExceeded {
        attempts: usize,
        last_feedback: String,
    },
}

/// What a completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// The game master's narration for this turn.
    pub narrative: String,
    /// Messages appended to the transcript this turn, in order.
    pub new_messages: Vec<Message>,
    /// World-mutating tool calls applied (excludes the action report).
    pub tool_invocations: usize,
    /// Whether a compaction fold ran this turn.
    pub compacted: bool,
}

/// Which world artifact a setup task produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupTarget {
    /// The story text stored via `define_story`.
    Story,
    /// The rules text stored via `define_rules`.
    Rules,
    /// The character roster.
    Characters,
    /// Free text returned directly, not stored in the world.
    Narrative,
}

/// Result of a converged setup task.
#[derive(Debug, Clone)]
pub struct SetupReport {
    /// The artifact that passed validation.
    pub artifact: String,
    /// Attempts used, counting the successful one.
    pub attempts: usize,
}

/// The self-reported outcome of a tool-decision pass.
#[derive(Debug, Deserialize)]
struct ActionReport {
    performed_world_action: bool,
    #[allow(dead_code)]
    reason: String,
    summary: String,
}

fn report_action_def() -> ToolDef {
    ToolDef {
        name: "report_action".to_string(),
        description: "Report whether the last round required world changes. Always \
            call this exactly once, after any other tool calls."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "performed_world_action": {
                    "type": "boolean",
                    "description": "True if any other tool was used this round"
                },
                "reason": {
                    "type": "string",
                    "description": "Why tools were or were not needed"
                },
                "summary": {
                    "type": "string",
                    "description": "One sentence describing the applied action, or \
                        'No action' if none"
                }
            },
            "required": ["performed_world_action", "reason", "summary"]
        }),
    }
}

/// Turn orchestrator. Owns the transcript and the compaction state; the
/// world is passed in per call and mutated only through the registry.
pub struct GameMaster {
    provider: Arc<dyn Generate>,
    registry: ToolRegistry,
    retrieval: Box<dyn RetrievalStore>,
    compactor: Compactor,
    history: Vec<Message>,
    last_actions: VecDeque<String>,
    round: usize,
    turns_since_fold: usize,
    config: SessionConfig,
}

impl GameMaster {
    pub fn new(
        provider: Arc<dyn Generate>,
        retrieval: Box<dyn RetrievalStore>,
        config: SessionConfig,
    ) -> Self {
        let compactor = Compactor::new(
            config.compaction_batch,
            config.chunk_size,
            config.chunk_overlap,
        );
        let mut last_actions = VecDeque::with_capacity(LAST_ACTIONS_KEPT);
        last_actions.push_back("No action yet.".to_string());

        Self {
            provider,
            registry: ToolRegistry::standard(),
            retrieval,
            compactor,
            history: Vec::new(),
            last_actions,
            round: 0,
            turns_since_fold: 0,
            config,
        }
    }

    /// The raw transcript, including tombstoned messages.
    pub fn history(&self) -> &[Message] {
        &self.history
    }

    /// Rounds of play completed.
    pub fn round(&self) -> usize {
        self.round
    }

    /// The current rolling summary, if any fold has happened.
    pub fn summary(&self) -> Option<&str> {
        self.compactor.summary()
    }

    /// How far compaction has advanced into the transcript.
    pub fn fold_cursor(&self) -> usize {
        self.compactor.fold_cursor()
    }

    /// Recent action summaries, oldest first.
    pub fn last_actions(&self) -> impl Iterator<Item = &str> {
        self.last_actions.iter().map(String::as_str)
    }

    /// Restore orchestration state from a saved snapshot, rebuilding the
    /// retrieval index from the folded prefix of the transcript.
    pub async fn restore(
        &mut self,
        history: Vec<Message>,
        round: usize,
        fold_cursor: usize,
        summary: Option<String>,
        last_actions: Vec<String>,
    ) {
        self.history = history;
        self.round = round;
        self.compactor.restore(fold_cursor, summary);
        self.last_actions = last_actions.into_iter().collect();
        if self.last_actions.is_empty() {
            self.last_actions.push_back("No action yet.".to_string());
        }
        self.compactor
            .rebuild_index(&self.history, self.retrieval.as_mut())
            .await;
    }

    /// Play one round: narrate the player's input, then apply any world
    /// changes the round implies.
    pub async fn run_turn(
        &mut self,
        input: &str,
        world: &mut WorldState,
    ) -> Result<TurnReport, EngineError> {
        self.round += 1;
        let turn_start = self.history.len();
        self.history.push(Message::player(input));

        log::debug!("round {}: filtering working history", self.round);
        let compacted = self.maybe_compact().await?;

        log::debug!("round {}: assembling prompt", self.round);
        let prompt = self.assemble_prompt(input, world).await;

        log::debug!("round {}: generating narration", self.round);
        let generation = self.provider.complete(prompt, Vec::new()).await?;
        let narrative = generation.text;
        self.history.push(Message::gm(narrative.clone()));

        log::debug!("round {}: tool decision", self.round);
        let tool_invocations = self.decide_and_apply_tools(input, &narrative, world).await?;

        Ok(TurnReport {
            narrative,
            new_messages: self.history[turn_start..].to_vec(),
            tool_invocations,
            compacted,
        })
    }

    /// Fold old transcript if the cadence says so.
    async fn maybe_compact(&mut self) -> Result<bool, EngineError> {
        self.turns_since_fold += 1;
        if self.turns_since_fold < self.config.compaction_every
            || !self.compactor.has_unfolded(&self.history)
        {
            return Ok(false);
        }

        self.turns_since_fold = 0;
        let report = self
            .compactor
            .fold(
                &self.history,
                self.round,
                self.provider.as_ref(),
                self.retrieval.as_mut(),
            )
            .await?;
        Ok(report.messages_folded > 0)
    }

    /// Build the narration prompt: base persona, injected world context,
    /// then the recent window of dialogue ending with the player's input.
    async fn assemble_prompt(&mut self, input: &str, world: &WorldState) -> Vec<ChatMessage> {
        let mut context = String::new();
        context.push_str(&format!("The main story of the game:\n{}\n\n", world.story));
        context.push_str(&format!("The rules of the game:\n{}\n\n", world.rules));
        context.push_str(&format!(
            "The current characters, their inventories and stats:\n{}\n\n",
            world.roster_json()
        ));

        if let Some(summary) = self.compactor.summary() {
            context.push_str(&format!("Summary of earlier events:\n{summary}\n\n"));
        }

        if !self.retrieval.is_empty() {
            let query = match self.previous_gm_dialogue() {
                Some(previous) => format!("{previous}\n{input}"),
                None => input.to_string(),
            };
            let fragments = self
                .retrieval
                .query(&query, self.config.retrieval_top_k)
                .await;
            if !fragments.is_empty() {
                context.push_str("Most relevant past rounds:\n");
                for fragment in fragments {
                    context.push_str(&format!("- {}\n", fragment.text));
                }
                context.push('\n');
            }
        }

        // The injection is recorded in the transcript but tombstoned, so
        // it never accumulates across turns.
        self.history.push(Message::injection(context.clone()));

        let mut prompt = vec![ChatMessage::system(GM_BASE_PROMPT), ChatMessage::user(context)];

        let working = filter_working(&self.history);
        let window_start = working.len().saturating_sub(self.config.recent_window);
        for message in &working[window_start..] {
            prompt.push(match message.role {
                Role::Player => ChatMessage::user(message.content.clone()),
                Role::Gm => ChatMessage::assistant(message.content.clone()),
                Role::Tool => continue,
            });
        }

        prompt
    }

    /// The most recent GM dialogue line before the current turn.
    fn previous_gm_dialogue(&self) -> Option<&str> {
        self.history
            .iter()
            .rev()
            .find(|m| m.role == Role::Gm && m.is_foldable())
            .map(|m| m.content.as_str())
    }

    /// Ask the model whether the round needs tools, apply them, and fold
    /// the reported action into the duplicate-suppression window.
    async fn decide_and_apply_tools(
        &mut self,
        input: &str,
        narrative: &str,
        world: &mut WorldState,
    ) -> Result<usize, EngineError> {
        let recent_actions: Vec<String> = self
            .last_actions
            .iter()
            .map(|a| format!("- {a}"))
            .collect();
        let system = TOOL_DECIDER_PROMPT.replace("{last_actions}", &recent_actions.join("\n"));

        let messages = vec![
            ChatMessage::system(system),
            ChatMessage::user(format!(
                "The last round of play:\nPlayer: {input}\nGM: {narrative}"
            )),
        ];

        let mut tools = self.registry.definitions();
        tools.push(report_action_def());

        let generation = self.provider.complete(messages, tools).await?;

        let mut applied = 0;
        let mut report: Option<ActionReport> = None;
        for call in &generation.tool_calls {
            if call.name == "report_action" {
                report = parse_action_report(call);
                continue;
            }
            applied += 1;
            let content = match self.registry.execute(&call.name, &call.arguments, world) {
                Ok(outcome) => outcome.content,
                // A failed call is captured, not fatal; the turn goes on.
                Err(e) => {
                    log::warn!("tool {} failed: {e}", call.name);
                    format!("Tool {} failed: {e}", call.name)
                }
            };
            self.history.push(Message::tool_result(content));
        }

        if let Some(report) = report {
            if report.performed_world_action {
                self.remember_action(report.summary);
            }
        } else if applied > 0 {
            // The decider forgot its report; remember something anyway so
            // the same action is not re-applied next round.
            self.remember_action(format!("Applied {applied} world change(s) without a report."));
        }

        Ok(applied)
    }

    fn remember_action(&mut self, summary: String) {
        if self.last_actions.len() == LAST_ACTIONS_KEPT {
            self.last_actions.pop_front();
        }
        self.last_actions.push_back(summary);
    }

    /// Run one world setup task to convergence.
    ///
    /// Each attempt generates with the full tool set, snapshots the target
    /// artifact, and validates it. Feedback from a rejected attempt is fed
    /// into the next one; the ceiling bounds the loop.
    pub async fn run_setup_task(
        &mut self,
        task: &str,
        target: SetupTarget,
        world: &mut WorldState,
    ) -> Result<SetupReport, EngineError> {
        let mut feedback: Option<String> = None;

        for attempt in 1..=self.config.retry_ceiling {
            let mut messages = vec![
                ChatMessage::system(DESIGNER_PROMPT),
                ChatMessage::user(task.to_string()),
            ];
            if let Some(ref why) = feedback {
                messages.push(ChatMessage::user(format!(
                    "The format is wrong because: {why}, please correct it."
                )));
            }

            log::debug!("setup task attempt {attempt}: generating");
            let generation = self
                .provider
                .complete(messages, self.registry.definitions())
                .await?;

            for call in &generation.tool_calls {
                if let Err(e) = self.registry.execute(&call.name, &call.arguments, world) {
                    log::warn!("setup tool {} failed: {e}", call.name);
                }
            }

            let artifact = match target {
                SetupTarget::Story => world.story.clone(),
                SetupTarget::Rules => world.rules.clone(),
                SetupTarget::Characters => world.roster_json(),
                SetupTarget::Narrative => generation.text.clone(),
            };

            log::debug!("setup task attempt {attempt}: validating");
            let verdict: Verdict =
                validator::check(self.provider.as_ref(), task, &artifact).await?;
            if verdict.complies() {
                return Ok(SetupReport {
                    artifact,
                    attempts: attempt,
                });
            }
            log::debug!("setup task attempt {attempt} rejected: {}", verdict.feedback);
            feedback = Some(verdict.feedback);
        }

        Err(EngineError::ConvergenceExceeded {
            attempts: self.config.retry_ceiling,
            last_feedback: feedback.unwrap_or_default(),
        })
    }
}

fn parse_action_report(call: &ToolCall) -> Option<ActionReport> {
    match serde_json::from_value(call.arguments.clone()) {
        Ok(report) => Some(report),
        Err(e) => {
            log::warn!("malformed action report: {e}");
            None
        }
    }
}
