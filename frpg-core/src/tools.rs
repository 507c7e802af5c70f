//! World-mutating tools exposed to the game master.
//!
//! The registry maps operation name to a declared argument schema plus a
//! handler. The engine dispatches through the registry and never hardcodes
//! operation names; adding a tool here is the only change needed to make
//! it callable.

use crate::dice;
use crate::world::{character_key, Item, ItemWrite, MoneyOutcome, WorldError, WorldState};
use groq::ToolDef;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from tool dispatch.
///
/// These are recovered locally by the engine: a failed call becomes a
/// tool-result message and the turn continues.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Dice(#[from] dice::DiceError),
}

/// Result of a successful tool invocation.
///
/// `declined` marks operations that were understood but refused (e.g. an
/// overdraft); the world is unchanged in that case.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub declined: bool,
}

impl ToolOutcome {
    pub fn applied(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            declined: false,
        }
    }

    pub fn declined(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            declined: true,
        }
    }
}

type Handler = fn(&mut WorldState, &Value) -> Result<ToolOutcome, ToolError>;

struct RegisteredTool {
    def: ToolDef,
    handler: Handler,
}

/// The fixed catalog of game operations.
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// The standard game tool set.
    pub fn standard() -> Self {
        Self {
            tools: vec![
                upsert_character_tool(),
                upsert_inventory_item_tool(),
                delete_inventory_item_tool(),
                add_money_tool(),
                reduce_money_tool(),
                define_rules_tool(),
                define_story_tool(),
                roll_dice_tool(),
            ],
        }
    }

    /// Tool definitions for the generation API.
    pub fn definitions(&self) -> Vec<ToolDef> {
        self.tools.iter().map(|t| t.def.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.def.name == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute one operation against the world.
    ///
    /// The world is borrowed exclusively for the duration of the call, so
    /// each operation applies atomically or not at all.
    pub fn execute(
        &self,
        name: &str,
        arguments: &Value,
        world: &mut WorldState,
    ) -> Result<ToolOutcome, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.def.name == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        (tool.handler)(world, arguments)
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments.clone()).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// upsert_character
// ============================================================================

#[derive(Deserialize)]
struct UpsertCharacterArgs {
    name: String,
    details: String,
    #[serde(default)]
    stats: BTreeMap<String, i64>,
    money: i64,
}

fn upsert_character_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "upsert_character".to_string(),
            description: "Add a character to the game, or overwrite an existing one. \
                Inventory is untouched; manage it with the item tools. Use this only \
                when a character permanently joins the game."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Unique character name"
                    },
                    "details": {
                        "type": "string",
                        "description": "Description, personality, appearance or backstory"
                    },
                    "stats": {
                        "type": "object",
                        "additionalProperties": { "type": "integer" },
                        "description": "Attribute map, e.g. {\"strength\": 8}"
                    },
                    "money": {
                        "type": "integer",
                        "description": "In-game currency the character holds; must not be negative"
                    }
                },
                "required": ["name", "details", "money"]
            }),
        },
        handler: |world, arguments| {
            let args: UpsertCharacterArgs = parse_args("upsert_character", arguments)?;
            world.upsert_character(&args.name, args.details, args.stats, args.money)?;
            Ok(ToolOutcome::applied(format!(
                "Character '{}' recorded.",
                args.name
            )))
        },
    }
}

// ============================================================================
// upsert_inventory_item
// ============================================================================

#[derive(Deserialize)]
struct UpsertItemArgs {
    character_key: String,
    is_weapon: bool,
    item_name: String,
    details: String,
    #[serde(default)]
    stats: BTreeMap<String, i64>,
    value: i64,
}

fn upsert_inventory_item_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "upsert_inventory_item".to_string(),
            description: "Add an item or weapon to a character's inventory, replacing \
                any item of the same name in place. Weapons carry a stats map (e.g. \
                {\"damage\": 10}); regular items do not."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "character_key": {
                        "type": "string",
                        "description": "Name of the character receiving the item"
                    },
                    "is_weapon": {
                        "type": "boolean",
                        "description": "True if the item is a weapon"
                    },
                    "item_name": {
                        "type": "string",
                        "description": "Name of the item"
                    },
                    "details": {
                        "type": "string",
                        "description": "Description of the item"
                    },
                    "stats": {
                        "type": "object",
                        "additionalProperties": { "type": "integer" },
                        "description": "Weapon stats; omit for regular items"
                    },
                    "value": {
                        "type": "integer",
                        "description": "Value in in-game currency"
                    }
                },
                "required": ["character_key", "is_weapon", "item_name", "details", "value"]
            }),
        },
        handler: |world, arguments| {
            let args: UpsertItemArgs = parse_args("upsert_inventory_item", arguments)?;
            let item = Item {
                name: args.item_name.clone(),
                details: args.details,
                stats: args.is_weapon.then_some(args.stats),
                value: args.value,
            };
            let write = world.upsert_item(&args.character_key, item)?;
            let verb = match write {
                ItemWrite::Inserted => "added to",
                ItemWrite::Replaced => "replaced in",
            };
            Ok(ToolOutcome::applied(format!(
                "'{}' {} {}'s inventory.",
                args.item_name,
                verb,
                character_key(&args.character_key)
            )))
        },
    }
}

// ============================================================================
// delete_inventory_item
// ============================================================================

#[derive(Deserialize)]
struct DeleteItemArgs {
    character_key: String,
    item_name: String,
}

fn delete_inventory_item_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "delete_inventory_item".to_string(),
            description: "Remove an item from a character's inventory, e.g. when it is \
                lost, sold or destroyed."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "character_key": {
                        "type": "string",
                        "description": "Name of the character whose inventory changes"
                    },
                    "item_name": {
                        "type": "string",
                        "description": "Name of the item to remove"
                    }
                },
                "required": ["character_key", "item_name"]
            }),
        },
        handler: |world, arguments| {
            let args: DeleteItemArgs = parse_args("delete_inventory_item", arguments)?;
            let item = world.delete_item(&args.character_key, &args.item_name)?;
            Ok(ToolOutcome::applied(format!(
                "'{}' removed from {}'s inventory.",
                item.name,
                character_key(&args.character_key)
            )))
        },
    }
}

// ============================================================================
// add_money / reduce_money
// ============================================================================

#[derive(Deserialize)]
struct MoneyArgs {
    character_key: String,
    amount: i64,
}

fn add_money_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "add_money".to_string(),
            description: "Add currency to a character's balance, e.g. loot, payment or \
                a completed sale."
                .to_string(),
            input_schema: money_schema(),
        },
        handler: |world, arguments| {
            let args: MoneyArgs = parse_args("add_money", arguments)?;
            match world.add_money(&args.character_key, args.amount)? {
                MoneyOutcome::Applied { balance } => Ok(ToolOutcome::applied(format!(
                    "{} now holds {} money.",
                    character_key(&args.character_key),
                    balance
                ))),
                MoneyOutcome::Declined { balance } => Ok(ToolOutcome::declined(format!(
                    "Declined: balance cannot go negative. {} still holds {} money.",
                    character_key(&args.character_key),
                    balance
                ))),
            }
        },
    }
}

fn reduce_money_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "reduce_money".to_string(),
            description: "Deduct currency from a character's balance, e.g. a purchase \
                or a bribe. Declined if the character cannot afford it."
                .to_string(),
            input_schema: money_schema(),
        },
        handler: |world, arguments| {
            let args: MoneyArgs = parse_args("reduce_money", arguments)?;
            match world.reduce_money(&args.character_key, args.amount)? {
                MoneyOutcome::Applied { balance } => Ok(ToolOutcome::applied(format!(
                    "{} now holds {} money.",
                    character_key(&args.character_key),
                    balance
                ))),
                MoneyOutcome::Declined { balance } => Ok(ToolOutcome::declined(format!(
                    "Declined: insufficient funds. {} holds only {} money.",
                    character_key(&args.character_key),
                    balance
                ))),
            }
        },
    }
}

fn money_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "character_key": {
                "type": "string",
                "description": "Name of the character"
            },
            "amount": {
                "type": "integer",
                "description": "Amount of currency"
            }
        },
        "required": ["character_key", "amount"]
    })
}

// ============================================================================
// define_rules / define_story
// ============================================================================

#[derive(Deserialize)]
struct TextArgs {
    text: String,
}

fn define_rules_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "define_rules".to_string(),
            description: "Store the game rules, replacing any previous rules text. \
                Written in plain language so compliance can be judged later."
                .to_string(),
            input_schema: text_schema("Game rules in plain language"),
        },
        handler: |world, arguments| {
            let args: TextArgs = parse_args("define_rules", arguments)?;
            world.set_rules(args.text);
            Ok(ToolOutcome::applied("Rules stored."))
        },
    }
}

fn define_story_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "define_story".to_string(),
            description: "Store the game's story outline, replacing any previous story \
                text."
                .to_string(),
            input_schema: text_schema("Story outline for the game"),
        },
        handler: |world, arguments| {
            let args: TextArgs = parse_args("define_story", arguments)?;
            world.set_story(args.text);
            Ok(ToolOutcome::applied("Story stored."))
        },
    }
}

fn text_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "text": { "type": "string", "description": description }
        },
        "required": ["text"]
    })
}

// ============================================================================
// roll_dice
// ============================================================================

#[derive(Deserialize)]
struct RollDiceArgs {
    sides: u32,
    count: u32,
}

fn roll_dice_tool() -> RegisteredTool {
    RegisteredTool {
        def: ToolDef {
            name: "roll_dice".to_string(),
            description: "Roll dice for checks and combat. Returns each die result and \
                the total."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "sides": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of sides per die"
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of dice to roll"
                    }
                },
                "required": ["sides", "count"]
            }),
        },
        handler: |_world, arguments| {
            let args: RollDiceArgs = parse_args("roll_dice", arguments)?;
            let rolls = dice::roll(args.sides, args.count)?;
            Ok(ToolOutcome::applied(dice::describe(args.sides, &rolls)))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_contents() {
        let registry = ToolRegistry::standard();
        assert_eq!(registry.len(), 8);
        for name in [
            "upsert_character",
            "upsert_inventory_item",
            "delete_inventory_item",
            "add_money",
            "reduce_money",
            "define_rules",
            "define_story",
            "roll_dice",
        ] {
            assert!(registry.contains(name), "missing tool {name}");
        }
    }

    #[test]
    fn test_unknown_tool() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();
        let err = registry
            .execute("teleport", &json!({}), &mut world)
            .unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool(_)));
    }

    #[test]
    fn test_upsert_character_and_money_flow() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();

        registry
            .execute(
                "upsert_character",
                &json!({
                    "name": "Neon",
                    "details": "a hacker",
                    "stats": {"reflexes": 4},
                    "money": 100
                }),
                &mut world,
            )
            .unwrap();

        let outcome = registry
            .execute(
                "add_money",
                &json!({"character_key": "neon", "amount": 50}),
                &mut world,
            )
            .unwrap();

        assert!(!outcome.declined);
        assert_eq!(world.character("Neon").unwrap().money(), 150);
    }

    #[test]
    fn test_reduce_money_declined_not_error() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();
        world
            .upsert_character("Neon", "a hacker", Default::default(), 30)
            .unwrap();

        let outcome = registry
            .execute(
                "reduce_money",
                &json!({"character_key": "Neon", "amount": 50}),
                &mut world,
            )
            .unwrap();

        assert!(outcome.declined);
        assert_eq!(world.character("neon").unwrap().money(), 30);
    }

    #[test]
    fn test_upsert_character_negative_money_rejected() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();

        let err = registry
            .execute(
                "upsert_character",
                &json!({
                    "name": "Debt",
                    "details": "a gambler",
                    "money": -50
                }),
                &mut world,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::World(WorldError::NegativeMoney(-50))
        ));
        assert_eq!(world.character_count(), 0);
    }

    #[test]
    fn test_weapon_stats_only_for_weapons() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();
        world
            .upsert_character("Neon", "a hacker", Default::default(), 0)
            .unwrap();

        registry
            .execute(
                "upsert_inventory_item",
                &json!({
                    "character_key": "neon",
                    "is_weapon": false,
                    "item_name": "Ration",
                    "details": "a day of food",
                    "stats": {"ignored": 1},
                    "value": 2
                }),
                &mut world,
            )
            .unwrap();

        let neon = world.character("neon").unwrap();
        assert!(neon.item("Ration").unwrap().stats.is_none());
    }

    #[test]
    fn test_item_tool_on_missing_character() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();

        let err = registry
            .execute(
                "upsert_inventory_item",
                &json!({
                    "character_key": "ghost",
                    "is_weapon": false,
                    "item_name": "Coin",
                    "details": "",
                    "value": 1
                }),
                &mut world,
            )
            .unwrap_err();

        assert!(matches!(
            err,
            ToolError::World(WorldError::CharacterNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();
        let err = registry
            .execute("roll_dice", &json!({"sides": "twenty"}), &mut world)
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn test_roll_dice_output() {
        let registry = ToolRegistry::standard();
        let mut world = WorldState::new();
        let outcome = registry
            .execute("roll_dice", &json!({"sides": 1, "count": 3}), &mut world)
            .unwrap();
        assert_eq!(outcome.content, "3d1: [1, 1, 1] = 3");
    }
}
