//! Game world state: characters, inventories, story and rules text.
//!
//! The world is owned by the session and mutated only through the tool
//! registry. Character keys are case-folded before every lookup or
//! mutation, item names are unique within an inventory (writes with a
//! matching name replace in place), and money can never be read negative:
//! operations that would overdraw are declined, not clamped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from world lookups and writes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("Character not found: {0}")]
    CharacterNotFound(String),

    #[error("Item '{item}' not found in {character}'s inventory")]
    ItemNotFound { character: String, item: String },

    #[error("Money must not be negative: {0}")]
    NegativeMoney(i64),
}

/// Whether a character is driven by the player or the game master.
///
/// Assigned once when play begins and not source-controlled afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CharacterRole {
    Player,
    #[default]
    Npc,
}

/// An item in a character's inventory.
///
/// Identity within an inventory is the name, matched case-sensitively as
/// authored. Stats are present only for weapons.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BTreeMap<String, i64>>,
    pub value: i64,
}

/// A character in the game world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub details: String,
    /// Open-schema attribute map, e.g. {"reflexes": 4}.
    pub stats: BTreeMap<String, i64>,
    money: i64,
    /// Insertion/replacement order is preserved.
    pub inventory: Vec<Item>,
    #[serde(default)]
    pub role: CharacterRole,
}

impl Character {
    /// Current balance. Never negative.
    pub fn money(&self) -> i64 {
        self.money
    }

    /// Find an item by exact name.
    pub fn item(&self, name: &str) -> Option<&Item> {
        self.inventory.iter().find(|i| i.name == name)
    }
}

/// Outcome of a money operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoneyOutcome {
    /// The operation applied; carries the new balance.
    Applied { balance: i64 },
    /// The operation would overdraw the balance and was declined.
    /// The balance is unchanged.
    Declined { balance: i64 },
}

impl MoneyOutcome {
    pub fn is_declined(&self) -> bool {
        matches!(self, MoneyOutcome::Declined { .. })
    }

    pub fn balance(&self) -> i64 {
        match self {
            MoneyOutcome::Applied { balance } | MoneyOutcome::Declined { balance } => *balance,
        }
    }
}

/// Outcome of an inventory write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemWrite {
    Inserted,
    /// An item of the same name existed and was replaced in place.
    Replaced,
}

/// The shared mutable game state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorldState {
    /// Characters keyed by case-folded name.
    characters: BTreeMap<String, Character>,
    pub rules: String,
    pub story: String,
    /// Case-folded key of the primary participant's character.
    primary: Option<String>,
}

/// Case-fold a character name into its lookup key.
pub fn character_key(name: &str) -> String {
    name.to_lowercase()
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite a character.
    ///
    /// If a character with the same key exists, its details, stats and
    /// money are overwritten silently; inventory and role are untouched.
    /// A negative money argument is rejected, not clamped, and leaves any
    /// existing record unchanged.
    pub fn upsert_character(
        &mut self,
        name: &str,
        details: impl Into<String>,
        stats: BTreeMap<String, i64>,
        money: i64,
    ) -> Result<(), WorldError> {
        if money < 0 {
            return Err(WorldError::NegativeMoney(money));
        }
        let key = character_key(name);
        match self.characters.get_mut(&key) {
            Some(existing) => {
                existing.details = details.into();
                existing.stats = stats;
                existing.money = money;
            }
            None => {
                self.characters.insert(
                    key,
                    Character {
                        name: name.to_string(),
                        details: details.into(),
                        stats,
                        money,
                        inventory: Vec::new(),
                        role: CharacterRole::default(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Look up a character by name (case-insensitive).
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.get(&character_key(name))
    }

    fn character_mut(&mut self, name: &str) -> Result<&mut Character, WorldError> {
        let key = character_key(name);
        self.characters
            .get_mut(&key)
            .ok_or(WorldError::CharacterNotFound(key))
    }

    pub fn characters(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Insert an item, or replace the same-named item in place.
    pub fn upsert_item(&mut self, character: &str, item: Item) -> Result<ItemWrite, WorldError> {
        let c = self.character_mut(character)?;
        match c.inventory.iter_mut().find(|i| i.name == item.name) {
            Some(slot) => {
                *slot = item;
                Ok(ItemWrite::Replaced)
            }
            None => {
                c.inventory.push(item);
                Ok(ItemWrite::Inserted)
            }
        }
    }

    /// Remove the first item with the given name.
    pub fn delete_item(&mut self, character: &str, item_name: &str) -> Result<Item, WorldError> {
        let c = self.character_mut(character)?;
        match c.inventory.iter().position(|i| i.name == item_name) {
            Some(index) => Ok(c.inventory.remove(index)),
            None => Err(WorldError::ItemNotFound {
                character: c.name.clone(),
                item: item_name.to_string(),
            }),
        }
    }

    /// Add to a character's balance. Declined if the result would be
    /// negative (amount may itself be negative).
    pub fn add_money(&mut self, character: &str, amount: i64) -> Result<MoneyOutcome, WorldError> {
        let c = self.character_mut(character)?;
        match c.money.checked_add(amount) {
            Some(balance) if balance >= 0 => {
                c.money = balance;
                Ok(MoneyOutcome::Applied { balance })
            }
            _ => Ok(MoneyOutcome::Declined { balance: c.money }),
        }
    }

    /// Deduct from a character's balance. Declined if the amount exceeds
    /// the current balance.
    pub fn reduce_money(
        &mut self,
        character: &str,
        amount: i64,
    ) -> Result<MoneyOutcome, WorldError> {
        let c = self.character_mut(character)?;
        if amount > c.money {
            return Ok(MoneyOutcome::Declined { balance: c.money });
        }
        c.money -= amount;
        Ok(MoneyOutcome::Applied { balance: c.money })
    }

    /// Replace the rules text wholesale.
    pub fn set_rules(&mut self, rules: impl Into<String>) {
        self.rules = rules.into();
    }

    /// Replace the story text wholesale.
    pub fn set_story(&mut self, story: impl Into<String>) {
        self.story = story.into();
    }

    /// Designate the primary participant and tag everyone else as an NPC.
    pub fn assign_roles(&mut self, player: &str) -> Result<(), WorldError> {
        let key = character_key(player);
        if !self.characters.contains_key(&key) {
            return Err(WorldError::CharacterNotFound(key));
        }
        for (k, c) in self.characters.iter_mut() {
            c.role = if *k == key {
                CharacterRole::Player
            } else {
                CharacterRole::Npc
            };
        }
        self.primary = Some(key);
        Ok(())
    }

    /// The primary participant's character, once play has begun.
    pub fn primary_character(&self) -> Option<&Character> {
        self.primary.as_deref().and_then(|k| self.characters.get(k))
    }

    /// Render the character roster as JSON for prompt context.
    pub fn roster_json(&self) -> String {
        serde_json::to_string(&self.characters).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pairs: &[(&str, i64)]) -> BTreeMap<String, i64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn world_with_neon(money: i64) -> WorldState {
        let mut world = WorldState::new();
        world
            .upsert_character("Neon", "a hacker", stats(&[("reflexes", 4)]), money)
            .unwrap();
        world
    }

    #[test]
    fn test_case_normalized_lookup() {
        let mut world = world_with_neon(100);
        let outcome = world.add_money("NEON", 50).unwrap();
        assert_eq!(outcome, MoneyOutcome::Applied { balance: 150 });
        assert_eq!(world.character("neon").unwrap().money(), 150);
    }

    #[test]
    fn test_upsert_overwrites_but_keeps_inventory() {
        let mut world = world_with_neon(100);
        world
            .upsert_item(
                "neon",
                Item {
                    name: "Pistol".to_string(),
                    details: "a sidearm".to_string(),
                    stats: Some(stats(&[("damage", 6)])),
                    value: 200,
                },
            )
            .unwrap();

        world
            .upsert_character("Neon", "a burned-out hacker", stats(&[]), 10)
            .unwrap();

        let neon = world.character("Neon").unwrap();
        assert_eq!(neon.details, "a burned-out hacker");
        assert_eq!(neon.money(), 10);
        assert_eq!(neon.inventory.len(), 1);
    }

    #[test]
    fn test_item_replace_in_place() {
        let mut world = world_with_neon(100);
        for name in ["Knife", "Pistol", "Medkit"] {
            world
                .upsert_item(
                    "neon",
                    Item {
                        name: name.to_string(),
                        details: String::new(),
                        stats: None,
                        value: 10,
                    },
                )
                .unwrap();
        }

        let write = world
            .upsert_item(
                "neon",
                Item {
                    name: "Pistol".to_string(),
                    details: "upgraded".to_string(),
                    stats: Some(stats(&[("damage", 9)])),
                    value: 250,
                },
            )
            .unwrap();

        assert_eq!(write, ItemWrite::Replaced);
        let neon = world.character("neon").unwrap();
        assert_eq!(neon.inventory.len(), 3);
        // Position preserved.
        assert_eq!(neon.inventory[1].name, "Pistol");
        assert_eq!(neon.inventory[1].details, "upgraded");
    }

    #[test]
    fn test_delete_missing_item_leaves_inventory_unchanged() {
        let mut world = world_with_neon(100);
        world
            .upsert_item(
                "neon",
                Item {
                    name: "Knife".to_string(),
                    details: String::new(),
                    stats: None,
                    value: 5,
                },
            )
            .unwrap();

        let err = world.delete_item("neon", "Sword").unwrap_err();
        assert!(matches!(err, WorldError::ItemNotFound { .. }));
        assert_eq!(world.character("neon").unwrap().inventory.len(), 1);
    }

    #[test]
    fn test_reduce_money_declined_leaves_balance() {
        let mut world = world_with_neon(30);
        let outcome = world.reduce_money("Neon", 50).unwrap();
        assert!(outcome.is_declined());
        assert_eq!(world.character("neon").unwrap().money(), 30);
    }

    #[test]
    fn test_add_negative_money_declined_below_zero() {
        let mut world = world_with_neon(30);
        let outcome = world.add_money("neon", -50).unwrap();
        assert!(outcome.is_declined());
        assert_eq!(world.character("neon").unwrap().money(), 30);

        let outcome = world.add_money("neon", -30).unwrap();
        assert_eq!(outcome, MoneyOutcome::Applied { balance: 0 });
    }

    #[test]
    fn test_negative_money_upsert_rejected_not_clamped() {
        let mut world = WorldState::new();
        assert_eq!(
            world.upsert_character("Debt", "a gambler", BTreeMap::new(), -50),
            Err(WorldError::NegativeMoney(-50))
        );
        assert!(world.character("debt").is_none());

        // An existing record is left untouched by a rejected overwrite.
        let mut world = world_with_neon(30);
        assert_eq!(
            world.upsert_character("Neon", "rewritten", BTreeMap::new(), -1),
            Err(WorldError::NegativeMoney(-1))
        );
        let neon = world.character("neon").unwrap();
        assert_eq!(neon.money(), 30);
        assert_eq!(neon.details, "a hacker");
    }

    #[test]
    fn test_money_ops_on_missing_character() {
        let mut world = WorldState::new();
        assert_eq!(
            world.add_money("ghost", 10).unwrap_err(),
            WorldError::CharacterNotFound("ghost".to_string())
        );
    }

    #[test]
    fn test_assign_roles() {
        let mut world = world_with_neon(0);
        world
            .upsert_character("Vex", "a fixer", BTreeMap::new(), 500)
            .unwrap();

        world.assign_roles("NEON").unwrap();

        assert_eq!(world.character("neon").unwrap().role, CharacterRole::Player);
        assert_eq!(world.character("vex").unwrap().role, CharacterRole::Npc);
        assert_eq!(world.primary_character().unwrap().name, "Neon");
    }
}
