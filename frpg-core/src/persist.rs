//! Save and load game snapshots.
//!
//! A snapshot is a versioned JSON document holding the world plus the
//! orchestration state needed to resume play: transcript, rolling summary,
//! fold cursor and the duplicate-suppression window. The retrieval index
//! is rebuilt from the transcript on load rather than persisted.

use crate::message::Message;
use crate::world::WorldState;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    VersionMismatch { expected: u32, found: u32 },
}

/// A complete game snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedGame {
    pub version: u32,
    /// Unix timestamp (seconds) when the snapshot was written.
    pub saved_at: u64,
    pub world: WorldState,
    pub history: Vec<Message>,
    pub summary: Option<String>,
    pub fold_cursor: usize,
    pub round: usize,
    pub last_actions: Vec<String>,
}

impl SavedGame {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(
        world: WorldState,
        history: Vec<Message>,
        summary: Option<String>,
        fold_cursor: usize,
        round: usize,
        last_actions: Vec<String>,
    ) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            saved_at: unix_now(),
            world,
            history,
            summary,
            fold_cursor,
            round,
            last_actions,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Write a snapshot to disk as pretty JSON.
pub async fn save(path: impl AsRef<Path>, snapshot: &SavedGame) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json).await?;
    Ok(())
}

/// Read and version-check a snapshot from disk.
pub async fn load(path: impl AsRef<Path>) -> Result<SavedGame, PersistError> {
    let json = fs::read_to_string(path).await?;
    let snapshot: SavedGame = serde_json::from_str(&json)?;
    if snapshot.version != SavedGame::CURRENT_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: SavedGame::CURRENT_VERSION,
            found: snapshot.version,
        });
    }
    Ok(snapshot)
}
