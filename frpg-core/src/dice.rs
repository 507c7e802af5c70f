//! Dice rolling.
//!
//! Pure computation; the only tool operation that never touches the world.

use rand::Rng;
use thiserror::Error;

/// Error type for dice rolls.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    #[error("Invalid die size: {0}")]
    InvalidSides(u32),
    #[error("No dice specified")]
    NoDice,
}

/// Roll `count` independent dice, each uniform in `[1, sides]`.
pub fn roll(sides: u32, count: u32) -> Result<Vec<u32>, DiceError> {
    if sides < 1 {
        return Err(DiceError::InvalidSides(sides));
    }
    if count < 1 {
        return Err(DiceError::NoDice);
    }
    let mut rng = rand::thread_rng();
    Ok((0..count).map(|_| rng.gen_range(1..=sides)).collect())
}

/// Render rolls the way the GM reports them, e.g. `2d10: [7, 3] = 10`.
pub fn describe(sides: u32, rolls: &[u32]) -> String {
    let total: u32 = rolls.iter().sum();
    format!("{}d{}: {:?} = {}", rolls.len(), sides, rolls, total)
}
