//! Board geometry and tuning constants
//!
//! Everything is expressed in logical units on a square board of
//! [`BOARD_SIZE`]; the client scales to its canvas.

use serde::{Deserialize, Serialize};

use crate::util::geometry::Vec2;

/// Side length of the square logical board
pub const BOARD_SIZE: f32 = 1000.0;
/// Radius of each corner pocket
pub const POCKET_RADIUS: f32 = 39.0;
/// A body is captured once its center is closer than `POCKET_RADIUS - POCKET_TOLERANCE`
pub const POCKET_TOLERANCE: f32 = 6.0;
/// Distance from each edge to the playable cushion
pub const WALL_MARGIN: f32 = 22.0;

pub const COIN_RADIUS: f32 = 22.0;
pub const STRIKER_RADIUS: f32 = 27.0;

/// Height of the shaded band each player strikes from
pub const STRIKER_ZONE_HEIGHT: f32 = 171.0;
/// Distance of the striker baseline from the owning edge
pub const STRIKER_BASELINE_OFFSET: f32 = 146.0;
/// Inset of the horizontal striker range from each side edge
pub const STRIKER_SIDE_INSET: f32 = 59.0;
/// Extra slack around the striker radius for grabbing it
pub const STRIKER_GRAB_SLACK: f32 = 20.0;

pub const FRICTION: f32 = 0.993;
pub const WALL_RESTITUTION: f32 = 0.9;
pub const COIN_RESTITUTION: f32 = 0.985;
/// Velocity components below this are snapped to zero
pub const MIN_VELOCITY: f32 = 0.02;

pub const POWER_MULTIPLIER: f32 = 0.11;
pub const MAX_POWER: f32 = 220.0;
pub const MIN_POWER: f32 = 8.0;
/// Vertical pull that switches a gesture from positioning to aiming
pub const POSITIONING_THRESHOLD: f32 = 10.0;

/// Coins of each color in a full set (the queen is extra)
pub const COINS_PER_COLOR: usize = 9;
/// Coins plus queen
pub const TOTAL_PIECES: usize = COINS_PER_COLOR * 2 + 1;

/// The four pocket centers
pub const POCKETS: [Vec2; 4] = [
    Vec2::new(POCKET_RADIUS, POCKET_RADIUS),
    Vec2::new(BOARD_SIZE - POCKET_RADIUS, POCKET_RADIUS),
    Vec2::new(POCKET_RADIUS, BOARD_SIZE - POCKET_RADIUS),
    Vec2::new(BOARD_SIZE - POCKET_RADIUS, BOARD_SIZE - POCKET_RADIUS),
];

/// One of the two seats. Player one strikes from the bottom edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Player {
    One,
    Two,
}

impl Player {
    pub fn other(self) -> Self {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Player::One => 1,
            Player::Two => 2,
        }
    }

    /// Y coordinate the striker rests on during this player's turn
    pub fn striker_baseline(self) -> f32 {
        match self {
            Player::One => BOARD_SIZE - STRIKER_BASELINE_OFFSET,
            Player::Two => STRIKER_BASELINE_OFFSET,
        }
    }

    /// Vertical extent `(top, bottom)` of this player's striker zone
    pub fn striker_zone(self) -> (f32, f32) {
        match self {
            Player::One => (BOARD_SIZE - STRIKER_ZONE_HEIGHT, BOARD_SIZE),
            Player::Two => (0.0, STRIKER_ZONE_HEIGHT),
        }
    }

    pub fn zone_contains(self, y: f32) -> bool {
        let (top, bottom) = self.striker_zone();
        y >= top && y <= bottom
    }
}

impl std::fmt::Display for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Player {}", self.number())
    }
}

impl From<Player> for u8 {
    fn from(p: Player) -> u8 {
        p.number()
    }
}

impl TryFrom<u8> for Player {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Player::One),
            2 => Ok(Player::Two),
            other => Err(format!("invalid player number {other}")),
        }
    }
}

/// Horizontal range the striker center may occupy
pub fn striker_x_range(radius: f32) -> (f32, f32) {
    (
        STRIKER_SIDE_INSET + radius,
        BOARD_SIZE - STRIKER_SIDE_INSET - radius,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baselines_sit_inside_their_zones() {
        for p in [Player::One, Player::Two] {
            assert!(p.zone_contains(p.striker_baseline()), "{p}");
            assert!(!p.other().zone_contains(p.striker_baseline()), "{p}");
        }
    }

    #[test]
    fn player_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Player::Two).unwrap(), "2");
        let p: Player = serde_json::from_str("1").unwrap();
        assert_eq!(p, Player::One);
        assert!(serde_json::from_str::<Player>("3").is_err());
    }
}
