//! Snapshot schema shared by the client session and the relay

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::board::{Player, TOTAL_PIECES};
use super::body::{Body, BodyKind};

/// Per-player scores, keyed `"1"` / `"2"` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "1")]
    pub one: u32,
    #[serde(rename = "2")]
    pub two: u32,
}

impl Scores {
    pub fn get(&self, player: Player) -> u32 {
        match player {
            Player::One => self.one,
            Player::Two => self.two,
        }
    }

    pub fn add(&mut self, player: Player, points: u32) {
        match player {
            Player::One => self.one += points,
            Player::Two => self.two += points,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PocketedCounts {
    /// Pocketed coins and queen, striker excluded
    pub total: u32,
    pub queen: u32,
}

/// Full table state as mirrored to the other peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub current_player: Player,
    pub scores: Scores,
    pub message: String,
    pub pocketed_counts: PocketedCounts,
    pub is_any_moving: bool,
    /// Set once the game was decided, including a manual end
    #[serde(default)]
    pub game_over: bool,
    #[serde(default)]
    pub coins: Vec<Body>,
    #[serde(default)]
    pub striker: Option<Body>,
}

impl GameSnapshot {
    /// Summary broadcast when a room starts; bodies follow from player one
    pub fn initial() -> Self {
        Self {
            current_player: Player::One,
            scores: Scores::default(),
            message: "Player 1 to play.".to_string(),
            pocketed_counts: PocketedCounts::default(),
            is_any_moving: false,
            game_over: false,
            coins: Vec::new(),
            striker: None,
        }
    }

    /// A snapshot without bodies only carries the turn/score summary
    pub fn is_summary(&self) -> bool {
        self.coins.is_empty() && self.striker.is_none()
    }

    /// Reject snapshots that cannot describe a real table
    pub fn validate(&self) -> Result<(), SnapshotError> {
        if self.coins.len() > TOTAL_PIECES {
            return Err(SnapshotError::TooManyCoins(self.coins.len()));
        }

        let mut ids = HashSet::new();
        for body in self.coins.iter().chain(self.striker.iter()) {
            let finite = [body.x, body.y, body.vx, body.vy, body.r]
                .iter()
                .all(|v| v.is_finite());
            if !finite {
                return Err(SnapshotError::NonFinite(body.id));
            }
            if body.r <= 0.0 {
                return Err(SnapshotError::InvalidRadius(body.id));
            }
            if !ids.insert(body.id) {
                return Err(SnapshotError::DuplicateId(body.id));
            }
        }

        if self.coins.iter().any(|c| c.kind == BodyKind::Striker) {
            return Err(SnapshotError::MisplacedStriker);
        }
        if let Some(striker) = &self.striker {
            if striker.kind != BodyKind::Striker {
                return Err(SnapshotError::MisplacedStriker);
            }
        }
        Ok(())
    }
}

/// Snapshot validation errors
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SnapshotError {
    #[error("Snapshot carries {0} coins")]
    TooManyCoins(usize),

    #[error("Striker is missing from the striker slot or present among coins")]
    MisplacedStriker,

    #[error("Body {0} has a non-finite coordinate")]
    NonFinite(u32),

    #[error("Body {0} has a non-positive radius")]
    InvalidRadius(u32),

    #[error("Body id {0} appears twice")]
    DuplicateId(u32),
}

/// Decides which frames publish a snapshot
pub struct SnapshotCadence {
    /// Frames since the last published snapshot
    frames_since_snapshot: u32,
    /// Publish every `interval` frames
    interval: u32,
}

impl SnapshotCadence {
    pub fn new(interval: u32) -> Self {
        Self {
            frames_since_snapshot: 0,
            interval: interval.max(1),
        }
    }

    /// Check if this frame should publish
    pub fn should_send(&mut self) -> bool {
        self.frames_since_snapshot += 1;
        if self.frames_since_snapshot >= self.interval {
            self.frames_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Publish on the next check regardless of the interval (captures, turn switches)
    pub fn force_next(&mut self) {
        self.frames_since_snapshot = self.interval;
    }
}

/// Relay counters for the health endpoint
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SnapshotStats {
    pub total_snapshots: u64,
    pub avg_bodies_per_snapshot: f32,
}

impl SnapshotStats {
    pub fn record(&mut self, body_count: usize) {
        self.total_snapshots += 1;

        // Running average
        let n = self.total_snapshots as f32;
        self.avg_bodies_per_snapshot =
            self.avg_bodies_per_snapshot * ((n - 1.0) / n) + (body_count as f32 / n);
    }
}
