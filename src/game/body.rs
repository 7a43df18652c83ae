//! Circular bodies on the table

use serde::{Deserialize, Serialize};

use crate::util::geometry::Vec2;

use super::board::{COIN_RADIUS, STRIKER_RADIUS};

/// What a body is. Decides scoring and reset behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    Coin,
    Queen,
    Striker,
}

impl BodyKind {
    /// Points credited when this kind drops into a pocket
    pub fn capture_points(self) -> u32 {
        match self {
            BodyKind::Coin => 1,
            BodyKind::Queen => 3,
            BodyKind::Striker => 5,
        }
    }

    /// Whether the points go to the opponent of the player who shot
    pub fn is_foul(self) -> bool {
        matches!(self, BodyKind::Striker)
    }
}

/// Color tag of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinColor {
    White,
    Black,
    Red,
}

/// A coin, the queen or the striker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Body {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub r: f32,
    pub color: CoinColor,
    pub kind: BodyKind,
    pub pocketed: bool,
    /// Set when the striker is released, cleared once everything has stopped
    #[serde(default)]
    pub just_shot: bool,
}

impl Body {
    pub fn coin(id: u32, x: f32, y: f32, color: CoinColor) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            r: COIN_RADIUS,
            color,
            kind: BodyKind::Coin,
            pocketed: false,
            just_shot: false,
        }
    }

    pub fn queen(id: u32, x: f32, y: f32) -> Self {
        Self {
            kind: BodyKind::Queen,
            ..Self::coin(id, x, y, CoinColor::Red)
        }
    }

    pub fn striker(id: u32, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            r: STRIKER_RADIUS,
            color: CoinColor::White,
            kind: BodyKind::Striker,
            pocketed: false,
            just_shot: false,
        }
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn speed(&self) -> f32 {
        crate::util::geometry::len(self.vx, self.vy)
    }

    pub fn is_moving(&self) -> bool {
        !self.pocketed && (self.vx != 0.0 || self.vy != 0.0)
    }

    pub fn stop(&mut self) {
        self.vx = 0.0;
        self.vy = 0.0;
    }

    /// True if `kind` and `color` identify a regular coin of `color`
    pub fn is_coin_of(&self, color: CoinColor) -> bool {
        self.kind == BodyKind::Coin && self.color == color
    }
}
