//! Pointer gestures: slide the striker along the baseline or pull back to shoot

use tracing::debug;

use super::board::{Player, BOARD_SIZE, MAX_POWER, MIN_POWER, POSITIONING_THRESHOLD, POWER_MULTIPLIER, STRIKER_GRAB_SLACK};
use super::table::Table;
use crate::util::geometry::{clamp, dist, Vec2};

/// Maps client pixel coordinates onto the 1000x1000 logical board.
///
/// The board is drawn as the largest square that fits the surface, centered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub left: f32,
    pub top: f32,
    pub scale: f32,
}

impl Viewport {
    pub fn fit(width: f32, height: f32) -> Self {
        let side = width.min(height).max(1.0);
        Self {
            left: (width - side) / 2.0,
            top: (height - side) / 2.0,
            scale: side / BOARD_SIZE,
        }
    }

    pub fn to_logical(&self, cx: f32, cy: f32) -> Vec2 {
        Vec2::new((cx - self.left) / self.scale, (cy - self.top) / self.scale)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::fit(BOARD_SIZE, BOARD_SIZE)
    }
}

/// Why a pointer-down did not start a gesture
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum AimRejection {
    #[error("Game is over")]
    GameOver,

    #[error("Bodies are still moving")]
    BodiesMoving,

    #[error("Waiting for {0}")]
    NotYourTurn(Player),

    #[error("Not seated in a started game")]
    NotSeated,

    #[error("Pointer is outside the striker zone")]
    OutOfZone,

    #[error("Pointer is not on the striker")]
    NotNearStriker,
}

/// Result of releasing the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotOutcome {
    /// Striker released with this pull strength
    Fired { power: f32 },
    /// Pull was below the minimum; nothing moved
    TooWeak { power: f32 },
    /// Gesture never left the baseline; striker stays at `x`
    Positioned { x: f32 },
    /// The table was replaced while the pointer was down
    Discarded,
    /// No gesture in progress
    NoGesture,
}

/// Where the current turn stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    AwaitingAim,
    Positioning,
    Aiming,
    Settling,
    GameOver,
}

#[derive(Debug, Clone, Copy)]
struct Gesture {
    start: Vec2,
    current: Vec2,
    aiming: bool,
    generation: u64,
}

/// Turns pointer events into striker placement or a shot
#[derive(Debug, Default)]
pub struct AimController {
    gesture: Option<Gesture>,
}

impl AimController {
    /// Start a gesture at `p`.
    ///
    /// `local_player` restricts input to one seat in networked play.
    pub fn pointer_down(
        &mut self,
        table: &mut Table,
        p: Vec2,
        local_player: Option<Player>,
    ) -> Result<(), AimRejection> {
        if table.is_game_over() {
            return Err(AimRejection::GameOver);
        }
        let current = table.current_player();
        if let Some(local) = local_player {
            if local != current {
                table.set_message(format!("Waiting for {current}"));
                return Err(AimRejection::NotYourTurn(current));
            }
        }
        if table.is_any_moving() {
            return Err(AimRejection::BodiesMoving);
        }
        if !current.zone_contains(p.y) {
            return Err(AimRejection::OutOfZone);
        }
        let striker = table.striker();
        if dist(p, striker.position()) > striker.r + STRIKER_GRAB_SLACK {
            return Err(AimRejection::NotNearStriker);
        }

        self.gesture = Some(Gesture {
            start: p,
            current: p,
            aiming: false,
            generation: table.generation(),
        });
        Ok(())
    }

    /// Track the pointer. Small vertical motion slides the striker; anything
    /// past the threshold locks the gesture into aiming.
    pub fn pointer_move(&mut self, table: &mut Table, p: Vec2) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if gesture.generation != table.generation() {
            return;
        }
        gesture.current = p;
        if (gesture.start.y - p.y).abs() > POSITIONING_THRESHOLD {
            gesture.aiming = true;
        }
        if !gesture.aiming {
            table.position_striker(p.x);
        }
    }

    /// Finish the gesture
    pub fn pointer_up(&mut self, table: &mut Table) -> ShotOutcome {
        let Some(gesture) = self.gesture.take() else {
            return ShotOutcome::NoGesture;
        };
        if gesture.generation != table.generation() {
            debug!(
                gesture_generation = gesture.generation,
                table_generation = table.generation(),
                "Discarding stale gesture"
            );
            return ShotOutcome::Discarded;
        }

        if !gesture.aiming {
            let x = table.striker().x;
            table.set_message(format!(
                "Striker positioned X={}. Pull vertically to shoot.",
                x.round()
            ));
            return ShotOutcome::Positioned { x };
        }

        let pull = gesture.start - gesture.current;
        let length = pull.length();
        let power = clamp(length, 0.0, MAX_POWER);
        if power < MIN_POWER {
            table.set_message("Shot too weak, pull more.");
            return ShotOutcome::TooWeak { power };
        }

        let speed = power * POWER_MULTIPLIER;
        table.strike(pull.x / length * speed, pull.y / length * speed);
        table.set_message(format!(
            "{} shot (power {})",
            table.current_player(),
            power.round()
        ));
        debug!(power, player = table.current_player().number(), "Striker released");
        ShotOutcome::Fired { power }
    }

    /// Drop any gesture in progress
    pub fn cancel(&mut self) {
        self.gesture = None;
    }

    pub fn phase(&self, table: &Table) -> TurnPhase {
        if table.is_game_over() {
            return TurnPhase::GameOver;
        }
        if table.striker().just_shot || table.is_any_moving() {
            return TurnPhase::Settling;
        }
        match self.gesture {
            Some(g) if g.generation == table.generation() && g.aiming => TurnPhase::Aiming,
            Some(g) if g.generation == table.generation() => TurnPhase::Positioning,
            _ => TurnPhase::AwaitingAim,
        }
    }

    /// Current pull as `(start, current)` for drawing the aim line
    pub fn aim_line(&self) -> Option<(Vec2, Vec2)> {
        self.gesture.filter(|g| g.aiming).map(|g| (g.start, g.current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::board::striker_x_range;

    fn striker_pos(table: &Table) -> Vec2 {
        table.striker().position()
    }

    #[test]
    fn viewport_centers_board_in_wide_surface() {
        let vp = Viewport::fit(1600.0, 800.0);
        assert_eq!(vp.left, 400.0);
        assert_eq!(vp.top, 0.0);
        let p = vp.to_logical(800.0, 400.0);
        assert!((p.x - 500.0).abs() < 1e-3 && (p.y - 500.0).abs() < 1e-3);
        let corner = vp.to_logical(400.0, 0.0);
        assert_eq!(corner, Vec2::ZERO);
    }

    #[test]
    fn small_drag_slides_striker_and_clamps() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let start = striker_pos(&table);
        aim.pointer_down(&mut table, start, None).unwrap();
        assert_eq!(aim.phase(&table), TurnPhase::Positioning);

        aim.pointer_move(&mut table, Vec2::new(300.0, start.y + 4.0));
        assert_eq!(striker_pos(&table), Vec2::new(300.0, start.y));

        aim.pointer_move(&mut table, Vec2::new(-50.0, start.y));
        let (left, _) = striker_x_range(table.striker().r);
        assert_eq!(table.striker().x, left);

        let outcome = aim.pointer_up(&mut table);
        assert_eq!(outcome, ShotOutcome::Positioned { x: left });
        assert!(!table.striker().just_shot);
        assert!(table.state().message.starts_with("Striker positioned"));
    }

    #[test]
    fn pulling_back_fires_opposite_to_drag() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let start = striker_pos(&table);
        aim.pointer_down(&mut table, start, None).unwrap();
        aim.pointer_move(&mut table, Vec2::new(start.x, start.y + 100.0));
        assert_eq!(aim.phase(&table), TurnPhase::Aiming);
        // Locked: horizontal motion no longer slides the striker
        aim.pointer_move(&mut table, Vec2::new(start.x + 30.0, start.y + 100.0));
        assert_eq!(table.striker().x, start.x);

        aim.pointer_move(&mut table, Vec2::new(start.x, start.y + 100.0));
        let outcome = aim.pointer_up(&mut table);
        assert_eq!(outcome, ShotOutcome::Fired { power: 100.0 });
        let striker = table.striker();
        assert!(striker.just_shot);
        assert_eq!(striker.vx, 0.0);
        assert!((striker.vy + 100.0 * POWER_MULTIPLIER).abs() < 1e-4);
        assert_eq!(aim.phase(&table), TurnPhase::Settling);
    }

    #[test]
    fn power_is_capped() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let start = striker_pos(&table);
        aim.pointer_down(&mut table, start, None).unwrap();
        aim.pointer_move(&mut table, Vec2::new(start.x - 300.0, start.y + 400.0));
        let outcome = aim.pointer_up(&mut table);
        assert_eq!(outcome, ShotOutcome::Fired { power: MAX_POWER });
        let speed = table.striker().speed();
        assert!((speed - MAX_POWER * POWER_MULTIPLIER).abs() < 1e-3);
    }

    #[test]
    fn weak_pull_leaves_striker_alone() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let start = striker_pos(&table);
        aim.pointer_down(&mut table, start, None).unwrap();
        // Past the positioning threshold but under the minimum power
        aim.pointer_move(&mut table, Vec2::new(start.x, start.y - 11.0));
        aim.pointer_move(&mut table, Vec2::new(start.x, start.y - 7.0));
        let outcome = aim.pointer_up(&mut table);
        assert_eq!(outcome, ShotOutcome::TooWeak { power: 7.0 });
        assert!(!table.striker().is_moving());
        assert!(!table.striker().just_shot);
    }

    #[test]
    fn rejections() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let s = striker_pos(&table);

        assert_eq!(
            aim.pointer_down(&mut table, Vec2::new(s.x, 500.0), None),
            Err(AimRejection::OutOfZone)
        );
        assert_eq!(
            aim.pointer_down(&mut table, Vec2::new(s.x + 200.0, s.y), None),
            Err(AimRejection::NotNearStriker)
        );
        assert_eq!(
            aim.pointer_down(&mut table, s, Some(Player::Two)),
            Err(AimRejection::NotYourTurn(Player::One))
        );
        assert_eq!(table.state().message, "Waiting for Player 1");

        table.strike(0.0, -3.0);
        assert_eq!(
            aim.pointer_down(&mut table, s, None),
            Err(AimRejection::BodiesMoving)
        );
        assert_eq!(aim.pointer_up(&mut table), ShotOutcome::NoGesture);
    }

    #[test]
    fn reset_mid_gesture_discards_release() {
        let mut table = Table::new(1);
        let mut aim = AimController::default();
        let start = striker_pos(&table);
        aim.pointer_down(&mut table, start, None).unwrap();
        aim.pointer_move(&mut table, Vec2::new(start.x, start.y + 80.0));
        table.reset_table();
        aim.pointer_move(&mut table, Vec2::new(start.x, start.y + 120.0));
        assert_eq!(aim.pointer_up(&mut table), ShotOutcome::Discarded);
        assert!(!table.striker().is_moving());
        assert_eq!(aim.phase(&table), TurnPhase::AwaitingAim);
    }

    #[test]
    fn player_two_grabs_from_top() {
        let mut table = Table::new(1);
        table.switch_player();
        let mut aim = AimController::default();
        let s = striker_pos(&table);
        assert!(aim.pointer_down(&mut table, s, Some(Player::Two)).is_ok());
        aim.pointer_move(&mut table, Vec2::new(s.x, s.y - 50.0));
        assert_eq!(aim.pointer_up(&mut table), ShotOutcome::Fired { power: 50.0 });
        assert!(table.striker().vy > 0.0);
    }
}
