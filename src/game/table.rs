//! Authoritative table state: bodies, turn order, scores and win detection

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use super::board::{
    striker_x_range, Player, BOARD_SIZE, COINS_PER_COLOR, COIN_RADIUS,
};
use super::body::{Body, BodyKind, CoinColor};
use super::physics::PhysicsSystem;
use super::snapshot::{GameSnapshot, PocketedCounts, Scores, SnapshotError};
use crate::util::geometry::clamp;

/// Id reserved for the striker
pub const STRIKER_ID: u32 = 9999;

const INNER_RING: f32 = COIN_RADIUS * 3.2;
const OUTER_RING: f32 = COIN_RADIUS * 5.6;

/// Turn and score summary
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub current_player: Player,
    pub scores: Scores,
    pub message: String,
    pub pocketed_counts: PocketedCounts,
    pub is_any_moving: bool,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            current_player: Player::One,
            scores: Scores::default(),
            message: "Position striker horizontally then pull vertically to shoot.".to_string(),
            pocketed_counts: PocketedCounts::default(),
            is_any_moving: false,
        }
    }
}

/// A body that dropped this tick and who was credited for it
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub body_id: u32,
    pub kind: BodyKind,
    pub credited: Player,
    pub points: u32,
}

/// What happened during one [`Table::tick`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub captures: Vec<Capture>,
    pub turn_switched: bool,
    pub game_over: bool,
}

/// Result of a finished game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Winner(Player),
    Tie,
}

/// The carrom table. Owns every body; the striker is always the last one.
pub struct Table {
    bodies: Vec<Body>,
    state: GameState,
    game_over: bool,
    /// Bumped whenever the body collection is replaced
    generation: u64,
    substeps: u32,
    rng: ChaCha8Rng,
}

impl Table {
    /// A freshly racked table, layout randomized from `seed`
    pub fn new(seed: u64) -> Self {
        let mut table = Self {
            bodies: Vec::new(),
            state: GameState::default(),
            game_over: false,
            generation: 0,
            substeps: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        table.reset_table();
        table
    }

    /// Split every tick into `substeps` physics steps
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    /// Rack the coins, park the striker for player one and clear the scores
    pub fn reset_table(&mut self) {
        let center = BOARD_SIZE / 2.0;
        let mut bodies = Vec::with_capacity(20);
        let mut id = 1;

        bodies.push(Body::queen(id, center, center));
        id += 1;

        for i in 0..6 {
            let ang = (i as f32 / 6.0) * std::f32::consts::TAU;
            let color = if i % 2 == 0 {
                CoinColor::Black
            } else {
                CoinColor::White
            };
            bodies.push(Body::coin(
                id,
                center + INNER_RING * ang.cos(),
                center + INNER_RING * ang.sin(),
                color,
            ));
            id += 1;
        }

        for i in 0..6 {
            let ang = ((i as f32 + 0.5) / 6.0) * std::f32::consts::TAU;
            let color = if i % 2 == 1 {
                CoinColor::Black
            } else {
                CoinColor::White
            };
            bodies.push(Body::coin(
                id,
                center + OUTER_RING * ang.cos(),
                center + OUTER_RING * ang.sin(),
                color,
            ));
            id += 1;
        }

        let count = |bodies: &[Body], color| bodies.iter().filter(|b| b.is_coin_of(color)).count();
        let mut white = count(&bodies, CoinColor::White);
        let mut black = count(&bodies, CoinColor::Black);
        let mut white_next = true;

        while white < COINS_PER_COLOR || black < COINS_PER_COLOR {
            let color = match (white < COINS_PER_COLOR, black < COINS_PER_COLOR) {
                (true, true) if white_next => CoinColor::White,
                (true, true) => CoinColor::Black,
                (true, false) => CoinColor::White,
                _ => CoinColor::Black,
            };
            white_next = !white_next;

            let angle = self.rng.gen::<f32>() * std::f32::consts::TAU;
            let radius = OUTER_RING + COIN_RADIUS * (0.8 + self.rng.gen::<f32>() * 1.6);
            bodies.push(Body::coin(
                id,
                center + angle.cos() * radius,
                center + angle.sin() * radius,
                color,
            ));
            id += 1;

            match color {
                CoinColor::White => white += 1,
                _ => black += 1,
            }
        }

        bodies.push(Body::striker(
            STRIKER_ID,
            center,
            Player::One.striker_baseline(),
        ));

        self.bodies = bodies;
        self.game_over = false;
        self.generation += 1;
        self.state = GameState {
            message: "Player 1 (bottom) to play. Position striker horizontally then pull vertically to shoot."
                .to_string(),
            ..GameState::default()
        };

        debug!(generation = self.generation, bodies = self.bodies.len(), "Table reset");
    }

    /// Hand the turn over and park the striker on the new player's baseline
    pub fn switch_player(&mut self) {
        let next = self.state.current_player.other();
        self.state.current_player = next;
        self.park_striker(next);
        self.state.message = format!(
            "Motion stopped. {next}'s turn, striker moved to opposite side."
        );
        debug!(player = next.number(), "Turn switched");
    }

    /// Forced pass. Only allowed while nothing moves and the game is live.
    pub fn pass_turn(&mut self) -> bool {
        if self.game_over || PhysicsSystem::is_any_moving(&self.bodies) {
            return false;
        }
        let next = self.state.current_player.other();
        self.state.current_player = next;
        self.park_striker(next);
        self.state.message = format!("Forced pass. {next}'s turn.");
        true
    }

    fn park_striker(&mut self, player: Player) {
        let striker = self.striker_mut();
        striker.stop();
        striker.pocketed = false;
        striker.just_shot = false;
        striker.x = BOARD_SIZE / 2.0;
        striker.y = player.striker_baseline();
    }

    /// Recount pocketed pieces from the bodies themselves
    pub fn update_pocket_counts(&mut self) {
        let pocketed = self.coins().iter().filter(|b| b.pocketed);
        let (mut total, mut queen) = (0, 0);
        for body in pocketed {
            total += 1;
            if body.kind == BodyKind::Queen {
                queen += 1;
            }
        }
        self.state.pocketed_counts = PocketedCounts { total, queen };
    }

    /// Credit the capture of `bodies[idx]` to the right player
    fn score_capture(&mut self, idx: usize) -> Capture {
        let body = &self.bodies[idx];
        let (body_id, kind) = (body.id, body.kind);
        let shooter = self.state.current_player;
        let credited = if kind.is_foul() { shooter.other() } else { shooter };
        let points = kind.capture_points();

        self.state.scores.add(credited, points);
        self.state.message = match kind {
            BodyKind::Striker => format!(
                "Striker pocketed: {credited} +{points}. Striker will reset to other side."
            ),
            BodyKind::Queen => format!("{credited} pocketed the Queen (+{points})."),
            BodyKind::Coin => format!("{credited} pocketed a coin (+{points})."),
        };

        debug!(body_id, ?kind, player = credited.number(), points, "Capture scored");
        Capture {
            body_id,
            kind,
            credited,
            points,
        }
    }

    /// Current leader by score
    pub fn leader(&self) -> Outcome {
        let scores = self.state.scores;
        match scores.get(Player::One).cmp(&scores.get(Player::Two)) {
            std::cmp::Ordering::Greater => Outcome::Winner(Player::One),
            std::cmp::Ordering::Less => Outcome::Winner(Player::Two),
            std::cmp::Ordering::Equal => Outcome::Tie,
        }
    }

    /// True once every coin and the queen are pocketed. Makes the table terminal.
    pub fn check_win_condition(&mut self) -> bool {
        if !self.all_pieces_pocketed() {
            return false;
        }
        self.finish("Game Over! ");
        true
    }

    /// Stop the game now and declare the current leader
    pub fn end_game(&mut self) -> Outcome {
        self.finish("")
    }

    fn all_pieces_pocketed(&self) -> bool {
        let coins = self.coins();
        let pocketed = |pred: fn(&Body) -> bool| coins.iter().filter(|b| b.pocketed && pred(b)).count();
        pocketed(|b| b.is_coin_of(CoinColor::White)) >= COINS_PER_COLOR
            && pocketed(|b| b.is_coin_of(CoinColor::Black)) >= COINS_PER_COLOR
            && pocketed(|b| b.kind == BodyKind::Queen) >= 1
    }

    fn finish(&mut self, prefix: &str) -> Outcome {
        let outcome = self.leader();
        self.state.message = match outcome {
            Outcome::Winner(p) => format!("{prefix}{p} wins!"),
            Outcome::Tie => format!("{prefix}It's a tie!"),
        };
        if !self.game_over {
            info!(
                score_one = self.state.scores.one,
                score_two = self.state.scores.two,
                "Game over"
            );
        }
        self.game_over = true;
        self.striker_mut().just_shot = false;
        outcome
    }

    /// Switch turns once the shot has fully settled. Returns true if it switched.
    pub fn settle(&mut self) -> bool {
        if self.game_over || PhysicsSystem::is_any_moving(&self.bodies) {
            return false;
        }
        if !self.striker().just_shot {
            return false;
        }
        self.striker_mut().just_shot = false;
        self.switch_player();
        true
    }

    /// Advance the simulation by one frame
    pub fn tick(&mut self, dt_factor: f32) -> TickReport {
        let mut report = TickReport::default();
        if self.game_over {
            report.game_over = true;
            return report;
        }

        let step_factor = dt_factor / self.substeps as f32;
        for _ in 0..self.substeps {
            let captured = PhysicsSystem::step(&mut self.bodies, step_factor);
            for idx in captured {
                let capture = self.score_capture(idx);
                report.captures.push(capture);
            }
        }

        if !report.captures.is_empty() {
            self.update_pocket_counts();
            report.game_over = self.check_win_condition();
        }

        self.state.is_any_moving = PhysicsSystem::is_any_moving(&self.bodies);
        if !report.game_over {
            report.turn_switched = self.settle();
        }
        report
    }

    /// Slide the striker along the current player's baseline
    pub(crate) fn position_striker(&mut self, x: f32) -> f32 {
        let baseline = self.state.current_player.striker_baseline();
        let striker = self.striker_mut();
        let (left, right) = striker_x_range(striker.r);
        striker.x = clamp(x, left, right);
        striker.y = baseline;
        striker.x
    }

    /// Release the striker with the given velocity
    pub(crate) fn strike(&mut self, vx: f32, vy: f32) {
        let striker = self.striker_mut();
        striker.vx = vx;
        striker.vy = vy;
        striker.just_shot = true;
        self.state.is_any_moving = true;
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.state.message = message.into();
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn coins(&self) -> &[Body] {
        &self.bodies[..self.bodies.len() - 1]
    }

    pub fn striker(&self) -> &Body {
        &self.bodies[self.bodies.len() - 1]
    }

    fn striker_mut(&mut self) -> &mut Body {
        let last = self.bodies.len() - 1;
        &mut self.bodies[last]
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn current_player(&self) -> Player {
        self.state.current_player
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_any_moving(&self) -> bool {
        PhysicsSystem::is_any_moving(&self.bodies)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Serialize the whole table
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            current_player: self.state.current_player,
            scores: self.state.scores,
            message: self.state.message.clone(),
            pocketed_counts: self.state.pocketed_counts,
            is_any_moving: self.state.is_any_moving,
            game_over: self.game_over,
            coins: self.coins().to_vec(),
            striker: Some(self.striker().clone()),
        }
    }

    /// Overwrite the local table with a peer's snapshot.
    ///
    /// Summary snapshots only carry turn and scores; the bodies stay. An
    /// invalid snapshot leaves the table untouched.
    pub fn apply_snapshot(&mut self, snapshot: GameSnapshot) -> Result<(), SnapshotError> {
        snapshot.validate()?;

        let summary = snapshot.is_summary();
        let current = snapshot.current_player;
        let game_over = snapshot.game_over;
        self.state = GameState {
            current_player: current,
            scores: snapshot.scores,
            message: snapshot.message,
            pocketed_counts: snapshot.pocketed_counts,
            is_any_moving: snapshot.is_any_moving,
        };
        if summary {
            self.game_over = game_over;
            return Ok(());
        }

        let mut bodies = snapshot.coins;
        bodies.push(
            snapshot
                .striker
                .unwrap_or_else(|| Body::striker(STRIKER_ID, BOARD_SIZE / 2.0, current.striker_baseline())),
        );
        self.bodies = bodies;
        self.generation += 1;
        self.game_over = game_over || self.all_pieces_pocketed();
        Ok(())
    }
}
