//! Carrom simulation: board geometry, bodies, physics, turn rules and input

pub mod board;
pub mod body;
pub mod input;
pub mod physics;
pub mod snapshot;
pub mod spatial;
pub mod table;

pub use board::Player;
pub use body::{Body, BodyKind, CoinColor};
pub use input::{AimController, AimRejection, ShotOutcome, TurnPhase, Viewport};
pub use physics::PhysicsSystem;
pub use snapshot::{GameSnapshot, PocketedCounts, Scores, SnapshotError};
pub use table::{Capture, GameState, Outcome, Table, TickReport};
