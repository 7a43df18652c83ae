//! Client side driver: session state and the frame loop

pub mod game_loop;
pub mod session;

pub use game_loop::{GameLoop, LoopCommand};
pub use session::{Mode, MultiplayerState, Session};
