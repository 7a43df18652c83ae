//! Carrom - table physics, turn rules and a two-player relay
//!
//! - `game`: bodies, physics, scoring and pointer input for one table
//! - `client`: a player's session and the frame loop that drives it
//! - `rooms`, `ws`, `http`: the relay server that pairs two sessions

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod rooms;
pub mod util;
pub mod ws;
