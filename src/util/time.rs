//! Time utilities for the relay and the frame loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Frame rate the physics constants are tuned for
pub const FRAMES_PER_SECOND: u32 = 60;
/// Nominal frame length in milliseconds; a frame of this length has factor 1.0
pub const NOMINAL_FRAME_MS: f32 = 16.67;
/// Longest frame the simulation will integrate in one go
pub const MAX_FRAME_MS: f32 = 34.0;
/// How often pocket counters are recomputed outside the frame loop
pub const POCKET_REFRESH_MS: u64 = 500;

/// Interval between frames of the game loop
pub fn frame_duration() -> Duration {
    Duration::from_micros(1_000_000 / FRAMES_PER_SECOND as u64)
}

/// Convert a wall-clock frame length into the integration factor the physics
/// expects. Long frames (tab switches, stalls) are capped.
pub fn frame_factor(elapsed: Duration) -> f32 {
    let ms = elapsed.as_secs_f32() * 1000.0;
    ms.min(MAX_FRAME_MS) / NOMINAL_FRAME_MS
}
