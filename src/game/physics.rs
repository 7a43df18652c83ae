//! Carrom physics: friction, cushions, coin-coin contacts and pockets
//!
//! All functions operate in place on a slice of bodies. Pocketed bodies are
//! inert: they are skipped by every pass until the table resets them.

use crate::util::geometry::{dist, len, Vec2};

use super::board::{
    BOARD_SIZE, COIN_RESTITUTION, FRICTION, MIN_VELOCITY, POCKETS, POCKET_RADIUS,
    POCKET_TOLERANCE, WALL_MARGIN, WALL_RESTITUTION,
};
use super::body::Body;
use super::spatial::{SpatialGrid, GRID_CELL_SIZE};

/// Extra separation added when pushing overlapping bodies apart
pub const SEPARATION_SLOP: f32 = 0.01;

/// Physics system for the carrom table
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Apply friction, snap crawling components to zero, then advance positions.
    ///
    /// Friction is applied once per call whatever `dt_factor` is.
    pub fn integrate(bodies: &mut [Body], dt_factor: f32) {
        for body in bodies.iter_mut().filter(|b| !b.pocketed) {
            body.vx *= FRICTION;
            body.vy *= FRICTION;
            if body.vx.abs() < MIN_VELOCITY {
                body.vx = 0.0;
            }
            if body.vy.abs() < MIN_VELOCITY {
                body.vy = 0.0;
            }
            body.x += body.vx * dt_factor;
            body.y += body.vy * dt_factor;
        }
    }

    /// Keep every body inside `[margin, BOARD_SIZE - margin]` on both axes,
    /// bouncing it back with [`WALL_RESTITUTION`].
    pub fn resolve_walls(bodies: &mut [Body], margin: f32) {
        let lo = margin;
        let hi = BOARD_SIZE - margin;
        for body in bodies.iter_mut().filter(|b| !b.pocketed) {
            if body.x - body.r < lo {
                body.x = lo + body.r;
                body.vx = body.vx.abs() * WALL_RESTITUTION;
            }
            if body.x + body.r > hi {
                body.x = hi - body.r;
                body.vx = -body.vx.abs() * WALL_RESTITUTION;
            }
            if body.y - body.r < lo {
                body.y = lo + body.r;
                body.vy = body.vy.abs() * WALL_RESTITUTION;
            }
            if body.y + body.r > hi {
                body.y = hi - body.r;
                body.vy = -body.vy.abs() * WALL_RESTITUTION;
            }
        }
    }

    /// Resolve contacts using the grid broad phase
    pub fn resolve_collisions(bodies: &mut [Body]) {
        let pairs = SpatialGrid::build(bodies, GRID_CELL_SIZE).candidate_pairs();
        for (i, j) in pairs {
            let (a, b) = pair_mut(bodies, i, j);
            Self::resolve_contact(a, b);
        }
    }

    /// Reference O(n²) contact pass, visiting pairs in `(i, j)` order
    pub fn resolve_collisions_brute_force(bodies: &mut [Body]) {
        for i in 0..bodies.len() {
            for j in (i + 1)..bodies.len() {
                let (a, b) = pair_mut(bodies, i, j);
                Self::resolve_contact(a, b);
            }
        }
    }

    /// Separate two overlapping bodies and exchange an equal-mass impulse.
    ///
    /// Returns the impulse added to `b` (`a` received its negation), or `None`
    /// if the bodies do not touch. A zero impulse means they were already
    /// separating.
    pub fn resolve_contact(a: &mut Body, b: &mut Body) -> Option<Vec2> {
        if a.pocketed || b.pocketed {
            return None;
        }
        let dx = b.x - a.x;
        let dy = b.y - a.y;
        let d = len(dx, dy);
        let min_d = a.r + b.r;
        if d >= min_d {
            return None;
        }

        // Coincident centers have no normal; push apart along +x
        let (nx, ny) = if d > f32::EPSILON {
            (dx / d, dy / d)
        } else {
            (1.0, 0.0)
        };

        let push = 0.5 * (min_d - d + SEPARATION_SLOP);
        a.x -= nx * push;
        a.y -= ny * push;
        b.x += nx * push;
        b.y += ny * push;

        let vel_along = (b.vx - a.vx) * nx + (b.vy - a.vy) * ny;
        if vel_along >= 0.0 {
            return Some(Vec2::ZERO);
        }

        let impulse = -(1.0 + COIN_RESTITUTION) * vel_along / 2.0;
        let ix = impulse * nx;
        let iy = impulse * ny;
        a.vx -= ix;
        a.vy -= iy;
        b.vx += ix;
        b.vy += iy;

        Some(Vec2::new(ix, iy))
    }

    /// Capture bodies that reached a pocket. Returns the indices captured by
    /// this call; bodies already pocketed are skipped.
    pub fn check_pockets(bodies: &mut [Body]) -> Vec<usize> {
        let capture_radius = POCKET_RADIUS - POCKET_TOLERANCE;
        let mut captured = Vec::new();
        for (idx, body) in bodies.iter_mut().enumerate() {
            if body.pocketed {
                continue;
            }
            if POCKETS
                .iter()
                .any(|&pocket| dist(body.position(), pocket) < capture_radius)
            {
                body.pocketed = true;
                body.stop();
                captured.push(idx);
            }
        }
        captured
    }

    /// True if any body on the table still has velocity
    pub fn is_any_moving(bodies: &[Body]) -> bool {
        bodies.iter().any(Body::is_moving)
    }

    /// One full tick: integrate, cushions, contacts, pockets
    pub fn step(bodies: &mut [Body], dt_factor: f32) -> Vec<usize> {
        Self::integrate(bodies, dt_factor);
        Self::resolve_walls(bodies, WALL_MARGIN);
        Self::resolve_collisions(bodies);
        Self::check_pockets(bodies)
    }
}

/// Two distinct mutable bodies, `i < j`
fn pair_mut(bodies: &mut [Body], i: usize, j: usize) -> (&mut Body, &mut Body) {
    debug_assert!(i < j);
    let (head, tail) = bodies.split_at_mut(j);
    (&mut head[i], &mut tail[0])
}
