//! Batched value types exchanged across the world boundary.
//!
//! All arrays are indexed `[env]` or `[env, action]` and hold one row per
//! environment in the lock-step batch. Shape invariants are documented here
//! and enforced by the consumer at the call boundary.

use ndarray::{Array1, Array2};

/// Snapshot of a batch of environments from the side of the player to move.
#[derive(Clone, Debug)]
pub struct Observation {
    /// Legal-action mask, `[env, action]`. At least one `true` per row.
    pub valid: Array2<bool>,
    /// Seat of the player to move in each environment, `[env]`.
    pub seats: Array1<usize>,
}

impl Observation {
    pub fn n_envs(&self) -> usize {
        self.seats.len()
    }
}

/// Result of stepping a batch of environments by one action each.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Whether the step ended the episode, `[env]`.
    pub terminal: Array1<bool>,
    /// Reward per seat, `[env, seat]`. Zero for non-terminal steps.
    pub rewards: Array2<f32>,
}

impl Transition {
    pub fn n_envs(&self) -> usize {
        self.terminal.len()
    }
}
