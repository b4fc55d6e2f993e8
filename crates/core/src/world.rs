use ndarray::{Array1, Array2};

use crate::types::{Observation, Transition};

/// A batched environment abstraction for lock-step planning.
///
/// A `World` is a stateless transition function over clonable per-environment
/// state values; a batch is simply a slice of states advanced together. This
/// keeps the world trivially snapshottable: consumers that need to branch
/// (the search tree, rollout evaluators) clone states and step the clones.
pub trait World: Clone + Send + Sync {
    /// Full per-environment state (e.g. a board position plus seat to move)
    type State: Clone + Send;

    /// Number of seats (players). Rewards and values are vectors of this length.
    fn n_seats(&self) -> usize;

    /// Size of the flat action space. Every state exposes a validity mask
    /// over exactly this many actions.
    fn n_actions(&self) -> usize;

    /// Fresh starting states for a batch of `n_envs` environments
    fn reset(&self, n_envs: usize) -> Vec<Self::State>;

    /// Reports the valid-action mask and the seat to move for each state.
    ///
    /// Every state must have at least one valid action; a just-finished game
    /// is represented by the fresh state `step` resets it to, never by a
    /// dead end.
    fn observe(&self, states: &[Self::State]) -> Observation;

    /// Advances each state in place by its action and reports the transition
    /// produced by that step.
    ///
    /// `actions[i]` must be valid for `states[i]`. States whose step ends the
    /// game are replaced by fresh starting states before returning; the
    /// transition still describes the step that just happened (`terminal`
    /// set, final rewards filled in).
    fn step(&self, states: &mut [Self::State], actions: &[usize]) -> Transition;
}

/// Builds an all-false terminal vector and zero rewards for a batch,
/// the common starting point for `step` implementations.
pub fn empty_transition(n_envs: usize, n_seats: usize) -> Transition {
    Transition {
        terminal: Array1::from_elem(n_envs, false),
        rewards: Array2::zeros((n_envs, n_seats)),
    }
}
