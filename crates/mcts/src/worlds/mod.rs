//! Reference worlds: small games with known structure, used by the test
//! suite and the pit binary.

mod hex;

pub use hex::{Cell, Hex, HexState};

use lockstep_core::{empty_transition, Observation, Transition, World};
use ndarray::{Array1, Array2};

use crate::evaluator::KnownValue;

/// Single seat, single action, every step ends the episode with reward 1.
#[derive(Clone, Debug, Default)]
pub struct InstantWin;

impl World for InstantWin {
    type State = ();

    fn n_seats(&self) -> usize {
        1
    }

    fn n_actions(&self) -> usize {
        1
    }

    fn reset(&self, n_envs: usize) -> Vec<()> {
        vec![(); n_envs]
    }

    fn observe(&self, states: &[()]) -> Observation {
        Observation {
            valid: Array2::from_elem((states.len(), 1), true),
            seats: Array1::zeros(states.len()),
        }
    }

    fn step(&self, states: &mut [()], _actions: &[usize]) -> Transition {
        Transition {
            terminal: Array1::from_elem(states.len(), true),
            rewards: Array2::ones((states.len(), 1)),
        }
    }
}

impl KnownValue for InstantWin {
    fn values(&self, states: &[()]) -> Array2<f32> {
        Array2::ones((states.len(), 1))
    }
}

/// Two seats, one action. Seat 0's move is a rewardless pass to seat 1;
/// seat 1's move ends the episode with `[+1, -1]` and the next episode
/// starts from seat 0 again. The state is the seat to move.
#[derive(Clone, Debug, Default)]
pub struct FirstWinsSecondLoses;

impl World for FirstWinsSecondLoses {
    type State = usize;

    fn n_seats(&self) -> usize {
        2
    }

    fn n_actions(&self) -> usize {
        1
    }

    fn reset(&self, n_envs: usize) -> Vec<usize> {
        vec![0; n_envs]
    }

    fn observe(&self, states: &[usize]) -> Observation {
        Observation {
            valid: Array2::from_elem((states.len(), 1), true),
            seats: Array1::from_vec(states.to_vec()),
        }
    }

    fn step(&self, states: &mut [usize], _actions: &[usize]) -> Transition {
        let mut transition = empty_transition(states.len(), 2);
        for (env, state) in states.iter_mut().enumerate() {
            if *state == 1 {
                transition.terminal[env] = true;
                transition.rewards[[env, 0]] = 1.0;
                transition.rewards[[env, 1]] = -1.0;
                *state = 0;
            } else {
                *state = 1;
            }
        }
        transition
    }
}

impl KnownValue for FirstWinsSecondLoses {
    fn values(&self, states: &[usize]) -> Array2<f32> {
        let mut values = Array2::zeros((states.len(), 2));
        for env in 0..states.len() {
            values[[env, 0]] = 1.0;
            values[[env, 1]] = -1.0;
        }
        values
    }
}

/// Single seat, two actions, fixed episode length. The episode pays 1 at the
/// end iff action 1 was chosen at every step. The exact value under uniform
/// play from an all-ones prefix at depth `d` is `(1/2)^(length - d)`.
#[derive(Clone, Debug)]
pub struct AllOnes {
    length: usize,
}

/// Progress through one [`AllOnes`] episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllOnesState {
    depth: usize,
    correct: bool,
}

impl AllOnes {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
        }
    }
}

impl World for AllOnes {
    type State = AllOnesState;

    fn n_seats(&self) -> usize {
        1
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn reset(&self, n_envs: usize) -> Vec<AllOnesState> {
        vec![
            AllOnesState {
                depth: 0,
                correct: true,
            };
            n_envs
        ]
    }

    fn observe(&self, states: &[AllOnesState]) -> Observation {
        Observation {
            valid: Array2::from_elem((states.len(), 2), true),
            seats: Array1::zeros(states.len()),
        }
    }

    fn step(&self, states: &mut [AllOnesState], actions: &[usize]) -> Transition {
        let mut transition = empty_transition(states.len(), 1);
        for (env, state) in states.iter_mut().enumerate() {
            state.depth += 1;
            state.correct &= actions[env] == 1;
            if state.depth == self.length {
                transition.terminal[env] = true;
                transition.rewards[[env, 0]] = if state.correct { 1.0 } else { 0.0 };
                *state = AllOnesState {
                    depth: 0,
                    correct: true,
                };
            }
        }
        transition
    }
}

impl KnownValue for AllOnes {
    fn values(&self, states: &[AllOnesState]) -> Array2<f32> {
        let mut values = Array2::zeros((states.len(), 1));
        for (env, state) in states.iter().enumerate() {
            if state.correct {
                values[[env, 0]] = 0.5f32.powi((self.length - state.depth) as i32);
            }
        }
        values
    }
}
