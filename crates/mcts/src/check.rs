//! Eager shape checks at component boundaries.
//!
//! Worlds and evaluators are external collaborators; every batched tensor
//! they hand back is validated here before the engine indexes into it.

use crate::error::{Result, SearchError};
use crate::evaluator::Evaluation;
use lockstep_core::{Observation, Transition};

fn dims(shape: &[usize]) -> String {
    let parts: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

pub(crate) fn check_observation(
    obs: &Observation,
    n_envs: usize,
    n_actions: usize,
    n_seats: usize,
) -> Result<()> {
    if obs.valid.dim() != (n_envs, n_actions) {
        return Err(SearchError::Shape {
            name: "observation.valid",
            expected: dims(&[n_envs, n_actions]),
            got: dims(&[obs.valid.nrows(), obs.valid.ncols()]),
        });
    }
    if obs.seats.len() != n_envs {
        return Err(SearchError::Shape {
            name: "observation.seats",
            expected: dims(&[n_envs]),
            got: dims(&[obs.seats.len()]),
        });
    }
    for (env, &seat) in obs.seats.iter().enumerate() {
        if seat >= n_seats {
            return Err(SearchError::Shape {
                name: "observation.seats",
                expected: format!("seat < {n_seats}"),
                got: format!("seat {seat} in env {env}"),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_transition(tr: &Transition, n_envs: usize, n_seats: usize) -> Result<()> {
    if tr.terminal.len() != n_envs {
        return Err(SearchError::Shape {
            name: "transition.terminal",
            expected: dims(&[n_envs]),
            got: dims(&[tr.terminal.len()]),
        });
    }
    if tr.rewards.dim() != (n_envs, n_seats) {
        return Err(SearchError::Shape {
            name: "transition.rewards",
            expected: dims(&[n_envs, n_seats]),
            got: dims(&[tr.rewards.nrows(), tr.rewards.ncols()]),
        });
    }
    Ok(())
}

pub(crate) fn check_evaluation(
    ev: &Evaluation,
    n_envs: usize,
    n_actions: usize,
    n_seats: usize,
) -> Result<()> {
    if ev.logits.dim() != (n_envs, n_actions) {
        return Err(SearchError::Shape {
            name: "evaluation.logits",
            expected: dims(&[n_envs, n_actions]),
            got: dims(&[ev.logits.nrows(), ev.logits.ncols()]),
        });
    }
    if ev.values.dim() != (n_envs, n_seats) {
        return Err(SearchError::Shape {
            name: "evaluation.values",
            expected: dims(&[n_envs, n_seats]),
            got: dims(&[ev.values.nrows(), ev.values.ncols()]),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array1, Array2};

    #[test]
    fn test_observation_shapes() {
        let obs = Observation {
            valid: Array2::from_elem((2, 3), true),
            seats: Array1::zeros(2),
        };
        assert!(check_observation(&obs, 2, 3, 1).is_ok());
        assert!(check_observation(&obs, 2, 4, 1).is_err());
        assert!(check_observation(&obs, 3, 3, 1).is_err());
    }

    #[test]
    fn test_observation_seat_range() {
        let obs = Observation {
            valid: Array2::from_elem((2, 3), true),
            seats: Array1::from_vec(vec![0, 2]),
        };
        assert!(check_observation(&obs, 2, 3, 3).is_ok());
        let err = check_observation(&obs, 2, 3, 2).unwrap_err();
        assert!(matches!(err, SearchError::Shape { name, .. } if name == "observation.seats"));
    }

    #[test]
    fn test_transition_shapes() {
        let tr = Transition {
            terminal: Array1::from_elem(2, false),
            rewards: Array2::zeros((2, 2)),
        };
        assert!(check_transition(&tr, 2, 2).is_ok());
        assert!(check_transition(&tr, 2, 1).is_err());
    }

    #[test]
    fn test_evaluation_shapes() {
        let ev = Evaluation {
            logits: Array2::zeros((4, 9)),
            values: Array2::zeros((4, 2)),
        };
        assert!(check_evaluation(&ev, 4, 9, 2).is_ok());
        assert!(check_evaluation(&ev, 4, 9, 1).is_err());
        assert!(check_evaluation(&ev, 4, 8, 2).is_err());
    }
}
