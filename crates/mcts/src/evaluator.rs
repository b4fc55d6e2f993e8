//! Evaluators: priors and value estimates for batches of states.

use std::cell::RefCell;

use lockstep_core::World;
use ndarray::{Array2, ArrayView1};
use rand::Rng;

/// Evaluator output for a batch of states.
///
/// `logits` are normalized log-probabilities over actions, `-inf` on invalid
/// actions; `values` are expected future returns per seat.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// `[env, action]`.
    pub logits: Array2<f32>,
    /// `[env, seat]`.
    pub values: Array2<f32>,
}

/// Maps a batch of world states to priors and value estimates.
///
/// The engine consumes this as an opaque callable; anything from a uniform
/// stub to a neural network fits behind it.
pub trait Evaluator<W: World> {
    fn evaluate(&self, world: &W, states: &[W::State]) -> Evaluation;
}

/// Normalized log-probabilities of the uniform distribution over each row's
/// valid actions; invalid actions get `-inf`.
pub fn uniform_logits(valid: &Array2<bool>) -> Array2<f32> {
    let (n_envs, n_actions) = valid.dim();
    let mut logits = Array2::from_elem((n_envs, n_actions), f32::NEG_INFINITY);
    for env in 0..n_envs {
        let n_valid = valid.row(env).iter().filter(|&&v| v).count();
        if n_valid == 0 {
            continue;
        }
        let log_p = -(n_valid as f32).ln();
        for action in 0..n_actions {
            if valid[[env, action]] {
                logits[[env, action]] = log_p;
            }
        }
    }
    logits
}

/// Pick a uniformly random valid action from a mask row.
///
/// # Panics
/// Panics if the row has no valid action; worlds guarantee at least one.
pub fn random_valid_action<R: Rng>(valid: ArrayView1<'_, bool>, rng: &mut R) -> usize {
    let n_valid = valid.iter().filter(|&&v| v).count();
    let mut pick = rng.gen_range(0..n_valid.max(1));
    for (action, &ok) in valid.iter().enumerate() {
        if ok {
            if pick == 0 {
                return action;
            }
            pick -= 1;
        }
    }
    panic!("BUG: no valid action in mask row");
}

/// Worlds whose exact expected value under uniform-random play is known in
/// closed form. Lets tests pin search output without an evaluator model in
/// the loop.
pub trait KnownValue: World {
    /// Expected returns per seat, `[env, seat]`.
    fn values(&self, states: &[Self::State]) -> Array2<f32>;
}

/// Uniform priors, zero values.
#[derive(Clone, Debug, Default)]
pub struct UniformEvaluator;

impl<W: World> Evaluator<W> for UniformEvaluator {
    fn evaluate(&self, world: &W, states: &[W::State]) -> Evaluation {
        let obs = world.observe(states);
        Evaluation {
            logits: uniform_logits(&obs.valid),
            values: Array2::zeros((states.len(), world.n_seats())),
        }
    }
}

/// Uniform priors, values read straight off the world's closed form.
#[derive(Clone, Debug, Default)]
pub struct ProxyEvaluator;

impl<W: KnownValue> Evaluator<W> for ProxyEvaluator {
    fn evaluate(&self, world: &W, states: &[W::State]) -> Evaluation {
        let obs = world.observe(states);
        Evaluation {
            logits: uniform_logits(&obs.valid),
            values: world.values(states),
        }
    }
}

/// Uniform priors, values estimated by averaging uniform-random playouts.
pub struct RolloutEvaluator<R> {
    rng: RefCell<R>,
    n_rollouts: usize,
}

impl<R: Rng> RolloutEvaluator<R> {
    pub fn new(rng: R, n_rollouts: usize) -> Self {
        Self {
            rng: RefCell::new(rng),
            n_rollouts: n_rollouts.max(1),
        }
    }
}

impl<W: World, R: Rng> Evaluator<W> for RolloutEvaluator<R> {
    fn evaluate(&self, world: &W, states: &[W::State]) -> Evaluation {
        let n_envs = states.len();
        let n_seats = world.n_seats();
        let obs = world.observe(states);
        let logits = uniform_logits(&obs.valid);

        let mut rng = self.rng.borrow_mut();
        let mut totals = Array2::<f32>::zeros((n_envs, n_seats));
        for _ in 0..self.n_rollouts {
            let mut playout: Vec<W::State> = states.to_vec();
            let mut live = vec![true; n_envs];
            // Rows that finished keep stepping their reset states in
            // lock-step; their rewards are ignored.
            while live.iter().any(|&l| l) {
                let obs = world.observe(&playout);
                let actions: Vec<usize> = (0..n_envs)
                    .map(|env| random_valid_action(obs.valid.row(env), &mut *rng))
                    .collect();
                let transition = world.step(&mut playout, &actions);
                for env in 0..n_envs {
                    if !live[env] {
                        continue;
                    }
                    for seat in 0..n_seats {
                        totals[[env, seat]] += transition.rewards[[env, seat]];
                    }
                    if transition.terminal[env] {
                        live[env] = false;
                    }
                }
            }
        }
        Evaluation {
            logits,
            values: totals / self.n_rollouts as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worlds::{AllOnes, InstantWin};
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_uniform_logits_normalized_over_valid() {
        let valid = arr2(&[[true, false, true], [true, true, true]]);
        let logits = uniform_logits(&valid);
        assert_abs_diff_eq!(logits[[0, 0]], (0.5f32).ln(), epsilon = 1e-6);
        assert_eq!(logits[[0, 1]], f32::NEG_INFINITY);
        for env in 0..2 {
            let total: f32 = logits.row(env).iter().map(|l| l.exp()).sum();
            assert_abs_diff_eq!(total, 1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_random_valid_action_respects_mask() {
        let valid = ndarray::arr1(&[false, true, false, true]);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for _ in 0..200 {
            let action = random_valid_action(valid.view(), &mut rng);
            assert!(action == 1 || action == 3);
        }
    }

    #[test]
    fn test_rollout_on_certain_win() {
        let world = InstantWin;
        let states = world.reset(3);
        let evaluator = RolloutEvaluator::new(ChaCha8Rng::seed_from_u64(1), 4);
        let ev = evaluator.evaluate(&world, &states);
        for env in 0..3 {
            assert_eq!(ev.values[[env, 0]], 1.0);
        }
    }

    #[test]
    fn test_proxy_reads_closed_form() {
        let world = AllOnes::new(3);
        let states = world.reset(2);
        let ev = ProxyEvaluator.evaluate(&world, &states);
        for env in 0..2 {
            assert_abs_diff_eq!(ev.values[[env, 0]], 0.125, epsilon = 1e-6);
        }
    }
}
