//! Lock-step descent from every root to an insertion point.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::Rng;

use crate::error::Result;
use crate::policy::{lambda_n, regularized_policy};
use crate::tree::{Forest, Stats, NONE};

/// Where each environment's next expansion grafts: the node that finished
/// the walk and the action sampled there.
pub(crate) struct Descent {
    /// Node index per environment.
    pub(crate) parents: Array1<i64>,
    /// Action index per environment.
    pub(crate) actions: Array1<i64>,
}

/// Walk every environment from its root until none is active.
///
/// A position is active while it sits on an evaluated, non-terminal node;
/// an environment that steps onto an unexpanded slot (`NONE`) or a terminal
/// node keeps its last `(parent, action)` pair and stops participating while
/// the rest keep walking. Masking instead of branching keeps the loop
/// lock-step across the batch. Children are allocated after their parents,
/// so every active environment strictly increases its node index and the
/// loop ends within capacity iterations.
pub(crate) fn descend<S, R: Rng>(
    forest: &Forest<S>,
    stats: &Stats,
    c_puct: f32,
    rng: &mut R,
) -> Result<Descent> {
    let n_envs = forest.n_envs();
    let mut current = Array1::<i64>::zeros(n_envs);
    let mut parents = Array1::<i64>::zeros(n_envs);
    let mut actions = Array1::<i64>::from_elem(n_envs, NONE);

    loop {
        let active: Vec<(usize, i64)> = (0..n_envs)
            .filter(|&e| {
                let node = current[e];
                node != NONE
                    && forest.evaluated(e, node as usize)
                    && !forest.terminal[[e, node as usize]]
            })
            .map(|e| (e, current[e]))
            .collect();
        if active.is_empty() {
            return Ok(Descent { parents, actions });
        }

        let policies = node_policies(forest, stats, &active, c_puct)?;
        for (i, &(env, node)) in active.iter().enumerate() {
            let action = sample_row(policies.row(i), rng);
            parents[env] = node;
            actions[env] = action as i64;
            current[env] = forest.children[[env, node as usize, action]];
        }
    }
}

/// Solve the selection policy for a list of `(env, node)` pairs.
///
/// Priors are exponentiated log-probabilities. Child q values are gathered
/// for the seat to move at each node, min-max rescaled per row with
/// unvisited actions pinned at zero, and handed to the regularized solver
/// together with a visit-dependent lambda.
pub(crate) fn node_policies<S>(
    forest: &Forest<S>,
    stats: &Stats,
    nodes: &[(usize, i64)],
    c_puct: f32,
) -> Result<Array2<f32>> {
    let k = nodes.len();
    let n_actions = forest.n_actions();
    let pi = Array2::from_shape_fn((k, n_actions), |(i, a)| {
        let (env, node) = nodes[i];
        forest.priors[[env, node as usize, a]].exp()
    });
    let (visits, q_raw) = stats.action_stats(forest, nodes);
    let q = rescale_rows(&q_raw, &visits);
    let totals = visits.sum_axis(Axis(1));
    let lambdas = Array1::from_shape_fn(k, |i| lambda_n(c_puct, totals[i], n_actions));
    regularized_policy(&pi, &q, &lambdas)
}

/// Min-max rescale each row to `[0, 1]` with an epsilon guard against a
/// degenerate zero range, then pin unvisited actions back to zero.
fn rescale_rows(q: &Array2<f32>, visits: &Array2<f32>) -> Array2<f32> {
    let (k, n_actions) = q.dim();
    let mut out = Array2::zeros((k, n_actions));
    for i in 0..k {
        let row = q.row(i);
        let min = row.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min + 1e-6;
        for a in 0..n_actions {
            if visits[[i, a]] > 0.0 {
                out[[i, a]] = (q[[i, a]] - min) / range;
            }
        }
    }
    out
}

/// Sample an index from a categorical distribution by inverse CDF.
///
/// Zero-mass entries are never selected; floating-point shortfall in the
/// cumulative sum falls back to the last positive-mass entry.
pub(crate) fn sample_row<R: Rng>(p: ArrayView1<'_, f32>, rng: &mut R) -> usize {
    let u: f32 = rng.gen();
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (i, &mass) in p.iter().enumerate() {
        if mass <= 0.0 {
            continue;
        }
        last_positive = i;
        cumulative += mass;
        if u < cumulative {
            return i;
        }
    }
    last_positive
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Assert empirical counts match expected probabilities within three
    /// standard deviations of the binomial.
    fn assert_distribution(counts: &[usize], probs: &[f32]) {
        let total: usize = counts.iter().sum();
        for (i, (&count, &p)) in counts.iter().zip(probs).enumerate() {
            let mean = total as f32 * p;
            let sigma = (total as f32 * p * (1.0 - p)).sqrt();
            let dev = (count as f32 - mean).abs();
            assert!(
                dev <= 3.0 * sigma.max(1.0),
                "index {i}: count {count}, expected {mean:.1} ± {:.1}",
                3.0 * sigma
            );
        }
    }

    fn write_priors(forest: &mut Forest<()>, env: usize, node: usize, probs: &[f32]) {
        for (a, &p) in probs.iter().enumerate() {
            forest.priors[[env, node, a]] = p.ln();
        }
    }

    #[test]
    fn test_sample_row_skips_zero_mass() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p = arr1(&[0.5f32, 0.0, 0.5]);
        for _ in 0..200 {
            assert_ne!(sample_row(p.view(), &mut rng), 1);
        }
    }

    #[test]
    fn test_sample_row_certain_mass() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let p = arr1(&[0.0f32, 1.0]);
        for _ in 0..50 {
            assert_eq!(sample_row(p.view(), &mut rng), 1);
        }
    }

    #[test]
    fn test_rescale_rows_pins_unvisited() {
        let q = arr2(&[[0.0f32, 2.0, 4.0]]);
        let visits = arr2(&[[0.0f32, 1.0, 1.0]]);
        let out = rescale_rows(&q, &visits);
        assert_eq!(out[[0, 0]], 0.0);
        assert!(out[[0, 1]] > 0.0 && out[[0, 1]] < out[[0, 2]]);
        assert!(out[[0, 2]] <= 1.0);
    }

    #[test]
    fn test_descent_samples_fresh_root_from_prior() {
        // A fresh root has no visited children, so all q are equal and the
        // solved policy reproduces the prior exactly.
        let n_envs = 1024;
        let mut forest: Forest<()> = Forest::new(n_envs, 2, 2, 1);
        for env in 0..n_envs {
            write_priors(&mut forest, env, 0, &[1.0 / 3.0, 2.0 / 3.0]);
        }
        let stats = Stats::new(n_envs, 2, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let descent = descend(&forest, &stats, 1.0, &mut rng).unwrap();

        let mut counts = [0usize; 2];
        for env in 0..n_envs {
            assert_eq!(descent.parents[env], 0);
            counts[descent.actions[env] as usize] += 1;
        }
        assert_distribution(&counts, &[1.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_descent_mixes_depth_two() {
        // Root with two evaluated, once-visited children. Every q is equal,
        // so each node's policy reproduces its prior and the insertion
        // points follow the product of priors along the walk.
        let n_envs = 1024;
        let mut forest: Forest<()> = Forest::new(n_envs, 4, 2, 1);
        let mut stats = Stats::new(n_envs, 4, 1);
        for env in 0..n_envs {
            write_priors(&mut forest, env, 0, &[1.0 / 3.0, 2.0 / 3.0]);
            write_priors(&mut forest, env, 1, &[1.0 / 4.0, 3.0 / 4.0]);
            write_priors(&mut forest, env, 2, &[1.0 / 5.0, 4.0 / 5.0]);
            forest.connect(env, 0, 0, 1);
            forest.connect(env, 0, 1, 2);
            stats.visits[[env, 1]] = 1;
            stats.visits[[env, 2]] = 1;
        }
        let mut rng = ChaCha8Rng::seed_from_u64(13);

        let descent = descend(&forest, &stats, 1.0, &mut rng).unwrap();

        let mut parent_counts = [0usize; 2];
        let mut action_counts = [0usize; 2];
        for env in 0..n_envs {
            let parent = descent.parents[env];
            assert!(parent == 1 || parent == 2, "unexpected parent {parent}");
            parent_counts[(parent - 1) as usize] += 1;
            action_counts[descent.actions[env] as usize] += 1;
        }
        assert_distribution(&parent_counts, &[1.0 / 3.0, 2.0 / 3.0]);
        // Marginal over both walks: 1/3 * [1/4, 3/4] + 2/3 * [1/5, 4/5].
        assert_distribution(&action_counts, &[13.0 / 60.0, 47.0 / 60.0]);
    }

    #[test]
    fn test_descent_stops_at_terminal() {
        let mut forest: Forest<()> = Forest::new(1, 3, 1, 1);
        write_priors(&mut forest, 0, 0, &[1.0]);
        write_priors(&mut forest, 0, 1, &[1.0]);
        forest.connect(0, 0, 0, 1);
        forest.terminal[[0, 1]] = true;
        let mut stats = Stats::new(1, 3, 1);
        stats.visits[[0, 1]] = 1;
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let descent = descend(&forest, &stats, 2.0, &mut rng).unwrap();

        // The walk ends on the terminal child; the insertion point stays
        // the pair that led there.
        assert_eq!(descent.parents[0], 0);
        assert_eq!(descent.actions[0], 0);
    }
}
