//! Batched arena storage for the search trees.
//!
//! One fixed-capacity tree per environment, all stored in dense arrays with
//! the environment as the leading axis. Nodes are integer indices into the
//! arena; `NONE` marks absent links. This maps every tree operation onto
//! flat array reads and writes, which is what lets the descent and backup
//! loops run lock-step across the whole batch.

use ndarray::{s, Array2, Array3};

/// Sentinel for "no node" / "no action" in the index arrays.
pub(crate) const NONE: i64 = -1;

/// Arena of per-environment trees.
///
/// The root of every environment lives at node index 0. New nodes are
/// allocated in simulation order, so a child's index is always strictly
/// greater than its parent's.
pub(crate) struct Forest<S> {
    n_envs: usize,
    capacity: usize,
    n_actions: usize,
    n_seats: usize,

    /// Child index per action, `[env, node, action]`. `NONE` until expanded.
    pub(crate) children: Array3<i64>,
    /// Parent index, `[env, node]`. `NONE` for the root.
    pub(crate) parents: Array2<i64>,
    /// Action that led from the parent to this node, `[env, node]`.
    pub(crate) relation: Array2<i64>,
    /// Seat to move at this node, `[env, node]`.
    pub(crate) seats: Array2<i64>,
    /// Whether the step that created this node ended the episode, `[env, node]`.
    pub(crate) terminal: Array2<bool>,
    /// Rewards of the step that created this node, `[env, node, seat]`.
    pub(crate) rewards: Array3<f32>,
    /// Evaluator log-priors, `[env, node, action]`. `NaN` until the node has
    /// been evaluated; descent treats NaN-presence as "not yet expanded".
    pub(crate) priors: Array3<f32>,

    /// World snapshot per node, owned by the tree. `None` until expansion.
    states: Vec<Option<S>>,
}

impl<S> Forest<S> {
    pub(crate) fn new(n_envs: usize, capacity: usize, n_actions: usize, n_seats: usize) -> Self {
        Self {
            n_envs,
            capacity,
            n_actions,
            n_seats,
            children: Array3::from_elem((n_envs, capacity, n_actions), NONE),
            parents: Array2::from_elem((n_envs, capacity), NONE),
            relation: Array2::from_elem((n_envs, capacity), NONE),
            seats: Array2::zeros((n_envs, capacity)),
            terminal: Array2::from_elem((n_envs, capacity), false),
            rewards: Array3::zeros((n_envs, capacity, n_seats)),
            priors: Array3::from_elem((n_envs, capacity, n_actions), f32::NAN),
            states: (0..n_envs * capacity).map(|_| None).collect(),
        }
    }

    pub(crate) fn n_envs(&self) -> usize {
        self.n_envs
    }

    pub(crate) fn n_actions(&self) -> usize {
        self.n_actions
    }

    pub(crate) fn n_seats(&self) -> usize {
        self.n_seats
    }

    /// Whether a node's prior has been written (no NaN left in its row).
    pub(crate) fn evaluated(&self, env: usize, node: usize) -> bool {
        !self
            .priors
            .slice(s![env, node, ..])
            .iter()
            .any(|v| v.is_nan())
    }

    /// Wire `child` as the node reached from `parent` by `action`.
    ///
    /// Re-wiring an existing child writes the values it already has.
    pub(crate) fn connect(&mut self, env: usize, parent: usize, action: usize, child: usize) {
        self.children[[env, parent, action]] = child as i64;
        self.parents[[env, child]] = parent as i64;
        self.relation[[env, child]] = action as i64;
    }

    pub(crate) fn state(&self, env: usize, node: usize) -> Option<&S> {
        self.states[env * self.capacity + node].as_ref()
    }

    pub(crate) fn set_state(&mut self, env: usize, node: usize, state: S) {
        self.states[env * self.capacity + node] = Some(state);
    }
}

/// Visit counts and per-seat value sums, updated only by backup.
pub(crate) struct Stats {
    /// `[env, node]`.
    pub(crate) visits: Array2<u32>,
    /// `[env, node, seat]`.
    pub(crate) values: Array3<f32>,
}

impl Stats {
    pub(crate) fn new(n_envs: usize, capacity: usize, n_seats: usize) -> Self {
        Self {
            visits: Array2::zeros((n_envs, capacity)),
            values: Array3::zeros((n_envs, capacity, n_seats)),
        }
    }

    /// Gather per-action child statistics for a list of `(env, node)` pairs.
    ///
    /// Returns `(visits, q)`, both `[pair, action]`: the child's visit count
    /// and its mean value from the perspective of the seat to move at the
    /// parent node. Actions without a visited child get zero in both.
    pub(crate) fn action_stats<S>(
        &self,
        forest: &Forest<S>,
        nodes: &[(usize, i64)],
    ) -> (Array2<f32>, Array2<f32>) {
        let k = nodes.len();
        let n_actions = forest.n_actions();
        let mut visits = Array2::<f32>::zeros((k, n_actions));
        let mut q = Array2::<f32>::zeros((k, n_actions));
        for (i, &(env, node)) in nodes.iter().enumerate() {
            let node = node as usize;
            let seat = forest.seats[[env, node]] as usize;
            for action in 0..n_actions {
                let child = forest.children[[env, node, action]];
                if child == NONE {
                    continue;
                }
                let child = child as usize;
                let n = self.visits[[env, child]];
                if n == 0 {
                    continue;
                }
                visits[[i, action]] = n as f32;
                q[[i, action]] = self.values[[env, child, seat]] / n as f32;
            }
        }
        (visits, q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_forest_is_unlinked() {
        let forest: Forest<()> = Forest::new(2, 4, 3, 2);
        assert_eq!(forest.children[[0, 0, 0]], NONE);
        assert_eq!(forest.parents[[1, 3]], NONE);
        assert!(!forest.evaluated(0, 0));
        assert!(forest.state(0, 0).is_none());
    }

    #[test]
    fn test_connect_wires_both_directions() {
        let mut forest: Forest<()> = Forest::new(1, 4, 2, 1);
        forest.connect(0, 0, 1, 2);
        assert_eq!(forest.children[[0, 0, 1]], 2);
        assert_eq!(forest.parents[[0, 2]], 0);
        assert_eq!(forest.relation[[0, 2]], 1);
        // Untouched slots stay absent.
        assert_eq!(forest.children[[0, 0, 0]], NONE);
    }

    #[test]
    fn test_evaluated_flips_once_priors_written() {
        let mut forest: Forest<()> = Forest::new(1, 2, 2, 1);
        assert!(!forest.evaluated(0, 1));
        forest.priors[[0, 1, 0]] = (0.5f32).ln();
        // Half-written rows still count as unexpanded.
        assert!(!forest.evaluated(0, 1));
        forest.priors[[0, 1, 1]] = (0.5f32).ln();
        assert!(forest.evaluated(0, 1));
    }

    #[test]
    fn test_action_stats_gathers_parent_seat() {
        let mut forest: Forest<()> = Forest::new(1, 3, 2, 2);
        forest.seats[[0, 0]] = 1;
        forest.connect(0, 0, 0, 1);
        forest.connect(0, 0, 1, 2);

        let mut stats = Stats::new(1, 3, 2);
        stats.visits[[0, 1]] = 2;
        stats.values[[0, 1, 0]] = 4.0;
        stats.values[[0, 1, 1]] = -4.0;
        stats.visits[[0, 2]] = 1;
        stats.values[[0, 2, 1]] = 0.5;

        let (visits, q) = stats.action_stats(&forest, &[(0, 0)]);
        assert_eq!(visits[[0, 0]], 2.0);
        assert_eq!(visits[[0, 1]], 1.0);
        // Seat 1 moves at the root, so q comes from the seat-1 column.
        assert_eq!(q[[0, 0]], -2.0);
        assert_eq!(q[[0, 1]], 0.5);
    }

    #[test]
    fn test_action_stats_skips_unvisited() {
        let forest: Forest<()> = Forest::new(1, 2, 3, 1);
        let stats = Stats::new(1, 2, 1);
        let (visits, q) = stats.action_stats(&forest, &[(0, 0)]);
        assert!(visits.iter().all(|&v| v == 0.0));
        assert!(q.iter().all(|&v| v == 0.0));
    }
}
