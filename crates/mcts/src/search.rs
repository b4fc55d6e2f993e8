//! Batched search facade: one arena per decision, simulations in lock-step.

use lockstep_core::World;
use ndarray::{Array2, Array3};
use rand::Rng;
use tracing::trace;

use crate::check::{check_evaluation, check_observation, check_transition};
use crate::config::SearchConfig;
use crate::descent::{descend, node_policies, sample_row};
use crate::error::{Result, SearchError};
use crate::evaluator::Evaluator;
use crate::tree::{Forest, Stats, NONE};

/// Root decision for a batch: the solved root policy and the accumulated
/// root value estimate.
#[derive(Clone, Debug)]
pub struct SearchResult {
    /// `[env, action]`, rows sum to one.
    pub policy: Array2<f32>,
    /// `[env, seat]`, visit-weighted average of root child values.
    pub values: Array2<f32>,
}

/// Decision reported by [`MctsAgent::decide`].
#[derive(Clone, Debug)]
pub struct Decision {
    /// Log of the root policy, `[env, action]`; `-inf` where the policy
    /// assigns zero mass.
    pub logits: Array2<f32>,
    /// Root value estimate, `[env, seat]`.
    pub values: Array2<f32>,
    /// Action sampled from the root policy per environment.
    pub actions: Vec<usize>,
}

/// One batched search over a fixed node budget.
///
/// The expected call sequence is `new`, `initialize`, `simulate` exactly
/// `n_nodes - 1` times, then `root`. Deviations fail loudly; nothing is
/// retried or silently ignored. The arena is sized for the budget up front
/// and discarded with the search.
pub struct Mcts<W: World, R: Rng> {
    world: W,
    config: SearchConfig,
    rng: R,
    forest: Forest<W::State>,
    stats: Stats,
    sim: usize,
}

impl<W: World, R: Rng> Mcts<W, R> {
    /// Allocate the arena and place each environment's root at node 0.
    ///
    /// # Errors
    /// `Config` for an invalid configuration or an empty batch, `Shape` if
    /// the world's root observation is malformed.
    pub fn new(world: W, config: SearchConfig, states: Vec<W::State>, rng: R) -> Result<Self> {
        config.validate()?;
        if states.is_empty() {
            return Err(SearchError::Config("batch of root states is empty".into()));
        }
        let n_envs = states.len();
        let n_actions = world.n_actions();
        let n_seats = world.n_seats();
        let mut forest = Forest::new(n_envs, config.n_nodes, n_actions, n_seats);
        let stats = Stats::new(n_envs, config.n_nodes, n_seats);

        let obs = world.observe(&states);
        check_observation(&obs, n_envs, n_actions, n_seats)?;
        for (env, state) in states.into_iter().enumerate() {
            forest.seats[[env, 0]] = obs.seats[env] as i64;
            forest.set_state(env, 0, state);
        }

        Ok(Self {
            world,
            config,
            rng,
            forest,
            stats,
            sim: 0,
        })
    }

    /// Evaluate the roots once to seed their priors. No backup happens
    /// here; a root has no value to propagate to itself.
    ///
    /// # Errors
    /// `AlreadyInitialized` on a second call, `Shape` for a malformed
    /// evaluation.
    pub fn initialize<E: Evaluator<W>>(&mut self, evaluator: &E) -> Result<()> {
        if self.sim != 0 {
            return Err(SearchError::AlreadyInitialized);
        }
        let n_envs = self.forest.n_envs();
        let n_actions = self.forest.n_actions();
        let states = self.root_states();
        let evaluation = evaluator.evaluate(&self.world, &states);
        check_evaluation(&evaluation, n_envs, n_actions, self.forest.n_seats())?;
        for env in 0..n_envs {
            for action in 0..n_actions {
                self.forest.priors[[env, 0, action]] = evaluation.logits[[env, action]];
            }
        }
        self.sim = 1;
        Ok(())
    }

    /// Run one descent + expansion + backup cycle across the whole batch.
    ///
    /// # Errors
    /// `RootNotInitialized` before [`Mcts::initialize`], `BudgetExhausted`
    /// once `n_nodes - 1` simulations have run, plus the fatal solver and
    /// shape conditions.
    pub fn simulate<E: Evaluator<W>>(&mut self, evaluator: &E) -> Result<()> {
        if self.sim == 0 {
            return Err(SearchError::RootNotInitialized);
        }
        if self.sim >= self.config.n_nodes {
            return Err(SearchError::BudgetExhausted {
                budget: self.config.n_nodes,
            });
        }
        let n_envs = self.forest.n_envs();
        let n_actions = self.forest.n_actions();
        let n_seats = self.forest.n_seats();

        let walk = descend(&self.forest, &self.stats, self.config.c_puct, &mut self.rng)?;

        // Graft point per environment: reuse the existing child when the
        // walk stopped on a terminal node (terminal nodes are never
        // re-expanded), otherwise the next fresh slot in simulation order.
        let mut leaves = vec![0usize; n_envs];
        let mut actions = vec![0usize; n_envs];
        for env in 0..n_envs {
            let parent = usize::try_from(walk.parents[env]).expect("BUG: descent left no parent");
            let action = usize::try_from(walk.actions[env]).expect("BUG: descent left no action");
            let existing = self.forest.children[[env, parent, action]];
            let leaf = if existing == NONE {
                self.sim
            } else {
                existing as usize
            };
            self.forest.connect(env, parent, action, leaf);
            leaves[env] = leaf;
            actions[env] = action;
        }

        let mut stepped: Vec<W::State> = (0..n_envs)
            .map(|env| {
                let parent = walk.parents[env] as usize;
                self.forest
                    .state(env, parent)
                    .cloned()
                    .expect("BUG: descent parent has no stored state")
            })
            .collect();
        let transition = self.world.step(&mut stepped, &actions);
        check_transition(&transition, n_envs, n_seats)?;
        let obs = self.world.observe(&stepped);
        check_observation(&obs, n_envs, n_actions, n_seats)?;
        let evaluation = evaluator.evaluate(&self.world, &stepped);
        check_evaluation(&evaluation, n_envs, n_actions, n_seats)?;

        // Revisited terminal leaves get identical values written again.
        for (env, state) in stepped.into_iter().enumerate() {
            let leaf = leaves[env];
            self.forest.terminal[[env, leaf]] = transition.terminal[env];
            for seat in 0..n_seats {
                self.forest.rewards[[env, leaf, seat]] = transition.rewards[[env, seat]];
            }
            self.forest.seats[[env, leaf]] = obs.seats[env] as i64;
            for action in 0..n_actions {
                self.forest.priors[[env, leaf, action]] = evaluation.logits[[env, action]];
            }
            self.forest.set_state(env, leaf, state);
        }

        self.backup(&leaves, evaluation.values);
        trace!(simulation = self.sim, "lock-step simulation complete");
        self.sim += 1;
        Ok(())
    }

    /// Report the root decision: the regularized policy at the root under
    /// the accumulated statistics, and the visit-weighted average of root
    /// child values as the value estimate.
    ///
    /// # Errors
    /// `RootNotInitialized` before [`Mcts::initialize`], plus the fatal
    /// solver conditions.
    pub fn root(&self) -> Result<SearchResult> {
        if self.sim == 0 {
            return Err(SearchError::RootNotInitialized);
        }
        let n_envs = self.forest.n_envs();
        let n_actions = self.forest.n_actions();
        let n_seats = self.forest.n_seats();

        let roots: Vec<(usize, i64)> = (0..n_envs).map(|env| (env, 0)).collect();
        let policy = node_policies(&self.forest, &self.stats, &roots, self.config.c_puct)?;

        let mut values = Array2::zeros((n_envs, n_seats));
        for env in 0..n_envs {
            let mut total = 0u32;
            for action in 0..n_actions {
                let child = self.forest.children[[env, 0, action]];
                if child == NONE {
                    continue;
                }
                let child = child as usize;
                total += self.stats.visits[[env, child]];
                for seat in 0..n_seats {
                    values[[env, seat]] += self.stats.values[[env, child, seat]];
                }
            }
            let scale = 1.0 / total.max(1) as f32;
            for seat in 0..n_seats {
                values[[env, seat]] *= scale;
            }
        }

        Ok(SearchResult { policy, values })
    }

    /// Simulations completed so far, counting root initialization as one.
    pub fn simulations(&self) -> usize {
        self.sim
    }

    /// Per-node visit counts, `[env, node]`.
    pub fn visit_counts(&self) -> &Array2<u32> {
        &self.stats.visits
    }

    /// Per-node value sums, `[env, node, seat]`.
    pub fn value_sums(&self) -> &Array3<f32> {
        &self.stats.values
    }

    fn root_states(&self) -> Vec<W::State> {
        (0..self.forest.n_envs())
            .map(|env| {
                self.forest
                    .state(env, 0)
                    .cloned()
                    .expect("BUG: root state missing")
            })
            .collect()
    }

    /// Propagate evaluated leaf values to the roots along parent links.
    ///
    /// A terminal node resets the carried value before absorbing its own
    /// reward, so repeated visits never compound terminal rewards. The
    /// walks run lock-step; environments whose walk already reached the
    /// root sit out on the `NONE` sentinel.
    fn backup(&mut self, leaves: &[usize], values: Array2<f32>) {
        let n_seats = self.forest.n_seats();
        let mut carried = values;
        let mut current: Vec<i64> = leaves.iter().map(|&leaf| leaf as i64).collect();
        while current.iter().any(|&node| node != NONE) {
            for (env, slot) in current.iter_mut().enumerate() {
                let node = *slot;
                if node == NONE {
                    continue;
                }
                let node = node as usize;
                if self.forest.terminal[[env, node]] {
                    for seat in 0..n_seats {
                        carried[[env, seat]] = 0.0;
                    }
                }
                for seat in 0..n_seats {
                    carried[[env, seat]] += self.forest.rewards[[env, node, seat]];
                    self.stats.values[[env, node, seat]] += carried[[env, seat]];
                }
                self.stats.visits[[env, node]] += 1;
                *slot = self.forest.parents[[env, node]];
            }
        }
    }
}

/// Bundles an evaluator and a configuration into a single
/// decision-producing call.
pub struct MctsAgent<E> {
    evaluator: E,
    config: SearchConfig,
}

impl<E> MctsAgent<E> {
    pub fn new(evaluator: E, config: SearchConfig) -> Self {
        Self { evaluator, config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run one full search over the batch and sample an action from each
    /// root policy.
    ///
    /// # Errors
    /// Everything [`Mcts`] can raise.
    pub fn decide<W, R>(&self, world: &W, states: Vec<W::State>, rng: &mut R) -> Result<Decision>
    where
        W: World,
        E: Evaluator<W>,
        R: Rng,
    {
        let mut search = Mcts::new(world.clone(), self.config.clone(), states, &mut *rng)?;
        search.initialize(&self.evaluator)?;
        for _ in 1..self.config.n_nodes {
            search.simulate(&self.evaluator)?;
        }
        let result = search.root()?;

        let actions = (0..result.policy.nrows())
            .map(|env| sample_row(result.policy.row(env), rng))
            .collect();
        Ok(Decision {
            logits: result.policy.mapv(f32::ln),
            values: result.values,
            actions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;
    use crate::worlds::InstantWin;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fresh_search(n_nodes: usize) -> Mcts<InstantWin, ChaCha8Rng> {
        let world = InstantWin;
        let states = world.reset(2);
        Mcts::new(
            world,
            SearchConfig::with_nodes(n_nodes),
            states,
            ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap()
    }

    #[test]
    fn test_simulate_before_initialize_fails() {
        let mut search = fresh_search(4);
        let err = search.simulate(&UniformEvaluator).unwrap_err();
        assert!(matches!(err, SearchError::RootNotInitialized));
    }

    #[test]
    fn test_root_before_initialize_fails() {
        let search = fresh_search(4);
        assert!(matches!(
            search.root().unwrap_err(),
            SearchError::RootNotInitialized
        ));
    }

    #[test]
    fn test_double_initialize_fails() {
        let mut search = fresh_search(4);
        search.initialize(&UniformEvaluator).unwrap();
        let err = search.initialize(&UniformEvaluator).unwrap_err();
        assert!(matches!(err, SearchError::AlreadyInitialized));
    }

    #[test]
    fn test_budget_exhaustion_is_fatal() {
        let mut search = fresh_search(3);
        search.initialize(&UniformEvaluator).unwrap();
        search.simulate(&UniformEvaluator).unwrap();
        search.simulate(&UniformEvaluator).unwrap();
        let err = search.simulate(&UniformEvaluator).unwrap_err();
        assert!(matches!(err, SearchError::BudgetExhausted { budget: 3 }));
    }

    #[test]
    fn test_empty_batch_rejected() {
        let err = Mcts::new(
            InstantWin,
            SearchConfig::with_nodes(4),
            Vec::new(),
            ChaCha8Rng::seed_from_u64(0),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SearchError::Config(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let world = InstantWin;
        let states = world.reset(1);
        let err = Mcts::new(
            world,
            SearchConfig::with_nodes(4).with_c_puct(0.0),
            states,
            ChaCha8Rng::seed_from_u64(0),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SearchError::Config(_)));
    }
}
