//! Batched lock-step Monte Carlo Tree Search.
//!
//! Runs many independent searches together, vectorized across a batch
//! dimension: per-environment arena trees in dense arrays, a regularized
//! selection policy solved by batched bisection, and masked descent/backup
//! loops that let environments reach different depths without per-element
//! branching.
//!
//! The expected flow is [`MctsAgent::decide`]: initialize the roots, run
//! `n_nodes - 1` lock-step simulations, then report a policy, a value
//! estimate and a sampled action per environment. [`Mcts`] exposes the same
//! machinery one simulation at a time.

mod check;
mod descent;
mod tree;

pub mod config;
pub mod error;
pub mod evaluator;
pub mod policy;
pub mod search;
pub mod worlds;

pub use config::SearchConfig;
pub use error::{Result, SearchError};
pub use evaluator::{
    Evaluation, Evaluator, KnownValue, ProxyEvaluator, RolloutEvaluator, UniformEvaluator,
};
pub use search::{Decision, Mcts, MctsAgent, SearchResult};
