//! Error types for the batched search engine.
//!
//! Everything here is fatal to the whole batched search: the engine never
//! retries, and no partial results are recovered. The only tolerated
//! numerical degradation (the bisection endpoint fallback) is handled inside
//! the solver and never surfaces as an error.

use thiserror::Error;

/// Errors produced by the search engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    /// The search configuration failed validation.
    #[error("invalid search configuration: {0}")]
    Config(String),

    /// A simulation or root query was issued before `initialize`.
    #[error("root node has not been initialized")]
    RootNotInitialized,

    /// `initialize` was called on an already-initialized search.
    #[error("search already initialized")]
    AlreadyInitialized,

    /// More simulations were requested than the configured budget allows.
    #[error("simulation budget of {budget} exhausted")]
    BudgetExhausted { budget: usize },

    /// A `NaN` surfaced in the bisection residual. This signals corrupted
    /// evaluator output or a broken invariant upstream, never a recoverable
    /// condition.
    #[error("hit a NaN in the bisection residual")]
    NanResidual,

    /// A bisection bracket endpoint crossed the root mid-search on a row
    /// that was healthy at entry.
    #[error("{side} bisection bracket passed the root (residual {residual})")]
    BracketInvariant { side: &'static str, residual: f32 },

    /// A batched tensor crossing a component boundary had the wrong shape.
    #[error("shape mismatch for {name}: expected {expected}, got {got}")]
    Shape {
        name: &'static str,
        expected: String,
        got: String,
    },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SearchError>;
