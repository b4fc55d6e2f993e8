//! Search configuration.

use crate::error::{Result, SearchError};

/// Configuration for a batched search.
///
/// `n_nodes` is both the simulation budget and the tree capacity: one root
/// plus `n_nodes - 1` simulations, each allocating at most one node.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Total node budget per environment, including the root. Must be > 1.
    pub n_nodes: usize,

    /// Exploration coefficient for the regularized selection policy.
    /// Must be strictly positive: zero collapses the bisection bracket
    /// to a single point and the solver cannot make progress.
    pub c_puct: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_nodes: 64,
            c_puct: 2.5,
        }
    }
}

impl SearchConfig {
    /// Create a configuration with the given node budget and default
    /// exploration coefficient.
    pub fn with_nodes(n_nodes: usize) -> Self {
        Self {
            n_nodes,
            ..Self::default()
        }
    }

    /// Set the exploration coefficient.
    pub fn with_c_puct(mut self, c_puct: f32) -> Self {
        self.c_puct = c_puct;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `SearchError::Config` if `n_nodes < 2` or `c_puct` is not
    /// strictly positive (this also rejects `NaN`).
    pub fn validate(&self) -> Result<()> {
        if self.n_nodes < 2 {
            return Err(SearchError::Config(format!(
                "n_nodes must be at least 2, got {}",
                self.n_nodes
            )));
        }
        if !(self.c_puct > 0.0) {
            return Err(SearchError::Config(format!(
                "c_puct must be strictly positive, got {}",
                self.c_puct
            )));
        }
        Ok(())
    }
}
