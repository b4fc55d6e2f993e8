//! Core abstractions for batched, lock-step game environments.
//!
//! This crate defines the [`World`] trait, a functional interface over a
//! batch of independent environments that are observed and stepped together,
//! and the batched value types ([`Observation`], [`Transition`]) exchanged
//! across that boundary. Search engines and evaluators build on these types
//! without knowing anything about a concrete game.

mod error;
mod types;
mod world;

pub use error::{Result, WorldError};
pub use types::{Observation, Transition};
pub use world::{empty_transition, World};
