//! Reversible first-order reaction model (A ⇌ B).
//!
//! The model is implemented as small, pure functions so that the objective
//! and estimator code can stay generic over experiments.

pub mod model;

pub use model::*;
