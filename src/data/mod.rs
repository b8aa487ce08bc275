//! Built-in and generated datasets.
//!
//! - `defaults`: the dataset shipped with the tool
//! - `synthetic`: model-generated experiments with seeded Gaussian noise

pub mod defaults;
pub mod synthetic;

pub use defaults::*;
pub use synthetic::*;
