//! Mathematical utilities: overflow-safe rate terms and covariance estimation.

pub mod arrhenius;
pub mod covariance;

pub use arrhenius::*;
pub use covariance::*;
