//! Parameter estimation.
//!
//! Responsibilities:
//!
//! - build the least-squares objective over all experiments
//! - run Levenberg–Marquardt from one or many starting points
//! - estimate parameter uncertainty at the optimum

pub mod estimator;
pub mod multistart;
pub mod objective;
pub mod starts;

pub use estimator::*;
pub use multistart::*;
pub use objective::*;
pub use starts::*;
