//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - experiment records (`Experiment`) and the fitted parameter vector (`ParameterSet`)
//! - fit outputs (`FitResult`, `FitStatus`)
//! - run configuration and on-disk file schemas

pub mod types;

pub use types::*;
