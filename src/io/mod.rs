//! Input/output helpers.
//!
//! - dataset ingest (JSON / CSV) and dataset JSON output (`dataset`)
//! - result JSON read/write (`result`)
//! - residual CSV export (`export`)

pub mod dataset;
pub mod export;
pub mod result;

pub use dataset::*;
pub use export::*;
pub use result::*;

/// Tool name recorded in every file this crate writes.
pub const TOOL_NAME: &str = "kfit";
