//! Export per-point residuals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::error::AppError;
use crate::report::ResidualRow;

/// Write per-point residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, rows: &[ResidualRow]) -> Result<(), AppError> {
    let mut file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_residuals(&mut file, rows)
}

/// Write the residual CSV to any writer.
pub fn write_residuals<W: Write>(out: &mut W, rows: &[ResidualRow]) -> Result<(), AppError> {
    writeln!(out, "experiment,temperature_k,time_s,ca_obs,ca_fit,residual,cb_fit")
        .map_err(|e| AppError::io(format!("Failed to write export CSV header: {e}")))?;

    for r in rows {
        writeln!(
            out,
            "{},{},{},{:.6},{:.6},{:.6},{:.6}",
            r.experiment, r.temperature, r.time, r.ca_obs, r.ca_fit, r.residual, r.cb_fit,
        )
        .map_err(|e| AppError::io(format!("Failed to write export CSV row: {e}")))?;
    }
    Ok(())
}
