//! Dataset ingest (JSON or long-format CSV) and dataset JSON output.
//!
//! CSV layout: one observation per row, grouped by an `experiment` label.
//!
//! ```text
//! experiment,temperature_k,ca0,time_s,ca
//! run-a,298.15,10.0,10,8.84
//! run-a,298.15,10.0,20,8.09
//! run-b,308.15,10.0,10,8.32
//! ```
//!
//! Column order is free; header names are case-insensitive. Unlike a lenient
//! spreadsheet import, any bad row fails the whole load: a silently dropped
//! point would change the fit.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{DatasetFile, Experiment};
use crate::error::AppError;
use crate::fit::validate_experiments;
use crate::io::TOOL_NAME;

const REQUIRED_COLUMNS: [&str; 5] = ["experiment", "temperature_k", "ca0", "time_s", "ca"];

/// Load experiments from `.json` or `.csv`, chosen by extension.
pub fn load_dataset(path: &Path) -> Result<Vec<Experiment>, AppError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("json") => read_dataset_json(path),
        Some("csv") => read_dataset_csv(path),
        _ => Err(AppError::invalid_input(format!(
            "Unsupported dataset '{}': expected a .json or .csv file.",
            path.display()
        ))),
    }
}

/// Read a dataset JSON file (`DatasetFile` schema) and validate every experiment.
pub fn read_dataset_json(path: &Path) -> Result<Vec<Experiment>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open dataset JSON '{}': {e}", path.display())))?;
    let dataset: DatasetFile = serde_json::from_reader(file)
        .map_err(|e| AppError::io(format!("Invalid dataset JSON '{}': {e}", path.display())))?;
    validate_experiments(&dataset.experiments)?;
    Ok(dataset.experiments)
}

/// Write experiments as a dataset JSON file.
pub fn write_dataset_json(path: &Path, experiments: &[Experiment]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create dataset JSON '{}': {e}", path.display())))?;
    let dataset = DatasetFile {
        tool: TOOL_NAME.to_string(),
        experiments: experiments.to_vec(),
    };
    serde_json::to_writer_pretty(file, &dataset)
        .map_err(|e| AppError::io(format!("Failed to write dataset JSON: {e}")))?;
    Ok(())
}

/// Read a long-format dataset CSV file.
pub fn read_dataset_csv(path: &Path) -> Result<Vec<Experiment>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open dataset CSV '{}': {e}", path.display())))?;
    parse_dataset_csv(file)
}

#[derive(Debug)]
struct Group {
    label: String,
    first_line: usize,
    temperature: f64,
    ca0: f64,
    times: Vec<f64>,
    ca: Vec<f64>,
}

/// Parse long-format CSV from any reader.
pub fn parse_dataset_csv<R: Read>(reader: R) -> Result<Vec<Experiment>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::invalid_data(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for col in REQUIRED_COLUMNS {
        if !header_map.contains_key(col) {
            return Err(AppError::invalid_data(format!("Missing required column: `{col}`")));
        }
    }

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        // Counting records undercounts after blank lines or multi-line quoted
        // fields, so prefer the reader's own position.
        let fallback = idx + 2;
        let record = result.map_err(|e| {
            let line = e.position().map_or(fallback, |p| p.line() as usize);
            AppError::invalid_data(format!("CSV line {line}: parse error: {e}"))
        })?;
        let line = record.position().map_or(fallback, |p| p.line() as usize);

        let row = parse_row(&record, &header_map)
            .map_err(|msg| AppError::invalid_data(format!("CSV line {line}: {msg}")))?;
        let Row {
            label,
            temperature,
            ca0,
            time,
            ca,
        } = row;

        match index.get(&label) {
            Some(&g) => {
                let group = &mut groups[g];
                if temperature != group.temperature || ca0 != group.ca0 {
                    return Err(AppError::invalid_data(format!(
                        "CSV line {line}: experiment '{label}' has temperature_k={temperature}, ca0={ca0}, but line {} has temperature_k={}, ca0={}.",
                        group.first_line, group.temperature, group.ca0
                    )));
                }
                group.times.push(time);
                group.ca.push(ca);
            }
            None => {
                index.insert(label.clone(), groups.len());
                groups.push(Group {
                    label,
                    first_line: line,
                    temperature,
                    ca0,
                    times: vec![time],
                    ca: vec![ca],
                });
            }
        }
    }

    if groups.is_empty() {
        return Err(AppError::invalid_data("Dataset CSV contains no rows."));
    }

    groups
        .into_iter()
        .map(|g| {
            Experiment::new(g.temperature, g.ca0, g.times, g.ca).map_err(|e| {
                AppError::invalid_data(format!(
                    "Experiment '{}' (from line {}): {}",
                    g.label,
                    g.first_line,
                    e.message()
                ))
            })
        })
        .collect()
}

struct Row {
    label: String,
    temperature: f64,
    ca0: f64,
    time: f64,
    ca: f64,
}

fn parse_row(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Row, String> {
    Ok(Row {
        label: get_required(record, header_map, "experiment")?.to_string(),
        temperature: parse_f64(record, header_map, "temperature_k")?,
        ca0: parse_f64(record, header_map, "ca0")?,
        time: parse_f64(record, header_map, "time_s")?,
        ca: parse_f64(record, header_map, "ca")?,
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    key: &str,
) -> Result<&'a str, String> {
    header_map
        .get(key)
        .and_then(|&idx| record.get(idx))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing `{key}` value."))
}

fn parse_f64(record: &StringRecord, header_map: &HashMap<String, usize>, key: &str) -> Result<f64, String> {
    let raw = get_required(record, header_map, key)?;
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("Invalid `{key}` value '{raw}'."))?;
    if !v.is_finite() {
        return Err(format!("Non-finite `{key}` value '{raw}'."));
    }
    Ok(v)
}
