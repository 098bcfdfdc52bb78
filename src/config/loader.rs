// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawRow, RawStepTable, SampleSheet, Settings, StepTable};
use crate::errors::Result;

/// Read a tab-separated file with a header line into header-keyed rows.
///
/// Lines starting with `#` are ignored, fields are trimmed, and quotes carry
/// no special meaning. Rows missing trailing columns are tolerated; the
/// missing columns are simply absent from the row.
pub fn read_tsv(path: impl AsRef<Path>) -> Result<SampleSheet> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .quoting(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(SampleSheet { headers, rows })
}

/// Load the step table without row-level validation.
pub fn load_step_table_raw(path: impl AsRef<Path>) -> Result<RawStepTable> {
    let sheet = read_tsv(path)?;
    Ok(RawStepTable { rows: sheet.rows })
}

/// Load and validate the step table.
///
/// Graph-level checks (duplicate names, unknown `prior` references) happen
/// later, in [`crate::dag::TaskGraph::build`].
pub fn load_step_table(path: impl AsRef<Path>) -> Result<StepTable> {
    let raw = load_step_table_raw(path)?;
    StepTable::try_from(raw)
}

/// Load the sample list.
pub fn load_sample_sheet(path: impl AsRef<Path>) -> Result<SampleSheet> {
    read_tsv(path)
}

/// Load the optional TOML settings file.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings> {
    let contents = fs::read_to_string(path.as_ref())?;
    let settings: Settings = toml::from_str(&contents)?;
    Ok(settings)
}
