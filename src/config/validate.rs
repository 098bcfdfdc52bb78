// src/config/validate.rs

use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::{RawRow, RawStepTable, StepRow, StepTable};
use crate::dag::task::{END_TASK, START_TASK};
use crate::errors::{BatchdagError, Result};
use crate::types::Granularity;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

impl TryFrom<RawStepTable> for StepTable {
    type Error = BatchdagError;

    fn try_from(raw: RawStepTable) -> std::result::Result<Self, Self::Error> {
        ensure_has_steps(&raw)?;
        let steps = raw
            .rows
            .into_iter()
            .map(parse_step_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(StepTable::new_unchecked(steps))
    }
}

fn ensure_has_steps(raw: &RawStepTable) -> Result<()> {
    if raw.rows.is_empty() {
        return Err(BatchdagError::ConfigError(
            "step table must contain at least one step row".to_string(),
        ));
    }
    Ok(())
}

fn parse_step_row(raw: RawRow) -> Result<StepRow> {
    let name = column(&raw, "name").to_string();
    if name.is_empty() {
        return Err(BatchdagError::ConfigError(
            "step row with empty `name` column".to_string(),
        ));
    }
    if name == START_TASK || name == END_TASK {
        return Err(BatchdagError::ConfigError(format!(
            "step name '{name}' is reserved for the synthetic graph source/sink"
        )));
    }

    let granularity: Granularity = column(&raw, "type")
        .parse()
        .map_err(|e: String| BatchdagError::ConfigError(format!("step '{name}': {e}")))?;

    Ok(StepRow {
        granularity,
        args: split_list(column(&raw, "args")),
        mem: column(&raw, "mem").to_string(),
        thread: column(&raw, "thread").to_string(),
        prior: split_list(column(&raw, "prior")),
        submit_args: split_whitespace(column(&raw, "submitArgs")),
        name,
        raw,
    })
}

fn column<'a>(raw: &'a RawRow, key: &str) -> &'a str {
    raw.get(key).map(|s| s.trim()).unwrap_or("")
}

/// Split a comma-separated column, dropping empty entries.
pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn split_whitespace(value: &str) -> Vec<String> {
    WHITESPACE
        .split(value.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
