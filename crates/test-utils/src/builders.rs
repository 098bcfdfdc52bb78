#![allow(dead_code)]

use std::path::Path;

use batchdag::config::{RawRow, RawStepTable, SampleSheet, StepTable};
use batchdag::entity::Population;

const STEP_COLUMNS: [&str; 7] = ["name", "type", "args", "mem", "thread", "prior", "submitArgs"];

/// Builder for step tables, either as a validated `StepTable` or as TSV text.
#[derive(Debug, Clone, Default)]
pub struct StepTableBuilder {
    rows: Vec<RawRow>,
}

impl StepTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a step with `mem = 1`, `thread = 1` and no submit args.
    pub fn step(self, name: &str, granularity: &str, args: &str, prior: &str) -> Self {
        self.step_with(StepRowBuilder::new(name, granularity).args(args).prior(prior))
    }

    pub fn step_with(mut self, row: StepRowBuilder) -> Self {
        self.rows.push(row.row);
        self
    }

    pub fn build_raw(self) -> RawStepTable {
        RawStepTable { rows: self.rows }
    }

    pub fn build(self) -> StepTable {
        StepTable::try_from(self.build_raw()).expect("Failed to build valid step table from builder")
    }

    pub fn to_tsv(&self) -> String {
        let mut out = STEP_COLUMNS.join("\t");
        out.push('\n');
        for row in self.rows.iter() {
            let fields: Vec<&str> = STEP_COLUMNS
                .iter()
                .map(|c| row.get(*c).map(String::as_str).unwrap_or(""))
                .collect();
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        out
    }
}

/// Builder for one step row.
#[derive(Debug, Clone)]
pub struct StepRowBuilder {
    row: RawRow,
}

impl StepRowBuilder {
    pub fn new(name: &str, granularity: &str) -> Self {
        let mut row = RawRow::new();
        row.insert("name".to_string(), name.to_string());
        row.insert("type".to_string(), granularity.to_string());
        row.insert("mem".to_string(), "1".to_string());
        row.insert("thread".to_string(), "1".to_string());
        Self { row }
    }

    pub fn args(self, args: &str) -> Self {
        self.set("args", args)
    }

    pub fn prior(self, prior: &str) -> Self {
        self.set("prior", prior)
    }

    pub fn mem(self, mem: &str) -> Self {
        self.set("mem", mem)
    }

    pub fn thread(self, thread: &str) -> Self {
        self.set("thread", thread)
    }

    pub fn submit_args(self, submit_args: &str) -> Self {
        self.set("submitArgs", submit_args)
    }

    fn set(mut self, key: &str, value: &str) -> Self {
        self.row.insert(key.to_string(), value.to_string());
        self
    }
}

/// Builder for sample lists.
#[derive(Debug, Clone)]
pub struct SampleSheetBuilder {
    headers: Vec<String>,
    rows: Vec<RawRow>,
}

impl SampleSheetBuilder {
    pub fn new() -> Self {
        Self {
            headers: ["sampleID", "barcode", "fq1", "fq2", "sampleNum", "primer"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows: Vec::new(),
        }
    }

    /// Add a sample; read files are derived from the barcode.
    pub fn sample(self, id: &str, barcode: &str) -> Self {
        self.sample_with(id, barcode, &[])
    }

    /// Add a sample with extra attribute columns.
    pub fn sample_with(mut self, id: &str, barcode: &str, extra: &[(&str, &str)]) -> Self {
        let index = self.rows.len() + 1;
        let mut row = RawRow::new();
        row.insert("sampleID".to_string(), id.to_string());
        row.insert("barcode".to_string(), barcode.to_string());
        row.insert("fq1".to_string(), format!("{barcode}_1.fq.gz"));
        row.insert("fq2".to_string(), format!("{barcode}_2.fq.gz"));
        row.insert("sampleNum".to_string(), index.to_string());
        row.insert("primer".to_string(), "ACGT".to_string());
        for (key, value) in extra {
            if !self.headers.iter().any(|h| h == key) {
                self.headers.push(key.to_string());
            }
            row.insert(key.to_string(), value.to_string());
        }
        self.rows.push(row);
        self
    }

    pub fn build(self) -> SampleSheet {
        SampleSheet {
            headers: self.headers,
            rows: self.rows,
        }
    }

    pub fn population(&self, outdir: impl AsRef<Path>) -> Population {
        Population::from_sheet(&self.clone().build(), outdir.as_ref())
            .expect("Failed to build population from builder")
    }

    pub fn to_tsv(&self) -> String {
        let mut out = self.headers.join("\t");
        out.push('\n');
        for row in self.rows.iter() {
            let fields: Vec<&str> = self
                .headers
                .iter()
                .map(|h| row.get(h).map(String::as_str).unwrap_or(""))
                .collect();
            out.push_str(&fields.join("\t"));
            out.push('\n');
        }
        out
    }
}

impl Default for SampleSheetBuilder {
    fn default() -> Self {
        Self::new()
    }
}
