// src/entity/mod.rs

//! Samples, barcodes and the population that owns them.
//!
//! The population is built once from the sample list and never mutated
//! afterwards, so every dispatch unit can read it through an `Arc` without
//! locking.

mod parse;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::config::model::RawRow;

pub use parse::barcode_list_path;

/// One row of the sample list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub id: String,
    /// Numeric index from the `sampleNum` column.
    pub index: u32,
    pub barcode: String,
    pub primer: String,
    pub fq1: String,
    pub fq2: String,
    /// The raw input row, used only to render template arguments.
    pub attributes: RawRow,
}

impl Sample {
    /// Value of a template argument for this sample.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A sequencing barcode shared by one or more samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Barcode {
    pub id: String,
    pub fq1: String,
    pub fq2: String,
    /// Generated per-barcode sample list consumed by the demultiplexer.
    pub list: PathBuf,
    /// Member sample ids, sorted.
    pub samples: Vec<String>,
}

/// Aggregate root: every sample and barcode of a run.
#[derive(Debug, Clone, Default)]
pub struct Population {
    samples: BTreeMap<String, Sample>,
    barcodes: BTreeMap<String, Barcode>,
}

impl Population {
    pub fn sample(&self, id: &str) -> Option<&Sample> {
        self.samples.get(id)
    }

    pub fn barcode(&self, id: &str) -> Option<&Barcode> {
        self.barcodes.get(id)
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn barcodes(&self) -> impl Iterator<Item = &Barcode> {
        self.barcodes.values()
    }

    /// Sample ids in sorted order.
    pub fn sample_ids(&self) -> Vec<String> {
        self.samples.keys().cloned().collect()
    }

    /// Barcode ids in sorted order.
    pub fn barcode_ids(&self) -> Vec<String> {
        self.barcodes.keys().cloned().collect()
    }

    /// Member sample ids of a barcode; empty for an unknown barcode.
    pub fn members_of(&self, barcode: &str) -> &[String] {
        self.barcodes
            .get(barcode)
            .map(|b| b.samples.as_slice())
            .unwrap_or(&[])
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn barcode_count(&self) -> usize {
        self.barcodes.len()
    }
}
