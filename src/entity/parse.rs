// src/entity/parse.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::model::{RawRow, SampleSheet};
use crate::entity::{Barcode, Population, Sample};
use crate::errors::{BatchdagError, Result};

/// Where the sample list of one barcode is written.
pub fn barcode_list_path(outdir: &Path, barcode: &str) -> PathBuf {
    outdir.join("barcode").join(format!("barcode.{barcode}.list"))
}

impl Population {
    /// Build the population from a parsed sample list.
    ///
    /// A barcode takes its read files from the first sample that names it;
    /// later samples only join its member list. A repeated `sampleID` is a
    /// fatal error.
    pub fn from_sheet(sheet: &SampleSheet, outdir: &Path) -> Result<Self> {
        let mut samples: BTreeMap<String, Sample> = BTreeMap::new();
        let mut barcodes: BTreeMap<String, Barcode> = BTreeMap::new();

        for row in &sheet.rows {
            let sample = sample_from_row(row)?;

            if samples.contains_key(&sample.id) {
                return Err(BatchdagError::DuplicateSample(sample.id));
            }

            let barcode = barcodes
                .entry(sample.barcode.clone())
                .or_insert_with(|| Barcode {
                    id: sample.barcode.clone(),
                    fq1: sample.fq1.clone(),
                    fq2: sample.fq2.clone(),
                    list: barcode_list_path(outdir, &sample.barcode),
                    samples: Vec::new(),
                });

            if barcode.fq1 != sample.fq1 || barcode.fq2 != sample.fq2 {
                warn!(
                    sample = %sample.id,
                    barcode = %barcode.id,
                    "sample read files differ from its barcode's; using the barcode's"
                );
            }

            barcode.samples.push(sample.id.clone());
            samples.insert(sample.id.clone(), sample);
        }

        for barcode in barcodes.values_mut() {
            barcode.samples.sort();
        }

        debug!(
            samples = samples.len(),
            barcodes = barcodes.len(),
            "population parsed"
        );

        Ok(Self { samples, barcodes })
    }
}

fn sample_from_row(row: &RawRow) -> Result<Sample> {
    let field = |key: &str| row.get(key).map(|s| s.trim().to_string()).unwrap_or_default();

    let id = field("sampleID");
    if id.is_empty() {
        return Err(BatchdagError::ConfigError(
            "sample list row with empty `sampleID`".to_string(),
        ));
    }

    let barcode = field("barcode");
    if barcode.is_empty() {
        return Err(BatchdagError::ConfigError(format!(
            "sample '{id}' has an empty `barcode` column"
        )));
    }

    let raw_index = field("sampleNum");
    let index = if raw_index.is_empty() {
        0
    } else {
        raw_index.parse::<u32>().map_err(|_| {
            BatchdagError::ConfigError(format!(
                "sample '{id}' has a non-numeric sampleNum '{raw_index}'"
            ))
        })?
    };

    Ok(Sample {
        index,
        primer: field("primer"),
        fq1: field("fq1"),
        fq2: field("fq2"),
        attributes: row.clone(),
        id,
        barcode,
    })
}
