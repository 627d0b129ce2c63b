use std::path::Path;

use bio::io::bed;

use crate::error::PileupError;

/// One row of a user-supplied `--regions` BED file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

pub fn parse_regions(path: &Path) -> Result<Vec<Region>, PileupError> {
    let mut reader =
        bed::Reader::from_file(path).map_err(|e| PileupError::IoFailure(e.to_string()))?;
    let mut regions = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| PileupError::IoFailure(e.to_string()))?;
        regions.push(Region {
            chrom: record.chrom().to_string(),
            start: record.start(),
            end: record.end(),
        });
    }
    Ok(regions)
}
