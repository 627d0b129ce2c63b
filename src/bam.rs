use std::collections::VecDeque;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use rust_htslib::bam::{self, Format, IndexedReader, Read as HtsRead, Record};

use crate::chunk::AlignedRead;
use crate::error::PileupError;
use crate::regions::Region;

pub type BamHeader = bam::Header;

/// A single alignment record, wrapped so the chunker can reason about it
/// through [`AlignedRead`] without caring that it came from htslib.
#[derive(Clone)]
pub struct BamRead(pub Record);

impl AlignedRead for BamRead {
    fn ref_id(&self) -> i32 {
        self.0.tid()
    }

    fn start(&self) -> i64 {
        self.0.pos()
    }

    fn end(&self) -> i64 {
        self.0.cigar().end_pos()
    }

    fn approx_size(&self) -> usize {
        // query sequence plus qualities, plus a fixed allowance for the
        // name, cigar and tag fields.
        self.0.seq_len() * 2 + 96
    }
}

/// Either a plain sequential reader over the whole file, or an indexed
/// reader walking a caller-supplied list of regions one `fetch` at a time.
enum Inner {
    Plain(bam::Reader),
    Indexed(IndexedReader, VecDeque<Region>),
}

/// Opens a coordinate-sorted BAM file and exposes its records as a plain
/// iterator, the shape the [`crate::chunk::Chunker`] expects. When opened
/// with regions, only reads overlapping those regions are yielded, via the
/// file's `.bai`/`.csi` index rather than a full sequential scan.
pub struct BamSource {
    inner: Inner,
    header: BamHeader,
}

impl BamSource {
    pub fn open(path: &Path) -> Result<Self, PileupError> {
        let reader =
            bam::Reader::from_path(path).map_err(|e| PileupError::BamReadFailure(e.to_string()))?;
        let header = BamHeader::from_template(reader.header());
        Ok(Self {
            inner: Inner::Plain(reader),
            header,
        })
    }

    /// Restricts reading to `regions`, in the order given, using the BAM
    /// index. Falls back to [`Self::open`] when `regions` is empty.
    pub fn open_with_regions(path: &Path, regions: &[Region]) -> Result<Self, PileupError> {
        if regions.is_empty() {
            return Self::open(path);
        }

        let mut reader = IndexedReader::from_path(path)
            .map_err(|e| PileupError::BamReadFailure(e.to_string()))?;
        let header = BamHeader::from_template(reader.header());
        let mut queue: VecDeque<Region> = regions.iter().cloned().collect();
        fetch_next_region(&mut reader, &mut queue)?;

        Ok(Self {
            inner: Inner::Indexed(reader, queue),
            header,
        })
    }

    pub fn header(&self) -> &BamHeader {
        &self.header
    }

    /// Target sequence names in `tid` order, as BED expects them.
    pub fn ref_names(&self) -> Vec<String> {
        let view = match &self.inner {
            Inner::Plain(reader) => reader.header(),
            Inner::Indexed(reader, _) => reader.header(),
        };
        view.target_names()
            .into_iter()
            .map(|name| String::from_utf8_lossy(name).into_owned())
            .collect()
    }
}

/// Positions `reader` on the next region in `queue` whose chromosome name
/// resolves against the index, skipping names the header doesn't recognize.
/// Returns `false` once `queue` is exhausted without a usable region.
fn fetch_next_region(
    reader: &mut IndexedReader,
    queue: &mut VecDeque<Region>,
) -> Result<bool, PileupError> {
    while let Some(region) = queue.pop_front() {
        if let Ok(tid) = reader.header().tid(region.chrom.as_bytes()) {
            reader
                .fetch((tid, region.start as i64, region.end as i64))
                .map_err(|e| PileupError::BamReadFailure(e.to_string()))?;
            return Ok(true);
        }
    }
    Ok(false)
}

impl Iterator for BamSource {
    type Item = Result<BamRead, PileupError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            Inner::Plain(reader) => {
                let mut record = Record::new();
                match reader.read(&mut record) {
                    Some(Ok(())) => Some(Ok(BamRead(record))),
                    Some(Err(e)) => Some(Err(PileupError::BamReadFailure(e.to_string()))),
                    None => None,
                }
            }
            Inner::Indexed(reader, queue) => loop {
                let mut record = Record::new();
                match reader.read(&mut record) {
                    Some(Ok(())) => return Some(Ok(BamRead(record))),
                    Some(Err(e)) => return Some(Err(PileupError::BamReadFailure(e.to_string()))),
                    None => match fetch_next_region(reader, queue) {
                        Ok(true) => continue,
                        Ok(false) => return None,
                        Err(e) => return Some(Err(e)),
                    },
                }
            },
        }
    }
}

/// Serializes `reads` with `header` into an already-open FIFO write end.
///
/// htslib only opens writers against a path, so the already-open
/// descriptor (opened ahead of time to synchronize with the reader, see
/// [`crate::fifo`]) is handed over through `/dev/fd/<n>` rather than
/// reopened.
pub fn write_chunk_to_fifo(
    file: File,
    header: &BamHeader,
    reads: &[BamRead],
) -> Result<(), PileupError> {
    let fd_path = format!("/dev/fd/{}", file.as_raw_fd());
    let mut writer = bam::Writer::from_path(&fd_path, header, Format::Bam)
        .map_err(|e| PileupError::BamReadFailure(e.to_string()))?;
    for read in reads {
        writer
            .write(&read.0)
            .map_err(|e| PileupError::BamReadFailure(e.to_string()))?;
    }
    drop(writer);
    drop(file);
    Ok(())
}
