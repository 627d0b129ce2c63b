use std::iter::Peekable;

use crate::error::PileupError;

/// How far past a chunk boundary a read may start and still be pulled into
/// both the chunk that precedes it and the one that follows, so a caller
/// run against either chunk sees full read context at the seam.
pub const OVERLAP_SLACK: i64 = 1_000;

/// The minimal view of an aligned read the chunker needs: its reference,
/// its span, and an estimate of how much memory it costs to hold onto.
pub trait AlignedRead: Clone {
    fn ref_id(&self) -> i32;
    fn start(&self) -> i64;
    fn end(&self) -> i64;
    fn approx_size(&self) -> usize;
}

/// A contiguous, non-overlapping slice of the genome (`start_position` /
/// `end_position`) together with every read needed to pileup it, including
/// flanking reads up to [`OVERLAP_SLACK`] outside that slice.
#[derive(Debug, Clone)]
pub struct Chunk<R> {
    pub ref_id: i32,
    pub start_position: i64,
    pub end_position: i64,
    pub reads: Vec<R>,
}

/// Turns an ordered read iterator into a lazy sequence of pileup chunks,
/// each bounded by `buffer_size` bytes of read data (best-effort: a single
/// oversized read can push a chunk past the budget, never under it).
pub struct Chunker<I, R> {
    reads: Peekable<I>,
    buffer_size: usize,
    carry: Vec<R>,
    done: bool,
}

impl<I, R> Chunker<I, R>
where
    I: Iterator<Item = Result<R, PileupError>>,
    R: AlignedRead,
{
    pub fn new(reads: I, buffer_size: usize) -> Self {
        Self {
            reads: reads.peekable(),
            buffer_size,
            carry: Vec::new(),
            done: false,
        }
    }
}

impl<I, R> Iterator for Chunker<I, R>
where
    I: Iterator<Item = Result<R, PileupError>>,
    R: AlignedRead,
{
    type Item = Result<Chunk<R>, PileupError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let left_flank = std::mem::take(&mut self.carry);

        let (ref_id, start_position) = match self.reads.peek() {
            Some(Ok(r)) => (r.ref_id(), r.start()),
            Some(Err(_)) => {
                self.done = true;
                return Some(Err(self.reads.next().unwrap().unwrap_err()));
            }
            None => {
                self.done = true;
                if left_flank.is_empty() {
                    return None;
                }
                let start_position = left_flank.iter().map(|r| r.start()).min().unwrap();
                let end_position = left_flank.iter().map(|r| r.end()).max().unwrap();
                return Some(Ok(Chunk {
                    ref_id: left_flank[0].ref_id(),
                    start_position,
                    end_position,
                    reads: left_flank,
                }));
            }
        };

        let mut core = Vec::new();
        let mut budget = 0usize;
        let mut end_position = start_position;
        loop {
            match self.reads.peek() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(_)) => {
                    return Some(Err(self.reads.next().unwrap().unwrap_err()));
                }
                Some(Ok(r)) if r.ref_id() != ref_id => break,
                Some(Ok(_)) => {
                    let r = self.reads.next().unwrap().unwrap();
                    end_position = end_position.max(r.end());
                    budget += r.approx_size();
                    core.push(r);
                    if budget >= self.buffer_size {
                        break;
                    }
                }
            }
        }

        let mut right_flank = Vec::new();
        loop {
            match self.reads.peek() {
                Some(Ok(r)) if r.ref_id() == ref_id && r.start() <= end_position + OVERLAP_SLACK => {
                    right_flank.push(self.reads.next().unwrap().unwrap());
                }
                _ => break,
            }
        }

        self.carry = core
            .iter()
            .chain(right_flank.iter())
            .filter(|r| r.start() >= end_position - OVERLAP_SLACK)
            .cloned()
            .collect();

        let mut reads = left_flank;
        reads.extend(core);
        reads.extend(right_flank);

        Some(Ok(Chunk {
            ref_id,
            start_position,
            end_position,
            reads,
        }))
    }
}
