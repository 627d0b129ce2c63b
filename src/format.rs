use std::io::Write;

use crate::codec;
use crate::error::PileupError;

/// The effective output format of the last stage in the pipe (mpileup
/// alone, or mpileup piped through a caller).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Pileup,
    Bcf,
    UncompressedBcf,
    Vcf,
    /// Bgzipped VCF. Never reaches a [`Recipe`] lookup: rejected by
    /// argument normalization before a `RuntimeContext` is built.
    GzippedVcf,
}

impl OutputFormat {
    /// The flag `strip-bcf-header` needs to recognize this format's header.
    pub fn header_strip_flag(self) -> &'static str {
        match self {
            OutputFormat::Pileup | OutputFormat::Vcf => "--vcf",
            OutputFormat::Bcf => "--bcf",
            OutputFormat::UncompressedBcf => "--ubcf",
            OutputFormat::GzippedVcf => {
                unreachable!("gzipped VCF is rejected before a recipe is ever built")
            }
        }
    }

    pub fn recipe(self) -> Recipe {
        match self {
            OutputFormat::Pileup => Recipe {
                strip_header: true,
                compress: true,
            },
            OutputFormat::Bcf => Recipe {
                strip_header: true,
                compress: false,
            },
            OutputFormat::UncompressedBcf | OutputFormat::Vcf => Recipe {
                strip_header: true,
                compress: true,
            },
            OutputFormat::GzippedVcf => {
                unreachable!("gzipped VCF is rejected before a recipe is ever built")
            }
        }
    }
}

/// The per-chunk finishing steps a recipe prescribes: strip the caller's
/// repeated header, then compress for the spool. Chunk 1 keeps its header
/// (the final output needs exactly one), every later chunk strips it.
#[derive(Debug, Clone, Copy)]
pub struct Recipe {
    pub strip_header: bool,
    pub compress: bool,
}

impl Recipe {
    pub fn strip_header_cmd(&self, self_exe: &str, format: OutputFormat, num: u64) -> Option<String> {
        if self.strip_header && num != 1 {
            Some(format!(
                "{self_exe} strip-bcf-header {}",
                format.header_strip_flag()
            ))
        } else {
            None
        }
    }

    pub fn compression_cmd(&self, self_exe: &str) -> Option<String> {
        if self.compress {
            Some(format!("{self_exe} lz4-compress"))
        } else {
            None
        }
    }

    /// Reverses `compression_cmd`'s effect on the bytes captured from a chunk.
    pub fn decompress(&self, bytes: &[u8], sink: &mut dyn Write) -> Result<(), PileupError> {
        if self.compress {
            codec::decompress_to(bytes, sink)
        } else {
            sink.write_all(bytes).map_err(PileupError::from)
        }
    }
}
