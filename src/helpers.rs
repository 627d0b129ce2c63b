use std::io::{self, Read, Write};

use crate::codec;
use crate::error::PileupError;

/// Dispatches the driver's own self-invoked helper subcommands. The
/// driver re-executes itself as `strip-bcf-header` / `lz4-compress` /
/// `lz4-decompress` inside the per-chunk shell pipeline so no extra
/// binaries need to be installed alongside samtools and bcftools.
pub fn dispatch(args: &[String]) -> Result<(), PileupError> {
    match args.first().map(String::as_str) {
        Some("strip-bcf-header") => strip_bcf_header(&args[1..]),
        Some("lz4-compress") => lz4_compress(),
        Some("lz4-decompress") => lz4_decompress(),
        Some(other) => Err(PileupError::ArgRejected(format!(
            "unknown helper subcommand `{other}`"
        ))),
        None => Err(PileupError::ArgRejected(
            "missing helper subcommand".to_string(),
        )),
    }
}

fn strip_bcf_header(flags: &[String]) -> Result<(), PileupError> {
    let format = flags.first().map(String::as_str).unwrap_or("--vcf");
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input).map_err(PileupError::from)?;

    let body = match format {
        "--vcf" => strip_text_header(&input),
        "--bcf" | "--ubcf" => strip_binary_header(&input),
        other => {
            return Err(PileupError::ArgRejected(format!(
                "strip-bcf-header: unknown format flag `{other}`"
            )))
        }
    };

    io::stdout().write_all(body).map_err(PileupError::from)
}

/// VCF headers are the contiguous run of lines starting with `#` at the
/// top of the stream.
fn strip_text_header(input: &[u8]) -> &[u8] {
    let mut offset = 0;
    for line in input.split(|&b| b == b'\n') {
        if line.first() == Some(&b'#') {
            offset += line.len() + 1;
        } else {
            break;
        }
    }
    &input[offset.min(input.len())..]
}

/// BCF's header is a length-prefixed text block right after the 5-byte
/// `BCF\x02\x02` magic.
fn strip_binary_header(input: &[u8]) -> &[u8] {
    const MAGIC_LEN: usize = 5;
    if input.len() < MAGIC_LEN + 4 {
        return input;
    }
    let len = u32::from_le_bytes(input[MAGIC_LEN..MAGIC_LEN + 4].try_into().unwrap()) as usize;
    let body_start = (MAGIC_LEN + 4 + len).min(input.len());
    &input[body_start..]
}

fn lz4_compress() -> Result<(), PileupError> {
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input).map_err(PileupError::from)?;
    let compressed = codec::compress(&input)?;
    io::stdout().write_all(&compressed).map_err(PileupError::from)
}

fn lz4_decompress() -> Result<(), PileupError> {
    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input).map_err(PileupError::from)?;
    codec::decompress_to(&input, &mut io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_text_header_removes_only_leading_hash_lines() {
        let input = b"#h1\n#h2\nchr1\t1\t.\nchr1\t2\t.\n";
        assert_eq!(strip_text_header(input), b"chr1\t1\t.\nchr1\t2\t.\n");
    }

    #[test]
    fn strip_text_header_on_headerless_input_is_a_no_op() {
        let input = b"chr1\t1\t.\n";
        assert_eq!(strip_text_header(input), input);
    }
}
