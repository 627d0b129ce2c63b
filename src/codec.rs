use std::io::{self, Write};

use lz4_flex::frame::{FrameDecoder, FrameEncoder};

use crate::error::PileupError;

pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, PileupError> {
    let mut encoder = FrameEncoder::new(Vec::new());
    encoder.write_all(bytes)?;
    encoder
        .finish()
        .map_err(|e| PileupError::IoFailure(e.to_string()))
}

pub fn decompress_to(bytes: &[u8], sink: &mut dyn Write) -> Result<(), PileupError> {
    let mut decoder = FrameDecoder::new(bytes);
    io::copy(&mut decoder, sink).map_err(PileupError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original = b"reference\tstart\tend\nchr1\t0\t100\n".repeat(64);
        let compressed = compress(&original).unwrap();
        let mut out = Vec::new();
        decompress_to(&compressed, &mut out).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn round_trips_empty_input() {
        let compressed = compress(&[]).unwrap();
        let mut out = Vec::new();
        decompress_to(&compressed, &mut out).unwrap();
        assert!(out.is_empty());
    }
}
