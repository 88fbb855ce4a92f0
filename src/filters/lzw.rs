//! LZWDecode filter.

use super::{FilterParams, StreamFilter, decode_predictor, encode_predictor};
use crate::error::{Error, Result};
use weezl::{BitOrder, decode::Decoder, encode::Encoder};

/// LZWDecode: Lempel-Ziv-Welch with MSB-first bit packing and 8-bit codes.
pub struct LzwFilter;

impl StreamFilter for LzwFilter {
    fn decode(&self, input: &[u8], params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let expanded = Decoder::new(BitOrder::Msb, 8)
            .decode(input)
            .map_err(|e| Error::Malformed(format!("LZW decode failed: {}", e)))?;

        match params {
            Some(p) if p.predictor != 1 => decode_predictor(&expanded, p),
            _ => Ok(expanded),
        }
    }

    fn encode(&self, input: &[u8], params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let predicted;
        let input = match params {
            Some(p) if p.predictor != 1 => {
                predicted = encode_predictor(input, p)?;
                predicted.as_slice()
            },
            _ => input,
        };

        Encoder::new(BitOrder::Msb, 8)
            .encode(input)
            .map_err(|e| Error::Malformed(format!("LZW encode failed: {}", e)))
    }

    fn name(&self) -> &'static str {
        "LZWDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = b"TOBEORNOTTOBEORTOBEORNOT".to_vec();
        let encoded = LzwFilter.encode(&data, None).unwrap();
        assert_eq!(LzwFilter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn test_round_trip_binary() {
        let data: Vec<u8> = (0..=255).collect();
        let encoded = LzwFilter.encode(&data, None).unwrap();
        assert_eq!(LzwFilter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn test_decode_garbage_fails() {
        // All-ones bitstream hits an out-of-range code quickly
        assert!(LzwFilter.decode(&[0xFF; 16], None).is_err());
    }
}
