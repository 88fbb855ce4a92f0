//! FlateDecode filter (zlib/deflate).

use super::{FilterParams, StreamFilter, decode_predictor, encode_predictor};
use crate::error::{Error, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// FlateDecode: zlib-wrapped deflate, optionally with a predictor pass.
pub struct FlateFilter;

impl StreamFilter for FlateFilter {
    fn decode(&self, input: &[u8], params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(input);
        let mut inflated = Vec::new();
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| Error::Malformed(format!("zlib inflate failed: {}", e)))?;

        match params {
            Some(p) if p.predictor != 1 => decode_predictor(&inflated, p),
            _ => Ok(inflated),
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

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(input)
            .and_then(|_| encoder.finish())
            .map_err(|e| Error::Malformed(format!("zlib deflate failed: {}", e)))
    }

    fn name(&self) -> &'static str {
        "FlateDecode"
    }
}
