//! Stream filter implementations.
//!
//! Every filter is symmetric: it can decode stream data read from a file and
//! encode data being written into one. Filters chain: `/Filter` arrays apply
//! in declaration order on decode and in reverse order on encode, with
//! `/DecodeParms` entries matched positionally.
//!
//! Supported filters: FlateDecode, LZWDecode, ASCIIHexDecode, ASCII85Decode,
//! RunLengthDecode, plus PNG predictors for the compression filters.

use crate::error::{Error, Result};

mod ascii85;
mod ascii_hex;
mod flate;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Filter;
pub use ascii_hex::AsciiHexFilter;
pub use flate::FlateFilter;
pub use lzw::LzwFilter;
pub use predictor::{decode_predictor, encode_predictor};
pub use runlength::RunLengthFilter;

/// Decode parameters for a single filter (`/DecodeParms` entry).
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Predictor algorithm (1 = none, 2 = TIFF, 10-15 = PNG)
    pub predictor: i64,
    /// Number of color components per sample
    pub colors: usize,
    /// Bits per component
    pub bits_per_component: usize,
    /// Number of columns (samples per row)
    pub columns: usize,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self { predictor: 1, colors: 1, bits_per_component: 8, columns: 1 }
    }
}

impl FilterParams {
    /// Bytes of sample data per row, before the PNG predictor tag.
    pub fn pixel_bytes_per_row(&self) -> usize {
        (self.columns * self.colors * self.bits_per_component + 7) / 8
    }

    /// Bytes per sample, rounded up to at least one whole byte.
    pub fn bytes_per_pixel(&self) -> usize {
        ((self.colors * self.bits_per_component + 7) / 8).max(1)
    }
}

/// A PDF stream filter: one encoding algorithm, both directions.
pub trait StreamFilter {
    /// Decode data read from a file.
    fn decode(&self, input: &[u8], params: Option<&FilterParams>) -> Result<Vec<u8>>;

    /// Encode data for writing into a file.
    fn encode(&self, input: &[u8], params: Option<&FilterParams>) -> Result<Vec<u8>>;

    /// The filter's `/Filter` name (e.g. "FlateDecode").
    fn name(&self) -> &'static str;
}

/// Look up a filter implementation by its `/Filter` name.
pub fn filter_by_name(name: &str) -> Result<Box<dyn StreamFilter>> {
    match name {
        "FlateDecode" => Ok(Box::new(FlateFilter)),
        "LZWDecode" => Ok(Box::new(LzwFilter)),
        "ASCIIHexDecode" => Ok(Box::new(AsciiHexFilter)),
        "ASCII85Decode" => Ok(Box::new(Ascii85Filter)),
        "RunLengthDecode" => Ok(Box::new(RunLengthFilter)),
        other => Err(Error::Malformed(format!("unknown stream filter /{}", other))),
    }
}

/// Decode stream data through a filter pipeline, in declaration order.
pub fn decode(data: &[u8], filters: &[String], params: &[Option<FilterParams>]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for (i, name) in filters.iter().enumerate() {
        let filter = filter_by_name(name)?;
        let p = params.get(i).and_then(|p| p.as_ref());
        current = filter.decode(&current, p)?;
        log::trace!("{}: {} bytes after decode", filter.name(), current.len());
    }

    Ok(current)
}

/// Encode stream data through a filter pipeline, in reverse declaration
/// order, so a subsequent decode of the `/Filter` array restores the input.
pub fn encode(data: &[u8], filters: &[String], params: &[Option<FilterParams>]) -> Result<Vec<u8>> {
    let mut current = data.to_vec();

    for (i, name) in filters.iter().enumerate().rev() {
        let filter = filter_by_name(name)?;
        let p = params.get(i).and_then(|p| p.as_ref());
        current = filter.encode(&current, p)?;
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_filter_rejected() {
        let err = decode(b"data", &["NoSuchDecode".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        assert_eq!(decode(b"data", &[], &[]).unwrap(), b"data");
        assert_eq!(encode(b"data", &[], &[]).unwrap(), b"data");
    }

    #[test]
    fn test_chained_filters_round_trip() {
        // [ASCII85 Flate]: decode applies ASCII85 then Flate,
        // encode applies Flate then ASCII85
        let filters = vec!["ASCII85Decode".to_string(), "FlateDecode".to_string()];
        let original = b"chained filter pipeline payload, repeated payload payload";

        let encoded = encode(original, &filters, &[]).unwrap();
        assert!(encoded.ends_with(b"~>"));

        let decoded = decode(&encoded, &filters, &[]).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_params_align_positionally() {
        // Predictor params on the Flate stage only
        let filters = vec!["FlateDecode".to_string()];
        let params = vec![Some(FilterParams {
            predictor: 12,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
        })];

        let original = vec![10u8, 20, 30, 40, 11, 21, 31, 41];
        let encoded = encode(&original, &filters, &params).unwrap();
        let decoded = decode(&encoded, &filters, &params).unwrap();
        assert_eq!(decoded, original);
    }
}
