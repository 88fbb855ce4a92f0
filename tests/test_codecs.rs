//! Property tests for the byte-level codecs.
//!
//! Round-trip laws over arbitrary inputs: name escaping, the ASCII filters,
//! run-length coding and the PNG predictors. Each property states the
//! invariant the hand-written unit tests only spot-check.

use pdf_amend::filters::{
    decode_predictor, encode_predictor, Ascii85Filter, AsciiHexFilter, FilterParams,
    RunLengthFilter, StreamFilter,
};
use pdf_amend::lexer::{decode_name_bytes, encode_name_bytes};
use proptest::prelude::*;

proptest! {
    #[test]
    fn name_escaping_round_trips(raw in proptest::collection::vec(any::<u8>(), 0..64)) {
        let encoded = encode_name_bytes(&raw);
        // Encoded names contain only regular characters
        for b in encoded.bytes() {
            prop_assert!((33..=126).contains(&b));
        }
        prop_assert_eq!(decode_name_bytes(encoded.as_bytes()), raw);
    }

    #[test]
    fn ascii_hex_round_trips(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        let filter = AsciiHexFilter;
        let encoded = filter.encode(&data, None).unwrap();
        prop_assert!(encoded.ends_with(b">"));
        prop_assert_eq!(filter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn ascii85_round_trips(data in proptest::collection::vec(any::<u8>(), 0..256)) {
        // Covers ragged tail groups and all-zero groups alike
        let filter = Ascii85Filter;
        let encoded = filter.encode(&data, None).unwrap();
        prop_assert!(encoded.ends_with(b"~>"));
        prop_assert_eq!(filter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn ascii85_lines_stay_within_width(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let encoded = Ascii85Filter.encode(&data, None).unwrap();
        for line in encoded.split(|&b| b == b'\n') {
            prop_assert!(line.len() <= 78); // 76 columns plus the "~>" tail
        }
    }

    #[test]
    fn run_length_round_trips(data in proptest::collection::vec(0u8..4, 0..300)) {
        // A small alphabet forces long runs through the repeat encoding
        let filter = RunLengthFilter;
        let encoded = filter.encode(&data, None).unwrap();
        prop_assert_eq!(filter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn run_length_never_expands_runs(byte in any::<u8>(), len in 4usize..200) {
        let data = vec![byte; len];
        let encoded = RunLengthFilter.encode(&data, None).unwrap();
        // Repeats pack 128 bytes into 2; worst case here is a few records
        prop_assert!(encoded.len() < data.len());
    }

    #[test]
    fn png_predictors_round_trip(
        predictor in 10i64..=15,
        columns in 1usize..16,
        colors in 1usize..4,
        rows in 1usize..6,
        seed in any::<u64>(),
    ) {
        let params = FilterParams { predictor, colors, bits_per_component: 8, columns };
        let row_len = params.pixel_bytes_per_row();

        // Deterministic pseudo-random sample data
        let mut state = seed | 1;
        let data: Vec<u8> = (0..row_len * rows)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 56) as u8
            })
            .collect();

        let encoded = encode_predictor(&data, &params).unwrap();
        prop_assert_eq!(encoded.len(), (row_len + 1) * rows);
        prop_assert_eq!(decode_predictor(&encoded, &params).unwrap(), data);
    }
}

#[test]
fn test_predictor_none_is_identity() {
    let params = FilterParams { predictor: 1, ..FilterParams::default() };
    let data = vec![1u8, 2, 3, 4];
    assert_eq!(encode_predictor(&data, &params).unwrap(), data);
    assert_eq!(decode_predictor(&data, &params).unwrap(), data);
}
