//! ASCII85Decode filter.
//!
//! Base-85 encoding: every 4 bytes become 5 characters in `!`..`u`, an
//! all-zero group shortens to `z`, and `~>` terminates the data. Encoded
//! output wraps at 76 columns so the stream stays mail-safe.

use super::{FilterParams, StreamFilter};
use crate::error::{Error, Result};

const LINE_WIDTH: usize = 76;

/// ASCII85Decode: 4-byte groups encoded base-85.
pub struct Ascii85Filter;

impl StreamFilter for Ascii85Filter {
    fn decode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        // Optional "<~" prefix (Adobe convention)
        let input = input.strip_prefix(b"<~").unwrap_or(input);

        let mut result = Vec::with_capacity(input.len() * 4 / 5);
        let mut group = [0u8; 5];
        let mut group_len = 0;

        for &b in input {
            match b {
                b'~' => break,
                b'z' if group_len == 0 => {
                    result.extend_from_slice(&[0, 0, 0, 0]);
                },
                b'z' => {
                    return Err(Error::Malformed(
                        "'z' inside an ASCII85 group".to_string(),
                    ));
                },
                b'!'..=b'u' => {
                    group[group_len] = b - b'!';
                    group_len += 1;
                    if group_len == 5 {
                        push_group(&group, 4, &mut result)?;
                        group_len = 0;
                    }
                },
                c if crate::lexer::is_whitespace(c) => continue,
                other => {
                    return Err(Error::Malformed(format!(
                        "invalid byte 0x{:02X} in ASCII85 data",
                        other
                    )));
                },
            }
        }

        // Partial final group: n characters carry n-1 bytes
        if group_len > 0 {
            if group_len == 1 {
                return Err(Error::Malformed(
                    "truncated ASCII85 data: single trailing character".to_string(),
                ));
            }
            // Pad with 'u' (84), the highest digit, so truncation rounds up
            for slot in group.iter_mut().skip(group_len) {
                *slot = 84;
            }
            push_group(&group, group_len - 1, &mut result)?;
        }

        Ok(result)
    }

    fn encode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(input.len() * 5 / 4 + input.len() / LINE_WIDTH + 2);
        let mut column = 0;

        let mut push = |result: &mut Vec<u8>, b: u8, column: &mut usize| {
            if *column == LINE_WIDTH {
                result.push(b'\n');
                *column = 0;
            }
            result.push(b);
            *column += 1;
        };

        for chunk in input.chunks(4) {
            let mut word = 0u32;
            for (i, &b) in chunk.iter().enumerate() {
                word |= (b as u32) << (24 - 8 * i);
            }

            if word == 0 && chunk.len() == 4 {
                push(&mut result, b'z', &mut column);
                continue;
            }

            let mut digits = [0u8; 5];
            let mut w = word;
            for d in digits.iter_mut().rev() {
                *d = (w % 85) as u8 + b'!';
                w /= 85;
            }
            // Partial group of n bytes emits n+1 characters
            for &d in digits.iter().take(chunk.len() + 1) {
                push(&mut result, d, &mut column);
            }
        }

        result.extend_from_slice(b"~>");
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "ASCII85Decode"
    }
}

/// Expand a 5-digit base-85 group into up to 4 bytes.
fn push_group(group: &[u8; 5], byte_count: usize, out: &mut Vec<u8>) -> Result<()> {
    let mut word = 0u64;
    for &d in group {
        word = word * 85 + d as u64;
    }
    if word > u32::MAX as u64 {
        return Err(Error::Malformed("ASCII85 group exceeds 32 bits".to_string()));
    }
    let bytes = (word as u32).to_be_bytes();
    out.extend_from_slice(&bytes[..byte_count]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_vector() {
        // "Man " encodes to "9jqo^" in base-85
        let decoded = Ascii85Filter.decode(b"9jqo^~>", None).unwrap();
        assert_eq!(decoded, b"Man ");
    }

    #[test]
    fn test_decode_z_shorthand() {
        let decoded = Ascii85Filter.decode(b"z~>", None).unwrap();
        assert_eq!(decoded, &[0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_partial_group() {
        let encoded = Ascii85Filter.encode(b"Hi", None).unwrap();
        assert_eq!(Ascii85Filter.decode(&encoded, None).unwrap(), b"Hi");
    }

    #[test]
    fn test_decode_ignores_whitespace_and_prefix() {
        let with_ws = b"<~9jq\n o^~>";
        assert_eq!(Ascii85Filter.decode(with_ws, None).unwrap(), b"Man ");
    }

    #[test]
    fn test_decode_single_trailing_char_fails() {
        assert!(Ascii85Filter.decode(b"9~>", None).is_err());
    }

    #[test]
    fn test_decode_z_mid_group_fails() {
        assert!(Ascii85Filter.decode(b"9jz~>", None).is_err());
    }

    #[test]
    fn test_encode_terminator_and_zero_group() {
        let encoded = Ascii85Filter.encode(&[0, 0, 0, 0, 1], None).unwrap();
        assert!(encoded.starts_with(b"z"));
        assert!(encoded.ends_with(b"~>"));
    }

    #[test]
    fn test_encode_final_partial_zero_group_not_z() {
        // A trailing partial group of zeros must be written out in full form
        let encoded = Ascii85Filter.encode(&[0, 0], None).unwrap();
        assert!(!encoded.contains(&b'z'));
        assert_eq!(Ascii85Filter.decode(&encoded, None).unwrap(), &[0, 0]);
    }

    #[test]
    fn test_encode_wraps_long_lines() {
        let data = vec![0xABu8; 400];
        let encoded = Ascii85Filter.encode(&data, None).unwrap();
        for line in encoded.split(|&b| b == b'\n') {
            assert!(line.len() <= LINE_WIDTH + 2); // + "~>" on the last line
        }
        assert_eq!(Ascii85Filter.decode(&encoded, None).unwrap(), data);
    }

    #[test]
    fn test_round_trip_ragged_lengths() {
        for len in 0..9 {
            let data: Vec<u8> = (0..len as u8).map(|i| i.wrapping_mul(37)).collect();
            let encoded = Ascii85Filter.encode(&data, None).unwrap();
            assert_eq!(Ascii85Filter.decode(&encoded, None).unwrap(), data, "len {}", len);
        }
    }
}
