//! ASCIIHexDecode filter.

use super::{FilterParams, StreamFilter};
use crate::error::{Error, Result};

/// ASCIIHexDecode: each byte as two hex digits, `>` marks end of data.
pub struct AsciiHexFilter;

impl StreamFilter for AsciiHexFilter {
    fn decode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(input.len() / 2);
        let mut high: Option<u8> = None;

        for &b in input {
            let nibble = match b {
                b'>' => break,
                b'0'..=b'9' => b - b'0',
                b'a'..=b'f' => b - b'a' + 10,
                b'A'..=b'F' => b - b'A' + 10,
                c if crate::lexer::is_whitespace(c) => continue,
                other => {
                    return Err(Error::Malformed(format!(
                        "invalid byte 0x{:02X} in ASCIIHex data",
                        other
                    )));
                },
            };
            match high.take() {
                None => high = Some(nibble),
                Some(h) => result.push((h << 4) | nibble),
            }
        }

        // Odd digit count implies a trailing zero nibble
        if let Some(h) = high {
            result.push(h << 4);
        }

        Ok(result)
    }

    fn encode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(input.len() * 2 + 1);
        for &b in input {
            result.push(HEX_DIGITS[(b >> 4) as usize]);
            result.push(HEX_DIGITS[(b & 0x0F) as usize]);
        }
        result.push(b'>');
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "ASCIIHexDecode"
    }
}

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";
