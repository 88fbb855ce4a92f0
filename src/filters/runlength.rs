//! RunLengthDecode filter.

use super::{FilterParams, StreamFilter};
use crate::error::{Error, Result};

/// End-of-data marker byte.
const EOD: u8 = 128;

/// RunLengthDecode: length byte 0-127 introduces a literal run of N+1
/// bytes, 129-255 repeats the next byte 257-N times, 128 ends the data.
pub struct RunLengthFilter;

impl StreamFilter for RunLengthFilter {
    fn decode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(input.len() * 2);
        let mut i = 0;

        while i < input.len() {
            let length = input[i];
            i += 1;

            if length == EOD {
                return Ok(result);
            }

            if length < 128 {
                let count = length as usize + 1;
                let literal = input.get(i..i + count).ok_or_else(|| {
                    Error::Malformed("truncated literal run in RunLength data".to_string())
                })?;
                result.extend_from_slice(literal);
                i += count;
            } else {
                let count = 257 - length as usize;
                let &byte = input.get(i).ok_or_else(|| {
                    Error::Malformed("truncated repeat run in RunLength data".to_string())
                })?;
                result.extend(std::iter::repeat(byte).take(count));
                i += 1;
            }
        }

        Err(Error::Malformed("RunLength data missing end-of-data marker".to_string()))
    }

    fn encode(&self, input: &[u8], _params: Option<&FilterParams>) -> Result<Vec<u8>> {
        let mut result = Vec::with_capacity(input.len() + input.len() / 127 + 2);
        let mut i = 0;

        while i < input.len() {
            let run_len = run_length_at(input, i);

            if run_len >= 3 {
                // Repeat run, capped at 128 bytes per record
                let count = run_len.min(128);
                result.push((257 - count) as u8);
                result.push(input[i]);
                i += count;
            } else {
                // Literal run up to the next repeat run (or 128 bytes)
                let start = i;
                while i < input.len() && i - start < 128 {
                    if run_length_at(input, i) >= 3 {
                        break;
                    }
                    i += 1;
                }
                result.push((i - start - 1) as u8);
                result.extend_from_slice(&input[start..i]);
            }
        }

        result.push(EOD);
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "RunLengthDecode"
    }
}

/// Length of the run of identical bytes starting at `pos`.
fn run_length_at(input: &[u8], pos: usize) -> usize {
    let byte = input[pos];
    input[pos..].iter().take_while(|&&b| b == byte).count()
}
