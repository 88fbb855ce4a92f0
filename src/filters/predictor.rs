//! PNG predictor pass for the compression filters.
//!
//! PNG predictors (10-15) difference each row against its left and upper
//! neighbors before compression. Every encoded row starts with a tag byte
//! naming the per-row algorithm (0-4), regardless of which predictor value
//! the decode parameters advertise; decoding honors the tag, encoding picks
//! Paeth for "optimum" (15) and the fixed algorithm otherwise.

use super::FilterParams;
use crate::error::{Error, Result};

/// Reverse a predictor pass on decompressed data.
pub fn decode_predictor(data: &[u8], params: &FilterParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Err(Error::NotImplemented("TIFF predictor 2".to_string())),
        10..=15 => {
            check_component_width(params)?;
            decode_png_rows(data, params)
        },
        other => Err(Error::Malformed(format!("invalid predictor value {}", other))),
    }
}

/// Apply a predictor pass before compression.
pub fn encode_predictor(data: &[u8], params: &FilterParams) -> Result<Vec<u8>> {
    match params.predictor {
        1 => Ok(data.to_vec()),
        2 => Err(Error::NotImplemented("TIFF predictor 2".to_string())),
        10..=15 => {
            check_component_width(params)?;
            encode_png_rows(data, params)
        },
        other => Err(Error::Malformed(format!("invalid predictor value {}", other))),
    }
}

fn check_component_width(params: &FilterParams) -> Result<()> {
    if params.bits_per_component == 16 {
        return Err(Error::NotImplemented("16-bit PNG predictor components".to_string()));
    }
    Ok(())
}

fn decode_png_rows(data: &[u8], params: &FilterParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let row_bytes = pixel_bytes + 1; // tag byte
    let bpp = params.bytes_per_pixel();

    if row_bytes == 1 || data.len() % row_bytes != 0 {
        return Err(Error::Malformed(format!(
            "predictor data length {} is not a multiple of row size {}",
            data.len(),
            row_bytes
        )));
    }

    let row_count = data.len() / row_bytes;
    let mut output = vec![0u8; row_count * pixel_bytes];

    for row in 0..row_count {
        let tag = data[row * row_bytes];
        let encoded = &data[row * row_bytes + 1..(row + 1) * row_bytes];
        let out_start = row * pixel_bytes;

        for i in 0..pixel_bytes {
            let raw = encoded[i];
            let left = if i >= bpp { output[out_start + i - bpp] } else { 0 };
            let above = if row > 0 { output[out_start + i - pixel_bytes] } else { 0 };
            let upper_left = if row > 0 && i >= bpp {
                output[out_start + i - pixel_bytes - bpp]
            } else {
                0
            };

            let reconstructed = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(above),
                3 => raw.wrapping_add(((left as u16 + above as u16) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, above, upper_left)),
                other => {
                    return Err(Error::Malformed(format!(
                        "invalid PNG predictor row tag {}",
                        other
                    )));
                },
            };
            output[out_start + i] = reconstructed;
        }
    }

    Ok(output)
}

fn encode_png_rows(data: &[u8], params: &FilterParams) -> Result<Vec<u8>> {
    let pixel_bytes = params.pixel_bytes_per_row();
    let bpp = params.bytes_per_pixel();

    if pixel_bytes == 0 || data.len() % pixel_bytes != 0 {
        return Err(Error::Malformed(format!(
            "predictor input length {} is not a multiple of row size {}",
            data.len(),
            pixel_bytes
        )));
    }

    // Optimum collapses to Paeth per row; fixed predictors keep their tag
    let tag = if params.predictor == 15 { 4 } else { (params.predictor - 10) as u8 };

    let row_count = data.len() / pixel_bytes;
    let mut output = Vec::with_capacity(row_count * (pixel_bytes + 1));

    for row in 0..row_count {
        let current = &data[row * pixel_bytes..(row + 1) * pixel_bytes];
        output.push(tag);

        for i in 0..pixel_bytes {
            let raw = current[i];
            let left = if i >= bpp { current[i - bpp] } else { 0 };
            let above = if row > 0 { data[(row - 1) * pixel_bytes + i] } else { 0 };
            let upper_left = if row > 0 && i >= bpp {
                data[(row - 1) * pixel_bytes + i - bpp]
            } else {
                0
            };

            let predicted = match tag {
                0 => 0,
                1 => left,
                2 => above,
                3 => ((left as u16 + above as u16) / 2) as u8,
                4 => paeth(left, above, upper_left),
                _ => unreachable!(),
            };
            output.push(raw.wrapping_sub(predicted));
        }
    }

    Ok(output)
}

/// Paeth predictor function (PNG spec 9.4). Ties break toward left,
/// then above, then upper-left.
fn paeth(left: u8, above: u8, upper_left: u8) -> u8 {
    let p = left as i16 + above as i16 - upper_left as i16;
    let pa = (p - left as i16).abs();
    let pb = (p - above as i16).abs();
    let pc = (p - upper_left as i16).abs();

    if pa <= pb && pa <= pc {
        left
    } else if pb <= pc {
        above
    } else {
        upper_left
    }
}
