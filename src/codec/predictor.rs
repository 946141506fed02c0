//! PNG and TIFF predictor implementations.
//!
//! Predictors transform raw bytes before compression to improve
//! compressibility of image-like data and are reversed after decompression.
//! PNG rows carry a 1-byte filter code (0=None, 1=Sub, 2=Up, 3=Average,
//! 4=Paeth); the previous row for the first row is all zeros and all
//! arithmetic is mod 256. TIFF-2 adds the left neighbor within each row.

use crate::codec::Predictor;
use crate::error::{Error, Result};

/// Reverse a predictor over decompressed data.
///
/// `columns` is the row width in bytes (PNG rows carry one extra tag byte).
pub fn decode_predictor(data: &[u8], predictor: Predictor, columns: usize) -> Result<Vec<u8>> {
    match predictor {
        Predictor::None => Ok(data.to_vec()),
        Predictor::Tiff2 => decode_tiff2(data, columns),
        Predictor::Png(_) => decode_png(data, columns),
    }
}

/// Apply a predictor to plain data.
///
/// PNG code 15 ("Optimum") encodes Up for multi-row data and Sub for a
/// single row; the fixed codes 10-14 apply their filter to every row.
pub fn encode_predictor(data: &[u8], predictor: Predictor, columns: usize) -> Result<Vec<u8>> {
    match predictor {
        Predictor::None => Ok(data.to_vec()),
        Predictor::Tiff2 => encode_tiff2(data, columns),
        Predictor::Png(code) => {
            let rows = check_rows(data.len(), columns)?;
            let filter = match code {
                10 => 0,
                11 => 1,
                12 => 2,
                13 => 3,
                14 => 4,
                15 => {
                    if rows > 1 {
                        2
                    } else {
                        1
                    }
                }
                other => {
                    return Err(Error::Decode(format!("invalid PNG predictor code {}", other)))
                }
            };
            encode_png(data, columns, filter)
        }
    }
}

fn check_rows(len: usize, columns: usize) -> Result<usize> {
    if columns == 0 {
        return Err(Error::Decode("predictor columns must be positive".to_string()));
    }
    if !len.is_multiple_of(columns) {
        return Err(Error::Decode(format!(
            "data length {} is not a multiple of row width {}",
            len, columns
        )));
    }
    Ok(len / columns)
}

fn decode_tiff2(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    check_rows(data.len(), columns)?;
    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(columns) {
        let mut previous = 0u8;
        for &byte in row {
            let sample = byte.wrapping_add(previous);
            output.push(sample);
            previous = sample;
        }
    }
    Ok(output)
}

fn encode_tiff2(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    check_rows(data.len(), columns)?;
    let mut output = Vec::with_capacity(data.len());
    for row in data.chunks(columns) {
        let mut previous = 0u8;
        for &byte in row {
            output.push(byte.wrapping_sub(previous));
            previous = byte;
        }
    }
    Ok(output)
}

/// Decode PNG-predicted rows, honoring the per-row filter code.
fn decode_png(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    let row_width = columns + 1;
    let rows = check_rows(data.len(), row_width)?;
    let mut output: Vec<u8> = Vec::with_capacity(rows * columns);

    for row_idx in 0..rows {
        let row = &data[row_idx * row_width..(row_idx + 1) * row_width];
        let filter = row[0];
        let encoded = &row[1..];
        let out_start = output.len();

        for (i, &byte) in encoded.iter().enumerate() {
            let left = if i > 0 { output[out_start + i - 1] } else { 0 };
            let above = if row_idx > 0 {
                output[out_start - columns + i]
            } else {
                0
            };
            let upper_left = if row_idx > 0 && i > 0 {
                output[out_start - columns + i - 1]
            } else {
                0
            };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => above,
                3 => (((left as u16) + (above as u16)) / 2) as u8,
                4 => paeth(left, above, upper_left),
                other => {
                    return Err(Error::Decode(format!(
                        "invalid PNG row filter code {} in row {}",
                        other, row_idx
                    )))
                }
            };
            output.push(byte.wrapping_add(predicted));
        }
    }

    Ok(output)
}

/// Encode plain rows with a single PNG filter code.
fn encode_png(data: &[u8], columns: usize, filter: u8) -> Result<Vec<u8>> {
    let rows = check_rows(data.len(), columns)?;
    let mut output = Vec::with_capacity(rows * (columns + 1));

    for row_idx in 0..rows {
        let row = &data[row_idx * columns..(row_idx + 1) * columns];
        output.push(filter);
        for (i, &byte) in row.iter().enumerate() {
            let left = if i > 0 { row[i - 1] } else { 0 };
            let above = if row_idx > 0 {
                data[(row_idx - 1) * columns + i]
            } else {
                0
            };
            let upper_left = if row_idx > 0 && i > 0 {
                data[(row_idx - 1) * columns + i - 1]
            } else {
                0
            };
            let predicted = match filter {
                0 => 0,
                1 => left,
                2 => above,
                3 => (((left as u16) + (above as u16)) / 2) as u8,
                4 => paeth(left, above, upper_left),
                other => {
                    return Err(Error::Decode(format!("invalid PNG row filter code {}", other)))
                }
            };
            output.push(byte.wrapping_sub(predicted));
        }
    }

    Ok(output)
}

/// Paeth predictor function from the PNG specification.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let (a, b, c) = (a as i16, b as i16, c as i16);
    let p = a + b - c;
    let pa = (p - a).abs();
    let pb = (p - b).abs();
    let pc = (p - c).abs();
    if pa <= pb && pa <= pc {
        a as u8
    } else if pb <= pc {
        b as u8
    } else {
        c as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiff2_roundtrip() {
        let plain: Vec<u8> = (0u8..24).collect();
        let encoded = encode_predictor(&plain, Predictor::Tiff2, 6).unwrap();
        assert_eq!(decode_predictor(&encoded, Predictor::Tiff2, 6).unwrap(), plain);
    }

    #[test]
    fn test_tiff2_delta_form() {
        // Monotone row becomes constant deltas.
        let plain = vec![10u8, 12, 14, 16];
        let encoded = encode_predictor(&plain, Predictor::Tiff2, 4).unwrap();
        assert_eq!(encoded, vec![10, 2, 2, 2]);
    }

    #[test]
    fn test_png_each_filter_roundtrips() {
        let plain: Vec<u8> = (0u8..60).map(|v| v.wrapping_mul(37)).collect();
        for code in 10..=14u8 {
            let encoded = encode_predictor(&plain, Predictor::Png(code), 10).unwrap();
            assert_eq!(
                decode_predictor(&encoded, Predictor::Png(code), 10).unwrap(),
                plain,
                "PNG predictor {}",
                code
            );
        }
    }

    #[test]
    fn test_png_optimum_picks_up_for_multirow() {
        let plain: Vec<u8> = (0u8..20).collect();
        let encoded = encode_predictor(&plain, Predictor::Png(15), 10).unwrap();
        // Every row tagged with filter 2 (Up).
        assert_eq!(encoded[0], 2);
        assert_eq!(encoded[11], 2);
        assert_eq!(decode_predictor(&encoded, Predictor::Png(15), 10).unwrap(), plain);
    }

    #[test]
    fn test_png_optimum_picks_sub_for_single_row() {
        let plain: Vec<u8> = (0u8..10).collect();
        let encoded = encode_predictor(&plain, Predictor::Png(15), 10).unwrap();
        assert_eq!(encoded[0], 1);
        assert_eq!(decode_predictor(&encoded, Predictor::Png(15), 10).unwrap(), plain);
    }

    #[test]
    fn test_png_up_13x11_sequence() {
        // 13x11 grayscale rows all carrying filter code 2 decode to the
        // byte sequence 0..143.
        let plain: Vec<u8> = (0u8..143).collect();
        let encoded = encode_predictor(&plain, Predictor::Png(12), 13).unwrap();
        assert_eq!(encoded.len(), 11 * 14);
        for row in 0..11 {
            assert_eq!(encoded[row * 14], 2);
        }
        let decoded = decode_predictor(&encoded, Predictor::Png(15), 13).unwrap();
        assert_eq!(decoded, plain);
    }

    #[test]
    fn test_first_row_previous_is_zeros() {
        // Up on the first row leaves bytes unchanged.
        let plain = vec![5u8, 6, 7];
        let encoded = encode_predictor(&plain, Predictor::Png(12), 3).unwrap();
        assert_eq!(&encoded[1..], &plain[..]);
    }

    #[test]
    fn test_ragged_input_rejected() {
        assert!(decode_predictor(&[0, 1, 2], Predictor::Tiff2, 2).is_err());
        assert!(decode_predictor(&[0, 1, 2], Predictor::Png(12), 3).is_err());
    }

    #[test]
    fn test_invalid_row_filter_rejected() {
        let data = [7u8, 0, 0, 0];
        assert!(decode_predictor(&data, Predictor::Png(15), 3).is_err());
    }
}
