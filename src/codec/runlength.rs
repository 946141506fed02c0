//! RunLengthDecode implementation.
//!
//! Each run starts with a length byte: 0-127 means copy the next length+1
//! bytes literally, 129-255 means repeat the next byte 257-length times,
//! and 128 is end-of-data.

use crate::error::{Error, Result};

/// Decode a RunLengthDecode stream.
pub fn rle_decode(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let mut index = 0;

    while index < data.len() {
        let length = data[index];
        index += 1;
        match length {
            0..=127 => {
                let count = length as usize + 1;
                if index + count > data.len() {
                    return Err(Error::Decode(format!(
                        "run-length literal of {} bytes exceeds input at offset {}",
                        count, index
                    )));
                }
                result.extend_from_slice(&data[index..index + count]);
                index += count;
            }
            128 => break,
            _ => {
                let count = 257 - length as usize;
                if index >= data.len() {
                    return Err(Error::Decode(format!(
                        "run-length repeat missing value byte at offset {}",
                        index
                    )));
                }
                result.extend(std::iter::repeat(data[index]).take(count));
                index += 1;
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rle_literal_run() {
        // length 2 -> copy 3 bytes
        assert_eq!(rle_decode(&[2, b'a', b'b', b'c']).unwrap(), b"abc");
    }

    #[test]
    fn test_rle_repeat_run() {
        // 257 - 254 = 3 copies of 'x'
        assert_eq!(rle_decode(&[254, b'x']).unwrap(), b"xxx");
    }

    #[test]
    fn test_rle_eod_stops() {
        assert_eq!(rle_decode(&[0, b'a', 128, 0, b'z']).unwrap(), b"a");
    }

    #[test]
    fn test_rle_mixed() {
        let encoded = [1, b'h', b'i', 255, b'!', 128];
        assert_eq!(rle_decode(&encoded).unwrap(), b"hi!!");
    }

    #[test]
    fn test_rle_truncated_literal_fails() {
        assert!(rle_decode(&[5, b'a']).is_err());
    }

    #[test]
    fn test_rle_truncated_repeat_fails() {
        assert!(rle_decode(&[200]).is_err());
    }
}
