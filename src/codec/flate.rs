//! FlateDecode (zlib/deflate) encode and decode.
//!
//! The most common PDF stream filter. Uses the flate2 crate.

use crate::error::{Error, Result};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{Read, Write};

/// Compress bytes with zlib at the default level.
pub fn flate_compress(plain: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    encoder.write_all(plain).expect("in-memory write");
    encoder.finish().expect("in-memory finish")
}

/// Decompress zlib-wrapped bytes.
pub fn flate_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::new();
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decode(format!("flate: {}", e)))?;
    Ok(output)
}
