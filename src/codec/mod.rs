//! Stream codec layer for PDF filters.
//!
//! Decoding covers Identity, FlateDecode and RunLengthDecode plus the
//! PNG (10-15) and TIFF-2 predictors applied after decompression. Encoding
//! covers Identity and FlateDecode with optional PNG prediction. DCTDecode
//! is carried opaquely: it is lossy and never decompressed by the engine.

use crate::error::{Error, Result};
use crate::object::{Dict, Name, Value};

mod flate;
mod predictor;
mod runlength;

pub use flate::{flate_compress, flate_decompress};
pub use predictor::{decode_predictor, encode_predictor};
pub use runlength::rle_decode;

/// Stream filters known to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFilter {
    /// No filter
    Identity,
    /// FlateDecode (zlib/deflate)
    Flate,
    /// RunLengthDecode
    RunLength,
    /// DCTDecode (JPEG, carried opaquely)
    Dct,
    /// Any other filter; decoding fails, the stream stays opaque
    Other(Name),
}

impl StreamFilter {
    /// Map a /Filter name onto a filter variant.
    pub fn from_name(name: &Name) -> Self {
        match name.as_str() {
            "FlateDecode" => StreamFilter::Flate,
            "RunLengthDecode" => StreamFilter::RunLength,
            "DCTDecode" => StreamFilter::Dct,
            other => StreamFilter::Other(Name::new(other)),
        }
    }

    /// The /Filter name for this filter, or `None` for Identity.
    pub fn to_name(&self) -> Option<Name> {
        match self {
            StreamFilter::Identity => None,
            StreamFilter::Flate => Some(Name::new("FlateDecode")),
            StreamFilter::RunLength => Some(Name::new("RunLengthDecode")),
            StreamFilter::Dct => Some(Name::new("DCTDecode")),
            StreamFilter::Other(name) => Some(name.clone()),
        }
    }

    /// Whether decoding this filter loses no information.
    pub fn is_lossless(&self) -> bool {
        !matches!(self, StreamFilter::Dct)
    }
}

/// Predictor applied before compression and reversed after decompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predictor {
    /// No prediction (1)
    None,
    /// TIFF predictor 2: per-row left delta
    Tiff2,
    /// PNG predictor with a fixed or per-row filter code (10-15)
    Png(u8),
}

impl Predictor {
    /// Map the /Predictor integer onto a predictor variant.
    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            1 => Ok(Predictor::None),
            2 => Ok(Predictor::Tiff2),
            10..=15 => Ok(Predictor::Png(code as u8)),
            other => Err(Error::Decode(format!("unknown predictor code {}", other))),
        }
    }

    /// The /Predictor integer for this variant.
    pub fn code(&self) -> i64 {
        match self {
            Predictor::None => 1,
            Predictor::Tiff2 => 2,
            Predictor::Png(code) => *code as i64,
        }
    }
}

/// An encoded stream: the raw bytes plus the filter and predictor settings
/// required to decode them.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedStream {
    data: Vec<u8>,
    filter: StreamFilter,
    predictor: Predictor,
    columns: usize,
}

impl EncodedStream {
    /// Wrap already-encoded bytes.
    pub fn new(data: Vec<u8>, filter: StreamFilter, predictor: Predictor, columns: usize) -> Self {
        EncodedStream {
            data,
            filter,
            predictor,
            columns,
        }
    }

    /// Unencoded passthrough bytes.
    pub fn identity(data: Vec<u8>) -> Self {
        EncodedStream::new(data, StreamFilter::Identity, Predictor::None, 1)
    }

    /// Build from a stream dictionary (reading /Filter and /DecodeParms)
    /// plus the raw bytes.
    ///
    /// A /Filter array with more than one element is rejected as
    /// `UnsupportedFilter`; single-element arrays are unwrapped.
    pub fn from_parts(dict: Option<&Dict>, data: Vec<u8>) -> Result<Self> {
        let filter = match dict.and_then(|d| d.get(&Name::new("Filter"))) {
            None => StreamFilter::Identity,
            Some(Value::Name(name)) => StreamFilter::from_name(name),
            Some(Value::Array(filters)) => match filters.as_slice() {
                [] => StreamFilter::Identity,
                [Value::Name(name)] => StreamFilter::from_name(name),
                _ => {
                    return Err(Error::UnsupportedFilter(format!(
                        "filter chain of {} filters",
                        filters.len()
                    )))
                }
            },
            Some(other) => {
                return Err(Error::Decode(format!(
                    "/Filter must be a name or array, found {}",
                    other.type_name()
                )))
            }
        };

        let (predictor, columns) = match dict.and_then(|d| d.get(&Name::new("DecodeParms"))) {
            Some(Value::Dictionary(parms)) => {
                let predictor = parms
                    .get(&Name::new("Predictor"))
                    .and_then(Value::as_integer)
                    .map(Predictor::from_code)
                    .transpose()?
                    .unwrap_or(Predictor::None);
                let columns = parms
                    .get(&Name::new("Columns"))
                    .and_then(Value::as_integer)
                    .unwrap_or(1) as usize;
                (predictor, columns.max(1))
            }
            _ => (Predictor::None, 1),
        };

        Ok(EncodedStream::new(data, filter, predictor, columns))
    }

    /// Encode plain bytes.
    ///
    /// Prediction picks PNG-Up for multi-row data and PNG-Sub for a single
    /// row; compression is Flate; plain data stays Identity.
    pub fn create(plain: &[u8], compress: bool, predict: bool, columns: usize) -> Result<Self> {
        if predict {
            let columns = columns.max(1);
            let rows = plain.len() / columns;
            let predictor = if rows > 1 {
                Predictor::Png(12)
            } else {
                Predictor::Png(11)
            };
            let predicted = encode_predictor(plain, predictor, columns)?;
            Ok(EncodedStream::new(
                flate_compress(&predicted),
                StreamFilter::Flate,
                predictor,
                columns,
            ))
        } else if compress {
            Ok(EncodedStream::new(
                flate_compress(plain),
                StreamFilter::Flate,
                Predictor::None,
                1,
            ))
        } else {
            Ok(EncodedStream::identity(plain.to_vec()))
        }
    }

    /// The encoded bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume into the encoded bytes.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the encoded payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The filter in effect.
    pub fn filter(&self) -> &StreamFilter {
        &self.filter
    }

    /// Whether decoding loses no information.
    pub fn is_lossless(&self) -> bool {
        self.filter.is_lossless()
    }

    /// Decompress and de-predict, returning the plain bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let decompressed = match &self.filter {
            StreamFilter::Identity => self.data.clone(),
            StreamFilter::Flate => flate_decompress(&self.data)?,
            StreamFilter::RunLength => rle_decode(&self.data)?,
            StreamFilter::Dct => {
                return Err(Error::UnsupportedFilter("DCTDecode".to_string()))
            }
            StreamFilter::Other(name) => {
                return Err(Error::UnsupportedFilter(name.as_str().to_string()))
            }
        };
        decode_predictor(&decompressed, self.predictor, self.columns)
    }

    /// Stream dictionary entries describing this encoding.
    pub fn meta_dict(&self) -> Dict {
        let mut meta = Dict::new();
        meta.insert(Name::new("Length"), Value::Integer(self.len() as i64));
        if let Some(name) = self.filter.to_name() {
            meta.insert(Name::new("Filter"), Value::Name(name));
        }
        if self.predictor != Predictor::None {
            let mut parms = Dict::new();
            parms.insert(Name::new("Columns"), Value::Integer(self.columns as i64));
            parms.insert(Name::new("Predictor"), Value::Integer(self.predictor.code()));
            meta.insert(Name::new("DecodeParms"), Value::Dictionary(parms));
        }
        meta
    }

    /// Rewrite /Length, /Filter and /DecodeParms in a stream dictionary,
    /// removing keys that no longer apply.
    pub fn update_dict(&self, dict: &mut Dict) {
        dict.shift_remove(&Name::new("Filter"));
        dict.shift_remove(&Name::new("DecodeParms"));
        for (key, value) in self.meta_dict() {
            dict.insert(key, value);
        }
    }
}
