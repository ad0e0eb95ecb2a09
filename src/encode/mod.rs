//! Little-endian primitive encode/decode, in the same shape as the
//! teacher crate's own `encode` module: a pair of minimal traits plus one
//! `impl` block per primitive type, rather than a single monolithic
//! serializer. The wire format lives a level up, in `quantile::sketch`
//! and `quantile::compactor`, which compose these primitives into the
//! sketch's fixed-layout header and per-compactor records.

mod float;
mod int;
mod vec;

use std::io;

pub trait Encodable<W>
where
    W: io::Write,
{
    fn encode(&self, writer: &mut W) -> Result<(), DecodeError>;
}

pub trait Decodable<T, R>
where
    R: io::Read,
{
    fn decode(reader: &mut R) -> Result<T, DecodeError>;
}

/// Failure decoding a byte image produced by `to_byte_array`.
///
/// Unlike `SketchError` (argument misuse at the query surface), every
/// variant here concerns untrusted external bytes: a short read, or a
/// header that does not match the constants this crate writes.
#[derive(Debug)]
pub enum DecodeError {
    IOError(io::Error),
    LengthTooLong(usize),
    BadHeader(&'static str),
    BadCompactorCount(&'static str),
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> DecodeError {
        DecodeError::IOError(err)
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::IOError(err) => write!(f, "i/o error decoding sketch: {}", err),
            DecodeError::LengthTooLong(n) => write!(f, "encoded length {} exceeds limit", n),
            DecodeError::BadHeader(msg) => write!(f, "bad sketch header: {}", msg),
            DecodeError::BadCompactorCount(msg) => write!(f, "bad compactor count: {}", msg),
        }
    }
}

impl std::error::Error for DecodeError {}
