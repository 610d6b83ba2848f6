//! Boundaries to the record encoders and decoders.
//!
//! The index never interprets record payloads. Instead, the format of the
//! records stored in a backing file is supplied once per data source through
//! an [`Encoder`] (when writing) or a [`Decoder`] (when querying). Both report
//! the [`Range`] a record covers, which is all the index needs to know.

use std::io;
use std::io::Read;
use std::io::Write;

use crate::Range;

/// An error related to decoding a record.
#[derive(Debug)]
pub enum Error {
    /// The underlying source could not be read.
    Io(io::Error),

    /// The bytes read do not form a valid record.
    Malformed(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Malformed(reason) => write!(f, "malformed record: {reason}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Decodes a single record from the current position of a source.
///
/// Any function or closure with the signature
/// `Fn(&mut dyn Read) -> Result<(T, Range), codec::Error>` is a decoder.
///
/// # Examples
///
/// ```
/// use std::io::Read;
///
/// use regionindex::Range;
/// use regionindex::codec;
/// use regionindex::codec::Decoder;
///
/// let decoder = |reader: &mut dyn Read| -> Result<(u8, Range), codec::Error> {
///     let mut buffer = [0u8; 1];
///     reader.read_exact(&mut buffer)?;
///     Ok((buffer[0], Range::new(buffer[0] as u64, buffer[0] as u64)))
/// };
///
/// let (record, range) = decoder.decode(&mut &[42u8][..])?;
/// assert_eq!(record, 42);
/// assert_eq!(range, Range::new(42, 42));
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub trait Decoder {
    /// The type of record produced.
    type Record;

    /// Decodes the next record and the range it covers.
    fn decode(&self, reader: &mut dyn Read) -> Result<(Self::Record, Range), Error>;
}

impl<F, T> Decoder for F
where
    F: Fn(&mut dyn Read) -> Result<(T, Range), Error>,
{
    type Record = T;

    fn decode(&self, reader: &mut dyn Read) -> Result<(T, Range), Error> {
        self(reader)
    }
}

/// Encodes records into a sink.
pub trait Encoder {
    /// The type of record consumed.
    type Record;

    /// Gets the range covered by a record.
    fn range(&self, record: &Self::Record) -> Range;

    /// Encodes a record.
    fn encode(&self, record: &Self::Record, writer: &mut dyn Write) -> io::Result<()>;
}
