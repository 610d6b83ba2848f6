//! A writer for indexed record files.
//!
//! An indexed file is laid out as follows (all integers little endian):
//!
//! 1. A header: the magic bytes `RIDX`, a `u32` format version, and the
//!    `u64` offset of the index section.
//! 2. The records, grouped by bin. The records of each bin are contiguous and
//!    begin at the start byte recorded for that bin.
//! 3. The index section: a `u32` chromosome count, followed by each
//!    chromosome's `u32` name length, its UTF-8 name, and its
//!    [node table](crate::tree::table).

use std::io;
use std::io::Seek;
use std::io::SeekFrom;
use std::io::Write;

use byteorder::LittleEndian;
use byteorder::WriteBytesExt as _;
use tracing::debug;

use crate::Range;
use crate::Tree;
use crate::chromosome;
use crate::chromosome::Dictionary;
use crate::codec::Encoder;
use crate::tree;
use crate::tree::table;

/// The magic bytes that open an indexed file.
pub const MAGIC: [u8; 4] = *b"RIDX";

/// The version of the file format written by this crate.
pub const VERSION: u32 = 1;

/// The offset of the index offset field, relative to the start of the header.
const INDEX_OFFSET_FIELD: u64 = 8;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Writer`].
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// A chromosome could not be registered.
    Chromosome(chromosome::Error),

    /// A tree error.
    Tree(tree::Error),

    /// A node table could not be written.
    Table(table::Error),

    /// A record was pushed for a chromosome that was never registered.
    UnknownChromosome(u32),

    /// A chromosome name is too long to be stored.
    NameTooLong(usize),

    /// A record's range is empty or lies outside of its chromosome's range.
    OutOfRange(u32, Range),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::Chromosome(err) => write!(f, "chromosome error: {err}"),
            Error::Tree(err) => write!(f, "tree error: {err}"),
            Error::Table(err) => write!(f, "node table error: {err}"),
            Error::UnknownChromosome(id) => write!(f, "unknown chromosome id: {id}"),
            Error::NameTooLong(len) => {
                write!(f, "chromosome name is too long: {len} bytes")
            }
            Error::OutOfRange(id, range) => {
                write!(f, "record range {range} is outside of chromosome {id}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Writer
////////////////////////////////////////////////////////////////////////////////////////

/// The tree and buffered records for a single chromosome.
#[derive(Debug)]
struct Pending {
    /// The tree being built.
    tree: Tree,

    /// The encoded records, indexed by the bin they were assigned to.
    bins: Vec<Vec<u8>>,
}

/// Writes records into bins and produces an indexed file.
///
/// Records are buffered per bin until [`Writer::finish()`] is called, at
/// which point every bin is flushed in index order and stamped with the
/// offset where its records begin.
#[derive(Debug)]
pub struct Writer<W, E>
where
    W: Write + Seek,
    E: Encoder,
{
    /// The inner writer.
    inner: W,

    /// The position of the header within the inner writer.
    origin: u64,

    /// The record encoder.
    encoder: E,

    /// The builder for each chromosome's tree.
    builder: tree::Builder,

    /// The registered chromosomes.
    dictionary: Dictionary,

    /// The pending trees, indexed by chromosome id.
    chromosomes: Vec<Pending>,
}

impl<W, E> Writer<W, E>
where
    W: Write + Seek,
    E: Encoder,
{
    /// Creates a new [`Writer`] and writes a placeholder header.
    pub fn try_new(mut inner: W, encoder: E, builder: tree::Builder) -> Result<Self> {
        let origin = inner.stream_position()?;

        inner.write_all(&MAGIC)?;
        inner.write_u32::<LittleEndian>(VERSION)?;
        inner.write_u64::<LittleEndian>(0)?;

        Ok(Self {
            inner,
            origin,
            encoder,
            builder,
            dictionary: Dictionary::default(),
            chromosomes: Vec::new(),
        })
    }

    /// Gets the registered chromosomes.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Gets the tree for a registered chromosome.
    pub fn tree(&self, id: u32) -> Option<&Tree> {
        self.chromosomes.get(id as usize).map(|pending| &pending.tree)
    }

    /// Registers a chromosome whose records all fall within `range` and
    /// returns its id.
    pub fn add_chromosome(&mut self, name: &str, range: Range) -> Result<u32> {
        if u32::try_from(name.len()).is_err() {
            return Err(Error::NameTooLong(name.len()));
        }

        let tree = self.builder.try_build(range).map_err(Error::Tree)?;
        let id = self.dictionary.push(name).map_err(Error::Chromosome)?;

        self.chromosomes.push(Pending {
            tree,
            bins: Vec::new(),
        });

        Ok(id)
    }

    /// Assigns a record to a bin within its chromosome's tree and buffers its
    /// encoded bytes.
    ///
    /// The record's range must be non-empty and lie within the range the
    /// chromosome was registered with.
    pub fn push(&mut self, chromosome: u32, record: &E::Record) -> Result<()> {
        let pending = self
            .chromosomes
            .get_mut(chromosome as usize)
            .ok_or(Error::UnknownChromosome(chromosome))?;

        let range = self.encoder.range(record);

        if !pending.tree.root().range().contains(&range) {
            return Err(Error::OutOfRange(chromosome, range));
        }

        let bin = pending.tree.insert(range);

        if pending.bins.len() <= bin {
            pending.bins.resize_with(bin + 1, Vec::new);
        }

        self.encoder.encode(record, &mut pending.bins[bin])?;
        Ok(())
    }

    /// Writes every bin and the index section, patches the header, and
    /// returns the inner writer.
    pub fn finish(self) -> Result<W> {
        let Self {
            mut inner,
            origin,
            dictionary,
            mut chromosomes,
            ..
        } = self;

        for pending in &mut chromosomes {
            for (index, bin) in pending.bins.iter().enumerate() {
                if bin.is_empty() {
                    continue;
                }

                let start_byte = inner.stream_position()?;
                pending
                    .tree
                    .set_start_byte(index, start_byte)
                    .map_err(Error::Tree)?;
                inner.write_all(bin)?;
            }
        }

        let index_offset = inner.stream_position()?;
        inner.write_u32::<LittleEndian>(chromosomes.len() as u32)?;

        for ((id, name), pending) in dictionary.iter().zip(&chromosomes) {
            debug!(
                chromosome = name,
                id,
                records = pending.tree.len(),
                bins = pending.tree.nodes().len(),
                "writing node table"
            );

            inner.write_u32::<LittleEndian>(name.len() as u32)?;
            inner.write_all(name.as_bytes())?;
            table::write(&mut inner, &pending.tree).map_err(Error::Table)?;
        }

        inner.seek(SeekFrom::Start(origin + INDEX_OFFSET_FIELD))?;
        inner.write_u64::<LittleEndian>(index_offset)?;
        inner.seek(SeekFrom::End(0))?;
        inner.flush()?;

        debug!(index_offset, chromosomes = chromosomes.len(), "finished indexed file");

        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    /// Encodes ranges as two little endian `u64`s.
    #[derive(Debug)]
    struct RangeEncoder;

    impl Encoder for RangeEncoder {
        type Record = Range;

        fn range(&self, record: &Range) -> Range {
            *record
        }

        fn encode(&self, record: &Range, writer: &mut dyn Write) -> io::Result<()> {
            writer.write_u64::<LittleEndian>(record.from())?;
            writer.write_u64::<LittleEndian>(record.to())
        }
    }

    #[test]
    fn bins_are_written_in_index_order() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut writer = Writer::try_new(Cursor::new(Vec::new()), RangeEncoder, Default::default())?;
        let chr1 = writer.add_chromosome("chr1", Range::new(1, 1_000_000))?;

        writer.push(chr1, &Range::new(150_000, 150_100))?;
        writer.push(chr1, &Range::new(199_000, 201_000))?;
        writer.push(chr1, &Range::new(10, 20))?;

        let bytes = writer.finish()?.into_inner();
        assert_eq!(&bytes[..4], b"RIDX");
        assert_eq!(&bytes[4..8], &1u32.to_le_bytes());

        // The root bin (index 0) comes first, right after the header.
        assert_eq!(&bytes[16..24], &199_000u64.to_le_bytes());
        assert_eq!(&bytes[32..40], &150_000u64.to_le_bytes());
        assert_eq!(&bytes[48..56], &10u64.to_le_bytes());

        let index_offset = u64::from_le_bytes(bytes[8..16].try_into()?);
        assert_eq!(index_offset, 64);

        Ok(())
    }

    #[test]
    fn unknown_chromosomes() {
        let mut writer =
            Writer::try_new(Cursor::new(Vec::new()), RangeEncoder, Default::default()).unwrap();

        let err = writer.push(3, &Range::new(1, 2)).unwrap_err();
        assert!(matches!(err, Error::UnknownChromosome(3)));
    }

    #[test]
    fn records_outside_the_chromosome() {
        let mut writer =
            Writer::try_new(Cursor::new(Vec::new()), RangeEncoder, Default::default()).unwrap();
        let chr1 = writer.add_chromosome("chr1", Range::new(1, 1_000_000)).unwrap();

        let err = writer.push(chr1, &Range::new(2_000_000, 2_000_010)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(0, _)));
        assert_eq!(
            err.to_string(),
            "record range 2000000-2000010 is outside of chromosome 0"
        );

        let err = writer.push(chr1, &Range::new(999_999, 1_000_005)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(0, _)));

        let err = writer.push(chr1, &Range::new(20, 10)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(0, _)));

        // Records touching both ends of the chromosome are accepted.
        writer.push(chr1, &Range::new(1, 1_000_000)).unwrap();
        assert_eq!(writer.tree(chr1).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_chromosomes() {
        let mut writer =
            Writer::try_new(Cursor::new(Vec::new()), RangeEncoder, Default::default()).unwrap();
        writer.add_chromosome("chr1", Range::new(1, 100)).unwrap();

        let err = writer.add_chromosome("1", Range::new(1, 100)).unwrap_err();
        assert!(matches!(
            err,
            Error::Chromosome(chromosome::Error::Duplicate(_, 0))
        ));
    }

    #[test]
    fn empty_chromosome_ranges() {
        let mut writer =
            Writer::try_new(Cursor::new(Vec::new()), RangeEncoder, Default::default()).unwrap();

        let err = writer.add_chromosome("chr1", Range::new(100, 1)).unwrap_err();
        assert!(matches!(err, Error::Tree(tree::Error::EmptyRange(_))));
        assert!(writer.dictionary().is_empty());
    }
}
