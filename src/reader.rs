//! A reader for indexed record files.

use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt as _;
use tracing::debug;

use crate::Range;
use crate::Region;
use crate::Tree;
use crate::chromosome;
use crate::chromosome::Dictionary;
use crate::codec::Decoder;
use crate::query;
use crate::query::Getter;
use crate::region::Comparison;
use crate::tree::table;
use crate::writer::MAGIC;
use crate::writer::VERSION;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Reader`].
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// The file did not start with the expected magic bytes.
    InvalidMagic([u8; 4]),

    /// The file was written with an unsupported format version.
    UnsupportedVersion(u32),

    /// A chromosome name was cut short.
    TruncatedName(usize, usize),

    /// A chromosome could not be registered.
    Chromosome(chromosome::Error),

    /// A node table could not be read.
    Table(table::Error),

    /// A query failed.
    Query(query::Error),

    /// The requested chromosome is not present in the file.
    UnknownChromosome(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::InvalidMagic(magic) => write!(
                f,
                "invalid magic bytes: expected {:?}, found {:?}",
                MAGIC, magic
            ),
            Error::UnsupportedVersion(version) => write!(
                f,
                "unsupported format version: expected {VERSION}, found {version}"
            ),
            Error::TruncatedName(expected, found) => write!(
                f,
                "truncated chromosome name: expected {expected} bytes, found {found} bytes"
            ),
            Error::Chromosome(err) => write!(f, "chromosome error: {err}"),
            Error::Table(err) => write!(f, "node table error: {err}"),
            Error::Query(err) => write!(f, "query error: {err}"),
            Error::UnknownChromosome(name) => write!(f, "unknown chromosome: `{name}`"),
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
// Reader
////////////////////////////////////////////////////////////////////////////////////////

/// A reader for an indexed record file.
///
/// Opening a reader loads every chromosome's tree from the index section.
/// Queries then only seek to and read the bins that can hold matching
/// records.
#[derive(Debug)]
pub struct Reader<R>
where
    R: Read + Seek,
{
    /// The inner reader.
    inner: R,

    /// The chromosomes in the file.
    dictionary: Dictionary,

    /// The trees, indexed by chromosome id.
    trees: Vec<Tree>,
}

impl<R> Reader<R>
where
    R: Read + Seek,
{
    /// Opens an indexed file whose header begins at the current position of
    /// `inner`.
    pub fn try_new(mut inner: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        inner.read_exact(&mut magic)?;

        if magic != MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let version = inner.read_u32::<LittleEndian>()?;

        if version != VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let index_offset = inner.read_u64::<LittleEndian>()?;
        inner.seek(SeekFrom::Start(index_offset))?;

        let count = inner.read_u32::<LittleEndian>()?;
        let mut dictionary = Dictionary::default();
        let mut trees = Vec::new();

        for _ in 0..count {
            let len = inner.read_u32::<LittleEndian>()? as usize;

            let mut name = String::new();
            (&mut inner).take(len as u64).read_to_string(&mut name)?;

            if name.len() != len {
                return Err(Error::TruncatedName(len, name.len()));
            }

            dictionary.push(name).map_err(Error::Chromosome)?;
            trees.push(table::read(&mut inner).map_err(Error::Table)?);
        }

        debug!(index_offset, chromosomes = trees.len(), "opened indexed file");

        Ok(Self {
            inner,
            dictionary,
            trees,
        })
    }

    /// Gets the chromosomes in the file.
    pub fn dictionary(&self) -> &Dictionary {
        &self.dictionary
    }

    /// Gets the tree for a chromosome id.
    pub fn tree(&self, id: u32) -> Option<&Tree> {
        self.trees.get(id as usize)
    }

    /// Gets a mutable reference to the inner reader.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consumes self and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Resolves a chromosome name (in any naming convention) to its id.
    fn resolve(&self, chromosome: &str) -> Result<u32> {
        self.dictionary
            .get(chromosome)
            .ok_or_else(|| Error::UnknownChromosome(chromosome.into()))
    }

    /// Fetches every record on `chromosome` whose range intersects `range`,
    /// sorted by start.
    pub fn query<D>(&mut self, decoder: &D, chromosome: &str, range: Range) -> Result<Vec<D::Record>>
    where
        D: Decoder + ?Sized,
    {
        let id = self.resolve(chromosome)?;
        let tree = &self.trees[id as usize];

        Getter::new(tree, decoder)
            .query(&mut self.inner, range)
            .map_err(Error::Query)
    }

    /// Reads every record stored directly in one bin of `chromosome`'s tree.
    pub fn read_bin<D>(
        &mut self,
        decoder: &D,
        chromosome: &str,
        index: usize,
    ) -> Result<Vec<(D::Record, Range)>>
    where
        D: Decoder + ?Sized,
    {
        let id = self.resolve(chromosome)?;
        let tree = &self.trees[id as usize];

        Getter::new(tree, decoder)
            .read_bin(&mut self.inner, index)
            .map_err(Error::Query)
    }

    /// Fetches every record that intersects a region spanning one or more
    /// chromosomes, as `(chromosome id, record)` pairs sorted by chromosome
    /// and then by start.
    ///
    /// The end base of `region` is exclusive.
    pub fn query_region<D>(&mut self, decoder: &D, region: &Region) -> Result<Vec<(u32, D::Record)>>
    where
        D: Decoder + ?Sized,
    {
        let mut results = Vec::new();

        for (id, tree) in self.trees.iter().enumerate() {
            let id = id as u32;
            let root = tree.root().range();
            let span = Region::new(id, root.from(), id, root.to().saturating_add(1));

            let clipped = match clip(&span, region) {
                Some(clipped) => clipped,
                None => continue,
            };

            let range = Range::new(clipped.start_base(), clipped.end_base() - 1);
            let records = Getter::new(tree, decoder)
                .query(&mut self.inner, range)
                .map_err(Error::Query)?;

            results.extend(records.into_iter().map(|record| (id, record)));
        }

        Ok(results)
    }
}

/// Clips the span of a chromosome to the part that lies within `region`.
///
/// Returns [`None`] when they do not overlap.
fn clip(span: &Region, region: &Region) -> Option<Region> {
    let clipped = match span.compare(region) {
        Comparison::DisjointBelow | Comparison::DisjointAbove => return None,
        Comparison::Contained => *span,
        Comparison::IntersectsBelow | Comparison::IntersectsAbove => {
            let mut clipped = *span;

            if region.start() > clipped.start() {
                clipped = clipped.upper_extreme(region.start_chrom_id(), region.start_base())?;
            }

            if region.end() < clipped.end() {
                clipped = clipped.lower_extreme(region.end_chrom_id(), region.end_base())?;
            }

            clipped
        }
    };

    (clipped.start() < clipped.end()).then_some(clipped)
}
