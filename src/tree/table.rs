//! Serialization of a [`Tree`]'s node table.
//!
//! The table is laid out as follows (all integers little endian):
//!
//! | Field          | Type     |
//! |----------------|----------|
//! | magic          | `[u8; 4]` (`BTBL`) |
//! | arity          | `u32`    |
//! | min bin size   | `u64`    |
//! | node count     | `u64`    |
//!
//! followed by one row per node, in index order:
//!
//! | Field          | Type     |
//! |----------------|----------|
//! | index          | `u64`    |
//! | from           | `u64`    |
//! | to             | `u64`    |
//! | size           | `u64`    |
//! | subtree size   | `u64`    |
//! | start byte     | `i64` (`-1` when unassigned) |

use std::io;
use std::io::Read;
use std::io::Write;

use byteorder::LittleEndian;
use byteorder::ReadBytesExt as _;
use byteorder::WriteBytesExt as _;

use crate::Range;
use crate::Tree;
use crate::tree;
use crate::tree::Entry;

/// The magic bytes that open a node table.
pub const MAGIC: [u8; 4] = *b"BTBL";

/// The largest arity a node table may declare.
pub const MAX_ARITY: usize = u16::MAX as usize;

/// The start byte written for bins whose records were never written.
const UNASSIGNED: i64 = -1;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to reading or writing a node table.
#[derive(Debug)]
pub enum Error {
    /// An I/O error.
    Io(io::Error),

    /// The table did not start with the expected magic bytes.
    InvalidMagic([u8; 4]),

    /// A value did not fit into the type it is stored as.
    Overflow(&'static str, u64),

    /// The arity is outside of the supported bounds.
    InvalidArity(u64),

    /// A negative start byte other than the unassigned marker.
    InvalidStartByte(usize, i64),

    /// The node table could not be turned back into a tree.
    Tree(tree::Error),
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
            Error::Overflow(field, value) => {
                write!(f, "the {field} ({value}) does not fit into its field")
            }
            Error::InvalidArity(arity) => write!(
                f,
                "invalid arity: expected at most {MAX_ARITY}, found {arity}"
            ),
            Error::InvalidStartByte(index, start_byte) => {
                write!(f, "invalid start byte for node {index}: {start_byte}")
            }
            Error::Tree(err) => write!(f, "tree error: {err}"),
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
// Reading and writing
////////////////////////////////////////////////////////////////////////////////////////

/// Writes the node table of `tree` to `writer`.
///
/// # Examples
///
/// ```
/// use regionindex::Range;
/// use regionindex::tree::Builder;
/// use regionindex::tree::table;
///
/// let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
/// tree.insert(Range::new(50, 120));
///
/// let mut buffer = Vec::new();
/// table::write(&mut buffer, &tree)?;
///
/// let rehydrated = table::read(&mut &buffer[..])?;
/// assert_eq!(rehydrated, tree);
///
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn write<W>(writer: &mut W, tree: &Tree) -> Result<()>
where
    W: Write,
{
    if tree.arity() > MAX_ARITY {
        return Err(Error::InvalidArity(tree.arity() as u64));
    }

    let arity = tree.arity() as u32;

    writer.write_all(&MAGIC)?;
    writer.write_u32::<LittleEndian>(arity)?;
    writer.write_u64::<LittleEndian>(tree.min_bin_size())?;
    writer.write_u64::<LittleEndian>(tree.nodes().len() as u64)?;

    for entry in tree.entries() {
        let start_byte = match entry.start_byte {
            Some(start_byte) => i64::try_from(start_byte)
                .map_err(|_| Error::Overflow("start byte", start_byte))?,
            None => UNASSIGNED,
        };

        writer.write_u64::<LittleEndian>(entry.index as u64)?;
        writer.write_u64::<LittleEndian>(entry.range.from())?;
        writer.write_u64::<LittleEndian>(entry.range.to())?;
        writer.write_u64::<LittleEndian>(entry.size)?;
        writer.write_u64::<LittleEndian>(entry.subtree_size)?;
        writer.write_i64::<LittleEndian>(start_byte)?;
    }

    Ok(())
}

/// Reads a node table from `reader` and rehydrates the [`Tree`] it describes.
pub fn read<R>(reader: &mut R) -> Result<Tree>
where
    R: Read,
{
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;

    if magic != MAGIC {
        return Err(Error::InvalidMagic(magic));
    }

    let arity = reader.read_u32::<LittleEndian>()?;

    // Every node allocates one slot per arity, so the bound is checked before
    // any node is built.
    if arity as usize > MAX_ARITY {
        return Err(Error::InvalidArity(u64::from(arity)));
    }

    let arity = arity as usize;
    let min_bin_size = reader.read_u64::<LittleEndian>()?;
    let count = reader.read_u64::<LittleEndian>()?;

    // The count comes straight from the file, so it only serves as a hint.
    let mut entries = Vec::with_capacity(count.min(1 << 16) as usize);

    for _ in 0..count {
        let index = usize::try_from(reader.read_u64::<LittleEndian>()?)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let from = reader.read_u64::<LittleEndian>()?;
        let to = reader.read_u64::<LittleEndian>()?;
        let size = reader.read_u64::<LittleEndian>()?;
        let subtree_size = reader.read_u64::<LittleEndian>()?;

        let start_byte = match reader.read_i64::<LittleEndian>()? {
            UNASSIGNED => None,
            value if value < 0 => return Err(Error::InvalidStartByte(index, value)),
            value => Some(value as u64),
        };

        entries.push(Entry {
            index,
            range: Range::new(from, to),
            size,
            subtree_size,
            start_byte,
        });
    }

    Tree::try_from_entries(arity, min_bin_size, entries).map_err(Error::Tree)
}
