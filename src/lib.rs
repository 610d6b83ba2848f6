//! `regionindex` is a crate for indexing large, ordered record files by the
//! genomic intervals their records cover.
//!
//! The crate provides three main points of entry:
//!
//! - Comparing and trimming multi-chromosome [`Region`]s.
//! - Building an interval [`Tree`] that assigns every record to the smallest
//!   bin that fully contains it.
//! - Writing and reading indexed files, where the records of each bin are
//!   stored contiguously and the trees are persisted alongside them.
//!
//! ## Trees and bins
//!
//! A [`Tree`] recursively partitions the [`Range`] of a chromosome into a
//! fixed number of equal-width slots (the _arity_). Inserting an interval
//! walks down from the root and stops at the deepest node whose range fully
//! contains it, creating nodes on the way as needed. Descent also stops once a
//! node is no larger than the minimum bin size. Each node is a _bin_: it counts
//! the records stored directly within it and the records stored anywhere
//! beneath it, which lets queries skip empty subtrees entirely.
//!
//! Trees are built through a [`tree::Builder`].
//!
//! ```
//! use regionindex::Range;
//! use regionindex::tree::Builder;
//!
//! let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
//!
//! let bin = tree.insert(Range::new(150_000, 150_100));
//! assert_eq!(tree.node(bin).unwrap().range(), Range::new(144_001, 152_000));
//!
//! // Intervals that straddle a slot boundary stay higher up in the tree.
//! let bin = tree.insert(Range::new(199_000, 201_000));
//! assert!(tree.node(bin).unwrap().is_root());
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Indexed files
//!
//! The record payloads are opaque to this crate: you supply a
//! [`codec::Encoder`] when writing and a [`codec::Decoder`] when reading.
//! A [`Writer`] bins each pushed record and, once finished, lays the records
//! out bin by bin followed by the index. A [`Reader`] loads the index and only
//! seeks to the bins whose ranges intersect a query.
//!
//! ```
//! use std::io::Cursor;
//! use std::io::Read;
//! use std::io::Write;
//!
//! use regionindex::Range;
//! use regionindex::Reader;
//! use regionindex::Writer;
//! use regionindex::codec;
//! use regionindex::codec::Encoder;
//!
//! /// Stores each range as two little endian integers.
//! struct Ranges;
//!
//! impl Encoder for Ranges {
//!     type Record = Range;
//!
//!     fn range(&self, record: &Range) -> Range {
//!         *record
//!     }
//!
//!     fn encode(&self, record: &Range, writer: &mut dyn Write) -> std::io::Result<()> {
//!         writer.write_all(&record.from().to_le_bytes())?;
//!         writer.write_all(&record.to().to_le_bytes())
//!     }
//! }
//!
//! let mut writer = Writer::try_new(Cursor::new(Vec::new()), Ranges, Default::default())?;
//! let chr1 = writer.add_chromosome("chr1", Range::new(1, 1_000_000))?;
//!
//! for (from, to) in [(500, 600), (10, 20), (700_000, 700_050)] {
//!     writer.push(chr1, &Range::new(from, to))?;
//! }
//!
//! let mut file = writer.finish()?;
//! file.set_position(0);
//!
//! let decoder = |reader: &mut dyn Read| -> Result<(Range, Range), codec::Error> {
//!     let mut buffer = [0u8; 8];
//!     reader.read_exact(&mut buffer)?;
//!     let from = u64::from_le_bytes(buffer);
//!     reader.read_exact(&mut buffer)?;
//!     let range = Range::new(from, u64::from_le_bytes(buffer));
//!     Ok((range, range))
//! };
//!
//! let mut reader = Reader::try_new(file)?;
//! let hits = reader.query(&decoder, "1", Range::new(1, 550))?;
//! assert_eq!(hits, vec![Range::new(10, 20), Range::new(500, 600)]);
//!
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![warn(missing_debug_implementations)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::broken_intra_doc_links)]

pub mod chromosome;
pub mod codec;
pub mod query;
pub mod range;
pub mod reader;
pub mod region;
pub mod tree;
pub mod writer;

pub use range::Range;
pub use region::Region;
pub use tree::Tree;

pub use self::reader::Reader;
pub use self::writer::Writer;
