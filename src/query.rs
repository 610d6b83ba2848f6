//! Range queries against a tree and its backing record source.

use std::io;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::sync::Mutex;

use tracing::debug;

use crate::Range;
use crate::Tree;
use crate::codec;
use crate::codec::Decoder;

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a query.
#[derive(Debug)]
pub enum Error {
    /// The backing source could not be seeked or read.
    Io(io::Error),

    /// A record within the bin at the provided index could not be decoded.
    MalformedRecord(usize, String),

    /// No node exists at the provided index.
    NodeNotFound(usize),

    /// A bin holds records but was never assigned a start byte.
    MissingStartByte(usize),

    /// The lock guarding a shared source was poisoned.
    PoisonedSource,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::MalformedRecord(index, reason) => {
                write!(f, "malformed record in bin {index}: {reason}")
            }
            Error::NodeNotFound(index) => write!(f, "node not found: {index}"),
            Error::MissingStartByte(index) => {
                write!(f, "bin {index} holds records but has no start byte")
            }
            Error::PoisonedSource => write!(f, "the shared record source was poisoned"),
        }
    }
}

impl std::error::Error for Error {}

/// A [`Result`](std::result::Result) with an [`Error`].
type Result<T> = std::result::Result<T, Error>;

////////////////////////////////////////////////////////////////////////////////////////
// Getter
////////////////////////////////////////////////////////////////////////////////////////

/// Fetches the records overlapping a range by walking a [`Tree`].
///
/// A getter only reads the tree, so any number of getters may share one.
/// Each query either owns a cursor into the backing source
/// ([`Getter::query`]) or shares a single cursor behind a lock
/// ([`Getter::query_locked`]).
#[derive(Debug)]
pub struct Getter<'a, D>
where
    D: ?Sized,
{
    /// The tree to walk.
    tree: &'a Tree,

    /// The decoder for records in the backing source.
    decoder: &'a D,
}

impl<'a, D> Getter<'a, D>
where
    D: Decoder + ?Sized,
{
    /// Creates a new [`Getter`].
    pub fn new(tree: &'a Tree, decoder: &'a D) -> Self {
        Self { tree, decoder }
    }

    /// Gets the tree being walked.
    pub fn tree(&self) -> &Tree {
        self.tree
    }

    /// Fetches every record whose range intersects `range`, sorted by the
    /// start of each record's range.
    ///
    /// Bins that don't intersect `range` (or that hold no records at all) are
    /// never read. If any read fails, the whole query fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::io::Cursor;
    /// use std::io::Read;
    ///
    /// use byteorder::LittleEndian;
    /// use byteorder::ReadBytesExt as _;
    /// use regionindex::Range;
    /// use regionindex::codec;
    /// use regionindex::query::Getter;
    /// use regionindex::tree::Builder;
    ///
    /// let mut tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
    /// let bin = tree.insert(Range::new(50, 120));
    /// tree.set_start_byte(bin, 0)?;
    ///
    /// // The single record is stored as two little endian `u64`s.
    /// let mut source = Cursor::new([50u64.to_le_bytes(), 120u64.to_le_bytes()].concat());
    ///
    /// let decoder = |reader: &mut dyn Read| -> Result<(Range, Range), codec::Error> {
    ///     let from = reader.read_u64::<LittleEndian>()?;
    ///     let to = reader.read_u64::<LittleEndian>()?;
    ///     Ok((Range::new(from, to), Range::new(from, to)))
    /// };
    ///
    /// let getter = Getter::new(&tree, &decoder);
    /// assert_eq!(getter.query(&mut source, Range::new(1, 200))?, vec![Range::new(50, 120)]);
    /// assert!(getter.query(&mut source, Range::new(5_000_000, 6_000_000))?.is_empty());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn query<S>(&self, source: &mut S, range: Range) -> Result<Vec<D::Record>>
    where
        S: Read + Seek,
    {
        self.collect_sorted(range, |index| self.read_bin(source, index))
    }

    /// Fetches every record whose range intersects `range` from a source
    /// that is shared behind a lock.
    ///
    /// The lock is held while each bin is seeked to and read, so that
    /// concurrent queries never interleave their reads.
    pub fn query_locked<S>(&self, source: &Mutex<S>, range: Range) -> Result<Vec<D::Record>>
    where
        S: Read + Seek,
    {
        self.collect_sorted(range, |index| {
            let mut guard = source.lock().map_err(|_| Error::PoisonedSource)?;
            self.read_bin(&mut *guard, index)
        })
    }

    /// Reads every record stored directly in the bin at `index`, without any
    /// filtering.
    pub fn read_bin<S>(&self, source: &mut S, index: usize) -> Result<Vec<(D::Record, Range)>>
    where
        S: Read + Seek,
    {
        let node = self.tree.node(index).ok_or(Error::NodeNotFound(index))?;

        if node.size() == 0 {
            return Ok(Vec::new());
        }

        let start_byte = node.start_byte().ok_or(Error::MissingStartByte(index))?;
        source
            .seek(SeekFrom::Start(start_byte))
            .map_err(Error::Io)?;

        let mut records = Vec::new();

        for _ in 0..node.size() {
            let record = self.decoder.decode(source).map_err(|err| match err {
                codec::Error::Io(err) => Error::Io(err),
                codec::Error::Malformed(reason) => Error::MalformedRecord(index, reason),
            })?;

            records.push(record);
        }

        Ok(records)
    }

    /// Walks the tree from the root, reading bins through `read`, and sorts
    /// the matching records by start.
    fn collect_sorted<F>(&self, range: Range, mut read: F) -> Result<Vec<D::Record>>
    where
        F: FnMut(usize) -> Result<Vec<(D::Record, Range)>>,
    {
        let mut hits = Vec::new();

        if !range.is_empty() {
            let mut visited = 0usize;
            self.collect(0, &range, &mut read, &mut hits, &mut visited)?;
            debug!(%range, visited, hits = hits.len(), "finished range query");
        }

        hits.sort_by_key(|(_, hit)| hit.from());
        Ok(hits.into_iter().map(|(record, _)| record).collect())
    }

    /// Collects the matching records of the subtree rooted at `index`.
    fn collect<F>(
        &self,
        index: usize,
        range: &Range,
        read: &mut F,
        hits: &mut Vec<(D::Record, Range)>,
        visited: &mut usize,
    ) -> Result<()>
    where
        F: FnMut(usize) -> Result<Vec<(D::Record, Range)>>,
    {
        let node = self.tree.node(index).ok_or(Error::NodeNotFound(index))?;

        if !node.range().intersects(range) {
            return Ok(());
        }

        *visited += 1;

        // A bin's range only bounds where its records were inserted; each
        // record must still be checked against the query.
        if node.size() > 0 {
            hits.extend(
                read(index)?
                    .into_iter()
                    .filter(|(_, record)| record.intersects(range)),
            );
        }

        for child in self.tree.children(node) {
            if child.subtree_size() > 0 && child.range().intersects(range) {
                self.collect(child.index(), range, read, hits, visited)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;

    use byteorder::LittleEndian;
    use byteorder::ReadBytesExt as _;
    use byteorder::WriteBytesExt as _;
    use proptest::prelude::*;

    use super::*;
    use crate::tree::Builder;

    /// A record made of its id followed by its range.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    struct Feature {
        id: u64,
        range: Range,
    }

    /// Decodes [`Feature`]s stored as three little endian `u64`s.
    #[derive(Debug)]
    struct FeatureDecoder;

    impl Decoder for FeatureDecoder {
        type Record = Feature;

        fn decode(
            &self,
            reader: &mut dyn Read,
        ) -> std::result::Result<(Feature, Range), codec::Error> {
            let id = reader.read_u64::<LittleEndian>()?;
            let from = reader.read_u64::<LittleEndian>()?;
            let to = reader.read_u64::<LittleEndian>()?;

            if from > to {
                return Err(codec::Error::Malformed(format!("inverted range {from}-{to}")));
            }

            let range = Range::new(from, to);
            Ok((Feature { id, range }, range))
        }
    }

    /// Counts how many records are decoded.
    #[derive(Debug, Default)]
    struct CountingDecoder {
        calls: Cell<usize>,
    }

    impl Decoder for CountingDecoder {
        type Record = Feature;

        fn decode(
            &self,
            reader: &mut dyn Read,
        ) -> std::result::Result<(Feature, Range), codec::Error> {
            self.calls.set(self.calls.get() + 1);
            FeatureDecoder.decode(reader)
        }
    }

    /// Inserts `features` into `tree` and lays out their bytes grouped by bin,
    /// stamping each bin's start byte.
    fn layout(tree: &mut Tree, features: &[Feature]) -> Cursor<Vec<u8>> {
        let mut bins = Vec::<Vec<Feature>>::new();

        for feature in features {
            let bin = tree.insert(feature.range);

            if bins.len() <= bin {
                bins.resize(bin + 1, Vec::new());
            }

            bins[bin].push(*feature);
        }

        let mut buffer = Vec::new();

        for (index, bin) in bins.iter().enumerate() {
            if bin.is_empty() {
                continue;
            }

            tree.set_start_byte(index, buffer.len() as u64).unwrap();

            for feature in bin {
                buffer.write_u64::<LittleEndian>(feature.id).unwrap();
                buffer.write_u64::<LittleEndian>(feature.range.from()).unwrap();
                buffer.write_u64::<LittleEndian>(feature.range.to()).unwrap();
            }
        }

        Cursor::new(buffer)
    }

    /// Builds a tree over `1-1,000,000` with the default parameters.
    fn genome() -> Tree {
        Builder::default()
            .try_build(Range::new(1, 1_000_000))
            .unwrap()
    }

    /// Creates features numbered in order from `(start, end)` pairs.
    fn features(ranges: &[(u64, u64)]) -> Vec<Feature> {
        ranges
            .iter()
            .enumerate()
            .map(|(id, (from, to))| Feature {
                id: id as u64,
                range: Range::new(*from, *to),
            })
            .collect()
    }

    #[test]
    fn finds_a_single_interval() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();
        let features = features(&[(50, 120)]);
        let mut source = layout(&mut tree, &features);

        let getter = Getter::new(&tree, &FeatureDecoder);
        assert_eq!(getter.query(&mut source, Range::new(1, 200))?, features);
        assert!(getter
            .query(&mut source, Range::new(5_000_000, 6_000_000))?
            .is_empty());

        Ok(())
    }

    #[test]
    fn queries_outside_the_root_read_nothing()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();

        // One record in a leaf bin and one held by the root itself.
        let features = features(&[(50, 120), (199_990, 200_010)]);
        let mut source = layout(&mut tree, &features);
        assert_eq!(tree.root().size(), 1);

        let decoder = CountingDecoder::default();
        let getter = Getter::new(&tree, &decoder);

        assert!(getter
            .query(&mut source, Range::new(5_000_000, 6_000_000))?
            .is_empty());
        assert_eq!(decoder.calls.get(), 0);

        assert_eq!(getter.query(&mut source, Range::new(1, 200))?, vec![features[0]]);
        assert_eq!(decoder.calls.get(), 2);

        Ok(())
    }

    #[test]
    fn results_are_sorted_by_start() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();

        // The first interval spans root slots and lands in the root, which is
        // read before the deeper bins.
        let features = features(&[(199_000, 201_000), (150_000, 150_100), (10, 20)]);
        let mut source = layout(&mut tree, &features);

        let getter = Getter::new(&tree, &FeatureDecoder);
        let ids = getter
            .query(&mut source, Range::new(1, 1_000_000))?
            .into_iter()
            .map(|feature| feature.id)
            .collect::<Vec<_>>();

        assert_eq!(ids, vec![2, 1, 0]);

        Ok(())
    }

    #[test]
    fn records_in_intersecting_bins_are_filtered()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();
        let features = features(&[(10, 20), (7_000, 7_500)]);
        let mut source = layout(&mut tree, &features);

        // Both records share a bin, but only one overlaps the query.
        let getter = Getter::new(&tree, &FeatureDecoder);
        let hits = getter.query(&mut source, Range::new(15, 100))?;
        assert_eq!(hits, vec![features[0]]);

        Ok(())
    }

    #[test]
    fn empty_queries_and_trees_yield_nothing()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();
        let mut source = layout(&mut tree, &[]);

        let getter = Getter::new(&tree, &FeatureDecoder);
        assert!(getter.query(&mut source, Range::new(1, 1_000_000))?.is_empty());
        assert!(getter.query(&mut source, Range::new(200, 100))?.is_empty());

        Ok(())
    }

    #[test]
    fn reading_a_whole_bin() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut tree = genome();
        let features = features(&[(10, 20), (7_000, 7_500)]);
        let mut source = layout(&mut tree, &features);

        let getter = Getter::new(&tree, &FeatureDecoder);
        let records = getter.read_bin(&mut source, 3)?;
        assert_eq!(
            records,
            vec![
                (features[0], Range::new(10, 20)),
                (features[1], Range::new(7_000, 7_500))
            ]
        );

        assert!(getter.read_bin(&mut source, 0)?.is_empty());
        assert!(matches!(
            getter.read_bin(&mut source, 99),
            Err(Error::NodeNotFound(99))
        ));

        Ok(())
    }

    #[test]
    fn truncated_sources_fail_the_whole_query() {
        let mut tree = genome();
        let features = features(&[(10, 20), (7_000, 7_500)]);
        let source = layout(&mut tree, &features);

        let mut bytes = source.into_inner();
        bytes.truncate(30);
        let mut source = Cursor::new(bytes);

        let getter = Getter::new(&tree, &FeatureDecoder);
        let err = getter.query(&mut source, Range::new(1, 100)).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn malformed_records_are_reported() {
        let mut tree = genome();
        let bin = tree.insert(Range::new(10, 20));
        tree.set_start_byte(bin, 0).unwrap();

        let mut bytes = Vec::new();
        bytes.write_u64::<LittleEndian>(0).unwrap();
        bytes.write_u64::<LittleEndian>(20).unwrap();
        bytes.write_u64::<LittleEndian>(10).unwrap();
        let mut source = Cursor::new(bytes);

        let getter = Getter::new(&tree, &FeatureDecoder);
        let err = getter.query(&mut source, Range::new(1, 100)).unwrap_err();
        assert!(matches!(err, Error::MalformedRecord(3, _)));
        assert_eq!(
            err.to_string(),
            "malformed record in bin 3: inverted range 20-10"
        );
    }

    #[test]
    fn unstamped_bins_are_reported() {
        let mut tree = genome();
        tree.insert(Range::new(10, 20));

        let getter = Getter::new(&tree, &FeatureDecoder);
        let err = getter
            .query(&mut Cursor::new(Vec::new()), Range::new(1, 100))
            .unwrap_err();
        assert!(matches!(err, Error::MissingStartByte(3)));
    }

    #[test]
    fn shared_sources_serve_concurrent_queries() {
        let mut tree = genome();
        let features = features(&[
            (10, 20),
            (7_000, 7_500),
            (150_000, 150_100),
            (199_000, 201_000),
            (900_000, 900_050),
        ]);

        let source = Arc::new(Mutex::new(layout(&mut tree, &features)));
        let tree = Arc::new(tree);

        let handles = (0..4)
            .map(|_| {
                let tree = Arc::clone(&tree);
                let source = Arc::clone(&source);

                thread::spawn(move || {
                    let getter = Getter::new(&tree, &FeatureDecoder);
                    getter
                        .query_locked(&source, Range::new(1, 1_000_000))
                        .unwrap()
                        .len()
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 5);
        }
    }

    /// Intervals that fit inside the genome.
    fn intervals() -> impl Strategy<Value = Vec<(u64, u64)>> {
        prop::collection::vec(
            (1u64..1_000_000, 0u64..60_000)
                .prop_map(|(from, length)| (from, (from + length).min(1_000_000))),
            0..200,
        )
    }

    /// Queries over and slightly beyond the genome.
    fn query() -> impl Strategy<Value = Range> {
        (0u64..1_100_000, 0u64..300_000).prop_map(|(from, length)| Range::new(from, from + length))
    }

    proptest! {
        #[test]
        fn queries_match_a_linear_scan(ranges in intervals(), query in query()) {
            let mut tree = genome();
            let features = features(&ranges);
            let mut source = layout(&mut tree, &features);

            let getter = Getter::new(&tree, &FeatureDecoder);
            let mut found = getter
                .query(&mut source, query)
                .unwrap()
                .into_iter()
                .map(|feature| feature.id)
                .collect::<Vec<_>>();
            found.sort_unstable();

            let expected = features
                .iter()
                .filter(|feature| feature.range.intersects(&query))
                .map(|feature| feature.id)
                .collect::<Vec<_>>();

            prop_assert_eq!(found, expected);
        }

        #[test]
        fn queries_are_idempotent(ranges in intervals(), query in query()) {
            let mut tree = genome();
            let features = features(&ranges);
            let mut source = layout(&mut tree, &features);

            let getter = Getter::new(&tree, &FeatureDecoder);
            let first = getter.query(&mut source, query).unwrap();
            let second = getter.query(&mut source, query).unwrap();

            prop_assert_eq!(first, second);
        }
    }
}
