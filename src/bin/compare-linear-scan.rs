//! A binary to comprehensively test that queries against an indexed file
//! return exactly what a brute-force interval search returns.
//!
//! ```shell
//! cargo run --release --bin=compare-linear-scan --features=binaries -- -n 100000
//! ```
//!
//! It achieves this by carrying out the following:
//!
//! * Randomly generating `n` features across a set of randomly sized
//!   chromosomes (weighted by chromosome length), writing them to an indexed
//!   file on disk, and reopening that file.
//! * Randomly generating query intervals, answering each of them with both
//!   the index and [`rust_lapper`], and ensuring all of the results match.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt as _;
use byteorder::WriteBytesExt as _;
use clap::Parser;
use clap_verbosity_flag::Verbosity;
use rand::Rng;
use rand::rngs::ThreadRng;
use regionindex::Range;
use regionindex::Reader;
use regionindex::Region;
use regionindex::Writer;
use regionindex::codec;
use regionindex::codec::Decoder;
use regionindex::codec::Encoder;
use regionindex::tree;
use rust_lapper::Interval;
use rust_lapper::Lapper;
use tempdir::TempDir;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_log::AsTrace as _;
use tracing_subscriber::EnvFilter;
use weighted_rand::builder::NewBuilder;
use weighted_rand::builder::WalkerTableBuilder;
use weighted_rand::table::WalkerTable;

////////////////////////////////////////////////////////////////////////////////////////
// Features
////////////////////////////////////////////////////////////////////////////////////////

/// A randomly generated feature.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct Feature {
    /// The order in which the feature was generated.
    id: u64,

    /// The first base covered by the feature.
    start: u64,

    /// The last base covered by the feature.
    end: u64,
}

impl Feature {
    /// Gets the range covered by the feature.
    fn range(&self) -> Range {
        Range::new(self.start, self.end)
    }
}

/// Stores features as three little endian integers.
#[derive(Debug)]
struct FeatureCodec;

impl Encoder for FeatureCodec {
    type Record = Feature;

    fn range(&self, record: &Feature) -> Range {
        record.range()
    }

    fn encode(&self, record: &Feature, writer: &mut dyn Write) -> io::Result<()> {
        writer.write_u64::<LittleEndian>(record.id)?;
        writer.write_u64::<LittleEndian>(record.start)?;
        writer.write_u64::<LittleEndian>(record.end)
    }
}

impl Decoder for FeatureCodec {
    type Record = Feature;

    fn decode(&self, reader: &mut dyn Read) -> Result<(Feature, Range), codec::Error> {
        let feature = Feature {
            id: reader.read_u64::<LittleEndian>()?,
            start: reader.read_u64::<LittleEndian>()?,
            end: reader.read_u64::<LittleEndian>()?,
        };

        if feature.start > feature.end {
            return Err(codec::Error::Malformed(format!(
                "feature {} ends before it starts",
                feature.id
            )));
        }

        Ok((feature, feature.range()))
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Choosing random locations
////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
struct Chromosomes {
    /// The chromosome names and lengths.
    chromosomes: Box<[(String, u32)]>,

    /// The weighted distribution.
    weights: WalkerTable,

    /// The random number generator.
    rng: ThreadRng,
}

impl Chromosomes {
    /// Creates `n` chromosomes with random lengths.
    fn random(n: usize, max_length: u32) -> Self {
        let mut rng = ThreadRng::default();

        let chromosomes = (1..=n)
            .map(|i| (format!("chr{i}"), rng.gen_range(1_000..=max_length.max(1_000))))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let weights = chromosomes
            .iter()
            .map(|(_, weight)| *weight)
            .collect::<Vec<_>>();

        Self {
            chromosomes,
            weights: WalkerTableBuilder::new(&weights).build(),
            rng,
        }
    }

    /// Picks a chromosome weighted by its length and a random interval on it
    /// that is at most `max_length` bases long.
    fn random_interval(&mut self, max_length: u64) -> (usize, Range) {
        let index = self.weights.next();
        let (_, size) = &self.chromosomes[index];
        let size = *size as u64;

        let start = self.rng.gen_range(1..=size);
        let length = self.rng.gen_range(0..max_length.max(1));
        let end = start.saturating_add(length).min(size);

        (index, Range::new(start, end))
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Linear scan
////////////////////////////////////////////////////////////////////////////////////////

/// Brute-force interval search, one [`Lapper`] per chromosome.
struct LinearScan(Vec<Lapper<u64, u64>>);

impl LinearScan {
    /// Creates a new [`LinearScan`] over the features of each chromosome.
    fn new(features: &[Vec<Feature>]) -> Self {
        Self(
            features
                .iter()
                .map(|features| {
                    // NOTE: lapper intervals are half-open, while feature
                    // ranges include their last base.
                    Lapper::new(
                        features
                            .iter()
                            .map(|feature| Interval {
                                start: feature.start,
                                stop: feature.end + 1,
                                val: feature.id,
                            })
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    /// Gets the ids of every feature on `chromosome` intersecting `range`.
    fn find(&self, chromosome: usize, range: Range) -> Vec<u64> {
        let mut ids = self.0[chromosome]
            .find(range.from(), range.to() + 1)
            .map(|interval| interval.val)
            .collect::<Vec<_>>();
        ids.sort_unstable();
        ids
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Main
////////////////////////////////////////////////////////////////////////////////////////

/// Throws the proverbial kitchen sink at the index.
#[derive(Parser)]
struct Args {
    /// The number of features to generate.
    #[arg(short, default_value_t = 100_000)]
    n: usize,

    /// The number of queries to run.
    #[arg(long, default_value_t = 10_000)]
    queries: usize,

    /// The number of chromosomes to spread the features across.
    #[arg(short, long, default_value_t = 24)]
    chromosomes: usize,

    /// The maximum length of a chromosome.
    #[arg(long, default_value_t = 250_000_000)]
    max_chromosome_length: u32,

    /// The maximum length of a feature.
    #[arg(long, default_value_t = 50_000)]
    max_feature_length: u64,

    /// The maximum length of a query.
    #[arg(long, default_value_t = 1_000_000)]
    max_query_length: u64,

    /// The number of slots each bin is divided into.
    #[arg(long, default_value_t = tree::builder::DEFAULT_ARITY)]
    arity: usize,

    /// The size at or below which bins are no longer divided.
    #[arg(long, default_value_t = tree::builder::DEFAULT_MIN_BIN_SIZE)]
    min_bin_size: u64,

    /// If desired, a permanent directory within which to write the indexed
    /// file. This is generally for debugging only.
    #[arg(short, long)]
    directory: Option<PathBuf>,

    #[command(flatten)]
    verbose: Verbosity,
}

fn throw(args: &Args) -> Result<()> {
    // The temporary directory is removed when this goes out of scope.
    let temporary = TempDir::new("regionindex").context("creating temporary directory")?;
    let directory = match &args.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).context("creating working directory")?;
            directory.clone()
        }
        None => temporary.path().to_path_buf(),
    };

    let path = directory.join("features.ridx");
    info!("indexed file: {}", path.display());

    let mut chromosomes = Chromosomes::random(args.chromosomes, args.max_chromosome_length);
    let mut features = vec![Vec::new(); args.chromosomes];

    for id in 0..args.n as u64 {
        let (chromosome, range) = chromosomes.random_interval(args.max_feature_length);
        features[chromosome].push(Feature {
            id,
            start: range.from(),
            end: range.to(),
        });
    }

    info!("writing {} features", args.n);

    let builder = tree::Builder::default()
        .with_arity(args.arity)
        .with_min_bin_size(args.min_bin_size);
    let file = File::create(&path).context("creating indexed file")?;
    let mut writer = Writer::try_new(BufWriter::new(file), FeatureCodec, builder)?;

    for ((name, length), features) in chromosomes.chromosomes.iter().zip(&features) {
        let id = writer.add_chromosome(name, Range::new(1, *length as u64))?;

        for feature in features {
            writer.push(id, feature)?;
        }
    }

    writer
        .finish()?
        .into_inner()
        .context("flushing indexed file")?;

    let file = File::open(&path).context("reopening indexed file")?;
    let mut reader = Reader::try_new(BufReader::new(file))?;

    for (id, name) in reader.dictionary().iter() {
        // SAFETY: every chromosome in the dictionary has a tree.
        let tree = reader.tree(id).unwrap();
        info!(
            "{name}: {} features in {} bins (depth {})",
            tree.len(),
            tree.nodes().len(),
            tree.depth()
        );
    }

    let scan = LinearScan::new(&features);
    let mut mismatches = 0usize;

    info!("running {} queries", args.queries);

    for _ in 0..args.queries {
        let (chromosome, range) = chromosomes.random_interval(args.max_query_length);
        let name = &chromosomes.chromosomes[chromosome].0;

        let indexed = reader
            .query(&FeatureCodec, name, range)
            .with_context(|| format!("querying {name}:{range}"))?;

        if indexed.windows(2).any(|pair| pair[0].start > pair[1].start) {
            bail!("results for {name}:{range} are not sorted by start");
        }

        let mut indexed = indexed.into_iter().map(|f| f.id).collect::<Vec<_>>();
        indexed.sort_unstable();

        let expected = scan.find(chromosome, range);

        if indexed != expected {
            mismatches += 1;
            error!(
                "{name}:{range}: index returned {} features, linear scan returned {}",
                indexed.len(),
                expected.len()
            );
        }
    }

    // A region spanning the end of the first chromosome through the start of
    // the second exercises the multi-chromosome path.
    if args.chromosomes > 1 {
        let (_, first) = &chromosomes.chromosomes[0];
        let cut = (*first as u64 / 2).max(1);
        let region = Region::new(0, cut, 1, 5_000);

        let hits = reader.query_region(&FeatureCodec, &region)?;
        let mut counts = HashMap::<u32, usize>::new();

        for (id, _) in &hits {
            *counts.entry(*id).or_default() += 1;
        }

        let expected = [
            scan.find(0, Range::new(cut, *first as u64)).len(),
            scan.find(1, Range::new(1, 4_999)).len(),
        ];

        for (id, expected) in expected.into_iter().enumerate() {
            let found = counts.get(&(id as u32)).copied().unwrap_or_default();

            if found != expected {
                mismatches += 1;
                error!("{region}: chromosome {id} returned {found} features, expected {expected}");
            }
        }
    }

    if args.directory.is_some() {
        warn!("indexed file was kept at {}", path.display());
    }

    if mismatches > 0 {
        error!("the index and the linear scan disagreed on {mismatches} queries");
        std::process::exit(1);
    }

    println!(
        "the index and the linear scan matched in 100.00% of cases (n = {})",
        args.queries
    );

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    assert!(args.n > 0, "`n` must be greater than 0!");
    assert!(args.chromosomes > 0, "`chromosomes` must be greater than 0!");

    match std::env::var("RUST_LOG") {
        Ok(_) => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .init(),
        Err(_) => tracing_subscriber::fmt()
            .with_max_level(args.verbose.log_level_filter().as_trace())
            .init(),
    };

    throw(&args)
}
