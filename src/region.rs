//! Bounding boxes over the (chromosome, base) coordinate space.
//!
//! A [`Region`] starts at a (chromosome id, base) pair and ends at another
//! (chromosome id, base) pair. Coordinates are ordered lexicographically: the
//! chromosome id is compared first, and the base is only consulted when the
//! chromosome ids are equal. The end of a region is exclusive at the base
//! level, so a region that ends exactly where another one starts does not
//! overlap it.
//!
//! The predicates in this module are the building blocks for pruning and
//! merging bounding boxes in R-tree style indices that span many references.

use std::num::ParseIntError;
use std::str::FromStr;

use tracing::warn;

/// The delimiter between the start and the end of a region in its textual
/// form.
pub const DELIMITER: char = '-';

/// The delimiter between the chromosome id and the base of a coordinate in the
/// textual form of a region.
pub const COORDINATE_DELIMITER: char = ':';

/// A (chromosome id, base) pair.
///
/// Tuples compare lexicographically, which is exactly the ordering used by
/// every predicate in this module.
pub type Coordinate = (u32, u64);

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error associated with parsing a [`Region`].
#[derive(Debug)]
pub enum ParseError {
    /// The delimiter between the start and the end was missing.
    MissingDelimiter(String),

    /// The delimiter between a chromosome id and a base was missing.
    MissingCoordinateDelimiter(String),

    /// An invalid chromosome id.
    InvalidChromosomeId(ParseIntError),

    /// An invalid base.
    InvalidBase(ParseIntError),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingDelimiter(value) => {
                write!(f, "missing delimiter \"{DELIMITER}\" in region: \"{value}\"")
            }
            ParseError::MissingCoordinateDelimiter(value) => write!(
                f,
                "missing delimiter \"{COORDINATE_DELIMITER}\" in coordinate: \"{value}\""
            ),
            ParseError::InvalidChromosomeId(err) => write!(f, "invalid chromosome id: {err}"),
            ParseError::InvalidBase(err) => write!(f, "invalid base: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

////////////////////////////////////////////////////////////////////////////////////////
// Comparison
////////////////////////////////////////////////////////////////////////////////////////

/// The relationship between a region and a test region.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Comparison {
    /// The region lies entirely below the test region.
    DisjointBelow,

    /// The region straddles the lower boundary of the test region.
    IntersectsBelow,

    /// The region lies entirely within the test region.
    Contained,

    /// The region straddles the upper boundary of the test region.
    IntersectsAbove,

    /// The region lies entirely above the test region.
    DisjointAbove,
}

impl Comparison {
    /// Gets the numeric code for the comparison.
    ///
    /// Negative codes point below the test region and positive codes point
    /// above it, with a magnitude of two for disjoint regions.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::region::Comparison;
    ///
    /// assert_eq!(Comparison::DisjointBelow.code(), -2);
    /// assert_eq!(Comparison::Contained.code(), 0);
    /// assert_eq!(Comparison::IntersectsAbove.code(), 1);
    /// ```
    pub fn code(&self) -> i8 {
        match self {
            Comparison::DisjointBelow => -2,
            Comparison::IntersectsBelow => -1,
            Comparison::Contained => 0,
            Comparison::IntersectsAbove => 1,
            Comparison::DisjointAbove => 2,
        }
    }

    /// Returns whether the two regions share no coordinates.
    pub fn is_disjoint(&self) -> bool {
        matches!(self, Comparison::DisjointBelow | Comparison::DisjointAbove)
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Comparison::DisjointBelow => write!(f, "disjoint below"),
            Comparison::IntersectsBelow => write!(f, "intersects below"),
            Comparison::Contained => write!(f, "contained"),
            Comparison::IntersectsAbove => write!(f, "intersects above"),
            Comparison::DisjointAbove => write!(f, "disjoint above"),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Region
////////////////////////////////////////////////////////////////////////////////////////

/// A bounding box spanning from a start coordinate to an end coordinate.
///
/// A region is expected to start at or before its end. This is not checked
/// at construction: callers that combine regions must preserve it themselves.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Region {
    /// The chromosome id of the start coordinate.
    start_chrom_id: u32,

    /// The base of the start coordinate.
    start_base: u64,

    /// The chromosome id of the end coordinate.
    end_chrom_id: u32,

    /// The base of the end coordinate.
    end_base: u64,
}

impl Region {
    /// Creates a new [`Region`].
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let region = Region::new(1, 100, 1, 200);
    /// assert_eq!(region.start(), (1, 100));
    /// assert_eq!(region.end(), (1, 200));
    /// ```
    pub fn new(start_chrom_id: u32, start_base: u64, end_chrom_id: u32, end_base: u64) -> Self {
        Self {
            start_chrom_id,
            start_base,
            end_chrom_id,
            end_base,
        }
    }

    /// Creates a new [`Region`] from a start and an end coordinate.
    pub fn from_coordinates(start: Coordinate, end: Coordinate) -> Self {
        Self::new(start.0, start.1, end.0, end.1)
    }

    /// Gets the chromosome id of the start coordinate.
    pub fn start_chrom_id(&self) -> u32 {
        self.start_chrom_id
    }

    /// Gets the base of the start coordinate.
    pub fn start_base(&self) -> u64 {
        self.start_base
    }

    /// Gets the chromosome id of the end coordinate.
    pub fn end_chrom_id(&self) -> u32 {
        self.end_chrom_id
    }

    /// Gets the base of the end coordinate.
    pub fn end_base(&self) -> u64 {
        self.end_base
    }

    /// Gets the start coordinate.
    pub fn start(&self) -> Coordinate {
        (self.start_chrom_id, self.start_base)
    }

    /// Gets the end coordinate.
    pub fn end(&self) -> Coordinate {
        (self.end_chrom_id, self.end_base)
    }

    /// Returns whether the region starts at or before its end.
    pub fn is_well_formed(&self) -> bool {
        self.start() <= self.end()
    }

    /// Returns whether this region lies entirely within `test`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let chromosome = Region::new(1, 0, 1, 1_000);
    /// assert!(Region::new(1, 0, 1, 1_000).contained_in(&chromosome));
    /// assert!(Region::new(1, 10, 1, 20).contained_in(&chromosome));
    /// assert!(!Region::new(1, 10, 2, 20).contained_in(&chromosome));
    /// ```
    pub fn contained_in(&self, test: &Region) -> bool {
        self.start() >= test.start() && self.end() <= test.end()
    }

    /// Returns whether this region straddles the lower boundary of `test`.
    ///
    /// Some part of this region must lie strictly below the start of `test`
    /// while some other part lies above it. A region ending exactly at the
    /// start of `test` does not intersect it.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let test = Region::new(1, 150, 1, 300);
    /// assert!(Region::new(1, 100, 1, 200).intersects_below(&test));
    /// assert!(!Region::new(1, 100, 1, 150).intersects_below(&test));
    /// ```
    pub fn intersects_below(&self, test: &Region) -> bool {
        self.start() < test.start() && self.end() > test.start()
    }

    /// Returns whether this region straddles the upper boundary of `test`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let test = Region::new(1, 150, 1, 300);
    /// assert!(Region::new(1, 250, 2, 10).intersects_above(&test));
    /// assert!(!Region::new(1, 300, 2, 10).intersects_above(&test));
    /// ```
    pub fn intersects_above(&self, test: &Region) -> bool {
        self.end() > test.end() && self.start() < test.end()
    }

    /// Returns whether this region ends at or before the start of `test`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let test = Region::new(1, 100, 1, 200);
    /// assert!(Region::new(1, 0, 1, 100).disjoint_below(&test));
    /// assert!(Region::new(0, 500, 0, 900).disjoint_below(&test));
    /// assert!(!Region::new(1, 0, 1, 101).disjoint_below(&test));
    /// ```
    pub fn disjoint_below(&self, test: &Region) -> bool {
        self.end() <= test.start()
    }

    /// Returns whether this region starts at or after the end of `test`.
    pub fn disjoint_above(&self, test: &Region) -> bool {
        self.start() >= test.end()
    }

    /// Classifies this region relative to `test`.
    ///
    /// Containment is checked first, then disjointness, then partial
    /// intersection. A region that encloses `test` on both sides is
    /// classified as [`Comparison::IntersectsBelow`].
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::region::Comparison;
    /// use regionindex::Region;
    ///
    /// let a = Region::new(1, 100, 1, 200);
    /// let b = Region::new(1, 150, 1, 300);
    ///
    /// assert_eq!(a.compare(&b), Comparison::IntersectsBelow);
    /// assert_eq!(b.compare(&a), Comparison::IntersectsAbove);
    /// assert_eq!(a.compare(&a), Comparison::Contained);
    /// ```
    pub fn compare(&self, test: &Region) -> Comparison {
        match self.classify(test) {
            Some(comparison) => comparison,
            None => {
                debug_assert!(false, "region {self} could not be classified against {test}");
                warn!(
                    region = %self,
                    test = %test,
                    "region could not be classified; treating it as intersecting"
                );

                match self.start() < test.start() {
                    true => Comparison::IntersectsBelow,
                    false => Comparison::IntersectsAbove,
                }
            }
        }
    }

    /// Classifies this region relative to `test`, returning [`None`] when no
    /// predicate applies.
    pub(crate) fn classify(&self, test: &Region) -> Option<Comparison> {
        if self.contained_in(test) {
            Some(Comparison::Contained)
        } else if self.disjoint_below(test) {
            Some(Comparison::DisjointBelow)
        } else if self.disjoint_above(test) {
            Some(Comparison::DisjointAbove)
        } else if self.intersects_below(test) {
            Some(Comparison::IntersectsBelow)
        } else if self.intersects_above(test) {
            Some(Comparison::IntersectsAbove)
        } else {
            None
        }
    }

    /// Gets the smallest region that contains both this region and `test`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let a = Region::new(1, 100, 1, 200);
    /// let b = Region::new(2, 5, 3, 10);
    ///
    /// assert_eq!(a.extremes(&b), Region::new(1, 100, 3, 10));
    /// assert_eq!(b.extremes(&a), Region::new(1, 100, 3, 10));
    /// ```
    pub fn extremes(&self, test: &Region) -> Region {
        Region::from_coordinates(
            self.start().min(test.start()),
            self.end().max(test.end()),
        )
    }

    /// Trims this region so that it starts at the provided cut point.
    ///
    /// Returns [`None`] if the cut point lies outside of this region.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let region = Region::new(1, 100, 3, 50);
    /// assert_eq!(region.upper_extreme(2, 0), Some(Region::new(2, 0, 3, 50)));
    /// assert_eq!(region.upper_extreme(1, 99), None);
    /// assert_eq!(region.upper_extreme(4, 0), None);
    /// ```
    pub fn upper_extreme(&self, start_chrom_id: u32, start_base: u64) -> Option<Region> {
        let cut = (start_chrom_id, start_base);

        if cut < self.start() || cut > self.end() {
            return None;
        }

        Some(Region::from_coordinates(cut, self.end()))
    }

    /// Trims this region so that it ends at the provided cut point.
    ///
    /// Returns [`None`] if the cut point lies outside of this region.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Region;
    ///
    /// let region = Region::new(1, 100, 3, 50);
    /// assert_eq!(region.lower_extreme(2, 0), Some(Region::new(1, 100, 2, 0)));
    /// assert_eq!(region.lower_extreme(3, 51), None);
    /// assert_eq!(region.lower_extreme(0, 0), None);
    /// ```
    pub fn lower_extreme(&self, end_chrom_id: u32, end_base: u64) -> Option<Region> {
        let cut = (end_chrom_id, end_base);

        if cut < self.start() || cut > self.end() {
            return None;
        }

        Some(Region::from_coordinates(self.start(), cut))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{}{}{}{}{}{}",
            self.start_chrom_id,
            COORDINATE_DELIMITER,
            self.start_base,
            DELIMITER,
            self.end_chrom_id,
            COORDINATE_DELIMITER,
            self.end_base
        )
    }
}

/// Parses a single `chromosome:base` coordinate.
fn parse_coordinate(s: &str) -> Result<Coordinate, ParseError> {
    let (chrom_id, base) = s
        .split_once(COORDINATE_DELIMITER)
        .ok_or_else(|| ParseError::MissingCoordinateDelimiter(s.into()))?;

    let chrom_id = chrom_id
        .trim()
        .parse()
        .map_err(ParseError::InvalidChromosomeId)?;
    let base = base.trim().parse().map_err(ParseError::InvalidBase)?;

    Ok((chrom_id, base))
}

impl FromStr for Region {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(DELIMITER)
            .ok_or_else(|| ParseError::MissingDelimiter(s.into()))?;

        Ok(Region::from_coordinates(
            parse_coordinate(start)?,
            parse_coordinate(end)?,
        ))
    }
}
