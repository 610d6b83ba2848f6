//! Single-chromosome ranges.

use std::num::ParseIntError;
use std::str::FromStr;

/// The delimiter between the two ends of a range in its textual form.
pub const DELIMITER: char = '-';

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error associated with parsing a [`Range`].
#[derive(Debug)]
pub enum ParseError {
    /// The delimiter between the start and the end was missing.
    MissingDelimiter(String),

    /// An invalid start position.
    InvalidFrom(ParseIntError),

    /// An invalid end position.
    InvalidTo(ParseIntError),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::MissingDelimiter(value) => {
                write!(f, "missing delimiter \"{DELIMITER}\" in range: \"{value}\"")
            }
            ParseError::InvalidFrom(err) => write!(f, "invalid start position: {err}"),
            ParseError::InvalidTo(err) => write!(f, "invalid end position: {err}"),
        }
    }
}

impl std::error::Error for ParseError {}

////////////////////////////////////////////////////////////////////////////////////////
// Range
////////////////////////////////////////////////////////////////////////////////////////

/// An inclusive range of positions on a single chromosome.
///
/// A range whose start lies after its end is _empty_: it has a length of
/// zero, and it neither contains nor intersects any other range.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Range {
    /// The first position in the range.
    from: u64,

    /// The last position in the range.
    to: u64,
}

impl Range {
    /// Creates a new [`Range`].
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    ///
    /// let range = Range::new(1, 1_000_000);
    /// assert_eq!(range.from(), 1);
    /// assert_eq!(range.to(), 1_000_000);
    /// ```
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// Gets the first position of the range.
    pub fn from(&self) -> u64 {
        self.from
    }

    /// Gets the last position of the range.
    pub fn to(&self) -> u64 {
        self.to
    }

    /// Gets the number of positions covered by the range.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    ///
    /// assert_eq!(Range::new(50, 120).len(), 71);
    /// assert_eq!(Range::new(7, 7).len(), 1);
    /// assert_eq!(Range::new(8, 7).len(), 0);
    /// ```
    pub fn len(&self) -> u64 {
        match self.is_empty() {
            true => 0,
            false => (self.to - self.from).saturating_add(1),
        }
    }

    /// Returns whether the range covers no positions at all.
    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Returns whether `other` lies entirely within this range.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    ///
    /// let bin = Range::new(1, 200_000);
    /// assert!(bin.contains(&Range::new(50, 120)));
    /// assert!(bin.contains(&bin));
    /// assert!(!bin.contains(&Range::new(199_999, 200_001)));
    /// ```
    pub fn contains(&self, other: &Range) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        other.from >= self.from && other.to <= self.to
    }

    /// Returns whether this range shares at least one position with `other`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    ///
    /// let query = Range::new(1, 200);
    /// assert!(query.intersects(&Range::new(50, 120)));
    /// assert!(query.intersects(&Range::new(200, 300)));
    /// assert!(!query.intersects(&Range::new(201, 300)));
    /// ```
    pub fn intersects(&self, other: &Range) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }

        other.from <= self.to && other.to >= self.from
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.from, DELIMITER, self.to)
    }
}

impl FromStr for Range {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(DELIMITER)
            .ok_or_else(|| ParseError::MissingDelimiter(s.into()))?;

        let from = from.trim().parse().map_err(ParseError::InvalidFrom)?;
        let to = to.trim().parse().map_err(ParseError::InvalidTo)?;

        Ok(Self { from, to })
    }
}
