//! A builder for a [`Tree`].

use crate::Range;
use crate::Tree;
use crate::tree;

/// The default number of equal-width children a bin may be split into.
pub const DEFAULT_ARITY: usize = 5;

/// The default width (in positions) at or below which a bin is never split.
pub const DEFAULT_MIN_BIN_SIZE: u64 = 10_000;

/// A builder for a [`Tree`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Builder {
    /// The number of equal-width children a bin may be split into.
    arity: usize,

    /// The width at or below which a bin is never split.
    min_bin_size: u64,
}

impl Builder {
    /// Sets the number of equal-width children a bin may be split into.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::tree::Builder;
    ///
    /// let builder = Builder::default().with_arity(4);
    /// assert_eq!(builder.arity(), 4);
    /// ```
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self
    }

    /// Sets the width at or below which a bin is never split.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::tree::Builder;
    ///
    /// let builder = Builder::default().with_min_bin_size(1_000);
    /// assert_eq!(builder.min_bin_size(), 1_000);
    /// ```
    pub fn with_min_bin_size(mut self, min_bin_size: u64) -> Self {
        self.min_bin_size = min_bin_size;
        self
    }

    /// Gets the configured arity.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Gets the configured minimum bin size.
    pub fn min_bin_size(&self) -> u64 {
        self.min_bin_size
    }

    /// Builds an empty [`Tree`] whose root covers `range`.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::Range;
    /// use regionindex::tree::Builder;
    ///
    /// let tree = Builder::default().try_build(Range::new(1, 1_000_000))?;
    /// assert_eq!(tree.nodes().len(), 1);
    /// assert_eq!(tree.root().range(), Range::new(1, 1_000_000));
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn try_build(&self, range: Range) -> Result<Tree, tree::Error> {
        Tree::try_new(self.arity, self.min_bin_size, range)
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            arity: DEFAULT_ARITY,
            min_bin_size: DEFAULT_MIN_BIN_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let builder = Builder::default();
        assert_eq!(builder.arity(), 5);
        assert_eq!(builder.min_bin_size(), 10_000);
    }

    #[test]
    fn invalid_arity() {
        let err = Builder::default()
            .with_arity(1)
            .try_build(Range::new(1, 100))
            .unwrap_err();

        assert!(matches!(err, tree::Error::InvalidArity(1)));
        assert_eq!(err.to_string(), "invalid arity: expected at least 2, found 1");
    }

    #[test]
    fn empty_root_range() {
        let err = Builder::default()
            .try_build(Range::new(100, 1))
            .unwrap_err();

        assert!(matches!(err, tree::Error::EmptyRange(_)));
        assert_eq!(err.to_string(), "the root range is empty: 100-1");
    }
}
