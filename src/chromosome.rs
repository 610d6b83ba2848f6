//! Chromosome names and ids.
//!
//! Data sources disagree on how references are named (`chr1` versus `1`,
//! `chrM` versus `MT`). Names are _homogenized_ before they are matched so
//! that these conventions do not prevent a lookup from succeeding.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

/// Matches a leading, case-insensitive `chr` prefix.
static PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    // SAFETY: the pattern is a constant that is known to compile.
    Regex::new(r"^(?i:chr)(.+)$").unwrap()
});

/// The homogenized name of the mitochondrial chromosome.
const MITOCHONDRIAL: &str = "MT";

/// Homogenizes a chromosome name.
///
/// # Examples
///
/// ```
/// use regionindex::chromosome::homogenize;
///
/// assert_eq!(homogenize("chr1"), "1");
/// assert_eq!(homogenize("CHRX"), "X");
/// assert_eq!(homogenize("chrM"), "MT");
/// assert_eq!(homogenize("MT"), "MT");
/// assert_eq!(homogenize("scaffold_12"), "scaffold_12");
/// ```
pub fn homogenize(name: &str) -> Cow<'_, str> {
    let name = match PREFIX.captures(name).and_then(|groups| groups.get(1)) {
        Some(rest) => rest.as_str(),
        None => name,
    };

    match name {
        "M" | "m" => Cow::Borrowed(MITOCHONDRIAL),
        _ => Cow::Borrowed(name),
    }
}

////////////////////////////////////////////////////////////////////////////////////////
// Errors
////////////////////////////////////////////////////////////////////////////////////////

/// An error related to a [`Dictionary`].
#[derive(Debug)]
pub enum Error {
    /// A chromosome with the same homogenized name was already registered.
    Duplicate(String, u32),

    /// Every chromosome id has been handed out.
    Exhausted,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Duplicate(name, id) => {
                write!(f, "chromosome `{name}` is already registered with id {id}")
            }
            Error::Exhausted => write!(f, "no more chromosome ids are available"),
        }
    }
}

impl std::error::Error for Error {}

////////////////////////////////////////////////////////////////////////////////////////
// Dictionary
////////////////////////////////////////////////////////////////////////////////////////

/// A mapping between chromosome names and chromosome ids.
///
/// Ids are handed out in registration order, starting at zero.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Dictionary {
    /// The registered names, indexed by id.
    names: Vec<String>,

    /// The ids, keyed by homogenized name.
    ids: HashMap<String, u32>,
}

impl Dictionary {
    /// Registers a chromosome and returns its id.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::chromosome::Dictionary;
    ///
    /// let mut dictionary = Dictionary::default();
    /// assert_eq!(dictionary.push("chr1")?, 0);
    /// assert_eq!(dictionary.push("chr2")?, 1);
    ///
    /// // `1` and `chr1` name the same chromosome.
    /// assert!(dictionary.push("1").is_err());
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn push(&mut self, name: impl Into<String>) -> Result<u32, Error> {
        let name = name.into();
        let key = homogenize(&name).into_owned();

        if let Some(id) = self.ids.get(&key) {
            return Err(Error::Duplicate(name, *id));
        }

        let id = u32::try_from(self.names.len()).map_err(|_| Error::Exhausted)?;
        self.ids.insert(key, id);
        self.names.push(name);

        Ok(id)
    }

    /// Gets the id of a chromosome by any of its names.
    ///
    /// # Examples
    ///
    /// ```
    /// use regionindex::chromosome::Dictionary;
    ///
    /// let mut dictionary = Dictionary::default();
    /// dictionary.push("chrM")?;
    ///
    /// assert_eq!(dictionary.get("MT"), Some(0));
    /// assert_eq!(dictionary.get("chrM"), Some(0));
    /// assert_eq!(dictionary.get("chr1"), None);
    ///
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(homogenize(name).as_ref()).copied()
    }

    /// Gets the registered name of a chromosome.
    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    /// Gets the number of registered chromosomes.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns whether no chromosomes are registered.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns an iterator over the chromosome ids and registered names.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> + '_ {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| (id as u32, name.as_str()))
    }
}
