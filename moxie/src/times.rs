// vim: tw=80
//! Cardinality bounds.

use std::fmt::{self, Display};

use crate::{Error, Result};

/// How many times an expectation (or a whole group) may be consumed.
///
/// `max == None` means unbounded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Times {
    min: usize,
    max: Option<usize>
}

impl Times {
    /// Forbid any call.
    pub const fn never() -> Self {
        Times{min: 0, max: Some(0)}
    }

    pub const fn once() -> Self {
        Times{min: 1, max: Some(1)}
    }

    pub const fn at_least_once() -> Self {
        Times{min: 1, max: None}
    }

    pub const fn at_most_once() -> Self {
        Times{min: 0, max: Some(1)}
    }

    /// Allow any number of calls, including none.
    pub const fn any() -> Self {
        Times{min: 0, max: None}
    }

    pub const fn at_least(n: usize) -> Self {
        Times{min: n, max: None}
    }

    pub const fn at_most(n: usize) -> Self {
        Times{min: 0, max: Some(n)}
    }

    /// Require exactly `n` calls.
    pub const fn exactly(n: usize) -> Self {
        Times{min: n, max: Some(n)}
    }

    /// Require between `min` and `max` calls, inclusive.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if `min > max`.
    pub fn between(min: usize, max: usize) -> Result<Self> {
        if min > max {
            return Err(Error::config(format!(
                "minimum number of times ({min}) cannot be greater than \
                 maximum number of times ({max})")));
        }
        Ok(Times{min, max: Some(max)})
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    /// Is it required that this be consumed an exact number of times, or may
    /// it be satisfied by a range of counts?
    pub fn is_exact(&self) -> bool {
        self.max == Some(self.min)
    }

    /// Has a count of `n` reached the minimum?
    pub fn is_satisfied(&self, n: usize) -> bool {
        n >= self.min
    }

    /// Has a count of `n` reached the maximum, so that no further call may
    /// be accepted?
    pub fn is_exhausted(&self, n: usize) -> bool {
        self.max.is_some_and(|max| n >= max)
    }

    /// Does `n` lie within the bound?
    pub fn allows(&self, n: usize) -> bool {
        self.is_satisfied(n) && !self.max.is_some_and(|max| n > max)
    }
}

impl Default for Times {
    /// By default an expectation must be called at least once.
    fn default() -> Self {
        Times::at_least_once()
    }
}

impl Display for Times {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (0, Some(0)) => f.write_str("never"),
            (0, None) => f.write_str("any number of"),
            (min, None) => write!(f, "at least {min}"),
            (0, Some(max)) => write!(f, "at most {max}"),
            (min, Some(max)) if min == max => write!(f, "exactly {min}"),
            (min, Some(max)) => write!(f, "between {min} and {max}"),
        }
    }
}
