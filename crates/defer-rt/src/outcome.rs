// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The terminal value of a cell (conc.core/OC1-OC2): success(T) or failure(error).

use crate::error::CellError;

/// Either `Success(T)` or `Failure(error)`. The terminal value a
/// [`crate::Cell`] resolves to.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Success(T),
    Failure(CellError),
}

impl<T> Outcome<T> {
    pub fn success(value: T) -> Self {
        Outcome::Success(value)
    }

    pub fn failure(error: CellError) -> Self {
        Outcome::Failure(error)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// Borrowing view: `Ok(&T)` or `Err(&CellError)`.
    pub fn as_result(&self) -> Result<&T, &CellError> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
        }
    }

    /// Consumes the outcome, yielding a `Result`.
    ///
    /// This is the one primitive the rest of the crate builds on: the
    /// source spec's `unwrapOrThrow` is Rust's `?`/`.unwrap()` applied to
    /// this `Result`.
    pub fn into_result(self) -> Result<T, CellError> {
        match self {
            Outcome::Success(v) => Ok(v),
            Outcome::Failure(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Success(v) => Outcome::Success(f(v)),
            Outcome::Failure(e) => Outcome::Failure(e),
        }
    }
}

impl<T: Clone> Outcome<T> {
    /// Clone the outcome. Kept as an explicit method (rather than relying
    /// purely on `#[derive(Clone)]`) because aggregators need to hand the
    /// same outcome to multiple result cells (`first_completed_of` fans one
    /// winning outcome out to exactly one result, but internal bookkeeping
    /// keeps a copy around for diagnostics).
    pub fn cloned(&self) -> Self {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CellError;

    #[test]
    fn success_predicates() {
        let o = Outcome::success(42);
        assert!(o.is_success());
        assert!(!o.is_failure());
        assert_eq!(o.into_result().unwrap(), 42);
    }

    #[test]
    fn failure_predicates() {
        let o: Outcome<i32> = Outcome::failure(CellError::match_failure());
        assert!(o.is_failure());
        assert!(o.into_result().is_err());
    }

    #[test]
    fn map_preserves_failure() {
        let o: Outcome<i32> = Outcome::failure(CellError::empty_reduce());
        let mapped = o.map(|v| v + 1);
        assert!(mapped.is_failure());
    }

    #[test]
    fn map_transforms_success() {
        let o = Outcome::success(1);
        let mapped = o.map(|v| v + 1);
        assert_eq!(mapped.into_result().unwrap(), 2);
    }
}
