// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Non-blocking combinators over a single [`Cell`] (conc.core/CB1-CB6).
//!
//! Modeled as a blanket extension trait the way `futures::FutureExt` sits
//! on top of `Future` — every method here is implemented once, in terms of
//! [`Cell::on_complete`], for anything that implements [`Cell`]. None of
//! them block: each returns a new, derived cell immediately and wires a
//! listener on the upstream to drive it.
//!
//! Derived cells inherit the upstream's remaining budget (`Cell::remaining`)
//! as their own timeout, anchored to the real system clock — a combinator
//! chain never outlives the cell it was built from. They use the default
//! tracing-backed [`crate::error::ErrorSink`]; the trait that created the
//! upstream cell doesn't expose its own sink, so there is nothing narrower
//! to inherit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::cell::{Cell, DeferredCell};
use crate::clock::SystemClock;
use crate::error::{CellError, ErrorSink, TracingErrorSink};
use crate::outcome::Outcome;

/// Combinators available on any [`Cell`], held behind an `Arc`.
pub trait CellExt<T: Send + Clone + 'static>: Cell<T> {
    /// Transforms a successful value; a failure passes through unchanged.
    /// A panicking `f` becomes a `ComputationFailure`.
    fn map<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> U + Send + 'static;

    /// Like [`Self::map`], but `f` returns another cell whose outcome
    /// becomes the derived cell's outcome — sequencing two dependent
    /// asynchronous steps.
    fn flat_map<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Arc<dyn Cell<U>> + Send + 'static;

    /// Keeps a successful value if `pred` holds, otherwise resolves to
    /// `Failure(MatchFailure)`. An upstream failure passes through
    /// unchanged; a panicking `pred` becomes a `ComputationFailure`.
    fn filter<F>(self: &Arc<Self>, pred: F) -> Arc<dyn Cell<T>>
    where
        F: FnOnce(&T) -> bool + Send + 'static;

    /// Applies a partial function: `Some(u)` completes with `u`, `None`
    /// completes with `Failure(MatchFailure)`. An upstream failure passes
    /// through unchanged.
    fn collect<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Option<U> + Send + 'static;

    /// Runs `f` as a side effect on a successful value; does nothing on
    /// failure. Unlike `map`/`filter`/`collect`, an upstream failure is
    /// not forwarded — the derived cell completes with `Success(())`
    /// either way, since it represents "the observation ran", not the
    /// upstream's own result. A panicking `f` is reported through the
    /// cell's error sink, not surfaced as a failure outcome — the derived
    /// cell still completes with `Success(())`.
    fn for_each<F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<()>>
    where
        F: FnOnce(&T) + Send + 'static;

    /// Applies `partial` to a successful value only; a failure, or
    /// `partial` returning `None` (undefined at this value), is silently
    /// ignored — the derived cell simply never completes on that branch
    /// and is subject to its own deadline like any other cell. A
    /// panicking `partial` becomes a `ComputationFailure`.
    fn receive<U, F>(self: &Arc<Self>, partial: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(&T) -> Option<U> + Send + 'static;
}

fn derived<U: Send + Clone + 'static>(remaining: std::time::Duration) -> Arc<DeferredCell<U>> {
    DeferredCell::pending(remaining, Arc::new(SystemClock), Arc::new(TracingErrorSink))
}

impl<T, C> CellExt<T> for C
where
    T: Send + Clone + 'static,
    C: Cell<T> + ?Sized,
{
    fn map<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let out = derived::<U>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Ok(value) => {
                let value = value.clone();
                match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(mapped) => target.complete(Outcome::success(mapped)),
                    Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
                }
            }
            Err(error) => target.complete(Outcome::failure(error.clone())),
        }));
        out
    }

    fn flat_map<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Arc<dyn Cell<U>> + Send + 'static,
    {
        let out = derived::<U>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Ok(value) => {
                let value = value.clone();
                match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(next) => target.complete_with(&*next),
                    Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
                }
            }
            Err(error) => target.complete(Outcome::failure(error.clone())),
        }));
        out
    }

    fn filter<F>(self: &Arc<Self>, pred: F) -> Arc<dyn Cell<T>>
    where
        F: FnOnce(&T) -> bool + Send + 'static,
    {
        let out = derived::<T>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Ok(value) => match panic::catch_unwind(AssertUnwindSafe(|| pred(value))) {
                Ok(true) => target.complete(Outcome::success(value.clone())),
                Ok(false) => target.complete(Outcome::failure(CellError::match_failure())),
                Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
            },
            Err(error) => target.complete(Outcome::failure(error.clone())),
        }));
        out
    }

    fn collect<U, F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(T) -> Option<U> + Send + 'static,
    {
        let out = derived::<U>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Ok(value) => {
                let value = value.clone();
                match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(Some(mapped)) => target.complete(Outcome::success(mapped)),
                    Ok(None) => target.complete(Outcome::failure(CellError::match_failure())),
                    Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
                }
            }
            Err(error) => target.complete(Outcome::failure(error.clone())),
        }));
        out
    }

    fn for_each<F>(self: &Arc<Self>, f: F) -> Arc<dyn Cell<()>>
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let out = derived::<()>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| {
            if let Ok(value) = outcome.as_result() {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    TracingErrorSink.report(
                        &CellError::computation_panic(payload),
                        "for_each",
                        "for_each callback panicked",
                    );
                }
            }
            target.complete(Outcome::success(()));
        }));
        out
    }

    fn receive<U, F>(self: &Arc<Self>, partial: F) -> Arc<dyn Cell<U>>
    where
        U: Send + Clone + 'static,
        F: FnOnce(&T) -> Option<U> + Send + 'static,
    {
        let out = derived::<U>(self.remaining());
        let target = Arc::clone(&out);
        self.on_complete(Box::new(move |outcome| {
            if let Ok(value) = outcome.as_result() {
                match panic::catch_unwind(AssertUnwindSafe(|| partial(value))) {
                    Ok(Some(mapped)) => target.complete(Outcome::success(mapped)),
                    Ok(None) => {}
                    Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
                }
            }
        }));
        out
    }
}
