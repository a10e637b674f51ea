// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error taxonomy and the injected error-reporting sink (conc.core/ER1-ER3).
//!
//! `CellError` is what gets stored inside a failed [`crate::Outcome`].
//! `TimeoutError` is separate on purpose: a timeout is never stored in a
//! cell, it is only ever returned from [`crate::Cell::wait`].

use std::fmt;

/// Errors that can end up inside `Outcome::Failure`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CellError {
    /// A user thunk, `map`/`flat_map`/`filter` body, or partial function
    /// panicked. Carries the panic payload rendered to a string.
    #[error("computation failed: {0}")]
    ComputationFailure(String),

    /// `filter`'s predicate rejected the value, or `collect`/`receive`'s
    /// partial function was undefined at the value.
    #[error("value did not match")]
    MatchFailure,

    /// `reduce` was called on an empty iterable of cells.
    #[error("reduce called on empty input")]
    EmptyReduce,
}

impl CellError {
    pub fn computation_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        CellError::ComputationFailure(msg)
    }

    pub fn match_failure() -> Self {
        CellError::MatchFailure
    }

    pub fn empty_reduce() -> Self {
        CellError::EmptyReduce
    }
}

/// Raised by `wait` when the deadline passes without completion. Never
/// stored in a cell, never reported through [`ErrorSink`].
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("cell did not complete before its deadline")]
pub struct TimeoutError;

/// External error channel. A single-method sink the core reports listener
/// panics and combinator-body panics through, rather than propagating or
/// printing directly. Injected per cell via the scheduler/builder — never
/// read from a global.
pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &CellError, source: &str, message: &str);
}

/// Default [`ErrorSink`] that emits structured `tracing` events. This is
/// the ambient logging story for the crate: library code never prints
/// directly, it reports through this trait, and the default implementation
/// routes those reports to whatever `tracing` subscriber the embedding
/// application has installed.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, error: &CellError, source: &str, message: &str) {
        tracing::warn!(target: "defer_rt", %error, source, message, "cell callback failed");
    }
}

impl fmt::Display for TracingErrorSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TracingErrorSink")
    }
}
