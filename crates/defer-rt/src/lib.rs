// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Asynchronous result composition core for an actor-based concurrency runtime.
//!
//! A [`DeferredCell`] represents a value that is computed elsewhere — on a
//! worker pool reached through a [`SchedulerPort`] — and lets consumers chain
//! dependent work ([`CellExt`]), aggregate several outstanding results
//! ([`aggregate`]), or block the calling thread until the result or a
//! deadline arrives ([`Cell::wait`]).
//!
//! Components:
//! - [`Outcome`] — success/failure terminal value of a cell
//! - [`DeferredCell`]/[`CompletedCell`] — the cell types, both implementing [`Cell`]
//! - [`CellExt`] — non-blocking combinators (`map`, `flat_map`, `filter`, `collect`, `for_each`, `receive`)
//! - [`aggregate`] — fan-in operators over iterables of cells (`first_completed_of`, `fold`, `reduce`, `sequence`, `traverse`)
//! - [`SchedulerPort`] — the one external capability this crate depends on
//! - [`clock`] — the monotonic time source deadlines are computed against
//!
//! The worker pool that actually runs submitted thunks, the surrounding
//! actor system, and any mailbox infrastructure are out of scope here — this
//! crate only depends on [`SchedulerPort::submit`].

pub mod aggregate;
pub mod cell;
pub mod clock;
pub mod combinators;
pub mod error;
pub mod outcome;
pub mod scheduler;

pub use aggregate::{first_completed_of, fold, reduce, sequence, traverse};
pub use cell::{completed, Cell, CompletedCell, DeferredCell, Listener};
pub use clock::{Clock, SystemClock};
pub use combinators::CellExt;
pub use error::{CellError, ErrorSink, TimeoutError, TracingErrorSink};
pub use outcome::Outcome;
pub use scheduler::{SchedulerPort, ThreadSchedulerPort};
