// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The external submission capability (conc.runtime/SC1).
//!
//! `SchedulerPort` is the only thing this crate depends on to get a thunk
//! run somewhere. The surrounding actor system's worker pool/dispatcher is
//! out of scope — this module only models the interface, plus a minimal
//! OS-thread-backed default so the crate is directly usable without pulling
//! in a real dispatcher.

use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// A boxed, one-shot unit of work.
pub type Thunk = Box<dyn FnOnce() + Send>;

/// External capability that runs submitted thunks on some worker, at some
/// later point. The core never inspects how or where — it only calls
/// `submit` once per [`crate::DeferredCell::submit`] call.
pub trait SchedulerPort: Send + Sync {
    fn submit(&self, thunk: Thunk);
}

/// Minimal default `SchedulerPort`: one OS thread per submission.
///
/// This is a convenience, not a dispatcher: no pooling, no work stealing,
/// no bound on concurrently running threads. Grounded on the teacher's
/// `rask_spawn` (panic-catching closure run on `std::thread::spawn`), minus
/// the affine `TaskHandle` — here the `DeferredCell` the submission
/// completes is the only handle a caller needs, so the thread is
/// fire-and-forget.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSchedulerPort;

impl SchedulerPort for ThreadSchedulerPort {
    fn submit(&self, thunk: Thunk) {
        thread::spawn(move || {
            // The thunk itself is responsible for catching panics and
            // completing its target cell either way (see
            // `DeferredCell::submit`); this spawn only needs to not let a
            // panic escape into the thread's default unwind handler with a
            // noisy abort-prone message for a detached thread.
            let _ = panic::catch_unwind(AssertUnwindSafe(thunk));
        });
    }
}
