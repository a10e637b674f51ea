// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The deferred-result cell (conc.core/CELL1-CELL5) and its immutable,
//! already-resolved counterpart.
//!
//! [`DeferredCell`] is a single-assignment value holder: `outcome` starts
//! absent and transitions to present exactly once, guarded by a
//! `Mutex`/`Condvar` pair. [`CompletedCell`] implements the same [`Cell`]
//! read surface for a value that was already known at construction time
//! (the identity element combinators and aggregators short-circuit on).

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::error::{CellError, ErrorSink, TimeoutError, TracingErrorSink};
use crate::outcome::Outcome;
use crate::scheduler::SchedulerPort;

/// A listener callback: invoked at most once and exactly once, with the
/// outcome the cell resolved to (see [`Cell::on_complete`]).
pub type Listener<T> = Box<dyn FnOnce(&Outcome<T>) + Send>;

/// The common read surface of [`DeferredCell`] and [`CompletedCell`].
///
/// Combinators ([`crate::CellExt`]) and aggregators ([`crate::aggregate`])
/// are written once against this trait, so callers can freely mix already
/// resolved and still-pending cells in one composition.
pub trait Cell<T: Send + 'static>: Send + Sync {
    /// Current outcome, if any. Never blocks.
    fn value(&self) -> Option<Outcome<T>>;

    /// `true` iff `now >= deadline`. An expired cell may still complete —
    /// this is a pure time comparison, not a gate on `complete`.
    fn is_expired(&self) -> bool;

    /// Time remaining until the deadline, or `Duration::ZERO` if it has
    /// already passed. Combinators use this to size the derived cell's own
    /// timeout.
    fn remaining(&self) -> Duration;

    /// Blocks until completed or the deadline passes.
    fn wait(&self) -> Result<Outcome<T>, TimeoutError>;

    /// Blocks until completed, ignoring the deadline entirely.
    fn wait_blocking(&self) -> Outcome<T>;

    /// Blocks to the deadline; `None` means it timed out.
    fn wait_value(&self) -> Option<Outcome<T>>;

    /// Blocks at most `min(timeout, remaining)`; `None` means it timed out.
    fn value_within(&self, timeout: Duration) -> Option<Outcome<T>>;

    /// Registers a listener. Fires exactly once: inline on the calling
    /// thread if already completed, otherwise from whichever thread calls
    /// `complete`. A panicking listener is caught and reported through the
    /// cell's [`ErrorSink`] — it never propagates and never aborts
    /// notification of the remaining listeners.
    fn on_complete(&self, listener: Listener<T>);

    /// `true` iff an outcome is present.
    fn is_completed(&self) -> bool {
        self.value().is_some()
    }
}

struct Inner<T> {
    outcome: Option<Outcome<T>>,
    listeners: Vec<Listener<T>>,
}

/// A single-assignment value holder with listener support and a deadline.
///
/// Always held behind an `Arc`: a cell's lifetime is shared between every
/// registrant, combinator, and caller that keeps a reference, and
/// `complete_with` needs to clone that `Arc` into a listener closure.
pub struct DeferredCell<T> {
    inner: Mutex<Inner<T>>,
    condvar: Condvar,
    deadline_nanos: u64,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    error_sink: Arc<dyn ErrorSink>,
}

fn duration_to_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

impl<T: Send + Clone + 'static> DeferredCell<T> {
    /// Constructs a pending cell not yet wired to any upstream or
    /// scheduler submission. Used internally by combinators, aggregators,
    /// and `submit_with`.
    pub(crate) fn pending(
        timeout: Duration,
        clock: Arc<dyn Clock>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Arc<Self> {
        let created_at = clock.now_nanos();
        let deadline_nanos = created_at.saturating_add(duration_to_nanos(timeout));
        Arc::new(Self {
            inner: Mutex::new(Inner {
                outcome: None,
                listeners: Vec::new(),
            }),
            condvar: Condvar::new(),
            deadline_nanos,
            timeout,
            clock,
            error_sink,
        })
    }

    /// Submits `body` to `scheduler` and returns a cell that completes with
    /// its result (or a `ComputationFailure` if it panics). Uses the real
    /// system clock and the default tracing-backed error sink; see
    /// [`Self::submit_with`] to inject both explicitly (tests use this to
    /// run against a deterministic clock).
    pub fn submit<F>(body: F, timeout: Duration, scheduler: &dyn SchedulerPort) -> Arc<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::submit_with(
            body,
            timeout,
            scheduler,
            Arc::new(SystemClock),
            Arc::new(TracingErrorSink),
        )
    }

    /// Like [`Self::submit`], with an explicit clock and error sink.
    pub fn submit_with<F>(
        body: F,
        timeout: Duration,
        scheduler: &dyn SchedulerPort,
        clock: Arc<dyn Clock>,
        error_sink: Arc<dyn ErrorSink>,
    ) -> Arc<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let cell = Self::pending(timeout, clock, error_sink);
        let target = Arc::clone(&cell);
        scheduler.submit(Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(value) => target.complete(Outcome::success(value)),
                Err(payload) => target.complete(Outcome::failure(CellError::computation_panic(payload))),
            }
        }));
        cell
    }

    /// Sets the outcome. A no-op if the cell is already completed — the
    /// first `complete` call wins, silently.
    pub fn complete(&self, outcome: Outcome<T>) {
        let listeners = {
            let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            if guard.outcome.is_some() {
                return;
            }
            guard.outcome = Some(outcome.clone());
            let listeners = std::mem::take(&mut guard.listeners);
            self.condvar.notify_all();
            listeners
        };
        for listener in listeners {
            self.invoke_listener(listener, &outcome);
        }
    }

    /// Completes `self` when `other` does, forwarding its outcome
    /// unchanged. A no-op if `self` is already completed.
    pub fn complete_with(self: &Arc<Self>, other: &dyn Cell<T>) {
        let target = Arc::clone(self);
        other.on_complete(Box::new(move |outcome| {
            target.complete(outcome.clone());
        }));
    }

    fn invoke_listener(&self, listener: Listener<T>, outcome: &Outcome<T>) {
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener(outcome)));
        if let Err(payload) = result {
            self.error_sink.report(
                &CellError::computation_panic(payload),
                "listener",
                "listener panicked during notification",
            );
        }
    }

    /// `deadline_nanos == None` means wait forever; `Some(d)` waits until
    /// the monotonic clock reaches `d`. Robust to spurious condvar
    /// wakeups: each iteration re-checks the outcome before re-computing
    /// how much time is left.
    fn wait_until(&self, deadline_nanos: Option<u64>) -> Option<Outcome<T>> {
        let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if let Some(outcome) = guard.outcome.clone() {
                return Some(outcome);
            }
            match deadline_nanos {
                None => {
                    guard = self
                        .condvar
                        .wait(guard)
                        .unwrap_or_else(|p| p.into_inner());
                }
                Some(deadline) => {
                    let now = self.clock.now_nanos();
                    if now >= deadline {
                        return None;
                    }
                    let remaining = Duration::from_nanos(deadline - now);
                    let (next_guard, _timed_out) = self
                        .condvar
                        .wait_timeout(guard, remaining)
                        .unwrap_or_else(|p| p.into_inner());
                    guard = next_guard;
                }
            }
        }
    }

    /// The configured lifetime budget, as passed at construction.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl<T: Send + Clone + 'static> Cell<T> for DeferredCell<T> {
    fn value(&self) -> Option<Outcome<T>> {
        self.inner
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .outcome
            .clone()
    }

    fn is_expired(&self) -> bool {
        self.clock.now_nanos() >= self.deadline_nanos
    }

    fn remaining(&self) -> Duration {
        let now = self.clock.now_nanos();
        if now >= self.deadline_nanos {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.deadline_nanos - now)
        }
    }

    fn wait(&self) -> Result<Outcome<T>, TimeoutError> {
        self.wait_value().ok_or(TimeoutError)
    }

    fn wait_blocking(&self) -> Outcome<T> {
        self.wait_until(None)
            .expect("an unbounded wait cannot return without an outcome")
    }

    fn wait_value(&self) -> Option<Outcome<T>> {
        self.wait_until(Some(self.deadline_nanos))
    }

    fn value_within(&self, timeout: Duration) -> Option<Outcome<T>> {
        let now = self.clock.now_nanos();
        let requested = now.saturating_add(duration_to_nanos(timeout));
        self.wait_until(Some(requested.min(self.deadline_nanos)))
    }

    fn on_complete(&self, listener: Listener<T>) {
        let already_done = {
            let mut guard = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            match &guard.outcome {
                None => {
                    guard.listeners.push(listener);
                    None
                }
                Some(outcome) => Some(outcome.clone()),
            }
        };
        if let Some(outcome) = already_done {
            self.invoke_listener(listener, &outcome);
        }
    }
}

/// An immutable, already-resolved cell. Every listener fires inline at
/// registration; every wait operation returns immediately.
pub struct CompletedCell<T> {
    outcome: Outcome<T>,
    error_sink: Arc<dyn ErrorSink>,
}

impl<T: Send + Clone + 'static> Cell<T> for CompletedCell<T> {
    fn value(&self) -> Option<Outcome<T>> {
        Some(self.outcome.clone())
    }

    fn is_expired(&self) -> bool {
        true
    }

    fn remaining(&self) -> Duration {
        Duration::ZERO
    }

    fn wait(&self) -> Result<Outcome<T>, TimeoutError> {
        Ok(self.outcome.clone())
    }

    fn wait_blocking(&self) -> Outcome<T> {
        self.outcome.clone()
    }

    fn wait_value(&self) -> Option<Outcome<T>> {
        Some(self.outcome.clone())
    }

    fn value_within(&self, _timeout: Duration) -> Option<Outcome<T>> {
        Some(self.outcome.clone())
    }

    fn on_complete(&self, listener: Listener<T>) {
        let outcome = self.outcome.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| listener(&outcome)));
        if let Err(payload) = result {
            self.error_sink.report(
                &CellError::computation_panic(payload),
                "listener",
                "listener panicked during inline notification",
            );
        }
    }
}

/// A cell that is already resolved to `outcome`. The identity element
/// aggregators short-circuit on (e.g. `fold` over empty input).
pub fn completed<T: Send + Clone + 'static>(outcome: Outcome<T>) -> Arc<CompletedCell<T>> {
    Arc::new(CompletedCell {
        outcome,
        error_sink: Arc::new(TracingErrorSink),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::scheduler::ThreadSchedulerPort;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;

    /// A clock callers can advance manually, for deterministic deadline tests.
    struct ManualClock {
        nanos: AtomicU64,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                nanos: AtomicU64::new(0),
            })
        }

        fn advance(&self, d: Duration) {
            self.nanos.fetch_add(d.as_nanos() as u64, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_nanos(&self) -> u64 {
            self.nanos.load(Ordering::SeqCst)
        }
    }

    fn cell<T: Send + Clone + 'static>(timeout: Duration) -> Arc<DeferredCell<T>> {
        DeferredCell::pending(timeout, Arc::new(SystemClock), Arc::new(TracingErrorSink))
    }

    #[test]
    fn complete_is_idempotent() {
        let c = cell::<i32>(Duration::from_secs(1));
        c.complete(Outcome::success(1));
        c.complete(Outcome::success(2));
        assert_eq!(c.value().unwrap().into_result().unwrap(), 1);
    }

    #[test]
    fn listener_registered_before_completion_fires_on_completing_thread() {
        let c = cell::<i32>(Duration::from_secs(1));
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        c.on_complete(Box::new(move |outcome| {
            *seen2.lock().unwrap() = Some(outcome.clone());
        }));
        c.complete(Outcome::success(7));
        assert_eq!(
            seen.lock().unwrap().clone().unwrap().into_result().unwrap(),
            7
        );
    }

    #[test]
    fn listener_registered_after_completion_fires_inline() {
        let c = cell::<i32>(Duration::from_secs(1));
        c.complete(Outcome::success(9));
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        // No other thread involved; if this fired asynchronously the
        // assertion below would race.
        c.on_complete(Box::new(move |outcome| {
            *seen2.lock().unwrap() = Some(outcome.clone());
        }));
        assert_eq!(
            seen.lock().unwrap().clone().unwrap().into_result().unwrap(),
            9
        );
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let c = cell::<i32>(Duration::from_secs(1));
        let second_ran = Arc::new(StdMutex::new(false));
        let second_ran2 = second_ran.clone();
        c.on_complete(Box::new(|_| panic!("boom")));
        c.on_complete(Box::new(move |_| {
            *second_ran2.lock().unwrap() = true;
        }));
        c.complete(Outcome::success(1));
        assert!(*second_ran.lock().unwrap());
    }

    #[test]
    fn wait_blocking_waits_for_another_thread() {
        let c = cell::<i32>(Duration::from_secs(30));
        let c2 = c.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            c2.complete(Outcome::success(5));
        });
        assert_eq!(c.wait_blocking().into_result().unwrap(), 5);
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_with_zero_timeout() {
        let c = cell::<i32>(Duration::ZERO);
        assert!(c.wait().is_err());
    }

    #[test]
    fn wait_succeeds_if_already_completed_before_deadline() {
        let c = cell::<i32>(Duration::ZERO);
        c.complete(Outcome::success(1));
        assert_eq!(c.wait().unwrap().into_result().unwrap(), 1);
    }

    #[test]
    fn is_expired_reflects_manual_clock() {
        let clock = ManualClock::new();
        let c: Arc<DeferredCell<i32>> =
            DeferredCell::pending(Duration::from_secs(1), clock.clone(), Arc::new(TracingErrorSink));
        assert!(!c.is_expired());
        clock.advance(Duration::from_secs(2));
        assert!(c.is_expired());
    }

    #[test]
    fn post_timeout_completion_still_notifies_new_listeners() {
        let clock = ManualClock::new();
        let c: Arc<DeferredCell<i32>> =
            DeferredCell::pending(Duration::from_millis(1), clock.clone(), Arc::new(TracingErrorSink));
        clock.advance(Duration::from_secs(1));
        assert!(c.is_expired());
        assert!(!c.is_completed());
        c.complete(Outcome::success(42));
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        c.on_complete(Box::new(move |o| *seen2.lock().unwrap() = Some(o.clone())));
        assert_eq!(
            seen.lock().unwrap().clone().unwrap().into_result().unwrap(),
            42
        );
    }

    #[test]
    fn completed_cell_is_always_expired_and_fires_inline() {
        let c = completed(Outcome::success(3));
        assert!(c.is_expired());
        assert!(c.is_completed());
        assert_eq!(c.wait().unwrap().into_result().unwrap(), 3);
        let seen = Arc::new(StdMutex::new(None));
        let seen2 = seen.clone();
        c.on_complete(Box::new(move |o| *seen2.lock().unwrap() = Some(o.clone())));
        assert_eq!(
            seen.lock().unwrap().clone().unwrap().into_result().unwrap(),
            3
        );
    }

    #[test]
    fn submit_runs_on_scheduler_and_completes() {
        let c = DeferredCell::submit(|| 42, Duration::from_secs(5), &ThreadSchedulerPort);
        assert_eq!(c.wait_blocking().into_result().unwrap(), 42);
    }

    #[test]
    fn submit_catches_panics_as_computation_failure() {
        let c: Arc<DeferredCell<i32>> =
            DeferredCell::submit(|| panic!("boom"), Duration::from_secs(5), &ThreadSchedulerPort);
        match c.wait_blocking() {
            Outcome::Failure(CellError::ComputationFailure(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected ComputationFailure, got {other:?}"),
        }
    }

    #[test]
    fn complete_with_forwards_upstream_outcome() {
        let upstream = cell::<i32>(Duration::from_secs(5));
        let downstream = cell::<i32>(Duration::from_secs(5));
        downstream.complete_with(&*upstream);
        upstream.complete(Outcome::success(11));
        assert_eq!(downstream.wait_blocking().into_result().unwrap(), 11);
    }
}
