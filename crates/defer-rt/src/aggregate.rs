// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Fan-in aggregation over many cells (conc.core/AG1-AG5).
//!
//! Every function here accepts a heterogeneous collection —
//! `impl IntoIterator<Item = Arc<dyn Cell<T>>>` — since in an actor system
//! the cells being joined rarely share a concrete type. Each attaches
//! listeners to its inputs and returns a derived cell immediately; none of
//! these block the calling thread.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cell::{Cell, DeferredCell};
use crate::clock::SystemClock;
use crate::error::{CellError, TracingErrorSink};
use crate::outcome::Outcome;

fn derived<U: Send + Clone + 'static>(timeout: Duration) -> Arc<DeferredCell<U>> {
    DeferredCell::pending(timeout, Arc::new(SystemClock), Arc::new(TracingErrorSink))
}

/// Resolves to whichever input resolves first, success or failure alike —
/// a race, not a first-success search. Built directly on
/// [`DeferredCell::complete_with`]: every input races to complete the same
/// derived cell, and completion is single-assignment, so the first writer
/// simply wins.
pub fn first_completed_of<T: Send + Clone + 'static>(
    cells: impl IntoIterator<Item = Arc<dyn Cell<T>>>,
    timeout: Duration,
) -> Arc<dyn Cell<T>> {
    let out = derived::<T>(timeout);
    for cell in cells {
        out.complete_with(&*cell);
    }
    out
}

/// Folds every successful input into `zero` using `op`, in whatever order
/// the inputs happen to complete — `op` must tolerate that, the same way
/// it would have to if the inputs were itself a concurrent stream. The
/// first failure short-circuits the whole fold. A panic anywhere within
/// `op` becomes a `ComputationFailure`. Empty input resolves to
/// `Success(zero)` immediately.
pub fn fold<T, U, F>(
    cells: impl IntoIterator<Item = Arc<dyn Cell<T>>>,
    timeout: Duration,
    zero: U,
    op: F,
) -> Arc<dyn Cell<U>>
where
    T: Send + Clone + 'static,
    U: Send + Clone + 'static,
    F: Fn(U, T) -> U + Send + Sync + 'static,
{
    let cells: Vec<_> = cells.into_iter().collect();
    let out = derived::<U>(timeout);
    if cells.is_empty() {
        out.complete(Outcome::success(zero));
        return out;
    }

    let remaining = Arc::new(AtomicUsize::new(cells.len()));
    let decided = Arc::new(AtomicBool::new(false));
    let completed_values: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::with_capacity(cells.len())));
    let seed = Arc::new(Mutex::new(Some(zero)));
    let op = Arc::new(op);

    for cell in &cells {
        let target = Arc::clone(&out);
        let remaining = Arc::clone(&remaining);
        let decided = Arc::clone(&decided);
        let completed_values = Arc::clone(&completed_values);
        let seed = Arc::clone(&seed);
        let op = Arc::clone(&op);
        cell.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Err(error) => {
                if !decided.swap(true, Ordering::SeqCst) {
                    target.complete(Outcome::failure(error.clone()));
                }
            }
            Ok(value) => {
                completed_values
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(value.clone());
                let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                if left == 0 && !decided.swap(true, Ordering::SeqCst) {
                    let collected =
                        std::mem::take(&mut *completed_values.lock().unwrap_or_else(|p| p.into_inner()));
                    let start = seed
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .take()
                        .expect("the zero value is consumed exactly once");
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        collected.into_iter().fold(start, |acc, v| op(acc, v))
                    })) {
                        Ok(folded) => target.complete(Outcome::success(folded)),
                        Err(payload) => {
                            target.complete(Outcome::failure(CellError::computation_panic(payload)))
                        }
                    }
                }
            }
        }));
    }
    out
}

/// Like [`fold`], but the seed is the value of whichever input happens to
/// complete first (no separately supplied zero), so it only makes sense
/// for a non-empty input. A panic anywhere within `op` becomes a
/// `ComputationFailure`. Empty input resolves to `Failure(EmptyReduce)`.
pub fn reduce<T, F>(
    cells: impl IntoIterator<Item = Arc<dyn Cell<T>>>,
    timeout: Duration,
    op: F,
) -> Arc<dyn Cell<T>>
where
    T: Send + Clone + 'static,
    F: Fn(T, T) -> T + Send + Sync + 'static,
{
    let cells: Vec<_> = cells.into_iter().collect();
    let out = derived::<T>(timeout);
    if cells.is_empty() {
        out.complete(Outcome::failure(CellError::empty_reduce()));
        return out;
    }

    let remaining = Arc::new(AtomicUsize::new(cells.len()));
    let decided = Arc::new(AtomicBool::new(false));
    let seed: Arc<Mutex<Option<T>>> = Arc::new(Mutex::new(None));
    let rest: Arc<Mutex<Vec<T>>> = Arc::new(Mutex::new(Vec::new()));
    let op = Arc::new(op);

    for cell in &cells {
        let target = Arc::clone(&out);
        let remaining = Arc::clone(&remaining);
        let decided = Arc::clone(&decided);
        let seed = Arc::clone(&seed);
        let rest = Arc::clone(&rest);
        let op = Arc::clone(&op);
        cell.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Err(error) => {
                if !decided.swap(true, Ordering::SeqCst) {
                    target.complete(Outcome::failure(error.clone()));
                }
            }
            Ok(value) => {
                let value = value.clone();
                // Whichever success grabs the empty seed slot first becomes
                // the accumulator's starting point; everyone else queues up.
                let mut seed_guard = seed.lock().unwrap_or_else(|p| p.into_inner());
                if seed_guard.is_none() {
                    *seed_guard = Some(value);
                    drop(seed_guard);
                } else {
                    drop(seed_guard);
                    rest.lock().unwrap_or_else(|p| p.into_inner()).push(value);
                }
                let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                if left == 0 && !decided.swap(true, Ordering::SeqCst) {
                    let seed_value = seed
                        .lock()
                        .unwrap_or_else(|p| p.into_inner())
                        .take()
                        .expect("at least one success claims the seed before remaining reaches zero");
                    let remainder = std::mem::take(&mut *rest.lock().unwrap_or_else(|p| p.into_inner()));
                    match panic::catch_unwind(AssertUnwindSafe(|| {
                        remainder.into_iter().fold(seed_value, |acc, v| op(acc, v))
                    })) {
                        Ok(folded) => target.complete(Outcome::success(folded)),
                        Err(payload) => {
                            target.complete(Outcome::failure(CellError::computation_panic(payload)))
                        }
                    }
                }
            }
        }));
    }
    out
}

/// Collects every input's value into a `Vec` in input order (not
/// completion order — positional slots are filled as each cell completes,
/// independent of which one finishes first). The first failure
/// short-circuits. Empty input resolves to `Success(vec![])` immediately.
/// The derived cell's own timeout is the longest remaining budget among
/// its inputs.
pub fn sequence<T: Send + Clone + 'static>(
    cells: impl IntoIterator<Item = Arc<dyn Cell<T>>>,
) -> Arc<dyn Cell<Vec<T>>> {
    let cells: Vec<_> = cells.into_iter().collect();
    let timeout = cells
        .iter()
        .map(|c| c.remaining())
        .max()
        .unwrap_or(Duration::ZERO);
    let out = derived::<Vec<T>>(timeout);
    if cells.is_empty() {
        out.complete(Outcome::success(Vec::new()));
        return out;
    }

    let slots: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new(vec![None; cells.len()]));
    let remaining = Arc::new(AtomicUsize::new(cells.len()));
    let decided = Arc::new(AtomicBool::new(false));

    for (index, cell) in cells.iter().enumerate() {
        let target = Arc::clone(&out);
        let slots = Arc::clone(&slots);
        let remaining = Arc::clone(&remaining);
        let decided = Arc::clone(&decided);
        cell.on_complete(Box::new(move |outcome| match outcome.as_result() {
            Err(error) => {
                if !decided.swap(true, Ordering::SeqCst) {
                    target.complete(Outcome::failure(error.clone()));
                }
            }
            Ok(value) => {
                slots.lock().unwrap_or_else(|p| p.into_inner())[index] = Some(value.clone());
                let left = remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                if left == 0 && !decided.swap(true, Ordering::SeqCst) {
                    let collected: Vec<T> =
                        std::mem::take(&mut *slots.lock().unwrap_or_else(|p| p.into_inner()))
                            .into_iter()
                            .map(|v| v.expect("every slot is filled once remaining reaches zero"))
                            .collect();
                    target.complete(Outcome::success(collected));
                }
            }
        }));
    }
    out
}

/// `map` then [`sequence`]: applies `f` to every item eagerly (each call
/// starts its own asynchronous cell) and joins the results in input order.
pub fn traverse<A, B, F>(items: impl IntoIterator<Item = A>, f: F) -> Arc<dyn Cell<Vec<B>>>
where
    B: Send + Clone + 'static,
    F: Fn(A) -> Arc<dyn Cell<B>>,
{
    let cells: Vec<Arc<dyn Cell<B>>> = items.into_iter().map(f).collect();
    sequence(cells)
}
