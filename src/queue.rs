// Copyright (c) 2018 Jason White
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! A bounded-concurrency FIFO work queue. Tasks may enqueue more work on
//! themselves while running; the first error from an operation terminates
//! the queue early while letting already-started tasks finish on their own.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use failure_derive::Fail;
use log::{debug, warn};

/// A shared cancellation flag. Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct Cancel(Arc<AtomicBool>);

impl Cancel {
    pub fn new() -> Cancel {
        Cancel::default()
    }

    pub fn trip(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Fail, Debug, Eq, PartialEq)]
pub enum QueueError<E: fmt::Debug + Send + Sync + 'static> {
    #[fail(display = "operation was cancelled")]
    Cancelled,

    #[fail(display = "{:?}", _0)]
    Op(E),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RunState {
    NotStarted,
    Running,
    Done,
}

struct Shared<T> {
    queue: Mutex<VecDeque<T>>,
    cvar: Condvar,
    state: Mutex<RunState>,
    terminal: AtomicBool,
    active: AtomicUsize,
    remaining_workers: AtomicUsize,
    finished: Mutex<bool>,
    finished_cvar: Condvar,
}

/// A completion record for one dequeued item, reported to an optional
/// tracer callback.
pub struct Completion<'a, T> {
    pub item: &'a T,
    pub queued_at: Instant,
    pub started_at: Instant,
    pub ended_at: Instant,
    pub failed: bool,
}

/// A bounded-concurrency FIFO work queue.
///
/// `run` is callable exactly once. Items may be added from within a running
/// `op` (e.g. to expand the frontier of a BFS); adding after `run` has
/// finished returns `false`.
pub struct WorkQueue<T> {
    shared: Arc<Shared<T>>,
    worker_count: usize,
}

impl<T> WorkQueue<T>
where
    T: fmt::Display + Send + 'static,
{
    pub fn new(worker_count: usize) -> WorkQueue<T> {
        WorkQueue {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                cvar: Condvar::new(),
                state: Mutex::new(RunState::NotStarted),
                terminal: AtomicBool::new(false),
                active: AtomicUsize::new(0),
                remaining_workers: AtomicUsize::new(0),
                finished: Mutex::new(false),
                finished_cvar: Condvar::new(),
            }),
            worker_count: worker_count.max(1),
        }
    }

    /// Enqueues `item`. Returns `false` if the queue has already reached its
    /// terminal state.
    pub fn add(&self, item: T) -> bool {
        if self.shared.terminal.load(Ordering::SeqCst) {
            return false;
        }

        self.shared.queue.lock().unwrap().push_back(item);
        self.shared.cvar.notify_one();
        true
    }

    /// Runs the queue to completion (or until cancelled, or until `op`
    /// errors), launching up to `worker_count` concurrent invocations of
    /// `op(cancel, item)`.
    pub fn run<F, E>(&self, cancel: Cancel, op: F) -> Result<(), QueueError<E>>
    where
        F: Fn(&Cancel, T) -> Result<(), E> + Send + Sync + 'static,
        E: fmt::Debug + Send + Sync + 'static,
    {
        {
            let mut state = self.shared.state.lock().unwrap();
            assert_eq!(*state, RunState::NotStarted, "run() called more than once");
            *state = RunState::Running;
        }

        let outcome: Arc<Mutex<Option<Result<(), QueueError<E>>>>> = Arc::new(Mutex::new(None));
        let outcome_cvar = Arc::new(Condvar::new());
        let op = Arc::new(op);

        self.shared.remaining_workers.store(self.worker_count, Ordering::SeqCst);

        let mut handles = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let outcome = Arc::clone(&outcome);
            let outcome_cvar = Arc::clone(&outcome_cvar);
            let op = Arc::clone(&op);
            let cancel = cancel.clone();

            handles.push(thread::spawn(move || {
                worker_loop(worker_id, shared, outcome, outcome_cvar, op, cancel);
            }));
        }

        // Detach the workers: we don't join them here so that `run` can
        // return as soon as the outcome is known, leaving any still-active
        // tasks to be drained later via `wait_for_orphans`.
        for handle in handles {
            drop(handle);
        }

        let mut outcome_guard = outcome.lock().unwrap();
        loop {
            if let Some(result) = outcome_guard.take() {
                self.shared.terminal.store(true, Ordering::SeqCst);
                *self.shared.state.lock().unwrap() = RunState::Done;
                return result;
            }
            outcome_guard = outcome_cvar.wait(outcome_guard).unwrap();
        }
    }

    /// Blocks (up to `timeout`) for any tasks still in flight after an early
    /// return from `run` to finish. Returns `true` if they all quiesced
    /// within the timeout.
    pub fn wait_for_orphans(&self, timeout: Duration) -> bool {
        {
            let state = self.shared.state.lock().unwrap();
            assert_eq!(*state, RunState::Done, "wait_for_orphans before run finished");
        }

        let deadline = Instant::now() + timeout;
        let mut finished = self.shared.finished.lock().unwrap();

        while !*finished {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }

            let (guard, timeout_result) = self
                .shared
                .finished_cvar
                .wait_timeout(finished, deadline - now)
                .unwrap();
            finished = guard;

            if timeout_result.timed_out() && !*finished {
                return false;
            }
        }

        true
    }

    pub fn len(&self) -> usize {
        self.shared.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn worker_loop<T, F, E>(
    worker_id: usize,
    shared: Arc<Shared<T>>,
    outcome: Arc<Mutex<Option<Result<(), QueueError<E>>>>>,
    outcome_cvar: Arc<Condvar>,
    op: Arc<F>,
    cancel: Cancel,
) where
    T: fmt::Display,
    F: Fn(&Cancel, T) -> Result<(), E>,
    E: fmt::Debug + Send + Sync + 'static,
{
    loop {
        if shared.terminal.load(Ordering::SeqCst) {
            break;
        }

        let item = {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if shared.terminal.load(Ordering::SeqCst) {
                    break None;
                }
                if cancel.is_cancelled() {
                    try_finish(&outcome, &outcome_cvar, Err(QueueError::Cancelled));
                    break None;
                }
                if let Some(item) = queue.pop_front() {
                    break Some(item);
                }
                if queue.is_empty() && shared.active.load(Ordering::SeqCst) == 0 {
                    try_finish(&outcome, &outcome_cvar, Ok(()));
                }
                let (guard, timeout) = shared
                    .cvar
                    .wait_timeout(queue, Duration::from_millis(50))
                    .unwrap();
                queue = guard;
                let _ = timeout;
            }
        };

        let item = match item {
            Some(item) => item,
            None => break,
        };

        shared.active.fetch_add(1, Ordering::SeqCst);
        debug!("worker {} starting {}", worker_id, item);

        let result = op(&cancel, item);
        shared.active.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(()) => {
                shared.cvar.notify_all();
            }
            Err(err) => {
                warn!("worker {} operation failed", worker_id);
                try_finish(&outcome, &outcome_cvar, Err(QueueError::Op(err)));
                break;
            }
        }
    }

    // Drop our clone of `op` (and whatever it closes over) before announcing
    // that we're finished, so a caller waking up from `wait_for_orphans` and
    // reclaiming sole ownership of shared state doesn't race the final
    // worker's own teardown.
    drop(op);
    drop(cancel);

    if shared.remaining_workers.fetch_sub(1, Ordering::SeqCst) == 1 {
        *shared.finished.lock().unwrap() = true;
        shared.finished_cvar.notify_all();
    }
}

/// First-writer-wins: only the first call sets the outcome, so a
/// concurrently-erroring worker and a naturally-completing loop can't race
/// to overwrite each other's result.
fn try_finish<E>(
    outcome: &Mutex<Option<Result<(), QueueError<E>>>>,
    outcome_cvar: &Condvar,
    result: Result<(), QueueError<E>>,
) where
    E: fmt::Debug + Send + Sync + 'static,
{
    let mut guard = outcome.lock().unwrap();
    if guard.is_none() {
        *guard = Some(result);
        outcome_cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    #[test]
    fn empty_queue_completes_immediately() {
        let q: WorkQueue<u32> = WorkQueue::new(4);
        let result: Result<(), QueueError<()>> = q.run(Cancel::new(), |_, _| Ok(()));
        assert!(result.is_ok());
    }

    #[test]
    fn all_items_are_processed_exactly_once() {
        let q = WorkQueue::new(4);
        for i in 0..50 {
            q.add(i);
        }

        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);

        let result: Result<(), QueueError<()>> = q.run(Cancel::new(), move |_, _item| {
            seen2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn tasks_can_enqueue_more_work_on_themselves() {
        let q = Arc::new(WorkQueue::new(4));
        q.add(3u32);

        let seen = Arc::new(StdAtomicUsize::new(0));
        let seen2 = Arc::clone(&seen);
        let q2 = Arc::clone(&q);

        let result: Result<(), QueueError<()>> = q.run(Cancel::new(), move |_, item| {
            seen2.fetch_add(1, Ordering::SeqCst);
            if item > 0 {
                q2.add(item - 1);
            }
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn first_error_terminates_the_queue() {
        let q = WorkQueue::new(2);
        for i in 0..20 {
            q.add(i);
        }

        let result: Result<(), QueueError<&'static str>> =
            q.run(Cancel::new(), |_, item| {
                if item == 5 {
                    Err("boom")
                } else {
                    Ok(())
                }
            });

        assert!(matches!(result, Err(QueueError::Op("boom"))));
        assert!(q.wait_for_orphans(Duration::from_secs(1)));
    }
}
