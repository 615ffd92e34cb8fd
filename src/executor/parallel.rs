// Copyright (c) 2019 Jason White
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

//! Runs an action DAG atop the bounded-concurrency work queue (`crate::queue`).
//! Every action not yet dispatched lives in a pending index set; as soon as
//! an action's preconditions are satisfied it is handed to a worker.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use crate::action::Action;
use crate::executor::{run_one, Config, ErrorStrategy, ExecResult};
use crate::queue::{Cancel, QueueError, WorkQueue};
use crate::tracer::{Tracer, TraceEntry};

struct State {
    result: ExecResult,
    pending: HashSet<usize>,
}

struct Shared {
    actions: Vec<Box<dyn Action>>,
    state: Mutex<State>,
    tracer: Arc<dyn Tracer>,
    error_strategy: ErrorStrategy,
    dry_run: bool,
}

/// Runs `actions` to completion (or until cancelled), dispatching every
/// action whose preconditions are satisfied to one of `config.workers`
/// concurrent workers.
pub fn run(actions: Vec<Box<dyn Action>>, cancel: Cancel, config: &Config) -> ExecResult {
    let pending: HashSet<usize> = (0..actions.len()).collect();

    let shared = Arc::new(Shared {
        actions,
        state: Mutex::new(State {
            result: ExecResult::default(),
            pending,
        }),
        tracer: Arc::clone(&config.tracer),
        error_strategy: config.error_strategy,
        dry_run: config.dry_run,
    });

    let queue: Arc<WorkQueue<usize>> = Arc::new(WorkQueue::new(config.workers.max(1)));
    queue_runnable_actions(&shared, &queue);

    let shared_for_op = Arc::clone(&shared);
    let queue_for_op = Arc::clone(&queue);

    // Not joined: it either fires once and exits after the deadline, or the
    // run finishes first and its `cancel.trip()` lands on an already-idle
    // queue, a no-op.
    if let Some(timeout) = config.timeout {
        let deadline_cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(timeout);
            deadline_cancel.trip();
        });
    }

    let run_result = queue.run(cancel.clone(), move |cancel, index| {
        run_action(index, &shared_for_op, &queue_for_op, cancel)
    });

    match run_result {
        Ok(()) => {
            queue.wait_for_orphans(config.wait_for_orphans_timeout);
        }
        Err(QueueError::Cancelled) | Err(QueueError::Op(())) => {
            cancel.trip();
            queue.wait_for_orphans(config.wait_for_orphans_timeout);
        }
    }

    let shared = Arc::try_unwrap(shared).unwrap_or_else(|_| {
        panic!("parallel executor workers still hold shared state after wait_for_orphans")
    });

    let actions = &shared.actions;
    let State {
        mut result,
        pending,
    } = shared.state.into_inner().unwrap();

    result
        .pending
        .extend(pending.into_iter().map(|i| actions[i].metadata()));

    shared.tracer.finish(&result.pending);
    result
}

/// Scans the pending set for actions whose preconditions are now satisfied
/// and hands them to the queue, removing them from the pending set so they
/// are never dispatched twice.
fn queue_runnable_actions(shared: &Arc<Shared>, queue: &Arc<WorkQueue<usize>>) {
    let runnable: Vec<usize> = {
        let mut state = shared.state.lock().unwrap();
        let runnable: Vec<usize> = state
            .pending
            .iter()
            .copied()
            .filter(|&i| shared.actions[i].can_run())
            .collect();

        for i in &runnable {
            state.pending.remove(i);
        }

        runnable
    };

    for i in runnable {
        queue.add(i);
    }
}

/// Returns `Err(())` to signal the queue should stop scheduling new work
/// (only under `ErrorStrategy::StopOnError`); `run`'s own failure is always
/// recorded in `ExecResult`, never surfaced as the queue's own error type.
fn run_action(
    index: usize,
    shared: &Arc<Shared>,
    queue: &Arc<WorkQueue<usize>>,
    cancel: &Cancel,
) -> Result<(), ()> {
    let action = shared.actions[index].as_ref();
    let started_at = Instant::now();
    let timestamp = chrono::Utc::now();
    let outcome = run_one(action, cancel, shared.dry_run);

    let events_emitted = outcome.as_ref().map(|e| e.len()).unwrap_or(0);
    shared.tracer.record(
        &TraceEntry {
            action: action.metadata(),
            timestamp,
            started_at,
            duration: started_at.elapsed(),
            events_emitted,
        },
        outcome.as_ref().err(),
    );

    let abort = {
        let mut state = shared.state.lock().unwrap();

        match outcome {
            Ok(events) => {
                for &i in &state.pending {
                    for event in &events {
                        shared.actions[i].signal(event);
                    }
                }
                state.result.completed.push(action.metadata());
                false
            }
            Err(err) => {
                state.result.errors.push((action.metadata(), err));
                shared.error_strategy == ErrorStrategy::StopOnError
            }
        }
    };

    if !abort {
        queue_runnable_actions(shared, queue);
        Ok(())
    } else {
        Err(())
    }
}
