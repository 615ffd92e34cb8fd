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

//! Runs a lowered action DAG to completion. Two implementations
//! ([`serial`] and [`parallel`]) share this module's configuration and
//! result shape; callers pick one based on how much concurrency the
//! underlying resource types can tolerate.

pub mod parallel;
pub mod serial;

use std::sync::Arc;
use std::time::Duration;

use crate::action::{Action, ActionMetadata};
use crate::error::ExecutorError;
use crate::queue::Cancel;
use crate::tracer::{NullTracer, Tracer};

/// How an executor responds to an action's `run` returning an error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorStrategy {
    /// Abort scheduling new actions as soon as the first error is seen.
    /// Already-running actions are allowed to finish.
    StopOnError,

    /// Record the error and keep scheduling whatever remains runnable.
    /// Actions that transitively depended on the failed one are left
    /// pending, since they never receive their precondition events.
    ContinueOnError,
}

/// Shared executor configuration.
pub struct Config {
    /// Compute `dry_run()` events instead of calling `run`.
    pub dry_run: bool,

    /// Where per-action timing and outcome records are sent.
    pub tracer: Arc<dyn Tracer>,

    pub error_strategy: ErrorStrategy,

    /// Bounds the whole run. `None` means no deadline.
    pub timeout: Option<Duration>,

    /// Bounds how long the orphan-drain phase (parallel executor only) is
    /// allowed to wait for in-flight actions after an early abort.
    pub wait_for_orphans_timeout: Duration,

    /// Worker count for the parallel executor. Unused by the serial one.
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            dry_run: false,
            tracer: Arc::new(NullTracer),
            error_strategy: ErrorStrategy::ContinueOnError,
            timeout: None,
            wait_for_orphans_timeout: Duration::from_secs(30),
            workers: num_cpus::get(),
        }
    }
}

/// What an executor run produced.
#[derive(Default, Debug)]
pub struct ExecResult {
    pub completed: Vec<ActionMetadata>,
    pub errors: Vec<(ActionMetadata, failure::Error)>,
    pub pending: Vec<ActionMetadata>,
}

impl ExecResult {
    /// `Ok` iff nothing failed and nothing was left pending; otherwise the
    /// counts are folded into an `ExecutorError` describing what went wrong.
    pub fn into_result(self) -> Result<ExecResult, (ExecResult, ExecutorError)> {
        match ExecutorError::from_counts(self.errors.len(), self.pending.len()) {
            None => Ok(self),
            Some(err) => Err((self, err)),
        }
    }
}

/// Runs `action`, honouring `config.dry_run`.
fn run_one(action: &dyn Action, cancel: &Cancel, dry_run: bool) -> Result<Vec<crate::event::Event>, failure::Error> {
    if dry_run {
        Ok(action.dry_run())
    } else {
        action.run(cancel)
    }
}
