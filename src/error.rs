// Copyright (c) 2017 Jason White
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

use failure_derive::Fail;

use crate::closure;
use crate::graph;
use crate::planner;
use crate::typeops;

/// The crate-wide error. Every subsystem owns its own leaf error type; this
/// is where they all trickle down to.
#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Graph(#[fail(cause)] graph::Error),

    #[fail(display = "{}", _0)]
    Plan(#[fail(cause)] planner::Error),

    #[fail(display = "{}", _0)]
    TypeOps(#[fail(cause)] typeops::Error),

    #[fail(display = "{}", _0)]
    Closure(#[fail(cause)] closure::Error),

    #[fail(display = "operation was cancelled")]
    Cancelled,

    #[fail(display = "{}", _0)]
    Executor(#[fail(cause)] ExecutorError),
}

impl From<graph::Error> for Error {
    fn from(err: graph::Error) -> Error {
        Error::Graph(err)
    }
}

impl From<planner::Error> for Error {
    fn from(err: planner::Error) -> Error {
        Error::Plan(err)
    }
}

impl From<typeops::Error> for Error {
    fn from(err: typeops::Error) -> Error {
        Error::TypeOps(err)
    }
}

impl From<closure::Error> for Error {
    fn from(err: closure::Error) -> Error {
        Error::Closure(err)
    }
}

impl From<ExecutorError> for Error {
    fn from(err: ExecutorError) -> Error {
        Error::Executor(err)
    }
}

/// The terminal error returned by an executor run whenever the result isn't a
/// clean, fully-completed DAG.
#[derive(Fail, Debug)]
pub enum ExecutorError {
    /// One or more actions returned an error from `run`.
    #[fail(display = "{} action(s) failed", _0)]
    ActionsFailed(usize),

    /// One or more actions never became runnable: a cycle, or a transitive
    /// descendant of a failed action.
    #[fail(display = "{} action(s) left pending", _0)]
    ActionsPending(usize),

    /// Both actions failed and actions are left pending.
    #[fail(display = "{} action(s) failed, {} action(s) left pending", _0, _1)]
    Both(usize, usize),
}

impl ExecutorError {
    pub fn from_counts(errors: usize, pending: usize) -> Option<ExecutorError> {
        match (errors, pending) {
            (0, 0) => None,
            (e, 0) => Some(ExecutorError::ActionsFailed(e)),
            (0, p) => Some(ExecutorError::ActionsPending(p)),
            (e, p) => Some(ExecutorError::Both(e, p)),
        }
    }
}
