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

//! Executors do not display anything themselves. Instead, they report to a
//! `Tracer`, which is free to log, render, or discard what it's told.

use std::fmt::Write as _;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use humantime::format_duration;

use crate::action::{ActionKind, ActionMetadata};

/// One action's outcome, as reported to a `Tracer`.
#[derive(Clone, Debug)]
pub struct TraceEntry {
    pub action: ActionMetadata,
    /// Wall-clock time the action started, for log correlation across runs.
    pub timestamp: DateTime<Utc>,
    pub started_at: Instant,
    pub duration: Duration,
    pub events_emitted: usize,
}

/// A sink for per-action execution records. Implementations must be safe to
/// call from any executor worker thread.
pub trait Tracer: Send + Sync {
    /// Reports the outcome of one action. `error` is `Some` iff the action's
    /// `run` returned an error.
    fn record(&self, entry: &TraceEntry, error: Option<&failure::Error>);

    /// Called once, after the executor has no more work to do.
    fn finish(&self, pending: &[ActionMetadata]);
}

/// Discards everything. The default when no tracer is configured.
pub struct NullTracer;

impl Tracer for NullTracer {
    fn record(&self, _entry: &TraceEntry, _error: Option<&failure::Error>) {}
    fn finish(&self, _pending: &[ActionMetadata]) {}
}

struct Recorded {
    entry: TraceEntry,
    failed: bool,
}

/// Accumulates a run's trace records and renders them as a Graphviz `.dot`
/// graph on demand, colour-coded by action kind.
pub struct DotTracer {
    records: Mutex<Vec<Recorded>>,
}

impl DotTracer {
    pub fn new() -> DotTracer {
        DotTracer {
            records: Mutex::new(Vec::new()),
        }
    }

    fn color(kind: ActionKind, failed: bool) -> &'static str {
        if failed {
            return "magenta";
        }

        match kind {
            ActionKind::Create => "palegreen",
            ActionKind::Delete => "pink",
            ActionKind::Update => "khaki1",
            ActionKind::Custom => "khaki3",
            ActionKind::Meta => "gray90",
        }
    }

    /// Renders the accumulated records as `.dot` text. Edges are drawn
    /// between actions in completion order, which approximates (but does not
    /// reconstruct) the precondition DAG: the tracer only sees what ran, not
    /// what it waited on.
    pub fn render(&self) -> String {
        let records = self.records.lock().unwrap();
        let mut out = String::new();

        let _ = writeln!(out, "digraph reconcile {{");
        let _ = writeln!(out, "    node [style=filled];");

        for (i, record) in records.iter().enumerate() {
            let color = Self::color(record.entry.action.kind, record.failed);
            let _ = writeln!(
                out,
                "    n{} [label=\"{}\\n{}\", fillcolor={}];",
                i,
                record.entry.action.name,
                format_duration(record.entry.duration),
                color
            );

            if i > 0 {
                let _ = writeln!(out, "    n{} -> n{};", i - 1, i);
            }
        }

        let _ = writeln!(out, "}}");
        out
    }
}

impl Default for DotTracer {
    fn default() -> DotTracer {
        DotTracer::new()
    }
}

impl Tracer for DotTracer {
    fn record(&self, entry: &TraceEntry, error: Option<&failure::Error>) {
        self.records.lock().unwrap().push(Recorded {
            entry: entry.clone(),
            failed: error.is_some(),
        });
    }

    fn finish(&self, pending: &[ActionMetadata]) {
        if pending.is_empty() {
            return;
        }

        let mut records = self.records.lock().unwrap();
        for action in pending {
            records.push(Recorded {
                entry: TraceEntry {
                    action: action.clone(),
                    timestamp: Utc::now(),
                    started_at: Instant::now(),
                    duration: Duration::default(),
                    events_emitted: 0,
                },
                failed: true,
            });
        }
    }
}
