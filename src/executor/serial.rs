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

//! A single-threaded executor: repeatedly finds the first runnable action,
//! runs it, and broadcasts its emitted events to everything still pending.
//! Stripped of any multi-worker bookkeeping since there is exactly one
//! worker here.

use std::time::Instant;

use crate::event::Event;
use crate::executor::{run_one, Config, ErrorStrategy, ExecResult};
use crate::queue::Cancel;
use crate::action::Action;

/// Runs `actions` to completion (or until cancelled). Actions are tried in
/// their original order each pass; this is `O(n^2)` in the worst case but
/// keeps the implementation and its ordering guarantees easy to audit, which
/// is the point of having a serial executor alongside the parallel one.
pub fn run(actions: Vec<Box<dyn Action>>, cancel: &Cancel, config: &Config) -> ExecResult {
    let mut result = ExecResult::default();
    let mut pending: Vec<Box<dyn Action>> = actions;
    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

    'outer: loop {
        if cancel.is_cancelled() {
            break;
        }

        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                cancel.trip();
                break;
            }
        }

        let runnable_index = pending.iter().position(|a| a.can_run());

        let index = match runnable_index {
            Some(index) => index,
            None => break,
        };

        let action = pending.remove(index);
        let started_at = Instant::now();
        let timestamp = chrono::Utc::now();

        match run_one(action.as_ref(), cancel, config.dry_run) {
            Ok(events) => {
                let metadata = action.metadata();
                config.tracer.record(
                    &crate::tracer::TraceEntry {
                        action: metadata.clone(),
                        timestamp,
                        started_at,
                        duration: started_at.elapsed(),
                        events_emitted: events.len(),
                    },
                    None,
                );

                broadcast(&events, &pending);
                result.completed.push(metadata);
            }
            Err(err) => {
                let metadata = action.metadata();
                config.tracer.record(
                    &crate::tracer::TraceEntry {
                        action: metadata.clone(),
                        timestamp,
                        started_at,
                        duration: started_at.elapsed(),
                        events_emitted: 0,
                    },
                    Some(&err),
                );

                result.errors.push((metadata, err));

                if config.error_strategy == ErrorStrategy::StopOnError {
                    break 'outer;
                }
            }
        }
    }

    result.pending.extend(pending.iter().map(|a| a.metadata()));
    config.tracer.finish(&result.pending);
    result
}

fn broadcast(events: &[Event], pending: &[Box<dyn Action>]) {
    for event in events {
        for action in pending {
            action.signal(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionBase, ActionKind, ActionMetadata};
    use crate::id::{Key, ResourceId};
    use std::sync::Mutex;

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g/v1", "widgets", "p", Key::Global, name)
    }

    struct RecordingAction {
        base: ActionBase,
        name: String,
        emits: Vec<Event>,
        fail: bool,
        log: std::sync::Arc<Mutex<Vec<String>>>,
    }

    impl std::fmt::Display for RecordingAction {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "{}", self.name)
        }
    }

    impl Action for RecordingAction {
        fn signal(&self, event: &Event) -> bool {
            self.base.signal(event)
        }

        fn run(&self, _cancel: &Cancel) -> Result<Vec<Event>, failure::Error> {
            self.log.lock().unwrap().push(self.name.clone());
            if self.fail {
                Err(failure::err_msg("boom"))
            } else {
                Ok(self.emits.clone())
            }
        }

        fn dry_run(&self) -> Vec<Event> {
            self.emits.clone()
        }

        fn pending_events(&self) -> Vec<Event> {
            self.base.pending_events()
        }

        fn metadata(&self) -> ActionMetadata {
            ActionMetadata {
                name: self.name.clone(),
                kind: ActionKind::Meta,
                summary: String::new(),
            }
        }
    }

    #[test]
    fn runs_actions_in_dependency_order() {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));

        let a = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "a".into(),
            emits: vec![Event::exists(id("a"))],
            fail: false,
            log: log.clone(),
        });
        let b = Box::new(RecordingAction {
            base: ActionBase::new(vec![Event::exists(id("a"))]),
            name: "b".into(),
            emits: vec![],
            fail: false,
            log: log.clone(),
        });

        let config = Config::default();
        let result = run(vec![b, a], &Cancel::new(), &config);

        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
        assert_eq!(result.completed.len(), 2);
        assert!(result.errors.is_empty());
        assert!(result.pending.is_empty());
    }

    #[test]
    fn stop_on_error_leaves_dependents_pending() {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));

        let a = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "a".into(),
            emits: vec![],
            fail: true,
            log: log.clone(),
        });
        let b = Box::new(RecordingAction {
            base: ActionBase::new(vec![Event::exists(id("a"))]),
            name: "b".into(),
            emits: vec![],
            fail: false,
            log: log.clone(),
        });

        let mut config = Config::default();
        config.error_strategy = ErrorStrategy::StopOnError;

        let result = run(vec![a, b], &Cancel::new(), &config);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.pending.len(), 1);
        assert_eq!(result.pending[0].name, "b");
    }

    #[test]
    fn continue_on_error_runs_unrelated_actions() {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));

        let a = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "a".into(),
            emits: vec![],
            fail: true,
            log: log.clone(),
        });
        let c = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "c".into(),
            emits: vec![],
            fail: false,
            log: log.clone(),
        });

        let config = Config::default();
        let result = run(vec![a, c], &Cancel::new(), &config);

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.completed.len(), 1);
        assert!(result.pending.is_empty());
    }

    #[test]
    fn an_expired_deadline_leaves_every_action_pending() {
        let log = std::sync::Arc::new(Mutex::new(Vec::new()));

        let a = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "a".into(),
            emits: vec![],
            fail: false,
            log: log.clone(),
        });
        let b = Box::new(RecordingAction {
            base: ActionBase::new(vec![]),
            name: "b".into(),
            emits: vec![],
            fail: false,
            log,
        });

        let mut config = Config::default();
        config.timeout = Some(std::time::Duration::from_nanos(0));

        let cancel = Cancel::new();
        let result = run(vec![a, b], &cancel, &config);

        assert!(cancel.is_cancelled());
        assert_eq!(result.completed.len(), 0);
        assert_eq!(result.pending.len(), 2);
    }
}
