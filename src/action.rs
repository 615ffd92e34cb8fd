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

//! The action contract: an executable unit derived from a node's plan,
//! guarded by event preconditions and producing event postconditions.

use std::fmt;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::Duration;

use crate::event::Event;
use crate::queue::Cancel;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Meta,
    Custom,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActionKind::Create => write!(f, "create"),
            ActionKind::Update => write!(f, "update"),
            ActionKind::Delete => write!(f, "delete"),
            ActionKind::Meta => write!(f, "meta"),
            ActionKind::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActionMetadata {
    pub name: String,
    pub kind: ActionKind,
    pub summary: String,
}

impl fmt::Display for ActionMetadata {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.name, self.kind, self.summary)
    }
}

/// An executable unit derived from a node's plan. Preconditions are events
/// that must be observed before `run` may be invoked; postconditions are the
/// events `run` emits on success.
pub trait Action: Send + Sync + fmt::Display {
    /// True iff every precondition has been satisfied.
    fn can_run(&self) -> bool {
        self.pending_events().is_empty()
    }

    /// If `event` satisfies one of the pending preconditions, removes it and
    /// returns `true`. Otherwise returns `false` without effect.
    fn signal(&self, event: &Event) -> bool;

    /// Performs the action's side effect. On success, returns the events to
    /// signal to other actions.
    fn run(&self, cancel: &Cancel) -> Result<Vec<Event>, failure::Error>;

    /// Computes the events this action would emit, without performing any
    /// side effect.
    fn dry_run(&self) -> Vec<Event>;

    /// The preconditions not yet satisfied.
    fn pending_events(&self) -> Vec<Event>;

    fn metadata(&self) -> ActionMetadata;
}

/// Shared bookkeeping for the pending-event set, reused by every concrete
/// action implementation.
pub struct ActionBase {
    pending: Mutex<Vec<Event>>,
}

impl ActionBase {
    pub fn new(preconditions: Vec<Event>) -> ActionBase {
        ActionBase {
            pending: Mutex::new(preconditions),
        }
    }

    pub fn pending_events(&self) -> Vec<Event> {
        self.pending.lock().unwrap().clone()
    }

    pub fn can_run(&self) -> bool {
        self.pending.lock().unwrap().is_empty()
    }

    /// Removes `event` from the pending set by equality. Returns `true` iff
    /// it was present.
    pub fn signal(&self, event: &Event) -> bool {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|e| e != event);
        pending.len() != before
    }
}

/// Controls how a `RetriableAction` decides whether (and how long) to back
/// off before trying its inner action again.
pub struct RetryPolicy {
    pub retries: u32,
    pub delay: Duration,
    pub backoff: u32,
    pub max_delay: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            retries: 0,
            delay: Duration::from_secs(1),
            backoff: 2,
            max_delay: None,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> RetryPolicy {
        RetryPolicy::default()
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_backoff(mut self, backoff: u32) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }
}

/// Wraps an action with retry-on-error semantics. `can_retry` is consulted on
/// each failure; returning `Some(backoff)` retries after sleeping for that
/// exact duration (letting the predicate itself pick e.g. a longer backoff
/// for rate-limit errors), `None` gives up immediately. `policy.retries`
/// still bounds the total number of attempts regardless of what `can_retry`
/// returns.
pub struct RetriableAction<A, C> {
    inner: A,
    policy: RetryPolicy,
    can_retry: C,
}

impl<A, C> RetriableAction<A, C>
where
    A: Action,
    C: Fn(&failure::Error) -> Option<Duration> + Send + Sync,
{
    pub fn new(inner: A, policy: RetryPolicy, can_retry: C) -> RetriableAction<A, C> {
        RetriableAction {
            inner,
            policy,
            can_retry,
        }
    }
}

impl<A, C> fmt::Display for RetriableAction<A, C>
where
    A: Action,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl<A, C> Action for RetriableAction<A, C>
where
    A: Action,
    C: Fn(&failure::Error) -> Option<Duration> + Send + Sync,
{
    fn can_run(&self) -> bool {
        self.inner.can_run()
    }

    fn signal(&self, event: &Event) -> bool {
        self.inner.signal(event)
    }

    fn run(&self, cancel: &Cancel) -> Result<Vec<Event>, failure::Error> {
        let mut attempt = self.policy.retries + 1;

        loop {
            if cancel.is_cancelled() {
                return Err(failure::err_msg("action cancelled"));
            }

            match self.inner.run(cancel) {
                Ok(events) => return Ok(events),
                Err(err) => {
                    attempt -= 1;

                    match (self.can_retry)(&err) {
                        Some(backoff) if attempt > 0 => sleep(backoff),
                        _ => return Err(err),
                    }
                }
            }
        }
    }

    fn dry_run(&self) -> Vec<Event> {
        self.inner.dry_run()
    }

    fn pending_events(&self) -> Vec<Event> {
        self.inner.pending_events()
    }

    fn metadata(&self) -> ActionMetadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{Key, ResourceId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g/v1", "widgets", "p", Key::Global, name)
    }

    struct DummyAction {
        base: ActionBase,
        attempts: AtomicUsize,
        fail_first: usize,
    }

    impl fmt::Display for DummyAction {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "dummy")
        }
    }

    impl Action for DummyAction {
        fn can_run(&self) -> bool {
            self.base.can_run()
        }

        fn signal(&self, event: &Event) -> bool {
            self.base.signal(event)
        }

        fn run(&self, _cancel: &Cancel) -> Result<Vec<Event>, failure::Error> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                Err(failure::err_msg("not yet"))
            } else {
                Ok(vec![Event::exists(id("a"))])
            }
        }

        fn dry_run(&self) -> Vec<Event> {
            vec![Event::exists(id("a"))]
        }

        fn pending_events(&self) -> Vec<Event> {
            self.base.pending_events()
        }

        fn metadata(&self) -> ActionMetadata {
            ActionMetadata {
                name: "dummy".into(),
                kind: ActionKind::Meta,
                summary: "dummy action".into(),
            }
        }
    }

    #[test]
    fn action_base_signal_removes_matching_precondition() {
        let base = ActionBase::new(vec![Event::exists(id("a")), Event::exists(id("b"))]);
        assert!(!base.can_run());
        assert!(base.signal(&Event::exists(id("a"))));
        assert!(!base.can_run());
        assert!(base.signal(&Event::exists(id("b"))));
        assert!(base.can_run());
    }

    #[test]
    fn signal_on_absent_event_is_a_noop() {
        let base = ActionBase::new(vec![Event::exists(id("a"))]);
        assert!(!base.signal(&Event::exists(id("z"))));
        assert!(!base.can_run());
    }

    #[test]
    fn retriable_action_retries_until_success() {
        let inner = DummyAction {
            base: ActionBase::new(vec![]),
            attempts: AtomicUsize::new(0),
            fail_first: 2,
        };

        let action = RetriableAction::new(
            inner,
            RetryPolicy::new()
                .with_retries(3)
                .with_delay(Duration::from_millis(1)),
            |_err| Some(Duration::from_millis(1)),
        );

        let events = action.run(&Cancel::new()).unwrap();
        assert_eq!(events, vec![Event::exists(id("a"))]);
    }

    #[test]
    fn retriable_action_gives_up_when_can_retry_returns_false() {
        let inner = DummyAction {
            base: ActionBase::new(vec![]),
            attempts: AtomicUsize::new(0),
            fail_first: 5,
        };

        let action = RetriableAction::new(
            inner,
            RetryPolicy::new()
                .with_retries(3)
                .with_delay(Duration::from_millis(1)),
            |_err| None,
        );

        assert!(action.run(&Cancel::new()).is_err());
    }

    #[test]
    fn retriable_action_uses_the_predicates_own_backoff() {
        let inner = DummyAction {
            base: ActionBase::new(vec![]),
            attempts: AtomicUsize::new(0),
            fail_first: 1,
        };

        let action = RetriableAction::new(
            inner,
            RetryPolicy::new().with_retries(1),
            |_err| Some(Duration::from_millis(2)),
        );

        let started = std::time::Instant::now();
        let events = action.run(&Cancel::new()).unwrap();
        assert_eq!(events, vec![Event::exists(id("a"))]);
        assert!(started.elapsed() >= Duration::from_millis(2));
    }
}
