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

//! The per-node planner: given the observed ("got") and desired ("want")
//! state of a node, decides what operation (if any) reconciles them.

use std::fmt;

use failure_derive::Fail;
use log::debug;

use crate::fields::FieldPath;
use crate::graph::{Graph, Node, Ownership, State};
use crate::id::ResourceId;

#[derive(Fail, Debug, Eq, PartialEq)]
pub enum Error {
    #[fail(
        display = "got and want graphs disagree on membership for {}",
        _0
    )]
    MembershipMismatch(ResourceId),

    #[fail(
        display = "node {} has an invalid (got, want) state pair: ({}, {})",
        id, got, want
    )]
    InvalidStatePair {
        id: ResourceId,
        got: &'static str,
        want: &'static str,
    },
}

/// The decision produced for a single node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Operation {
    Nothing,
    Create,
    Update,
    Delete,
    Recreate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Nothing => write!(f, "nothing"),
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Recreate => write!(f, "recreate"),
        }
    }
}

/// A single changed field, as seen by the planner. Recreate-only fields
/// force `Operation::Recreate` rather than `Operation::Update`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldChange {
    pub path: FieldPath,
    pub recreate_only: bool,
}

/// The diff behind an `Update`/`Recreate` decision.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiffReport {
    pub changed: Vec<FieldChange>,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn requires_recreate(&self) -> bool {
        self.changed.iter().any(|c| c.recreate_only)
    }
}

/// The full result of planning a single node: what to do, why, and (for
/// Update/Recreate) the diff that drove the decision.
#[derive(Clone, Debug)]
pub struct PlanDetails {
    pub operation: Operation,
    pub why: String,
    pub diff: Option<DiffReport>,
}

impl PlanDetails {
    fn nothing(why: impl Into<String>) -> PlanDetails {
        PlanDetails {
            operation: Operation::Nothing,
            why: why.into(),
            diff: None,
        }
    }

    fn create(why: impl Into<String>) -> PlanDetails {
        PlanDetails {
            operation: Operation::Create,
            why: why.into(),
            diff: None,
        }
    }

    fn delete(why: impl Into<String>) -> PlanDetails {
        PlanDetails {
            operation: Operation::Delete,
            why: why.into(),
            diff: None,
        }
    }

    fn from_diff(diff: DiffReport) -> PlanDetails {
        if diff.is_empty() {
            PlanDetails::nothing("no field changes")
        } else if diff.requires_recreate() {
            PlanDetails {
                operation: Operation::Recreate,
                why: "a recreate-only field changed".into(),
                diff: Some(diff),
            }
        } else {
            PlanDetails {
                operation: Operation::Update,
                why: "fields changed".into(),
                diff: Some(diff),
            }
        }
    }
}

/// Computes the diff between the observed and desired resource bodies of a
/// node. Implemented per resource type, not by the planner itself: the
/// planner only interprets the result.
pub trait Differ {
    fn diff(&self, got: &Node, want: &Node) -> DiffReport;
}

/// Plans every node in `got` against its counterpart in `want`, writing the
/// result into each `got` node's `Plan` slot and returning it alongside.
///
/// Preconditions: `got` and `want` contain exactly the same id set.
pub fn plan_all(
    got: &Graph,
    want: &Graph,
    differ: &dyn Differ,
) -> Result<Vec<(ResourceId, PlanDetails)>, Error> {
    let mut results = Vec::with_capacity(got.len());

    for got_node in got.all() {
        let id = got_node.id().clone();
        let want_node = want
            .get(&id)
            .ok_or_else(|| Error::MembershipMismatch(id.clone()))?;

        let details = plan_one(got_node, want_node, differ)?;
        debug!("planned {}: {} ({})", id, details.operation, details.why);
        got_node.set_plan(details.clone());
        results.push((id, details));
    }

    for want_node in want.all() {
        if got.get(want_node.id()).is_none() {
            return Err(Error::MembershipMismatch(want_node.id().clone()));
        }
    }

    Ok(results)
}

/// Plans a single node given its observed and desired counterparts.
pub fn plan_one(
    got: &Node,
    want: &Node,
    differ: &dyn Differ,
) -> Result<PlanDetails, Error> {
    match (got.state(), want.state(), want.ownership()) {
        (State::Exists, State::Exists, Ownership::External) => {
            Ok(PlanDetails::nothing("not managed"))
        }
        (State::Exists, State::Exists, Ownership::Managed) => {
            Ok(PlanDetails::from_diff(differ.diff(got, want)))
        }
        (State::Exists, State::DoesNotExist, Ownership::Managed) => {
            Ok(PlanDetails::delete("no longer desired"))
        }
        (State::DoesNotExist, State::Exists, Ownership::Managed) => {
            Ok(PlanDetails::create("desired but absent"))
        }
        (State::DoesNotExist, State::DoesNotExist, _) => {
            Ok(PlanDetails::nothing("absent and not desired"))
        }
        (got_state, want_state, Ownership::Unknown) => Err(Error::InvalidStatePair {
            id: got.id().clone(),
            got: state_name(got_state),
            want: state_name(want_state),
        }),
        (got_state, want_state, _) => Err(Error::InvalidStatePair {
            id: got.id().clone(),
            got: state_name(got_state),
            want: state_name(want_state),
        }),
    }
}

fn state_name(state: State) -> &'static str {
    match state {
        State::Exists => "exists",
        State::DoesNotExist => "does-not-exist",
        State::Unknown => "unknown",
        State::Error => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Builder, NodeBuilder};
    use crate::id::Key;
    use crate::resource::MutableResource;
    use crate::fields::FieldTraits;
    use crate::version::Version;

    struct NoopDiffer;

    impl Differ for NoopDiffer {
        fn diff(&self, _got: &Node, _want: &Node) -> DiffReport {
            DiffReport::default()
        }
    }

    struct AlwaysChangedDiffer {
        recreate: bool,
    }

    impl Differ for AlwaysChangedDiffer {
        fn diff(&self, _got: &Node, _want: &Node) -> DiffReport {
            DiffReport {
                changed: vec![FieldChange {
                    path: FieldPath::from("name"),
                    recreate_only: self.recreate,
                }],
            }
        }
    }

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g/v1", "widgets", "p", Key::Global, name)
    }

    fn resource_node(
        builder: &mut Builder,
        name: &str,
        ownership: Ownership,
        state: State,
    ) {
        let mut nb = NodeBuilder::new(id(name), ownership, state);
        if state == State::Exists {
            let m = MutableResource::new(id(name), Version::Ga, FieldTraits::default());
            nb = nb.resource(m.freeze().unwrap());
        }
        builder.add(nb);
    }

    #[test]
    fn exists_exists_managed_with_no_diff_is_nothing() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::Managed, State::Exists);
        let got = got_b.build().unwrap();

        let mut want_b = Builder::new();
        resource_node(&mut want_b, "a", Ownership::Managed, State::Exists);
        let want = want_b.build().unwrap();

        let plans = plan_all(&got, &want, &NoopDiffer).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Nothing);
    }

    #[test]
    fn exists_exists_external_is_always_nothing() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::External, State::Exists);
        let got = got_b.build().unwrap();

        let mut want_b = Builder::new();
        resource_node(&mut want_b, "a", Ownership::External, State::Exists);
        let want = want_b.build().unwrap();

        let plans = plan_all(&got, &want, &AlwaysChangedDiffer { recreate: true }).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Nothing);
    }

    #[test]
    fn does_not_exist_to_exists_is_create() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::Managed, State::DoesNotExist);
        let got = got_b.build().unwrap();

        let mut want_b = Builder::new();
        resource_node(&mut want_b, "a", Ownership::Managed, State::Exists);
        let want = want_b.build().unwrap();

        let plans = plan_all(&got, &want, &NoopDiffer).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Create);
    }

    #[test]
    fn exists_to_does_not_exist_is_delete() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::Managed, State::Exists);
        let got = got_b.build().unwrap();

        let mut want_b = Builder::new();
        resource_node(&mut want_b, "a", Ownership::Managed, State::DoesNotExist);
        let want = want_b.build().unwrap();

        let plans = plan_all(&got, &want, &NoopDiffer).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Delete);
    }

    #[test]
    fn recreate_only_field_forces_recreate() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::Managed, State::Exists);
        let got = got_b.build().unwrap();

        let mut want_b = Builder::new();
        resource_node(&mut want_b, "a", Ownership::Managed, State::Exists);
        let want = want_b.build().unwrap();

        let plans =
            plan_all(&got, &want, &AlwaysChangedDiffer { recreate: true }).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Recreate);

        let plans =
            plan_all(&got, &want, &AlwaysChangedDiffer { recreate: false }).unwrap();
        assert_eq!(plans[0].1.operation, Operation::Update);
    }

    #[test]
    fn mismatched_membership_errors() {
        let mut got_b = Builder::new();
        resource_node(&mut got_b, "a", Ownership::Managed, State::Exists);
        let got = got_b.build().unwrap();

        let want = Builder::new().build().unwrap();

        assert!(matches!(
            plan_all(&got, &want, &NoopDiffer),
            Err(Error::MembershipMismatch(_))
        ));
    }
}
