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

use std::fmt;
use std::sync::Mutex;

use crate::id::ResourceId;
use crate::planner::PlanDetails;
use crate::resource::{Resource, ResourceRef};
use crate::version::Version;

/// Whether the core may mutate/delete a node, or merely observes it.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Ownership {
    Managed,
    External,
    Unknown,
}

impl fmt::Display for Ownership {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Ownership::Managed => write!(f, "managed"),
            Ownership::External => write!(f, "external"),
            Ownership::Unknown => write!(f, "unknown"),
        }
    }
}

/// Whether a node is known to exist remotely.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum State {
    Exists,
    DoesNotExist,
    Unknown,
    Error,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            State::Exists => write!(f, "exists"),
            State::DoesNotExist => write!(f, "does-not-exist"),
            State::Unknown => write!(f, "unknown"),
            State::Error => write!(f, "error"),
        }
    }
}

/// A vertex in the resource graph: a resource plus its planning metadata.
///
/// Immutable after `Builder::build()`, except for the `Plan` slot, which is
/// written exactly once by the planner.
#[derive(Debug)]
pub struct Node {
    id: ResourceId,
    version: Version,
    ownership: Ownership,
    state: State,
    resource: Option<Resource>,
    out_refs: Vec<ResourceRef>,
    in_refs: Vec<ResourceRef>,
    plan: Mutex<Option<PlanDetails>>,
}

impl Node {
    pub(crate) fn new(
        id: ResourceId,
        version: Version,
        ownership: Ownership,
        state: State,
        resource: Option<Resource>,
        out_refs: Vec<ResourceRef>,
        in_refs: Vec<ResourceRef>,
    ) -> Node {
        Node {
            id,
            version,
            ownership,
            state,
            resource,
            out_refs,
            in_refs,
            plan: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn out_refs(&self) -> &[ResourceRef] {
        &self.out_refs
    }

    pub fn in_refs(&self) -> &[ResourceRef] {
        &self.in_refs
    }

    /// Writes the plan for this node. Panics if a plan has already been set;
    /// the planner runs exactly once per node per reconciliation.
    pub fn set_plan(&self, plan: PlanDetails) {
        let mut slot = self.plan.lock().unwrap();
        assert!(slot.is_none(), "plan for {} was already set", self.id);
        *slot = Some(plan);
    }

    pub fn plan(&self) -> Option<PlanDetails> {
        self.plan.lock().unwrap().clone()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("ownership", &self.ownership)
            .field("state", &self.state)
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
