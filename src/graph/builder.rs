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

use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::node::{Node, Ownership, State};
use crate::graph::{Error, Graph};
use crate::id::ResourceId;
use crate::resource::{Resource, ResourceRef};
use crate::version::Version;

/// The mutable precursor of a `Node`, accumulated by the caller before
/// `Builder::build` validates and freezes the whole graph at once.
pub struct NodeBuilder {
    id: ResourceId,
    version: Version,
    ownership: Ownership,
    state: State,
    resource: Option<Resource>,
}

impl NodeBuilder {
    pub fn new(id: ResourceId, ownership: Ownership, state: State) -> NodeBuilder {
        NodeBuilder {
            version: Version::default(),
            id,
            ownership,
            state,
            resource: None,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    fn out_refs(&self) -> &[ResourceRef] {
        self.resource
            .as_ref()
            .map(|r| r.out_refs())
            .unwrap_or(&[])
    }
}

/// Accumulates `NodeBuilder`s and produces an immutable `Graph`.
#[derive(Default)]
pub struct Builder {
    nodes: HashMap<ResourceId, NodeBuilder>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn add(&mut self, node: NodeBuilder) -> &mut Self {
        self.nodes.insert(node.id.clone(), node);
        self
    }

    pub fn get(&self, id: &ResourceId) -> Option<&NodeBuilder> {
        self.nodes.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &NodeBuilder> {
        self.nodes.values()
    }

    /// Validates and freezes the accumulated node builders into a `Graph`.
    ///
    /// 1. Every out-ref target must already be present among the builders.
    /// 2. In-refs are computed by transposing the out-ref edges.
    /// 3. Invariants on ownership/state/resource presence are checked.
    /// 4. Each builder is materialised into an immutable `Node`.
    pub fn build(self) -> Result<Graph, Error> {
        for node in self.nodes.values() {
            if node.ownership != Ownership::Managed {
                continue;
            }
            for out_ref in node.out_refs() {
                if !self.nodes.contains_key(&out_ref.to) {
                    return Err(Error::DanglingRef {
                        from: node.id.clone(),
                        to: out_ref.to.clone(),
                    });
                }
            }
        }

        let mut in_refs: HashMap<ResourceId, Vec<ResourceRef>> = HashMap::new();
        for node in self.nodes.values() {
            for out_ref in node.out_refs() {
                in_refs
                    .entry(out_ref.to.clone())
                    .or_default()
                    .push(out_ref.clone());
            }
        }

        for node in self.nodes.values() {
            check_invariants(node)?;
        }

        let mut nodes = HashMap::with_capacity(self.nodes.len());
        for (id, node) in self.nodes {
            let in_refs = in_refs.remove(&id).unwrap_or_default();
            let out_refs = node.out_refs().to_vec();
            nodes.insert(
                id.clone(),
                Arc::new(Node::new(
                    id,
                    node.version,
                    node.ownership,
                    node.state,
                    node.resource,
                    out_refs,
                    in_refs,
                )),
            );
        }

        Ok(Graph { nodes })
    }

    /// Builds without validation, panicking on any error. Intended for use in
    /// tests that construct known-good graphs inline.
    pub fn must_build(self) -> Graph {
        self.build().expect("graph invariants violated")
    }

    /// A `Graph` whose node set is known but whose resources have not yet
    /// been synced; every node starts in `State::Unknown` with `Ownership`
    /// taken from `ownerships`. Used by the closure walk (`crate::closure`)
    /// to seed a graph before fetching remote state.
    pub fn new_graph_with_empty_nodes(
        ids: impl IntoIterator<Item = (ResourceId, Ownership)>,
    ) -> Result<Graph, Error> {
        let mut builder = Builder::new();
        for (id, ownership) in ids {
            builder.add(NodeBuilder::new(id, ownership, State::Unknown));
        }
        builder.build()
    }
}

fn check_invariants(node: &NodeBuilder) -> Result<(), Error> {
    if node.ownership == Ownership::Unknown {
        return Err(Error::UnknownOwnership(node.id.clone()));
    }

    match node.state {
        State::Exists if node.resource.is_none() => {
            return Err(Error::MissingResource(node.id.clone()));
        }
        State::DoesNotExist | State::Unknown | State::Error if node.resource.is_some() => {
            // A resource body is permitted here: e.g. a desired-but-not-yet-
            // created node carries its intended fields under `DoesNotExist`.
        }
        _ => {}
    }

    if let Some(resource) = &node.resource {
        if resource.id() != &node.id {
            return Err(Error::IdMismatch {
                node: node.id.clone(),
                resource: resource.id().clone(),
            });
        }

        if resource.version() != node.version {
            return Err(Error::VersionMismatch {
                id: node.id.clone(),
                node: node.version,
                resource: resource.version(),
            });
        }
    }

    Ok(())
}
