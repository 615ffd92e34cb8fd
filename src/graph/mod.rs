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

//! The resource graph: an immutable snapshot of nodes and their reference
//! edges, built once per reconciliation from a `Builder`.

pub mod builder;
pub mod node;

use std::collections::HashMap;
use std::sync::Arc;

use failure_derive::Fail;

use crate::id::ResourceId;
use crate::version::Version;

pub use builder::{Builder, NodeBuilder};
pub use node::{Node, Ownership, State};

#[derive(Fail, Debug, Eq, PartialEq)]
pub enum Error {
    #[fail(display = "node {} references unknown node {}", from, to)]
    DanglingRef { from: ResourceId, to: ResourceId },

    #[fail(display = "node {} is Exists but has no resource body", _0)]
    MissingResource(ResourceId),

    #[fail(display = "node {} has Ownership::Unknown, which build() never accepts", _0)]
    UnknownOwnership(ResourceId),

    #[fail(
        display = "resource id {} does not match its node id {}",
        resource, node
    )]
    IdMismatch {
        node: ResourceId,
        resource: ResourceId,
    },

    #[fail(
        display = "node {} declares version {} but its resource is version {}",
        id, node, resource
    )]
    VersionMismatch {
        id: ResourceId,
        node: Version,
        resource: Version,
    },
}

/// An immutable snapshot of the resource graph.
#[derive(Debug)]
pub struct Graph {
    nodes: HashMap<ResourceId, Arc<Node>>,
}

impl Graph {
    pub fn new_builder() -> Builder {
        Builder::new()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    pub fn all(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.nodes.contains_key(id)
    }
}
