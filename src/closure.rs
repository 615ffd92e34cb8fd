// Copyright (c) 2018 Jason White
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

//! Completes a caller-supplied desired graph by fetching any resource that is
//! referenced but not explicitly present, via a parallel BFS over out-refs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use failure_derive::Fail;
use log::debug;

use crate::graph::{Builder, Graph, NodeBuilder, Ownership, State};
use crate::id::ResourceId;
use crate::queue::{Cancel, QueueError, WorkQueue};
use crate::typeops::TypeOps;

#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "{}", _0)]
    Graph(#[fail(cause)] crate::graph::Error),

    #[fail(display = "{}", _0)]
    TypeOps(#[fail(cause)] crate::typeops::Error),

    #[fail(display = "no TypeOps registered for resource {}", _0)]
    Unregistered(ResourceId),

    #[fail(display = "operation was cancelled")]
    Cancelled,
}

impl From<crate::graph::Error> for Error {
    fn from(err: crate::graph::Error) -> Error {
        Error::Graph(err)
    }
}

/// Classifies a freshly synced node, with the opportunity to reclassify
/// ownership (e.g. a resource owned by a different reconciler becomes
/// `External` rather than `Managed`).
pub trait OnGet: Send + Sync {
    fn classify(&self, id: &ResourceId, default: Ownership) -> Ownership {
        let _ = id;
        default
    }
}

/// The default classifier: ownership is never reclassified.
pub struct DefaultOnGet;
impl OnGet for DefaultOnGet {}

/// Looks up the `TypeOps` to use for a given resource id. In production this
/// is backed by `crate::registry`; tests supply an in-memory stand-in.
pub trait TypeOpsLookup: Send + Sync {
    fn lookup(&self, id: &ResourceId) -> Option<Arc<dyn TypeOps>>;
}

struct Frontier {
    graph: Mutex<Builder>,
    seen: Mutex<HashMap<ResourceId, ()>>,
}

/// Completes `builder` by fetching every transitively referenced resource
/// not already present, then returns the resulting `Graph`.
///
/// `lookup` and `on_get` are `Arc`-owned (rather than borrowed) because the
/// BFS workers are real OS threads that must outlive this call when `run`
/// returns early on error; see `crate::queue`.
pub fn complete(
    builder: Builder,
    lookup: Arc<dyn TypeOpsLookup>,
    on_get: Arc<dyn OnGet>,
    workers: usize,
) -> Result<Graph, Error> {
    let seen: HashMap<ResourceId, ()> = builder.all().map(|n| (n.id().clone(), ())).collect();

    let frontier = Arc::new(Frontier {
        graph: Mutex::new(builder),
        seen: Mutex::new(seen),
    });

    let ids: Vec<ResourceId> = {
        let graph = frontier.graph.lock().unwrap();
        graph.all().map(|n| n.id().clone()).collect()
    };

    let queue: WorkQueue<ResourceId> = WorkQueue::new(workers);
    for id in ids {
        queue.add(id);
    }

    let cancel = Cancel::new();
    let run_cancel = cancel.clone();
    let frontier_for_op = Arc::clone(&frontier);
    let queue = Arc::new(queue);
    let queue_for_op = Arc::clone(&queue);

    let result = queue.run(run_cancel, move |cancel, id| {
        sync_node(
            &id,
            &frontier_for_op,
            lookup.as_ref(),
            on_get.as_ref(),
            &queue_for_op,
            cancel,
        )
    });

    match result {
        Ok(()) => {
            // `run` only returns `Ok` once every worker is idle, but workers
            // notice the terminal flag (and drop their captured `Arc`s) on
            // their own schedule; wait for that to happen before reclaiming
            // sole ownership of `frontier` below.
            queue.wait_for_orphans(Duration::from_secs(30));
        }
        Err(QueueError::Cancelled) => return Err(Error::Cancelled),
        Err(QueueError::Op(err)) => {
            cancel.trip();
            queue.wait_for_orphans(Duration::from_secs(30));
            return Err(err);
        }
    }

    let builder = Arc::try_unwrap(frontier)
        .unwrap_or_else(|_| panic!("closure workers still hold frontier after wait_for_orphans"))
        .graph
        .into_inner()
        .unwrap();

    Ok(builder.build()?)
}

fn sync_node(
    id: &ResourceId,
    frontier: &Arc<Frontier>,
    lookup: &dyn TypeOpsLookup,
    on_get: &dyn OnGet,
    queue: &Arc<WorkQueue<ResourceId>>,
    _cancel: &Cancel,
) -> Result<(), Error> {
    debug!("syncing {}", id);

    let ops = lookup
        .lookup(id)
        .ok_or_else(|| Error::Unregistered(id.clone()))?;

    let fetched = ops.get(id).map_err(Error::TypeOps)?;

    let (state, resource, ownership) = match fetched {
        Some(resource) => {
            let ownership = on_get.classify(id, Ownership::Managed);
            (State::Exists, Some(resource), ownership)
        }
        None => {
            let ownership = on_get.classify(id, Ownership::Managed);
            (State::DoesNotExist, None, ownership)
        }
    };

    {
        let mut graph = frontier.graph.lock().unwrap();
        let mut nb = NodeBuilder::new(id.clone(), ownership, state);
        if let Some(resource) = resource.clone() {
            nb = nb.resource(resource);
        }
        graph.add(nb);
    }

    if state == State::DoesNotExist || ownership == Ownership::External {
        return Ok(());
    }

    if let Some(resource) = resource {
        for out_ref in resource.out_refs() {
            let mut seen = frontier.seen.lock().unwrap();
            if seen.contains_key(&out_ref.to) {
                continue;
            }
            seen.insert(out_ref.to.clone(), ());
            drop(seen);

            {
                let mut graph = frontier.graph.lock().unwrap();
                graph.add(NodeBuilder::new(
                    out_ref.to.clone(),
                    Ownership::Unknown,
                    State::Unknown,
                ));
            }

            queue.add(out_ref.to.clone());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldTraits;
    use crate::id::Key;
    use crate::resource::{MutableResource as MR, Resource, ResourceRef};
    use crate::version::Version;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::collections::HashMap as StdHashMap;

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g/v1", "widgets", "p", Key::Global, name)
    }

    struct FakeOps {
        resources: StdHashMap<ResourceId, Resource>,
        calls: AtomicUsize,
    }

    impl TypeOps for FakeOps {
        fn scopes(&self) -> &[crate::id::Scope] {
            &[crate::id::Scope::Global]
        }

        fn field_traits(&self) -> FieldTraits {
            FieldTraits::default()
        }

        fn get(&self, id: &ResourceId) -> Result<Option<Resource>, crate::typeops::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.resources.get(id).cloned())
        }

        fn create(&self, resource: &Resource) -> Result<Resource, crate::typeops::Error> {
            Ok(resource.clone())
        }

        fn update(&self, desired: &MR) -> Result<Resource, crate::typeops::Error> {
            Ok(desired.clone().freeze()?)
        }

        fn delete(&self, _id: &ResourceId) -> Result<(), crate::typeops::Error> {
            Ok(())
        }
    }

    struct FakeLookup(Arc<FakeOps>);

    impl TypeOpsLookup for FakeLookup {
        fn lookup(&self, _id: &ResourceId) -> Option<Arc<dyn TypeOps>> {
            Some(Arc::clone(&self.0) as Arc<dyn TypeOps>)
        }
    }

    fn make_resource(name: &str, refs: Vec<ResourceId>) -> Resource {
        let mut m = MR::new(id(name), Version::Ga, FieldTraits::default());
        let out_refs = refs
            .into_iter()
            .map(|to| ResourceRef::new(id(name), crate::fields::FieldPath::from("ref"), to))
            .collect();
        m.set_out_refs(out_refs);
        m.freeze().unwrap()
    }

    #[test]
    fn closure_fetches_referenced_nodes() {
        let mut resources = StdHashMap::new();
        resources.insert(id("a"), make_resource("a", vec![id("b")]));
        resources.insert(id("b"), make_resource("b", vec![]));

        let ops = Arc::new(FakeOps {
            resources,
            calls: AtomicUsize::new(0),
        });
        let lookup: Arc<dyn TypeOpsLookup> = Arc::new(FakeLookup(Arc::clone(&ops)));

        let mut builder = Builder::new();
        builder.add(NodeBuilder::new(id("a"), Ownership::Managed, State::Unknown));

        let graph = complete(builder, lookup, Arc::new(DefaultOnGet), 2).unwrap();

        assert!(graph.contains(&id("a")));
        assert!(graph.contains(&id("b")));
    }

    #[test]
    fn closure_does_not_traverse_past_does_not_exist_nodes() {
        let resources = StdHashMap::new();
        let ops = Arc::new(FakeOps {
            resources,
            calls: AtomicUsize::new(0),
        });
        let lookup: Arc<dyn TypeOpsLookup> = Arc::new(FakeLookup(Arc::clone(&ops)));

        let mut builder = Builder::new();
        builder.add(NodeBuilder::new(id("a"), Ownership::Managed, State::Unknown));

        let graph = complete(builder, lookup, Arc::new(DefaultOnGet), 2).unwrap();

        let node = graph.get(&id("a")).unwrap();
        assert_eq!(node.state(), State::DoesNotExist);
        assert_eq!(graph.len(), 1);
    }
}
