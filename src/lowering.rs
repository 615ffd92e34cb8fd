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

//! Translates a node's `PlanDetails` into an ordered list of actions
//! connected by event pre/postconditions. Lowering is local: each node
//! contributes its own action(s) independently, and the event algebra is
//! what stitches the whole graph into a DAG.

use std::sync::Arc;

use crate::action::{Action, ActionBase, ActionKind, ActionMetadata};
use crate::event::Event;
use crate::graph::Node;
use crate::id::ResourceId;
use crate::planner::Operation;
use crate::typeops::TypeOps;

/// A zero-side-effect action that simply emits its preconfigured events once
/// runnable. Used for the `Nothing` plan (to seed dependents with an
/// existence signal) and as the second half of Create within a Recreate.
pub struct MetaAction {
    base: ActionBase,
    name: String,
    emits: Vec<Event>,
}

impl MetaAction {
    pub fn new(name: impl Into<String>, preconditions: Vec<Event>, emits: Vec<Event>) -> MetaAction {
        MetaAction {
            base: ActionBase::new(preconditions),
            name: name.into(),
            emits,
        }
    }
}

impl std::fmt::Display for MetaAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl Action for MetaAction {
    fn signal(&self, event: &Event) -> bool {
        self.base.signal(event)
    }

    fn run(&self, _cancel: &crate::queue::Cancel) -> Result<Vec<Event>, failure::Error> {
        Ok(self.emits.clone())
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
            summary: format!("emit {} event(s)", self.emits.len()),
        }
    }
}

/// Performs the type's `create` call, preconditioned on every out-ref target
/// existing, and emits `Exists(node)` on success.
pub struct CreateAction {
    base: ActionBase,
    id: ResourceId,
    ops: Arc<dyn TypeOps>,
    resource: crate::resource::Resource,
}

impl CreateAction {
    pub fn new(node: &Node, ops: Arc<dyn TypeOps>) -> CreateAction {
        let preconditions = node
            .out_refs()
            .iter()
            .map(|r| Event::exists(r.to.clone()))
            .collect();

        CreateAction {
            base: ActionBase::new(preconditions),
            id: node.id().clone(),
            ops,
            resource: node
                .resource()
                .cloned()
                .expect("Create action requires a desired resource body"),
        }
    }
}

impl std::fmt::Display for CreateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "create({})", self.id)
    }
}

impl Action for CreateAction {
    fn signal(&self, event: &Event) -> bool {
        self.base.signal(event)
    }

    fn run(&self, _cancel: &crate::queue::Cancel) -> Result<Vec<Event>, failure::Error> {
        self.ops
            .create(&self.resource)
            .map_err(failure::Error::from)?;
        Ok(vec![Event::exists(self.id.clone())])
    }

    fn dry_run(&self) -> Vec<Event> {
        vec![Event::exists(self.id.clone())]
    }

    fn pending_events(&self) -> Vec<Event> {
        self.base.pending_events()
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            name: format!("create({})", self.id),
            kind: ActionKind::Create,
            summary: "create the resource".into(),
        }
    }
}

/// Performs a delete, preconditioned on every inbound reference having
/// already been dropped. Emits `NotExists(node)` and `DropRef(node, t)` for
/// every out-ref.
pub struct DeleteAction {
    base: ActionBase,
    id: ResourceId,
    ops: Arc<dyn TypeOps>,
    out_refs: Vec<ResourceId>,
}

impl DeleteAction {
    pub fn new(node: &Node, ops: Arc<dyn TypeOps>) -> DeleteAction {
        let preconditions = node
            .in_refs()
            .iter()
            .map(|r| Event::drop_ref(r.from.clone(), node.id().clone()))
            .collect();

        DeleteAction {
            base: ActionBase::new(preconditions),
            id: node.id().clone(),
            ops,
            out_refs: node.out_refs().iter().map(|r| r.to.clone()).collect(),
        }
    }

    fn postconditions(&self) -> Vec<Event> {
        let mut events = vec![Event::not_exists(self.id.clone())];
        for target in &self.out_refs {
            events.push(Event::drop_ref(self.id.clone(), target.clone()));
        }
        events
    }
}

impl std::fmt::Display for DeleteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "delete({})", self.id)
    }
}

impl Action for DeleteAction {
    fn signal(&self, event: &Event) -> bool {
        self.base.signal(event)
    }

    fn run(&self, _cancel: &crate::queue::Cancel) -> Result<Vec<Event>, failure::Error> {
        self.ops
            .delete(&self.id)
            .map_err(failure::Error::from)?;
        Ok(self.postconditions())
    }

    fn dry_run(&self) -> Vec<Event> {
        self.postconditions()
    }

    fn pending_events(&self) -> Vec<Event> {
        self.base.pending_events()
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            name: format!("delete({})", self.id),
            kind: ActionKind::Delete,
            summary: "delete the resource".into(),
        }
    }
}

/// Patches the resource in place, preconditioned on the out-refs of the
/// desired resource existing. Emits `Exists(node)` and, for any reference
/// that changed, `DropRef(node, old_target)`.
pub struct UpdateAction {
    base: ActionBase,
    id: ResourceId,
    ops: Arc<dyn TypeOps>,
    desired: crate::resource::MutableResource,
    dropped_refs: Vec<ResourceId>,
}

impl UpdateAction {
    pub fn new(
        node: &Node,
        ops: Arc<dyn TypeOps>,
        desired: crate::resource::MutableResource,
        dropped_refs: Vec<ResourceId>,
    ) -> UpdateAction {
        let preconditions = node
            .out_refs()
            .iter()
            .map(|r| Event::exists(r.to.clone()))
            .collect();

        UpdateAction {
            base: ActionBase::new(preconditions),
            id: node.id().clone(),
            ops,
            desired,
            dropped_refs,
        }
    }

    fn postconditions(&self) -> Vec<Event> {
        let mut events = vec![Event::exists(self.id.clone())];
        for target in &self.dropped_refs {
            events.push(Event::drop_ref(self.id.clone(), target.clone()));
        }
        events
    }
}

impl std::fmt::Display for UpdateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "update({})", self.id)
    }
}

impl Action for UpdateAction {
    fn signal(&self, event: &Event) -> bool {
        self.base.signal(event)
    }

    fn run(&self, _cancel: &crate::queue::Cancel) -> Result<Vec<Event>, failure::Error> {
        self.ops
            .update(&self.desired)
            .map_err(failure::Error::from)?;
        Ok(self.postconditions())
    }

    fn dry_run(&self) -> Vec<Event> {
        self.postconditions()
    }

    fn pending_events(&self) -> Vec<Event> {
        self.base.pending_events()
    }

    fn metadata(&self) -> ActionMetadata {
        ActionMetadata {
            name: format!("update({})", self.id),
            kind: ActionKind::Update,
            summary: "update the resource".into(),
        }
    }
}

/// Lowers a planned node into its ordered action list. `ops` is the
/// `TypeOps` for this node's resource type; `updated` is only consulted for
/// `Operation::Update`/`Operation::Recreate`, where it carries the desired
/// post-update field state and which out-refs were dropped.
pub fn lower(
    node: &Node,
    operation: Operation,
    ops: Arc<dyn TypeOps>,
    updated: Option<(crate::resource::MutableResource, Vec<ResourceId>)>,
) -> Vec<Box<dyn Action>> {
    match operation {
        Operation::Nothing => {
            let emits = if node.resource().is_some() {
                vec![Event::exists(node.id().clone())]
            } else {
                vec![]
            };
            vec![Box::new(MetaAction::new(
                format!("nothing({})", node.id()),
                vec![],
                emits,
            ))]
        }

        Operation::Create => vec![Box::new(CreateAction::new(node, ops))],

        Operation::Delete => vec![Box::new(DeleteAction::new(node, ops))],

        Operation::Update => {
            let (desired, dropped_refs) =
                updated.expect("Update lowering requires the desired mutable resource");
            vec![Box::new(UpdateAction::new(node, ops, desired, dropped_refs))]
        }

        Operation::Recreate => {
            let delete = DeleteAction::new(node, Arc::clone(&ops));
            let mut create_preconditions: Vec<Event> = node
                .out_refs()
                .iter()
                .map(|r| Event::exists(r.to.clone()))
                .collect();
            create_preconditions.push(Event::not_exists(node.id().clone()));

            let resource = node
                .resource()
                .cloned()
                .expect("Recreate lowering requires a desired resource body");

            let create = CreateAction {
                base: ActionBase::new(create_preconditions),
                id: node.id().clone(),
                ops,
                resource,
            };

            vec![Box::new(delete), Box::new(create)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldTraits;
    use crate::graph::{Builder, NodeBuilder, Ownership, State};
    use crate::id::Key;
    use crate::resource::MutableResource;
    use crate::version::Version;

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g/v1", "widgets", "p", Key::Global, name)
    }

    struct NoopOps;
    impl TypeOps for NoopOps {
        fn scopes(&self) -> &[crate::id::Scope] {
            &[crate::id::Scope::Global]
        }
        fn field_traits(&self) -> FieldTraits {
            FieldTraits::default()
        }
        fn get(&self, _id: &ResourceId) -> Result<Option<crate::resource::Resource>, crate::typeops::Error> {
            Ok(None)
        }
        fn create(&self, resource: &crate::resource::Resource) -> Result<crate::resource::Resource, crate::typeops::Error> {
            Ok(resource.clone())
        }
        fn update(&self, desired: &MutableResource) -> Result<crate::resource::Resource, crate::typeops::Error> {
            Ok(desired.clone().freeze()?)
        }
        fn delete(&self, _id: &ResourceId) -> Result<(), crate::typeops::Error> {
            Ok(())
        }
    }

    fn node_with_out_ref(name: &str, target: Option<&str>) -> Node {
        let mut m = MutableResource::new(id(name), Version::Ga, FieldTraits::default());
        if let Some(target) = target {
            m.set_out_refs(vec![crate::resource::ResourceRef::new(
                id(name),
                crate::fields::FieldPath::from("ref"),
                id(target),
            )]);
        }
        let resource = m.freeze().unwrap();

        let mut builder = Builder::new();
        builder.add(NodeBuilder::new(id(name), Ownership::Managed, State::Exists).resource(resource));
        if let Some(target) = target {
            builder.add(NodeBuilder::new(id(target), Ownership::Managed, State::Exists));
        }
        let graph = builder.build().unwrap();
        clone_node_for_test(graph.get(&id(name)).unwrap())
    }

    // `Node` has no public `Clone`, since the rest of the crate relies on its
    // identity being pinned behind an `Arc`; tests just need an owned copy.
    fn clone_node_for_test(node: &Node) -> Node {
        Node::new(
            node.id().clone(),
            node.version(),
            node.ownership(),
            node.state(),
            node.resource().cloned(),
            node.out_refs().to_vec(),
            node.in_refs().to_vec(),
        )
    }

    #[test]
    fn create_action_preconditions_match_out_refs() {
        let node = node_with_out_ref("a", Some("b"));
        let action = CreateAction::new(&node, Arc::new(NoopOps));
        assert_eq!(action.pending_events(), vec![Event::exists(id("b"))]);
    }

    #[test]
    fn nothing_emits_exists_when_resource_present() {
        let node = node_with_out_ref("a", None);
        let actions = lower(&node, Operation::Nothing, Arc::new(NoopOps), None);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].dry_run(), vec![Event::exists(id("a"))]);
    }

    #[test]
    fn recreate_lowers_to_delete_then_create_with_extra_precondition() {
        let node = node_with_out_ref("a", Some("b"));
        let actions = lower(&node, Operation::Recreate, Arc::new(NoopOps), None);
        assert_eq!(actions.len(), 2);

        let create_preconditions = actions[1].pending_events();
        assert!(create_preconditions.contains(&Event::not_exists(id("a"))));
        assert!(create_preconditions.contains(&Event::exists(id("b"))));
    }

    #[test]
    fn delete_preconditions_match_in_refs() {
        let mut builder = Builder::new();
        let resource_a = MutableResource::new(id("a"), Version::Ga, FieldTraits::default())
            .freeze()
            .unwrap();
        builder.add(NodeBuilder::new(id("a"), Ownership::Managed, State::Exists).resource(resource_a));

        let mut fr = MutableResource::new(id("fr"), Version::Ga, FieldTraits::default());
        fr.set_out_refs(vec![crate::resource::ResourceRef::new(
            id("fr"),
            crate::fields::FieldPath::from("ref"),
            id("a"),
        )]);
        builder.add(NodeBuilder::new(id("fr"), Ownership::Managed, State::Exists).resource(fr.freeze().unwrap()));

        let graph = builder.build().unwrap();
        let a = graph.get(&id("a")).unwrap();
        let action = DeleteAction::new(a, Arc::new(NoopOps));

        assert_eq!(
            action.pending_events(),
            vec![Event::drop_ref(id("fr"), id("a"))]
        );
    }
}
