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

//! A resource is an abstract representation of some unit of externally
//! managed state: a file, an instance, a network. The core never interprets
//! a resource's fields itself; it only needs to be able to freeze it, diff
//! it, and walk its outbound references. The concrete schema and the rules
//! for parsing references out of it live with the resource type, behind
//! `TypeOps` (see `crate::typeops`).

use failure_derive::Fail;
use serde_json::Value;

use crate::fields::{FieldPath, FieldTraits};
use crate::id::ResourceId;
use crate::version::Version;

/// A typed edge from one resource's field to another resource.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct ResourceRef {
    pub from: ResourceId,
    pub path: FieldPath,
    pub to: ResourceId,
}

impl ResourceRef {
    pub fn new(from: ResourceId, path: FieldPath, to: ResourceId) -> ResourceRef {
        ResourceRef { from, path, to }
    }
}

#[derive(Fail, Debug, Eq, PartialEq)]
pub enum Error {
    #[fail(display = "field {} is output-only and cannot be written", _0)]
    OutputOnlyWrite(FieldPath),

    #[fail(display = "field {} must be set before freezing", _0)]
    MissingRequiredField(FieldPath),

    #[fail(
        display = "field {} is set but is not representable in version {}",
        _0, _1
    )]
    UnsupportedVersion(FieldPath, Version),

    #[fail(display = "resource id {} does not match node id {}", _0, _1)]
    IdMismatch(ResourceId, ResourceId),
}

/// An immutable, typed resource. Holds the wire representation for exactly
/// one `Version` at a time; `to_version` attempts to reinterpret it as
/// another version.
#[derive(Clone, Debug)]
pub struct Resource {
    id: ResourceId,
    version: Version,
    fields: Value,
    traits: FieldTraits,
    out_refs: Vec<ResourceRef>,
}

impl Resource {
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn fields(&self) -> &Value {
        &self.fields
    }

    pub fn traits(&self) -> &FieldTraits {
        &self.traits
    }

    pub fn out_refs(&self) -> &[ResourceRef] {
        &self.out_refs
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        self.fields.pointer(&path.json_pointer())
    }

    /// Reinterprets this resource as `target`. Succeeds only when every
    /// populated field that is version-restricted supports `target`.
    pub fn to_version(&self, target: Version) -> Result<Resource, Error> {
        if target == self.version {
            return Ok(self.clone());
        }

        for (path, _) in self.populated_version_restricted_paths() {
            if !self.traits.supports_version(&path, target) {
                return Err(Error::UnsupportedVersion(path, target));
            }
        }

        Ok(Resource {
            id: self.id.clone(),
            version: target,
            fields: self.fields.clone(),
            traits: self.traits.clone(),
            out_refs: self.out_refs.clone(),
        })
    }

    fn populated_version_restricted_paths(&self) -> Vec<(FieldPath, ())> {
        self.traits
            .version_restricted_paths()
            .filter(|p| self.get(p).map(|v| !v.is_null()).unwrap_or(false))
            .map(|p| (p.clone(), ()))
            .collect()
    }

    /// Starts a `MutableResource` seeded with this resource's current
    /// contents, for building an updated version of it.
    pub fn into_mutable(self) -> MutableResource {
        MutableResource {
            id: self.id,
            version: self.version,
            fields: self.fields,
            traits: self.traits,
            out_refs: self.out_refs,
        }
    }
}

/// Accumulates edits to a resource before it is frozen into an immutable
/// `Resource`. Not thread-safe; intended to be owned by a single thread for
/// the duration of authoring.
#[derive(Clone, Debug)]
pub struct MutableResource {
    id: ResourceId,
    version: Version,
    fields: Value,
    traits: FieldTraits,
    out_refs: Vec<ResourceRef>,
}

impl MutableResource {
    pub fn new(id: ResourceId, version: Version, traits: FieldTraits) -> MutableResource {
        MutableResource {
            id,
            version,
            fields: Value::Object(serde_json::Map::new()),
            traits,
            out_refs: Vec::new(),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Applies `f` to the value at `path`, creating intermediate objects as
    /// needed. Fails if `path` is marked output-only.
    pub fn access<F, T>(&mut self, path: &FieldPath, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Value) -> T,
    {
        if self.traits.is_output_only(path) {
            return Err(Error::OutputOnlyWrite(path.clone()));
        }

        Ok(f(ensure_path(&mut self.fields, path.segments())))
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        self.fields.pointer(&path.json_pointer())
    }

    pub fn set_out_refs(&mut self, out_refs: Vec<ResourceRef>) -> &mut Self {
        self.out_refs = out_refs;
        self
    }

    /// Validates every `NonZeroValue` field is populated and produces an
    /// immutable `Resource`.
    pub fn freeze(self) -> Result<Resource, Error> {
        for path in self.traits.non_zero_paths() {
            let populated = self
                .fields
                .pointer(&path.json_pointer())
                .map(|v| !v.is_null())
                .unwrap_or(false);

            if !populated {
                return Err(Error::MissingRequiredField(path.clone()));
            }
        }

        Ok(Resource {
            id: self.id,
            version: self.version,
            fields: self.fields,
            traits: self.traits,
            out_refs: self.out_refs,
        })
    }
}

use crate::fields::Segment;

fn ensure_path<'a>(root: &'a mut Value, segments: &[Segment]) -> &'a mut Value {
    let mut cur = root;
    for seg in segments {
        cur = match seg {
            Segment::Field(name) => {
                if !cur.is_object() {
                    *cur = Value::Object(serde_json::Map::new());
                }
                cur.as_object_mut()
                    .unwrap()
                    .entry(name.clone())
                    .or_insert(Value::Null)
            }
            Segment::Index(i) => {
                if !cur.is_array() {
                    *cur = Value::Array(Vec::new());
                }
                let arr = cur.as_array_mut().unwrap();
                while arr.len() <= *i {
                    arr.push(Value::Null);
                }
                &mut arr[*i]
            }
        };
    }
    cur
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Key;

    fn id() -> ResourceId {
        ResourceId::new(
            "compute.googleapis.com/v1",
            "networks",
            "my-project",
            Key::Global,
            "default",
        )
    }

    #[test]
    fn freeze_fails_when_required_field_missing() {
        let traits = FieldTraits::builder()
            .non_zero_value(FieldPath::from("name"))
            .build();

        let m = MutableResource::new(id(), Version::Ga, traits);

        assert_eq!(
            m.freeze().unwrap_err(),
            Error::MissingRequiredField(FieldPath::from("name"))
        );
    }

    #[test]
    fn access_rejects_output_only_writes() {
        let traits = FieldTraits::builder()
            .output_only(FieldPath::from("fingerprint"))
            .build();

        let mut m = MutableResource::new(id(), Version::Ga, traits);

        let err = m
            .access(&FieldPath::from("fingerprint"), |v| {
                *v = Value::String("abc".into())
            })
            .unwrap_err();

        assert_eq!(err, Error::OutputOnlyWrite(FieldPath::from("fingerprint")));
    }

    #[test]
    fn freeze_succeeds_when_required_fields_set() {
        let traits = FieldTraits::builder()
            .non_zero_value(FieldPath::from("name"))
            .build();

        let mut m = MutableResource::new(id(), Version::Ga, traits);
        m.access(&FieldPath::from("name"), |v| {
            *v = Value::String("default".into())
        })
        .unwrap();

        let r = m.freeze().unwrap();
        assert_eq!(
            r.get(&FieldPath::from("name")),
            Some(&Value::String("default".into()))
        );
    }

    #[test]
    fn to_version_rejects_unsupported_populated_fields() {
        let traits = FieldTraits::builder()
            .non_zero_value(FieldPath::from("preview"))
            .version_only(FieldPath::from("preview"), vec![Version::Alpha])
            .build();

        let mut m = MutableResource::new(id(), Version::Alpha, traits);
        m.access(&FieldPath::from("preview"), |v| *v = Value::Bool(true))
            .unwrap();
        let r = m.freeze().unwrap();

        assert!(r.to_version(Version::Alpha).is_ok());
        assert!(r.to_version(Version::Ga).is_err());
    }

    #[test]
    fn nested_index_paths_round_trip() {
        let traits = FieldTraits::default();
        let mut m = MutableResource::new(id(), Version::Ga, traits);

        let path = FieldPath::new().field("rules").index(0).field("port");
        m.access(&path, |v| *v = Value::from(443)).unwrap();

        assert_eq!(m.get(&path), Some(&Value::from(443)));
    }
}
