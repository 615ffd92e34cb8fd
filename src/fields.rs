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

//! Structured field paths and per-type field metadata.
//!
//! A resource type does not hand the core a schema; it hands it a
//! `FieldTraits` value built once at type-registration time. The core uses
//! it to drive diffing (ignore output-only fields) and freeze validation
//! (require non-zero fields to be set).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// One segment of a structured path into a resource's fields.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, "{}", name),
            Segment::Index(i) => write!(f, "[{}]", i),
        }
    }
}

/// A structured path into a resource's fields, e.g. `network.subnetwork[0]`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<Segment>);

impl FieldPath {
    pub fn new() -> FieldPath {
        FieldPath(Vec::new())
    }

    pub fn field<S: Into<String>>(mut self, name: S) -> FieldPath {
        self.0.push(Segment::Field(name.into()));
        self
    }

    pub fn index(mut self, i: usize) -> FieldPath {
        self.0.push(Segment::Index(i));
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    /// A JSON Pointer (RFC 6901) equivalent of this path, for indexing into a
    /// `serde_json::Value`.
    pub fn json_pointer(&self) -> String {
        let mut ptr = String::new();
        for seg in &self.0 {
            ptr.push('/');
            match seg {
                Segment::Field(name) => ptr.push_str(&name.replace('~', "~0").replace('/', "~1")),
                Segment::Index(i) => ptr.push_str(&i.to_string()),
            }
        }
        ptr
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                Segment::Field(_) if i > 0 => write!(f, ".{}", seg)?,
                _ => write!(f, "{}", seg)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(s: &str) -> FieldPath {
        FieldPath::new().field(s)
    }
}

/// A single trait attached to a field path.
#[derive(Clone, Debug, Eq, PartialEq)]
enum Trait {
    /// The field is set by the server and must never be written by a freeze.
    /// It is also ignored when diffing.
    OutputOnly,

    /// The field must be set (to a non-zero value) before a `MutableResource`
    /// may be frozen.
    NonZeroValue,

    /// The field may legitimately be left at its zero value; this exists to
    /// document an explicit decision, overriding no default (there is none),
    /// but is useful for type authors enumerating every field.
    AllowZeroValue,

    /// The field only exists in the given set of versions; attempting to
    /// convert a resource with this field populated to a version outside the
    /// set fails.
    VersionOnly(Vec<Version>),

    /// Changing this field requires a Recreate rather than an Update.
    RecreateOnly,
}

/// Per-resource-type field metadata, built once when the type registers
/// itself and shared (read-only) thereafter.
#[derive(Clone, Debug, Default)]
pub struct FieldTraits {
    traits: HashMap<FieldPath, Vec<Trait>>,
}

impl FieldTraits {
    pub fn builder() -> FieldTraitsBuilder {
        FieldTraitsBuilder::default()
    }

    pub fn is_output_only(&self, path: &FieldPath) -> bool {
        self.has(path, |t| *t == Trait::OutputOnly)
    }

    pub fn is_non_zero_value(&self, path: &FieldPath) -> bool {
        self.has(path, |t| *t == Trait::NonZeroValue)
    }

    pub fn is_recreate_only(&self, path: &FieldPath) -> bool {
        self.has(path, |t| *t == Trait::RecreateOnly)
    }

    /// Returns `true` if `path` is representable in `version`. Fields with no
    /// `VersionOnly` trait are representable in every version.
    pub fn supports_version(&self, path: &FieldPath, version: Version) -> bool {
        match self.traits.get(path) {
            None => true,
            Some(ts) => ts.iter().all(|t| match t {
                Trait::VersionOnly(versions) => versions.contains(&version),
                _ => true,
            }),
        }
    }

    pub fn non_zero_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.traits
            .iter()
            .filter(|(_, ts)| ts.contains(&Trait::NonZeroValue))
            .map(|(p, _)| p)
    }

    /// Paths that carry a `VersionOnly` restriction.
    pub fn version_restricted_paths(&self) -> impl Iterator<Item = &FieldPath> {
        self.traits
            .iter()
            .filter(|(_, ts)| ts.iter().any(|t| matches!(t, Trait::VersionOnly(_))))
            .map(|(p, _)| p)
    }

    fn has<F: Fn(&Trait) -> bool>(&self, path: &FieldPath, pred: F) -> bool {
        self.traits
            .get(path)
            .map(|ts| ts.iter().any(pred))
            .unwrap_or(false)
    }
}

#[derive(Default)]
pub struct FieldTraitsBuilder {
    traits: HashMap<FieldPath, Vec<Trait>>,
}

impl FieldTraitsBuilder {
    pub fn output_only(mut self, path: FieldPath) -> Self {
        self.traits.entry(path).or_default().push(Trait::OutputOnly);
        self
    }

    pub fn non_zero_value(mut self, path: FieldPath) -> Self {
        self.traits
            .entry(path)
            .or_default()
            .push(Trait::NonZeroValue);
        self
    }

    pub fn allow_zero_value(mut self, path: FieldPath) -> Self {
        self.traits
            .entry(path)
            .or_default()
            .push(Trait::AllowZeroValue);
        self
    }

    pub fn version_only(mut self, path: FieldPath, versions: Vec<Version>) -> Self {
        self.traits
            .entry(path)
            .or_default()
            .push(Trait::VersionOnly(versions));
        self
    }

    pub fn recreate_only(mut self, path: FieldPath) -> Self {
        self.traits
            .entry(path)
            .or_default()
            .push(Trait::RecreateOnly);
        self
    }

    pub fn build(self) -> FieldTraits {
        FieldTraits {
            traits: self.traits,
        }
    }
}
