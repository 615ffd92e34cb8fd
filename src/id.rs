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

//! Identity of a single externally-managed resource.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The scope a resource lives at. Global resources are visible project-wide;
/// regional and zonal resources are pinned to a particular region or zone.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Key {
    Global,
    Regional(String),
    Zonal(String),
}

impl Key {
    pub fn scope(&self) -> Scope {
        match self {
            Key::Global => Scope::Global,
            Key::Regional(_) => Scope::Regional,
            Key::Zonal(_) => Scope::Zonal,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Key::Global => write!(f, "global"),
            Key::Regional(region) => write!(f, "regions/{}", region),
            Key::Zonal(zone) => write!(f, "zones/{}", zone),
        }
    }
}

/// The scope of a resource, without the region/zone payload. Used to key
/// version resolution and `TypeOps` dispatch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Scope {
    Global,
    Regional,
    Zonal,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Regional => write!(f, "regional"),
            Scope::Zonal => write!(f, "zonal"),
        }
    }
}

/// The identity of a single externally-managed resource.
///
/// Two `ResourceId`s are equal iff every field is equal. The id is immutable
/// once a node is constructed from it; nothing in this crate mutates a
/// `ResourceId` in place.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    pub api_group: String,
    pub resource: String,
    pub project: String,
    pub key: Key,
    pub name: String,
}

impl ResourceId {
    pub fn new<S: Into<String>>(
        api_group: S,
        resource: S,
        project: S,
        key: Key,
        name: S,
    ) -> ResourceId {
        ResourceId {
            api_group: api_group.into(),
            resource: resource.into(),
            project: project.into(),
            key,
            name: name.into(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.key.scope()
    }

    /// The canonical self-link this id serialises to.
    pub fn self_link(&self) -> String {
        format!(
            "{}/projects/{}/{}/{}/{}",
            self.api_group, self.project, self.key, self.resource, self.name
        )
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.self_link())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ResourceId {
        ResourceId::new(
            "compute.googleapis.com/v1",
            "instances",
            "my-project",
            Key::Zonal("us-central1-a".into()),
            name,
        )
    }

    #[test]
    fn equality_is_by_value() {
        assert_eq!(id("a"), id("a"));
        assert_ne!(id("a"), id("b"));
    }

    #[test]
    fn self_link_is_stable() {
        assert_eq!(
            id("a").self_link(),
            "compute.googleapis.com/v1/projects/my-project/zones/us-central1-a/instances/a"
        );
    }

    #[test]
    fn scope_matches_key() {
        assert_eq!(id("a").scope(), Scope::Zonal);
        let global = ResourceId::new(
            "compute.googleapis.com/v1",
            "networks",
            "my-project",
            Key::Global,
            "default",
        );
        assert_eq!(global.scope(), Scope::Global);
    }
}
