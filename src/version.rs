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
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::id::Scope;

/// The API version of a resource's wire representation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Version {
    Ga,
    Alpha,
    Beta,
}

impl Default for Version {
    fn default() -> Version {
        Version::Ga
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Version::Ga => write!(f, "ga"),
            Version::Alpha => write!(f, "alpha"),
            Version::Beta => write!(f, "beta"),
        }
    }
}

/// Resolves the version to use for a given (scope, service) pair. Thread-safe
/// and late-binding: callers may register resolutions at any point before
/// they're consulted.
#[derive(Default)]
pub struct VersionResolver {
    overrides: RwLock<HashMap<(Scope, String), Version>>,
}

impl VersionResolver {
    pub fn new() -> VersionResolver {
        VersionResolver::default()
    }

    pub fn set(&self, scope: Scope, service: &str, version: Version) {
        self.overrides
            .write()
            .unwrap()
            .insert((scope, service.to_string()), version);
    }

    /// Resolves the version for `(scope, service)`, falling back to `GA`.
    pub fn resolve(&self, scope: Scope, service: &str) -> Version {
        self.overrides
            .read()
            .unwrap()
            .get(&(scope, service.to_string()))
            .copied()
            .unwrap_or_default()
    }
}
