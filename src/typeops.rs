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

//! The per-resource-type capability bundle the core consumes to do scoped,
//! versioned CRUD without knowing any concrete wire schema.
//!
//! The remote API client itself is an excluded collaborator: a `TypeOps`
//! implementation is expected to hold (or close over) whatever client handle
//! it needs and translate its own wire errors into `typeops::Error`.

use failure_derive::Fail;

use crate::id::{ResourceId, Scope};
use crate::resource::{self, MutableResource, Resource};
use crate::version::Version;

#[derive(Fail, Debug)]
pub enum Error {
    #[fail(display = "scope {} is not supported for this resource type", _0)]
    UnsupportedScope(Scope),

    #[fail(display = "version {} is not supported for this resource type", _0)]
    UnsupportedVersion(Version),

    #[fail(display = "{}", _0)]
    Resource(#[fail(cause)] resource::Error),

    #[fail(display = "remote call failed: {}", _0)]
    Remote(#[fail(cause)] failure::Error),
}

impl From<resource::Error> for Error {
    fn from(err: resource::Error) -> Error {
        Error::Resource(err)
    }
}

/// The outcome of a raw wire fetch, before `generic_get` classifies it.
pub enum RemoteError {
    /// The remote API reported the resource does not exist (HTTP 404).
    NotFound,
    Other(failure::Error),
}

/// Classifies a raw fetch: a `NotFound` wire error becomes `Ok(None)` rather
/// than an error, matching the "404 means does-not-exist" contract; any other
/// wire error is wrapped and propagated.
pub fn generic_get<F>(fetch: F) -> Result<Option<Resource>, Error>
where
    F: FnOnce() -> Result<Resource, RemoteError>,
{
    match fetch() {
        Ok(resource) => Ok(Some(resource)),
        Err(RemoteError::NotFound) => Ok(None),
        Err(RemoteError::Other(err)) => Err(Error::Remote(err)),
    }
}

/// The capability bundle a resource type registers under its
/// `(api_group, resource)` pair. Every method is scope/version agnostic at
/// the trait boundary; implementations are expected to branch on
/// `id.scope()` and the resource's `version()` internally and return
/// `UnsupportedScope`/`UnsupportedVersion` for combinations they don't serve.
pub trait TypeOps: Send + Sync {
    /// The scopes this resource type supports (global/regional/zonal).
    fn scopes(&self) -> &[Scope];

    /// Field metadata used to drive diffing and freeze validation.
    fn field_traits(&self) -> FieldTraits;

    /// Fetches the current remote state. `Ok(None)` means the resource does
    /// not exist; this is not an error.
    fn get(&self, id: &ResourceId) -> Result<Option<Resource>, Error>;

    /// Creates the resource remotely, choosing the wire version from
    /// `resource.version()`.
    fn create(&self, resource: &Resource) -> Result<Resource, Error>;

    /// Patches the resource. Implementations that support optimistic
    /// concurrency are expected to have already populated the fingerprint
    /// field on `desired` via a preceding `get`.
    fn update(&self, desired: &MutableResource) -> Result<Resource, Error>;

    /// Deletes the resource. Idempotent: deleting an absent resource is not
    /// required to error, though most real implementations will surface the
    /// remote's own semantics here.
    fn delete(&self, id: &ResourceId) -> Result<(), Error>;
}

pub use crate::fields::FieldTraits;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_get_maps_not_found_to_none() {
        let result: Result<Option<Resource>, Error> =
            generic_get(|| Err(RemoteError::NotFound));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn generic_get_propagates_other_errors() {
        let result: Result<Option<Resource>, Error> =
            generic_get(|| Err(RemoteError::Other(failure::err_msg("boom"))));
        assert!(matches!(result, Err(Error::Remote(_))));
    }
}
