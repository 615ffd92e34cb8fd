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

//! The process-wide registry mapping a resource's `api_group`/`resource` pair
//! to the `TypeOps` builder that knows how to operate on it.
//!
//! Resource types register themselves once, typically from a `ctor`-style
//! init function or explicitly at program startup; the registry is then
//! read-only for the remainder of the process's life.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use failure_derive::Fail;

use crate::typeops::TypeOps;

type Factory = Box<dyn Fn() -> Box<dyn TypeOps> + Send + Sync>;

#[derive(Fail, Debug, Eq, PartialEq)]
pub enum Error {
    #[fail(display = "type {}/{} is already registered", api_group, resource)]
    AlreadyRegistered { api_group: String, resource: String },

    #[fail(display = "no type registered for {}/{}", api_group, resource)]
    NotRegistered { api_group: String, resource: String },
}

fn factories() -> &'static Mutex<HashMap<(String, String), Factory>> {
    static FACTORIES: OnceLock<Mutex<HashMap<(String, String), Factory>>> = OnceLock::new();
    FACTORIES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Registers a `TypeOps` factory for `(api_group, resource)`. Errors if that
/// pair is already registered; double registration most likely indicates two
/// type modules were compiled in by mistake.
pub fn register<F>(api_group: &str, resource: &str, factory: F) -> Result<(), Error>
where
    F: Fn() -> Box<dyn TypeOps> + Send + Sync + 'static,
{
    let key = (api_group.to_string(), resource.to_string());
    let mut factories = factories().lock().unwrap();

    if factories.contains_key(&key) {
        return Err(Error::AlreadyRegistered {
            api_group: key.0,
            resource: key.1,
        });
    }

    factories.insert(key, Box::new(factory));
    Ok(())
}

/// Builds a fresh `TypeOps` instance for `(api_group, resource)`.
pub fn new_type_ops(api_group: &str, resource: &str) -> Result<Box<dyn TypeOps>, Error> {
    let key = (api_group.to_string(), resource.to_string());
    let factories = factories().lock().unwrap();

    match factories.get(&key) {
        Some(factory) => Ok(factory()),
        None => Err(Error::NotRegistered {
            api_group: key.0,
            resource: key.1,
        }),
    }
}

/// Removes every registration. Test-only: registration is process-global, so
/// tests that register fake types must clean up after themselves to avoid
/// bleeding state into unrelated tests running in the same binary.
#[cfg(test)]
pub fn clear() {
    factories().lock().unwrap().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldTraits;
    use crate::id::{Key, ResourceId, Scope};
    use crate::resource::{MutableResource, Resource};
    use crate::version::Version;

    struct Fake;

    impl TypeOps for Fake {
        fn scopes(&self) -> &[Scope] {
            &[Scope::Global]
        }

        fn field_traits(&self) -> FieldTraits {
            FieldTraits::default()
        }

        fn get(&self, id: &ResourceId) -> Result<Option<Resource>, crate::typeops::Error> {
            let _ = id;
            Ok(None)
        }

        fn create(&self, resource: &Resource) -> Result<Resource, crate::typeops::Error> {
            Ok(resource.clone())
        }

        fn update(
            &self,
            desired: &MutableResource,
        ) -> Result<Resource, crate::typeops::Error> {
            desired.clone().freeze().map_err(|e| {
                crate::typeops::Error::Resource(e)
            })
        }

        fn delete(&self, id: &ResourceId) -> Result<(), crate::typeops::Error> {
            let _ = id;
            Ok(())
        }
    }

    fn fake_id() -> ResourceId {
        ResourceId::new("fake.example.com/v1", "widgets", "p", Key::Global, "a")
    }

    #[test]
    fn register_then_new_type_ops_round_trips() {
        clear();
        register("fake.example.com/v1", "widgets", || Box::new(Fake)).unwrap();

        let ops = new_type_ops("fake.example.com/v1", "widgets").unwrap();
        assert!(ops.get(&fake_id()).unwrap().is_none());
        clear();
    }

    #[test]
    fn double_registration_is_rejected() {
        clear();
        register("fake.example.com/v1", "widgets", || Box::new(Fake)).unwrap();
        let err = register("fake.example.com/v1", "widgets", || Box::new(Fake)).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered { .. }));
        clear();
    }

    #[test]
    fn unregistered_type_is_an_error() {
        clear();
        let err = new_type_ops("fake.example.com/v1", "missing").unwrap_err();
        assert!(matches!(err, Error::NotRegistered { .. }));
    }
}
