// Copyright (c) 2019 Jason White
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

//! Signals produced by completed actions and consumed by still-pending ones.

use derive_more::Display;

use crate::id::ResourceId;

/// A value-equal signal. Two events are equal iff their tag and payload are
/// equal; there is no cross-variant equality.
#[derive(Clone, Debug, Display, Eq, PartialEq, Hash)]
pub enum Event {
    #[display(fmt = "exists({})", _0)]
    Exists(ResourceId),

    #[display(fmt = "not-exists({})", _0)]
    NotExists(ResourceId),

    #[display(fmt = "drop-ref({} -> {})", _0, _1)]
    DropRef(ResourceId, ResourceId),

    #[display(fmt = "custom({})", _0)]
    Custom(String),
}

impl Event {
    pub fn exists(id: ResourceId) -> Event {
        Event::Exists(id)
    }

    pub fn not_exists(id: ResourceId) -> Event {
        Event::NotExists(id)
    }

    pub fn drop_ref(from: ResourceId, to: ResourceId) -> Event {
        Event::DropRef(from, to)
    }

    pub fn custom<S: Into<String>>(name: S) -> Event {
        Event::Custom(name.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::Key;

    fn id(name: &str) -> ResourceId {
        ResourceId::new("g", "r", "p", Key::Global, name)
    }

    #[test]
    fn equality_is_by_tag_and_payload() {
        assert_eq!(Event::exists(id("a")), Event::exists(id("a")));
        assert_ne!(Event::exists(id("a")), Event::exists(id("b")));
    }

    #[test]
    fn no_cross_variant_equality() {
        assert_ne!(Event::exists(id("a")), Event::not_exists(id("a")));
        assert_ne!(
            Event::exists(id("a")),
            Event::drop_ref(id("a"), id("a"))
        );
    }
}
