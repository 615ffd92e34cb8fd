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

//! A declarative reconciliation engine for graphs of typed, cross-referencing
//! externally-managed resources.
//!
//! Callers describe the desired state of a graph of resources (`graph`),
//! register per-type behavior (`typeops`, `registry`), and ask the `planner`
//! to diff desired against observed state. The planner's per-node decisions
//! are lowered (`lowering`) into an action DAG (`action`, `event`) which an
//! `executor` (serial or parallel) runs to completion, reporting through a
//! `tracer`.

pub mod action;
pub mod closure;
pub mod error;
pub mod event;
pub mod executor;
pub mod fields;
pub mod graph;
pub mod id;
pub mod lowering;
pub mod planner;
pub mod queue;
pub mod registry;
pub mod resource;
pub mod tracer;
pub mod typeops;
pub mod version;

pub use error::Error;
