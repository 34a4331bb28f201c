// Copyright 2020-2024, Wayfair GmbH
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared KV store holding weir's cross-edge usage aggregates:
//! second-stamped hash counters and TTL'd active-request counts.
//!
//! Everything here is volatile by design. Counters live for a few seconds
//! and are continuously re-created by the collectors, so on restart the
//! store simply refills within one TTL window. No replication, no
//! persistence, no cross-key transactions; all consumers tolerate partial
//! updates.
//!
//! The store speaks a line-oriented text protocol (one command in, one
//! reply out, strict ordering), which is what lets the collector pipeline
//! thousands of updates per flush and drain the replies in one pass.

#[macro_use]
extern crate slog;

pub mod client;
mod errors;
mod proto;
mod server;
mod store;

pub use client::Client;
pub use errors::{Error, Result};
pub use proto::Reply;
pub use server::serve;
pub use store::Store;
