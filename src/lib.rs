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

//! The weir edge enforcer: the filter embedded in each proxy instance.
//!
//! Per request it attributes traffic to a user key, classifies the
//! operation, checks the locally-cached violation tables and admits or
//! rejects. Per payload chunk it enforces the user's per-direction
//! bandwidth share, fairly split across that user's local concurrent
//! requests, with a policy-driven slowdown layered on top when the
//! generator reports a fleet-wide violation. Everything it observes is
//! emitted as `~|~` event lines to the local collector; everything it
//! enforces arrives over the policy channel from the generator.
//!
//! The filter hooks ([`filter::WeirFilter`]) are synchronous because they
//! run on the proxy's request path; the policy-channel client, the
//! active-request refresh and the stale-policy sweeper are async tasks.

#[macro_use]
extern crate slog;

pub mod admin;
pub mod classify;
pub mod config;
pub mod errors;
pub mod events;
pub mod filter;
pub mod freq;
pub mod limits;
pub mod policy_client;
pub mod refresh;
pub mod shaper;
pub mod throttle;
pub mod violations;

pub use config::FilterConfig;
pub use errors::{Error, Result};
pub use filter::{Admission, RequestHead, StreamState, WeirFilter};
