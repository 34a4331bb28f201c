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

//! The two text protocols that tie the weir data plane together:
//!
//! * [`events`] — the `~|~`-delimited lines every edge emits towards its
//!   local collector over UDP.
//! * [`policy`] and [`framing`] — the line-oriented policy channel the
//!   generator uses to push violations and bandwidth limit-shares back to
//!   every edge over TCP.

pub mod events;
pub mod framing;
pub mod policy;

pub use events::{Event, EventParseError, Payload, DELIMITER};
pub use framing::{FrameReader, Framed};
pub use policy::{InstanceShare, LimitShare, Policy, PolicyParseError};
