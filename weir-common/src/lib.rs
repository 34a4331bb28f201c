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

//! Data model shared by every weir component: transfer directions, user
//! keys and their reserved values, instance ids, the limits table loaded
//! from the cache-limits file, delimited-string splitting and the epoch
//! clock the edge tables run on.

mod direction;
mod keys;
mod limits;
mod split;
mod time;

pub use direction::{Direction, UnknownDirection};
pub use keys::{
    instance_id, is_printable_ascii, is_valid_user_key, sanitize_user_key, ANONYMOUS_USER_KEY,
    DEFAULT_TIER, INVALID_USER_KEY, LEGACY_USER_KEY_LENGTH, USER_KEY_LENGTH,
};
pub use limits::{hard_coded_limit, LimitKind, LimitsTable, Tier, MB};
pub use split::Split;
pub use time::{epoch_now, epoch_usec, now_ms, Epoch};

/// Separator between the entity part of an aggregate key and the endpoint
/// it belongs to. Chosen because it is invalid in user keys, hostnames and
/// instance ids.
pub const ENDPOINT_SEPARATOR: char = '$';
