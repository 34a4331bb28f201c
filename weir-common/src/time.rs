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

use std::sync::OnceLock;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const USECS_IN_SEC: u64 = 1_000_000;

/// A wall-clock instant split into the current epoch second and how far
/// into that second we are. The throttle tables compare policy timestamps
/// at this resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch {
    pub secs: u64,
    pub usec_into_sec: u64,
}

fn since_epoch() -> Duration {
    // Pre-1970 clocks are not worth handling
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
}

pub fn epoch_now() -> Epoch {
    let now = since_epoch();
    Epoch {
        secs: now.as_secs(),
        usec_into_sec: u64::from(now.subsec_micros()),
    }
}

/// Microseconds since the unix epoch; the resolution policy messages are
/// stamped with.
pub fn epoch_usec() -> u64 {
    let now = since_epoch();
    now.as_secs() * USECS_IN_SEC + u64::from(now.subsec_micros())
}

fn process_start() -> Instant {
    static START: OnceLock<Instant> = OnceLock::new();
    *START.get_or_init(Instant::now)
}

/// Monotonic milliseconds since process start. All edge-table ticks
/// (cleanup deadlines, send gates, throttle-log gates) are expressed in
/// this clock so wall-clock steps cannot confuse them.
pub fn now_ms() -> u64 {
    process_start().elapsed().as_millis() as u64
}
