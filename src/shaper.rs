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

use crate::freq::FreqCounter;

/// All limits are defined per second.
pub const PERIOD_MS: u32 = 1000;
/// The counter slides over two periods, so nothing waits longer than that.
pub const MAX_WAIT_MS: u64 = 2 * PERIOD_MS as u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitResult {
    pub wait_ms: u64,
    pub bytes_to_forward: u32,
}

/// Ensure no more than `limit` bytes/s pass through `counter`, split
/// across `requests` concurrent requests of the same user on this
/// instance. `bytes_available` is what the stream could forward right
/// now; the result says how much of it may go immediately and how long to
/// wait before trying again.
///
/// Safe to call concurrently for the same counter: the single mutating
/// call is the counter update, which is itself thread-safe. Two racing
/// streams can both be granted quota and overshoot by one chunk; the next
/// call observes the overshoot and pauses them proportionally, which is
/// also what keeps the initial burst from draining the whole period at
/// once.
pub fn apply_bandwidth_limit(
    counter: &FreqCounter,
    limit: u32,
    requests: u32,
    bytes_available: u32,
    now_ms: u64,
) -> LimitResult {
    let requests = requests.max(1);

    let overshoot = counter.overshoot_period(PERIOD_MS, limit, now_ms);
    if overshoot > 0 {
        // Nothing is forwarded; wait long enough to not retry too early.
        // A zero limit cannot pay anything back, so it always waits the
        // full window rather than dividing by zero.
        let wait_ms = if limit > 0 {
            let wait = overshoot as u64 * u64::from(PERIOD_MS) * u64::from(requests)
                / u64::from(limit);
            wait.min(MAX_WAIT_MS)
        } else {
            MAX_WAIT_MS
        };
        return LimitResult {
            wait_ms,
            bytes_to_forward: 0,
        };
    }

    let quota = counter.remain_period(PERIOD_MS, limit, now_ms);
    // Divide the remaining quota evenly between the user's local active
    // requests, rounding up so a tiny remainder is not stuck undelivered
    let per_request = (u64::from(quota) + u64::from(requests) - 1) / u64::from(requests);
    let bytes_to_forward = bytes_available.min(per_request.min(u64::from(u32::MAX)) as u32);

    counter.update(PERIOD_MS, bytes_to_forward, now_ms);

    let wait_ms = if bytes_to_forward < bytes_available {
        counter
            .next_event_delay_period(PERIOD_MS, limit, now_ms)
            .min(MAX_WAIT_MS)
    } else {
        0
    };
    LimitResult {
        wait_ms,
        bytes_to_forward,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn under_the_limit_everything_forwards() {
        let counter = FreqCounter::new();
        let result = apply_bandwidth_limit(&counter, 10_000, 1, 4096, 5_000);
        assert_eq!(result.bytes_to_forward, 4096);
        assert_eq!(result.wait_ms, 0);
    }

    #[test]
    fn quota_splits_across_concurrent_requests() {
        let counter = FreqCounter::new();
        let result = apply_bandwidth_limit(&counter, 10_000, 4, u32::MAX, 5_000);
        assert_eq!(result.bytes_to_forward, 2500);
        // Plenty of quota remains for the other requests, so no wait yet
        assert_eq!(result.wait_ms, 0);
    }

    #[test]
    fn overshoot_pauses_proportionally() {
        let counter = FreqCounter::new();
        let now = 5_000;
        // Drain the whole second up front
        let first = apply_bandwidth_limit(&counter, 1000, 1, u32::MAX, now);
        assert_eq!(first.bytes_to_forward, 1000);
        // The next attempt overshoots and must wait, forwarding nothing
        let second = apply_bandwidth_limit(&counter, 1000, 1, 512, now + 1);
        assert_eq!(second.bytes_to_forward, 0);
        assert!(second.wait_ms > 0 && second.wait_ms <= MAX_WAIT_MS);
    }

    #[test]
    fn zero_limit_waits_the_maximum_not_divides_by_zero() {
        let counter = FreqCounter::new();
        let now = 5_000;
        counter.update(PERIOD_MS, 1, now);
        let result = apply_bandwidth_limit(&counter, 0, 1, 512, now + 1);
        assert_eq!(result.bytes_to_forward, 0);
        assert_eq!(result.wait_ms, MAX_WAIT_MS);
    }

    #[test]
    fn zero_concurrency_is_treated_as_one() {
        let counter = FreqCounter::new();
        let result = apply_bandwidth_limit(&counter, 1000, 0, 100, 5_000);
        assert_eq!(result.bytes_to_forward, 100);
    }

    #[test]
    fn forwarded_bytes_are_counted() {
        let counter = FreqCounter::new();
        let now = 5_000;
        apply_bandwidth_limit(&counter, 1000, 1, 600, now);
        assert_eq!(counter.remain_period(PERIOD_MS, 1000, now), 400);
    }
}
