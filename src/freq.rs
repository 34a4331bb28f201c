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

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// A lock-free sliding-window frequency counter.
///
/// Events are accumulated into the current period; when a period rolls
/// over, the current count becomes the previous count and the estimated
/// rate is the previous count scaled by how much of it still overlaps the
/// sliding window plus the current count. The estimate is approximate
/// under concurrent rotation, never unsafe; rates are u32 (bytes per
/// second in practice).
///
/// All methods take `now_ms` explicitly so callers share one clock and
/// tests can drive time by hand.
pub struct FreqCounter {
    /// High 32 bits: period start tick, low 32 bits: current count.
    /// Packing both into one word lets rotation happen in a single CAS.
    state: AtomicU64,
    prev: AtomicU32,
}

impl Default for FreqCounter {
    fn default() -> Self {
        Self::new()
    }
}

fn pack(tick: u32, count: u32) -> u64 {
    (u64::from(tick) << 32) | u64::from(count)
}

impl FreqCounter {
    pub fn new() -> Self {
        Self {
            state: AtomicU64::new(0),
            prev: AtomicU32::new(0),
        }
    }

    /// Current count, previous count and elapsed-in-period after logically
    /// rotating the window to `now_ms`.
    fn snapshot(&self, period_ms: u32, now_ms: u64) -> (u32, u32, u32) {
        let state = self.state.load(Ordering::Relaxed);
        let tick = (state >> 32) as u32;
        let curr = state as u32;
        let prev = self.prev.load(Ordering::Relaxed);
        let elapsed = (now_ms as u32).wrapping_sub(tick);
        if elapsed >= 2 * period_ms {
            (0, 0, elapsed % period_ms)
        } else if elapsed >= period_ms {
            (0, curr, elapsed - period_ms)
        } else {
            (curr, prev, elapsed)
        }
    }

    fn sliding_estimate(curr: u32, prev: u32, elapsed: u32, period_ms: u32) -> u32 {
        let overlap = u64::from(prev) * u64::from(period_ms - elapsed) / u64::from(period_ms);
        (overlap + u64::from(curr)).min(u64::from(u32::MAX)) as u32
    }

    /// Record `count` events at `now_ms`, rotating the window first when
    /// the period rolled over.
    pub fn update(&self, period_ms: u32, count: u32, now_ms: u64) {
        let now = now_ms as u32;
        loop {
            let state = self.state.load(Ordering::Relaxed);
            let tick = (state >> 32) as u32;
            let curr = state as u32;
            let elapsed = now.wrapping_sub(tick);
            if elapsed < period_ms {
                let next = pack(tick, curr.saturating_add(count));
                if self
                    .state
                    .compare_exchange_weak(state, next, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
            } else {
                let (new_tick, new_prev) = if elapsed >= 2 * period_ms {
                    (now, 0)
                } else {
                    (tick.wrapping_add(period_ms), curr)
                };
                if self
                    .state
                    .compare_exchange_weak(
                        state,
                        pack(new_tick, count),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    self.prev.store(new_prev, Ordering::Relaxed);
                    return;
                }
            }
        }
    }

    /// How many events the current period is ahead of its pro-rata budget.
    /// Positive values mean the caller consumed faster than `rate` allows
    /// so far this period; zero or negative means there is headroom.
    pub fn overshoot_period(&self, period_ms: u32, rate: u32, now_ms: u64) -> i64 {
        let (curr, _prev, elapsed) = self.snapshot(period_ms, now_ms);
        let budget = (u64::from(elapsed) + 1) * u64::from(rate) / u64::from(period_ms);
        i64::from(curr) - budget as i64
    }

    /// Events still available under `rate` for the sliding window.
    pub fn remain_period(&self, period_ms: u32, rate: u32, now_ms: u64) -> u32 {
        let (curr, prev, elapsed) = self.snapshot(period_ms, now_ms);
        let pending = Self::sliding_estimate(curr, prev, elapsed, period_ms);
        rate.saturating_sub(pending)
    }

    /// Milliseconds until the next event fits under `rate`; 0 when one
    /// fits now. Excess events pay back at `rate` per period.
    pub fn next_event_delay_period(&self, period_ms: u32, rate: u32, now_ms: u64) -> u64 {
        let (curr, prev, elapsed) = self.snapshot(period_ms, now_ms);
        let pending = Self::sliding_estimate(curr, prev, elapsed, period_ms);
        if pending < rate {
            return 0;
        }
        if rate == 0 {
            return u64::from(2 * period_ms);
        }
        let wait = u64::from(pending - rate + 1) * u64::from(period_ms) / u64::from(rate);
        wait.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: u32 = 1000;

    #[test]
    fn fresh_counter_has_full_budget() {
        let ctr = FreqCounter::new();
        let now = 5_000;
        assert!(ctr.overshoot_period(PERIOD, 1000, now) <= 0);
        assert_eq!(ctr.remain_period(PERIOD, 1000, now), 1000);
        assert_eq!(ctr.next_event_delay_period(PERIOD, 1000, now), 0);
    }

    #[test]
    fn consuming_the_budget_early_overshoots() {
        let ctr = FreqCounter::new();
        let now = 5_000;
        ctr.update(PERIOD, 1000, now);
        // Milliseconds into the period, the pro-rata budget is tiny
        let overshoot = ctr.overshoot_period(PERIOD, 1000, now + 1);
        assert!(overshoot > 900, "overshoot = {}", overshoot);
        assert_eq!(ctr.remain_period(PERIOD, 1000, now + 1), 0);
        assert!(ctr.next_event_delay_period(PERIOD, 1000, now + 1) >= 1);
    }

    #[test]
    fn previous_period_decays_across_the_window() {
        let ctr = FreqCounter::new();
        let start = 10_000;
        ctr.update(PERIOD, 800, start);
        // One period later the 800 became "previous" and decays linearly
        let remain_early = ctr.remain_period(PERIOD, 1000, start + u64::from(PERIOD) + 100);
        let remain_late = ctr.remain_period(PERIOD, 1000, start + u64::from(PERIOD) + 900);
        assert!(remain_early < remain_late);
        assert!(remain_early >= 200 - 10);
        // Two periods later the events aged out entirely
        assert_eq!(
            ctr.remain_period(PERIOD, 1000, start + 2 * u64::from(PERIOD)),
            1000
        );
    }

    #[test]
    fn zero_rate_never_admits() {
        let ctr = FreqCounter::new();
        let now = 5_000;
        assert_eq!(ctr.remain_period(PERIOD, 0, now), 0);
        assert_eq!(
            ctr.next_event_delay_period(PERIOD, 0, now),
            u64::from(2 * PERIOD)
        );
    }

    #[test]
    fn updates_within_a_period_accumulate() {
        let ctr = FreqCounter::new();
        let now = 7_000;
        ctr.update(PERIOD, 100, now);
        ctr.update(PERIOD, 200, now + 10);
        assert_eq!(ctr.remain_period(PERIOD, 1000, now + 20), 700);
    }

    #[test]
    fn concurrent_updates_do_not_lose_counts() {
        use std::sync::Arc;
        let ctr = Arc::new(FreqCounter::new());
        let now = 9_000;
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ctr = ctr.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    ctr.update(PERIOD, 1, now);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(ctr.remain_period(PERIOD, 10_000, now), 10_000 - 4000);
    }
}
