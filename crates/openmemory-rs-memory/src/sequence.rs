//! Per-timestamp sequence allocation for near-simultaneous messages.
//!
//! Counters live in process memory and are not persisted, so continuity is
//! only guaranteed within one running process. Two processes writing at the
//! same timestamp can hand out the same sequence; the store's unique key then
//! drops one of the inserts as a duplicate.

use crate::clock::{Clock, SystemClock};
use crate::policy::SequencePolicy;
use chrono::{DateTime, Utc};
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct SequenceCounter {
    count: u32,
    last_update: DateTime<Utc>,
}

/// Hands out small integers that disambiguate records sharing a timestamp.
#[derive(Debug)]
pub struct SequenceAllocator {
    policy: SequencePolicy,
    clock: Arc<dyn Clock>,
    counters: Mutex<HashMap<i64, SequenceCounter>>,
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new(SequencePolicy::default(), Arc::new(SystemClock))
    }
}

impl SequenceAllocator {
    /// Create an allocator with an explicit policy and time source.
    pub fn new(policy: SequencePolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate the next sequence number for `timestamp`.
    pub fn allocate(&self, timestamp: i64) -> u32 {
        let now = self.clock.now();
        let window = chrono::Duration::from_std(self.policy.eviction_window)
            .unwrap_or(chrono::Duration::MAX);
        let cap = self.policy.cap.max(1);

        let mut counters = self.counters.lock();
        let before = counters.len();
        counters.retain(|_, counter| now - counter.last_update <= window);
        let evicted = before - counters.len();
        if evicted > 0 {
            debug!("evicted idle sequence counters (count={evicted})");
        }

        match counters.get_mut(&timestamp) {
            Some(counter) => {
                counter.count = (counter.count + 1) % cap;
                counter.last_update = now;
                counter.count
            }
            None => {
                counters.insert(
                    timestamp,
                    SequenceCounter {
                        count: 0,
                        last_update: now,
                    },
                );
                0
            }
        }
    }

    /// Number of live counters.
    pub fn tracked(&self) -> usize {
        self.counters.lock().len()
    }

    /// Active policy.
    pub fn policy(&self) -> &SequencePolicy {
        &self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::SequenceAllocator;
    use crate::clock::ManualClock;
    use crate::policy::SequencePolicy;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn allocator(cap: u32) -> (SequenceAllocator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch(1_700_000_000));
        let policy = SequencePolicy {
            cap,
            ..SequencePolicy::default()
        };
        (SequenceAllocator::new(policy, clock.clone()), clock)
    }

    #[test]
    fn same_timestamp_counts_up_from_zero() {
        let (allocator, _clock) = allocator(1000);
        let values = (0..5).map(|_| allocator.allocate(42)).collect::<Vec<_>>();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn distinct_timestamps_are_independent() {
        let (allocator, _clock) = allocator(1000);
        assert_eq!(allocator.allocate(1), 0);
        assert_eq!(allocator.allocate(2), 0);
        assert_eq!(allocator.allocate(1), 1);
        assert_eq!(allocator.tracked(), 2);
    }

    #[test]
    fn wraps_at_cap() {
        let (allocator, _clock) = allocator(1000);
        let values = (0..1001).map(|_| allocator.allocate(7)).collect::<Vec<_>>();
        assert_eq!(values[999], 999);
        assert_eq!(values[1000], 0);
    }

    #[test]
    fn wraps_at_configured_cap() {
        let (allocator, _clock) = allocator(3);
        let values = (0..5).map(|_| allocator.allocate(7)).collect::<Vec<_>>();
        assert_eq!(values, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn idle_counters_are_evicted_after_window() {
        let (allocator, clock) = allocator(1000);
        assert_eq!(allocator.allocate(9), 0);
        assert_eq!(allocator.allocate(9), 1);

        clock.advance(Duration::seconds(10));
        assert_eq!(allocator.allocate(9), 2);

        clock.advance(Duration::seconds(11));
        assert_eq!(allocator.allocate(10), 0);
        assert_eq!(allocator.tracked(), 1);
        assert_eq!(allocator.allocate(9), 0);
    }
}
