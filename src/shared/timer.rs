//! Deadline Timer Wheel
//!
//! Single-owner timer table driven by an explicit clock. Arming returns a
//! [`TimerHandle`]; a handle fires at most once and never fires after it
//! has been cancelled. The event loop sleeps until [`TimerWheel::next_deadline`]
//! and then calls [`TimerWheel::expire`].

use std::collections::{BTreeMap, HashMap};

use tokio::time::Instant;

/// Opaque handle for one armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

/// Timer table keyed by deadline
#[derive(Debug)]
pub struct TimerWheel<K> {
    next_handle: u64,
    queue: BTreeMap<(Instant, TimerHandle), K>,
    deadlines: HashMap<TimerHandle, Instant>,
}

impl<K> TimerWheel<K> {
    pub fn new() -> Self {
        Self {
            next_handle: 0,
            queue: BTreeMap::new(),
            deadlines: HashMap::new(),
        }
    }

    /// Arm a timer that fires once `deadline` is reached
    pub fn arm(&mut self, deadline: Instant, key: K) -> TimerHandle {
        self.next_handle += 1;
        let handle = TimerHandle(self.next_handle);
        self.queue.insert((deadline, handle), key);
        self.deadlines.insert(handle, deadline);
        handle
    }

    /// Cancel a pending timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.deadlines.remove(&handle) {
            Some(deadline) => self.queue.remove(&(deadline, handle)).is_some(),
            None => false,
        }
    }

    /// Whether the handle is still pending
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        self.deadlines.contains_key(&handle)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer whose deadline is at or before `now`,
    /// in deadline order.
    pub fn expire(&mut self, now: Instant) -> Vec<(TimerHandle, K)> {
        let mut fired = Vec::new();
        while let Some(entry) = self.queue.first_entry() {
            let (deadline, handle) = *entry.key();
            if deadline > now {
                break;
            }
            let key = entry.remove();
            self.deadlines.remove(&handle);
            fired.push((handle, key));
        }
        fired
    }

    /// Cancel everything
    pub fn clear(&mut self) {
        self.queue.clear();
        self.deadlines.clear();
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}

impl<K> Default for TimerWheel<K> {
    fn default() -> Self {
        Self::new()
    }
}
