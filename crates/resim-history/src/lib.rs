//! Resim History - Bounded, time-ordered history buffer
//!
//! This crate provides the `TimeHistory` implementation used for every
//! per-entity buffer: predicted and confirmed snapshots, issued commands,
//! and raw remote snapshots awaiting playback.
//!
//! # Features
//!
//! - **Bounded memory**: Fixed capacity, no unbounded growth
//! - **O(1) append**: Normal in-order insertion is a push to the back
//! - **O(log n) lookup**: Binary search over sorted keys
//! - **Unconditional eviction**: The oldest entry is dropped when full,
//!   authoritative or not
//!
//! # Example
//!
//! ```rust
//! use resim_core::{SimTime, TimeHistory};
//! use resim_history::TimeIndexedHistory;
//!
//! let mut history = TimeIndexedHistory::new(3);
//! for ms in [0, 50, 100, 150] {
//!     history.add(SimTime::from_millis(ms), ms);
//! }
//!
//! // Oldest entry was evicted
//! assert_eq!(history.len(), 3);
//! assert!(history.get_exact(SimTime::from_millis(0)).is_none());
//!
//! // Best known state at or before a time
//! let (time, value) = history.get(SimTime::from_millis(120)).unwrap();
//! assert_eq!((time, *value), (SimTime::from_millis(100), 100));
//! ```

use resim_core::{SimTime, TickRate, TimeHistory, TimedRef};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::trace;

/// One stored entry
#[derive(Debug, Clone)]
struct Slot<T> {
    time: SimTime,
    value: T,
    authoritative: bool,
}

/// A bounded, time-ordered history
///
/// Entries are kept sorted by time. Normal operation appends strictly
/// increasing keys; replays write to keys that already exist.
#[derive(Debug, Clone)]
pub struct TimeIndexedHistory<T> {
    /// Sorted storage, oldest at the front
    entries: VecDeque<Slot<T>>,
    /// Capacity (max entries)
    capacity: usize,
    /// Entries dropped by capacity eviction since creation
    evicted: u64,
}

impl<T> TimeIndexedHistory<T> {
    /// Create a new history holding at most `capacity` entries
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Create a history sized to hold `span` worth of ticks
    ///
    /// # Example
    ///
    /// ```rust
    /// use resim_core::{TickRate, TimeHistory};
    /// use resim_history::TimeIndexedHistory;
    /// use std::time::Duration;
    ///
    /// // One second of history at 20 ticks per second
    /// let rate = TickRate::new(20).unwrap();
    /// let history: TimeIndexedHistory<u32> =
    ///     TimeIndexedHistory::for_duration(rate, Duration::from_secs(1));
    /// assert_eq!(history.capacity(), 20);
    /// ```
    pub fn for_duration(rate: TickRate, span: Duration) -> Self {
        Self::new(rate.ticks_in(span))
    }

    /// Iterate over stored entries (oldest to newest)
    pub fn iter(&self) -> impl Iterator<Item = TimedRef<'_, T>> {
        self.entries.iter().map(|s| (s.time, &s.value))
    }

    /// Iterate over stored keys (oldest to newest)
    pub fn times(&self) -> impl Iterator<Item = SimTime> + '_ {
        self.entries.iter().map(|s| s.time)
    }

    /// Find the first entry (oldest first) whose value satisfies `pred`
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<TimedRef<'_, T>> {
        self.iter().find(|(_, v)| pred(v))
    }

    /// Get statistics about the history
    pub fn stats(&self) -> HistoryStats {
        let (oldest, newest) = self.time_range().unwrap_or((SimTime::ZERO, SimTime::ZERO));
        HistoryStats {
            capacity: self.capacity,
            count: self.entries.len(),
            oldest,
            newest,
            evicted: self.evicted,
        }
    }

    fn search(&self, time: SimTime) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&time, |s| s.time)
    }

    /// Number of entries with key `<= time`
    fn count_up_to(&self, time: SimTime) -> usize {
        self.entries.partition_point(|s| s.time <= time)
    }

    fn timed(&self, index: usize) -> Option<TimedRef<'_, T>> {
        self.entries.get(index).map(|s| (s.time, &s.value))
    }
}

impl<T> TimeHistory<T> for TimeIndexedHistory<T> {
    fn add(&mut self, time: SimTime, value: T) -> Option<&T> {
        let index = match self.search(time) {
            Ok(index) => {
                let slot = &mut self.entries[index];
                slot.value = value;
                slot.authoritative = false;
                index
            }
            Err(index) => {
                let full = self.entries.len() >= self.capacity;
                if full && index == 0 {
                    trace!(%time, "history full, dropping entry older than buffer");
                    return None;
                }
                self.entries.insert(
                    index,
                    Slot {
                        time,
                        value,
                        authoritative: false,
                    },
                );
                if full {
                    if let Some(old) = self.entries.pop_front() {
                        self.evicted += 1;
                        trace!(evicted = %old.time, "history at capacity, evicted oldest");
                    }
                    index - 1
                } else {
                    index
                }
            }
        };
        self.entries.get(index).map(|s| &s.value)
    }

    fn get_exact(&self, time: SimTime) -> Option<&T> {
        self.search(time).ok().map(|i| &self.entries[i].value)
    }

    fn get(&self, time: SimTime) -> Option<TimedRef<'_, T>> {
        match self.count_up_to(time) {
            0 => self.timed(0),
            n => self.timed(n - 1),
        }
    }

    fn get_around(&self, time: SimTime) -> Option<(TimedRef<'_, T>, TimedRef<'_, T>)> {
        let len = self.entries.len();
        let n = self.count_up_to(time);
        let prev = match n {
            0 => return None,
            n if n == len => {
                // Only an exact hit on the newest key is still in range
                if len < 2 || self.entries[len - 1].time != time {
                    return None;
                }
                len - 2
            }
            n => n - 1,
        };
        Some((self.timed(prev)?, self.timed(prev + 1)?))
    }

    fn get_all_after(&self, time: SimTime) -> Vec<TimedRef<'_, T>> {
        let start = self.count_up_to(time);
        self.entries
            .range(start..)
            .map(|s| (s.time, &s.value))
            .collect()
    }

    fn overwrite(&mut self, time: SimTime, value: T) -> bool {
        match self.search(time) {
            Ok(index) => {
                self.entries[index].value = value;
                true
            }
            Err(_) => false,
        }
    }

    fn set_authoritative(&mut self, time: SimTime, authoritative: bool) -> bool {
        match self.search(time) {
            Ok(index) => {
                self.entries[index].authoritative = authoritative;
                true
            }
            Err(_) => false,
        }
    }

    fn is_authoritative(&self, time: SimTime) -> bool {
        self.search(time)
            .map(|i| self.entries[i].authoritative)
            .unwrap_or(false)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn oldest(&self) -> Option<TimedRef<'_, T>> {
        self.entries.front().map(|s| (s.time, &s.value))
    }

    fn newest(&self) -> Option<TimedRef<'_, T>> {
        self.entries.back().map(|s| (s.time, &s.value))
    }
}

/// Statistics about a history buffer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryStats {
    /// Maximum capacity
    pub capacity: usize,
    /// Current number of stored entries
    pub count: usize,
    /// Oldest key in the buffer
    pub oldest: SimTime,
    /// Newest key in the buffer
    pub newest: SimTime,
    /// Entries dropped by capacity eviction
    pub evicted: u64,
}

impl HistoryStats {
    /// Get the covered span (newest - oldest)
    pub fn span(&self) -> Duration {
        self.newest.duration_since(self.oldest)
    }

    /// Get the fill percentage (0.0 to 1.0)
    pub fn fill_ratio(&self) -> f32 {
        self.count as f32 / self.capacity as f32
    }
}
