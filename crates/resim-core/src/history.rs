//! Time-indexed history trait
//!
//! This trait is used by:
//! - `resim-history` for the bounded ring of per-entity snapshots and commands
//! - `resim-netcode` for prediction, reconciliation, observer playback, and
//!   lag compensation lookups
//!
//! Keys are times on a single clock. Under normal operation keys arrive in
//! strictly increasing order; replays write to keys that already exist.

use crate::SimTime;

/// A stored entry: its key and a borrow of its value
pub type TimedRef<'a, T> = (SimTime, &'a T);

/// Ordered map from time to value with bounded capacity.
pub trait TimeHistory<T> {
    /// Insert `value` at `time` and return the value actually stored.
    ///
    /// An existing entry at `time` is replaced (its authoritative flag is
    /// cleared). When capacity is exceeded the oldest entry is evicted, even
    /// if it is authoritative. Returns `None` only when `time` is older than
    /// every entry of a full history, in which case nothing is stored.
    fn add(&mut self, time: SimTime, value: T) -> Option<&T>;

    /// Get the value at exactly `time`.
    fn get_exact(&self, time: SimTime) -> Option<&T>;

    /// Get the latest entry with key `<= time`.
    ///
    /// Falls back to the oldest entry when `time` precedes the buffer, so this
    /// only returns `None` when the history is empty.
    fn get(&self, time: SimTime) -> Option<TimedRef<'_, T>>;

    /// Get the bracketing pair `(prev, next)` with `prev.0 <= time <= next.0`.
    ///
    /// Returns `None` if `time` lies outside the buffered range or fewer than
    /// two entries are stored.
    fn get_around(&self, time: SimTime) -> Option<(TimedRef<'_, T>, TimedRef<'_, T>)>;

    /// All entries with key strictly after `time`, oldest first.
    fn get_all_after(&self, time: SimTime) -> Vec<TimedRef<'_, T>>;

    /// Replace the value at an existing key, keeping its position.
    ///
    /// Returns `false` and changes nothing if `time` is not stored.
    fn overwrite(&mut self, time: SimTime, value: T) -> bool;

    /// Set the authoritative flag of the entry at `time`.
    ///
    /// Returns `false` if `time` is not stored.
    fn set_authoritative(&mut self, time: SimTime, authoritative: bool) -> bool;

    /// Whether the entry at `time` exists and is marked authoritative.
    fn is_authoritative(&self, time: SimTime) -> bool;

    /// Remove every entry.
    fn clear(&mut self);

    /// Maximum number of entries kept.
    fn capacity(&self) -> usize;

    /// Number of entries currently stored.
    fn len(&self) -> usize;

    /// Check if the history is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Oldest stored entry.
    fn oldest(&self) -> Option<TimedRef<'_, T>>;

    /// Newest stored entry.
    fn newest(&self) -> Option<TimedRef<'_, T>>;

    /// Get the time range of stored entries as `(oldest, newest)`.
    fn time_range(&self) -> Option<(SimTime, SimTime)> {
        Some((self.oldest()?.0, self.newest()?.0))
    }

    /// Whether `time` lies within the stored range (inclusive).
    fn contains_time(&self, time: SimTime) -> bool {
        self.time_range()
            .is_some_and(|(oldest, newest)| time >= oldest && time <= newest)
    }
}

/// A bracketing pair plus the normalized position of the target between them
pub type Bracket<'a, T> = (TimedRef<'a, T>, TimedRef<'a, T>, f32);

/// Extension trait for interpolating between stored entries
pub trait HistoryInterpolation<T>: TimeHistory<T> {
    /// Get the bracketing pair around `time` and the blend factor between them.
    fn bracket(&self, time: SimTime) -> Option<Bracket<'_, T>> {
        let (prev, next) = self.get_around(time)?;
        let alpha = interpolation_factor(prev.0, next.0, time);
        Some((prev, next, alpha))
    }
}

// Blanket implementation: any TimeHistory can interpolate
impl<T, H: TimeHistory<T> + ?Sized> HistoryInterpolation<T> for H {}

/// Calculate the interpolation factor of `target` between two keys.
///
/// Returns a value in [0.0, 1.0] where:
/// - 0.0 means use the "before" entry entirely
/// - 1.0 means use the "after" entry entirely
pub fn interpolation_factor(before: SimTime, after: SimTime, target: SimTime) -> f32 {
    if after <= before {
        return 0.0;
    }
    let range = (after.as_micros() - before.as_micros()) as f64;
    let offset = target.as_micros().saturating_sub(before.as_micros()) as f64;
    (offset / range).clamp(0.0, 1.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unbounded, sorted-vector history used to exercise the provided methods
    struct VecHistory {
        entries: Vec<(SimTime, u32, bool)>,
    }

    impl TimeHistory<u32> for VecHistory {
        fn add(&mut self, time: SimTime, value: u32) -> Option<&u32> {
            self.entries.retain(|(t, _, _)| *t != time);
            self.entries.push((time, value, false));
            self.entries.sort_by_key(|(t, _, _)| *t);
            self.get_exact(time)
        }

        fn get_exact(&self, time: SimTime) -> Option<&u32> {
            self.entries
                .iter()
                .find(|(t, _, _)| *t == time)
                .map(|(_, v, _)| v)
        }

        fn get(&self, time: SimTime) -> Option<TimedRef<'_, u32>> {
            self.entries
                .iter()
                .rev()
                .find(|(t, _, _)| *t <= time)
                .or(self.entries.first())
                .map(|(t, v, _)| (*t, v))
        }

        fn get_around(&self, time: SimTime) -> Option<(TimedRef<'_, u32>, TimedRef<'_, u32>)> {
            let idx = self.entries.iter().position(|(t, _, _)| *t > time)?;
            if idx == 0 {
                return None;
            }
            let (pt, pv, _) = &self.entries[idx - 1];
            let (nt, nv, _) = &self.entries[idx];
            Some(((*pt, pv), (*nt, nv)))
        }

        fn get_all_after(&self, time: SimTime) -> Vec<TimedRef<'_, u32>> {
            self.entries
                .iter()
                .filter(|(t, _, _)| *t > time)
                .map(|(t, v, _)| (*t, v))
                .collect()
        }

        fn overwrite(&mut self, time: SimTime, value: u32) -> bool {
            match self.entries.iter_mut().find(|(t, _, _)| *t == time) {
                Some(entry) => {
                    entry.1 = value;
                    true
                }
                None => false,
            }
        }

        fn set_authoritative(&mut self, time: SimTime, authoritative: bool) -> bool {
            match self.entries.iter_mut().find(|(t, _, _)| *t == time) {
                Some(entry) => {
                    entry.2 = authoritative;
                    true
                }
                None => false,
            }
        }

        fn is_authoritative(&self, time: SimTime) -> bool {
            self.entries.iter().any(|(t, _, a)| *t == time && *a)
        }

        fn clear(&mut self) {
            self.entries.clear();
        }

        fn capacity(&self) -> usize {
            usize::MAX
        }

        fn len(&self) -> usize {
            self.entries.len()
        }

        fn oldest(&self) -> Option<TimedRef<'_, u32>> {
            self.entries.first().map(|(t, v, _)| (*t, v))
        }

        fn newest(&self) -> Option<TimedRef<'_, u32>> {
            self.entries.last().map(|(t, v, _)| (*t, v))
        }
    }

    fn ms(v: u64) -> SimTime {
        SimTime::from_millis(v)
    }

    #[test]
    fn test_time_range_and_contains() {
        let mut history = VecHistory {
            entries: Vec::new(),
        };
        assert!(history.time_range().is_none());
        assert!(!history.contains_time(ms(0)));

        history.add(ms(10), 1);
        history.add(ms(30), 3);
        history.add(ms(20), 2);

        assert_eq!(history.time_range(), Some((ms(10), ms(30))));
        assert!(history.contains_time(ms(25)));
        assert!(!history.contains_time(ms(31)));
        assert!(!history.is_empty());
    }

    #[test]
    fn test_bracket() {
        let mut history = VecHistory {
            entries: Vec::new(),
        };
        history.add(ms(0), 0);
        history.add(ms(100), 10);

        let ((prev_t, prev), (next_t, next), alpha) = history.bracket(ms(25)).unwrap();
        assert_eq!((prev_t, *prev), (ms(0), 0));
        assert_eq!((next_t, *next), (ms(100), 10));
        assert_eq!(alpha, 0.25);

        assert!(history.bracket(ms(150)).is_none());
    }

    #[test]
    fn test_interpolation_factor() {
        assert_eq!(interpolation_factor(ms(0), ms(10), ms(0)), 0.0);
        assert_eq!(interpolation_factor(ms(0), ms(10), ms(10)), 1.0);
        assert_eq!(interpolation_factor(ms(0), ms(10), ms(5)), 0.5);
        assert_eq!(interpolation_factor(ms(10), ms(10), ms(10)), 0.0);
        assert_eq!(interpolation_factor(ms(0), ms(10), ms(20)), 1.0);
    }
}
