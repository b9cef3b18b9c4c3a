//! Time system for fixed-rate simulation
//!
//! Every participant runs its own clock. Values from different clocks are
//! never compared directly; the observer and reconciliation paths convert
//! between them explicitly.
//!
//! - `SimTime` - A point on one participant's clock (microsecond resolution)
//! - `TickRate` - Fixed simulation rate and the tick interval derived from it

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::time::Duration;

/// A point in time on a single participant's clock
///
/// Stored as whole microseconds so it can be used as an ordered map key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    /// The start of every clock
    pub const ZERO: SimTime = SimTime(0);

    /// Create a time from microseconds
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Create a time from milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000))
    }

    /// Create a time from fractional seconds (negative values clamp to zero)
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs <= 0.0 {
            return Self::ZERO;
        }
        Self((secs * 1_000_000.0).round() as u64)
    }

    /// Get the raw microsecond value
    pub fn as_micros(&self) -> u64 {
        self.0
    }

    /// Get the time as fractional seconds
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Move back by `delta`, stopping at zero
    pub fn saturating_sub(self, delta: Duration) -> Self {
        Self(self.0.saturating_sub(duration_micros(delta)))
    }

    /// Elapsed time since `earlier` (zero if `earlier` is later)
    pub fn duration_since(self, earlier: SimTime) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0.saturating_add(duration_micros(rhs)))
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: Duration) -> SimTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.as_secs_f64())
    }
}

fn duration_micros(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Fastest rate whose tick interval is still a whole microsecond
pub const MAX_TICKS_PER_SECOND: u32 = 1_000_000;

/// Fixed simulation rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickRate {
    ticks_per_second: u32,
}

impl TickRate {
    /// Create a tick rate
    ///
    /// Zero, or more than [`MAX_TICKS_PER_SECOND`], is rejected: a tick
    /// shorter than a microsecond would put every tick at the same time.
    pub fn new(ticks_per_second: u32) -> Result<Self> {
        if ticks_per_second == 0 || ticks_per_second > MAX_TICKS_PER_SECOND {
            return Err(Error::InvalidTickRate(ticks_per_second));
        }
        Ok(Self { ticks_per_second })
    }

    /// Ticks per second
    pub fn ticks_per_second(&self) -> u32 {
        self.ticks_per_second
    }

    /// Length of one tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.ticks_per_second))
    }

    /// Number of whole ticks that fit in `span`
    pub fn ticks_in(&self, span: Duration) -> usize {
        let interval = duration_micros(self.tick_interval()).max(1);
        (duration_micros(span) / interval) as usize
    }

    /// Clock time at which tick `index` starts
    pub fn tick_time(&self, index: u64) -> SimTime {
        SimTime::from_micros(index.saturating_mul(duration_micros(self.tick_interval())))
    }
}

impl Default for TickRate {
    fn default() -> Self {
        Self {
            ticks_per_second: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_time_arithmetic() {
        let t = SimTime::from_millis(100);
        assert_eq!((t + Duration::from_millis(50)).as_micros(), 150_000);
        assert_eq!((t - Duration::from_millis(30)).as_micros(), 70_000);
        assert_eq!(t.saturating_sub(Duration::from_secs(1)), SimTime::ZERO);
        assert_eq!(
            SimTime::from_millis(250).duration_since(t),
            Duration::from_millis(150)
        );
        assert_eq!(t.duration_since(SimTime::from_millis(250)), Duration::ZERO);
    }

    #[test]
    fn test_sim_time_secs() {
        assert_eq!(SimTime::from_secs_f64(0.05), SimTime::from_millis(50));
        assert_eq!(SimTime::from_secs_f64(-1.0), SimTime::ZERO);
        assert_eq!(SimTime::from_millis(1500).to_string(), "1.500s");
    }

    #[test]
    fn test_tick_rate() {
        let rate = TickRate::new(20).unwrap();
        assert_eq!(rate.tick_interval(), Duration::from_millis(50));
        assert_eq!(rate.ticks_in(Duration::from_millis(100)), 2);
        assert_eq!(rate.ticks_in(Duration::from_secs(1)), 20);
        assert_eq!(rate.tick_time(3), SimTime::from_millis(150));
    }

    #[test]
    fn test_zero_tick_rate_rejected() {
        assert!(matches!(TickRate::new(0), Err(Error::InvalidTickRate(0))));
    }

    #[test]
    fn test_sub_microsecond_tick_rate_rejected() {
        let fastest = TickRate::new(MAX_TICKS_PER_SECOND).unwrap();
        assert_eq!(fastest.tick_interval(), Duration::from_micros(1));
        assert_ne!(fastest.tick_time(1), fastest.tick_time(2));

        assert!(matches!(
            TickRate::new(MAX_TICKS_PER_SECOND + 1),
            Err(Error::InvalidTickRate(1_000_001))
        ));
        assert!(TickRate::new(u32::MAX).is_err());
    }

    #[test]
    fn test_sim_time_ron() {
        let t = SimTime::from_millis(42);
        let text = ron::to_string(&t).unwrap();
        assert_eq!(text, "42000");
        let back: SimTime = ron::from_str(&text).unwrap();
        assert_eq!(back, t);
    }
}
