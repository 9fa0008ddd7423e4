//! Wall-clock source for lock expiry and session lifetimes.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::time::Duration;

/// `now + d`, or `None` when the result is not a representable timestamp
pub fn checked_after(now: DateTime<Utc>, d: Duration) -> Option<DateTime<Utc>> {
    let delta = chrono::Duration::from_std(d).ok()?;
    now.checked_add_signed(delta)
}

/// Source of "now". Injected so lock windows and token expiry can be tested
/// without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward, stopping at the latest representable instant
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = checked_after(*now, by).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(61));
        assert_eq!(clock.now() - start, chrono::Duration::seconds(61));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_checked_after_rejects_overflow() {
        let now = Utc::now();
        assert_eq!(
            checked_after(now, Duration::from_secs(60)),
            Some(now + chrono::Duration::seconds(60))
        );
        assert_eq!(checked_after(now, Duration::from_secs(10_000_000_000_000_000)), None);
        assert_eq!(checked_after(now, Duration::MAX), None);
    }
}
