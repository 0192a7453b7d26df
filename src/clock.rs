use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::sync::Mutex;

/// Offset of Indian Standard Time from UTC, in seconds.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_epoch(&self) -> i64 {
        self.now().timestamp()
    }
}

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Wall-clock time reported in Indian Standard Time, independent of the host's zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct IstClock;

impl Clock for IstClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&ist())
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock(Mutex<DateTime<FixedOffset>>);

impl FixedClock {
    pub fn at_epoch(secs: i64) -> Self {
        let utc = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();
        Self(Mutex::new(utc.with_timezone(&ist())))
    }

    pub fn set_epoch(&self, secs: i64) {
        let utc = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();
        if let Ok(mut guard) = self.0.lock() {
            *guard = utc.with_timezone(&ist());
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut guard) = self.0.lock() {
            *guard += chrono::TimeDelta::seconds(secs);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        match self.0.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ist_clock_reports_plus_five_thirty() {
        let now = IstClock.now();
        assert_eq!(now.offset().local_minus_utc(), IST_OFFSET_SECS);
    }

    #[test]
    fn fixed_clock_keeps_epoch_and_advances() {
        let clock = FixedClock::at_epoch(1_700_000_000);
        assert_eq!(clock.now_epoch(), 1_700_000_000);
        clock.advance_secs(90);
        assert_eq!(clock.now_epoch(), 1_700_000_090);
        clock.set_epoch(42);
        assert_eq!(clock.now_epoch(), 42);
        assert_eq!(clock.now().offset().local_minus_utc(), IST_OFFSET_SECS);
    }
}
