//! Time sources and time zones used by the rotation rules.

use {
    chrono::{DateTime, Duration, FixedOffset, Local, Utc},
    std::{
        fmt::Debug,
        sync::{Mutex, PoisonError},
    },
};

/// Specifies the time zone used for calendar dates and timestamps in backup
/// file names.
///
/// # Examples
/// ```
/// use chrono::FixedOffset;
/// use rotatelog::TimeZone;
///
/// // Use UTC time for global deployments
/// let utc = TimeZone::UTC;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8)
/// let shanghai = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone)]
pub enum TimeZone {
    /// Use UTC time zone.
    UTC,
    /// Use the system's local time zone, including its daylight saving
    /// changes.
    Local,
    /// Use a fixed time zone offset.
    Fix(FixedOffset),
}

impl TimeZone {
    /// `time` as seen on this zone's wall clock. The local offset is looked
    /// up for `time` itself, so it follows daylight saving changes.
    pub(crate) fn at(&self, time: DateTime<Utc>) -> DateTime<FixedOffset> {
        match self {
            TimeZone::UTC => time.fixed_offset(),
            TimeZone::Local => time.with_timezone(&Local).fixed_offset(),
            TimeZone::Fix(fixed_offset) => time.with_timezone(fixed_offset),
        }
    }
}

/// A source of the current time.
///
/// Rules read "now" through a clock so rotation timing can be driven
/// deterministically in tests.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
///
/// ```
/// use chrono::{Duration, TimeZone as _, Utc};
/// use rotatelog::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 23, 59, 0).unwrap());
/// clock.advance(Duration::minutes(2));
/// assert_eq!(clock.now(), Utc.with_ymd_and_hms(2024, 3, 2, 0, 1, 0).unwrap());
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = *now + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        chrono::{Offset as _, TimeZone as _},
    };

    #[test]
    fn local_offset_follows_the_instant() {
        for time in [
            Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 7, 15, 12, 0, 0).unwrap(),
        ] {
            let expected = Local.offset_from_utc_datetime(&time.naive_utc()).fix();
            assert_eq!(*TimeZone::Local.at(time).offset(), expected, "{time}");
        }
    }

    #[test]
    fn fixed_zones_keep_their_offset() {
        let time = Utc.with_ymd_and_hms(2024, 3, 10, 20, 0, 0).unwrap();
        let east8 = FixedOffset::east_opt(8 * 3600).unwrap();

        assert_eq!(TimeZone::UTC.at(time).to_rfc3339(), "2024-03-10T20:00:00+00:00");
        assert_eq!(TimeZone::Fix(east8).at(time).to_rfc3339(), "2024-03-11T04:00:00+08:00");
    }
}
