//! Slot arithmetic in local wall-clock time.
//!
//! The core never converts between timezones itself: every instant here
//! is a naive wall-clock value in the timezone named by the request,
//! and the availability port hands that timezone name to the provider.
//! Busy intervals returned by the port are expressed in the same local
//! time, so overlap checks stay a pure comparison.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// First bookable hour of a business day (inclusive).
pub const BUSINESS_DAY_START_HOUR: u32 = 9;

/// Hour the business day ends (exclusive; the last slot starts at 17:00).
pub const BUSINESS_DAY_END_HOUR: u32 = 18;

/// A half-open `[start, end)` local-time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInterval {
    /// Inclusive start.
    pub start: NaiveDateTime,
    /// Exclusive end.
    pub end: NaiveDateTime,
}

impl SlotInterval {
    /// Builds the interval for a slot starting at `date`/`time` and
    /// lasting `duration_minutes`.
    #[must_use]
    pub fn for_slot(date: NaiveDate, time: NaiveTime, duration_minutes: u32) -> Self {
        let start = date.and_time(time);
        let end = start + Duration::minutes(i64::from(duration_minutes));
        Self { start, end }
    }

    /// Half-open interval overlap: `a.start < b.end && a.end > b.start`.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// Enumerates candidate slot starts over `[start_date, end_date]`:
/// weekdays only, one slot per hour within business hours. Output is
/// ordered ascending by date then time.
#[must_use]
pub fn business_slots(start_date: NaiveDate, end_date: NaiveDate) -> Vec<(NaiveDate, NaiveTime)> {
    let mut slots = Vec::new();
    for date in start_date.iter_days().take_while(|d| *d <= end_date) {
        if date.weekday().number_from_monday() > 5 {
            continue;
        }
        for hour in BUSINESS_DAY_START_HOUR..BUSINESS_DAY_END_HOUR {
            if let Some(time) = NaiveTime::from_hms_opt(hour, 0, 0) {
                slots.push((date, time));
            }
        }
    }
    slots
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d) else {
            panic!("valid date");
        };
        date
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        let Some(time) = NaiveTime::from_hms_opt(h, m, 0) else {
            panic!("valid time");
        };
        time
    }

    #[test]
    fn slot_interval_spans_duration() {
        let slot = SlotInterval::for_slot(date(2026, 3, 2), time(10, 0), 60);
        assert_eq!(slot.start, date(2026, 3, 2).and_time(time(10, 0)));
        assert_eq!(slot.end, date(2026, 3, 2).and_time(time(11, 0)));
    }

    #[test]
    fn slot_interval_crosses_midnight() {
        let slot = SlotInterval::for_slot(date(2026, 3, 2), time(23, 30), 60);
        assert_eq!(slot.end, date(2026, 3, 3).and_time(time(0, 30)));
    }

    #[test]
    fn overlap_is_half_open() {
        let a = SlotInterval::for_slot(date(2026, 3, 2), time(10, 0), 60);
        let adjacent = SlotInterval::for_slot(date(2026, 3, 2), time(11, 0), 60);
        let inside = SlotInterval::for_slot(date(2026, 3, 2), time(10, 30), 15);
        let before = SlotInterval::for_slot(date(2026, 3, 2), time(8, 0), 60);

        assert!(!a.overlaps(&adjacent));
        assert!(!adjacent.overlaps(&a));
        assert!(a.overlaps(&inside));
        assert!(!a.overlaps(&before));
    }

    #[test]
    fn business_slots_skip_weekends() {
        // 2026-03-06 is a Friday, 2026-03-09 a Monday.
        let slots = business_slots(date(2026, 3, 6), date(2026, 3, 9));
        assert_eq!(slots.len(), 18); // two weekdays x nine hourly slots
        assert!(slots.iter().all(|(d, _)| d.weekday().number_from_monday() <= 5));
    }

    #[test]
    fn business_slots_are_hourly_within_hours() {
        let slots = business_slots(date(2026, 3, 2), date(2026, 3, 2));
        let first = slots.first().map(|(_, t)| *t);
        let last = slots.last().map(|(_, t)| *t);
        assert_eq!(first, Some(time(9, 0)));
        assert_eq!(last, Some(time(17, 0)));
        assert_eq!(slots.len(), 9);
    }

    #[test]
    fn business_slots_sorted_by_date_then_time() {
        let slots = business_slots(date(2026, 3, 2), date(2026, 3, 4));
        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(slots, sorted);
    }
}
