//! Calendar-day windows over which a stress marking is in force.
//!
//! A window is `[start, start + extension_days]` with an inclusive end. All
//! arithmetic is calendar-day addition on [`NaiveDate`]; elapsed wall-clock
//! time never enters the computation.

use std::cmp::{max, min};
use std::fmt;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StressWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StressWindow {
    /// Returns `None` when the end date falls outside the representable calendar.
    pub fn from_extension(start: NaiveDate, extension_days: u32) -> Option<Self> {
        start
            .checked_add_days(Days::new(u64::from(extension_days)))
            .map(|end| Self { start, end })
    }

    /// Like [`StressWindow::from_extension`] but clamps to the last representable date.
    pub fn saturating(start: NaiveDate, extension_days: u32) -> Self {
        Self::from_extension(start, extension_days)
            .unwrap_or(Self { start, end: NaiveDate::MAX })
    }

    /// In force while the end date has not yet passed.
    pub fn is_active(&self, as_of: NaiveDate) -> bool {
        self.end >= as_of
    }

    pub fn union(&self, other: &Self) -> Self {
        Self { start: min(self.start, other.start), end: max(self.end, other.end) }
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whole days between start and end, floored at one.
    pub fn extension_days(&self) -> u32 {
        let days = (self.end - self.start).num_days().max(1);
        u32::try_from(days).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for StressWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::StressWindow;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).expect("valid date")
    }

    #[test]
    fn window_end_is_calendar_addition() {
        let window = StressWindow::from_extension(date(1, 1), 5).expect("window");
        assert_eq!(window.end, date(1, 6));

        let across_month = StressWindow::from_extension(date(1, 29), 5).expect("window");
        assert_eq!(across_month.end, date(2, 3));
    }

    #[test]
    fn activity_is_inclusive_of_end_date() {
        let window = StressWindow::from_extension(date(1, 1), 5).expect("window");
        assert!(window.is_active(date(1, 1)));
        assert!(window.is_active(date(1, 6)));
        assert!(!window.is_active(date(1, 7)));
        assert!(window.is_active(date(1, 2) - chrono::Days::new(30)));
    }

    #[test]
    fn union_takes_earliest_start_and_latest_end() {
        let first = StressWindow::from_extension(date(1, 1), 5).expect("window");
        let second = StressWindow::from_extension(date(1, 4), 5).expect("window");

        let union = first.union(&second);
        assert_eq!(union.start, date(1, 1));
        assert_eq!(union.end, date(1, 9));
        assert_eq!(union.extension_days(), 8);
        assert!(union.contains(&first));
        assert!(union.contains(&second));
        assert_eq!(union, second.union(&first));
    }

    #[test]
    fn union_of_disjoint_windows_spans_the_gap() {
        let early = StressWindow::from_extension(date(1, 1), 2).expect("window");
        let late = StressWindow::from_extension(date(1, 20), 3).expect("window");

        assert!(!early.overlaps(&late));
        let union = early.union(&late);
        assert_eq!(union.start, date(1, 1));
        assert_eq!(union.end, date(1, 23));
        assert_eq!(union.extension_days(), 22);
    }

    #[test]
    fn union_is_superset_across_a_grid_of_windows() {
        let starts = [date(1, 1), date(1, 3), date(1, 10), date(2, 28)];
        let lengths = [1_u32, 2, 7, 30];

        for left_start in starts {
            for left_len in lengths {
                for right_start in starts {
                    for right_len in lengths {
                        let left = StressWindow::saturating(left_start, left_len);
                        let right = StressWindow::saturating(right_start, right_len);
                        let union = left.union(&right);

                        assert_eq!(union.start, left.start.min(right.start));
                        assert_eq!(union.end, left.end.max(right.end));
                        assert!(union.contains(&left) && union.contains(&right));
                        assert!(union.extension_days() >= 1);
                    }
                }
            }
        }
    }

    #[test]
    fn degenerate_window_still_counts_one_day() {
        let window = StressWindow { start: date(3, 1), end: date(3, 1) };
        assert_eq!(window.extension_days(), 1);
    }

    #[test]
    fn overflowing_extension_is_rejected_or_clamped() {
        assert!(StressWindow::from_extension(chrono::NaiveDate::MAX, 1).is_none());
        assert_eq!(StressWindow::saturating(chrono::NaiveDate::MAX, 1).end, chrono::NaiveDate::MAX);
    }
}
