//! Allocation window arithmetic.
//!
//! The weekly trigger fires on the weekend and allocates the *following*
//! business week. Given "today", [`next_business_week`] yields that window:
//! the next Monday through Friday, rolling a full week forward when today
//! is already Monday.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};


/// Number of allocated days per business week (Monday through Friday).
pub const BUSINESS_DAYS: u64 = 5;

/// A Monday-through-Friday allocation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessWeek {
    monday: NaiveDate,
}

impl BusinessWeek {
    /// Creates a window starting at the given Monday.
    ///
    /// Returns `None` if `monday` is not actually a Monday.
    #[must_use]
    pub fn starting(monday: NaiveDate) -> Option<Self> {
        (monday.weekday() == Weekday::Mon).then_some(Self { monday })
    }

    /// First day of the window.
    #[must_use]
    pub const fn monday(&self) -> NaiveDate {
        self.monday
    }

    /// Last day of the window.
    #[must_use]
    pub fn friday(&self) -> NaiveDate {
        self.monday + Days::new(BUSINESS_DAYS - 1)
    }

    /// The window's days in order, Monday first.
    #[must_use]
    pub fn days(&self) -> Vec<NaiveDate> {
        (0..BUSINESS_DAYS)
            .map(|offset| self.monday + Days::new(offset))
            .collect()
    }

    /// Returns `true` if `date` falls inside the window.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.monday() && date <= self.friday()
    }
}

/// The upcoming allocation window as seen from `today`.
///
/// Always strictly in the future: when today is Monday the window starts
/// the following Monday, matching the weekend trigger cadence.
#[must_use]
pub fn next_business_week(today: NaiveDate) -> BusinessWeek {
    let until_monday = u64::from((7 - today.weekday().num_days_from_monday()) % 7);
    let offset = if until_monday == 0 { 7 } else { until_monday };
    BusinessWeek {
        monday: today + Days::new(offset),
    }
}
