use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone};

use crate::ops::Interval;

/// Daily cheap-power window, possibly wrapping midnight.
#[must_use]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CheapWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl CheapWindow {
    pub const fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// The occurrence containing `now`, or the upcoming one when `now` is outside the window.
    pub fn occurrence(self, now: DateTime<Local>) -> Interval {
        let today = now.date_naive();
        [today.pred_opt(), Some(today), today.succ_opt()]
            .into_iter()
            .flatten()
            .map(|date| self.starting_on(date))
            .find(|interval| now < interval.end)
            .unwrap_or_else(|| self.starting_on(today))
    }

    fn starting_on(self, date: NaiveDate) -> Interval {
        let end_date = if self.end <= self.start {
            date.checked_add_days(Days::new(1)).unwrap_or(date)
        } else {
            date
        };
        Interval { start: local_time(date, self.start), end: local_time(end_date, self.end) }
    }
}

/// Resolve the wall-clock time, skipping forward over a DST gap.
fn local_time(date: NaiveDate, time: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, "%H:%M").or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
}
