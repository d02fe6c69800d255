use std::{fmt, sync::LazyLock};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result, layout::SOURCE_TIMEZONE};

static WEEK_PIECE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\s*-\s*(\d+))?$").unwrap());

/// Label used to identify a class in listings and filters: `"{code} - {name}"`.
pub fn class_label(module_code: &str, module_name: &str) -> String {
    format!("{module_code} - {module_name}")
}

/// A weekday that can carry classes. The timetable only publishes Monday to Friday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TeachingDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

impl TeachingDay {
    pub const ALL: [Self; 5] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
    ];

    /// Days after Monday (Monday = 0).
    pub const fn offset(self) -> u32 {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
        }
    }

    /// Heading text used by the timetable for this day.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|day| day.name() == name)
    }

    /// Two-letter code used by `BYDAY`.
    pub const fn ical_code(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
        }
    }
}

impl fmt::Display for TeachingDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inclusive run of teaching weeks, 1-based from the start of the academic year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRange {
    pub start_week: u32,
    pub end_week: u32,
}

impl WeekRange {
    pub fn new(start_week: u32, end_week: u32) -> Result<Self> {
        if start_week == 0 || end_week < start_week {
            return Err(Error::MalformedWeekRange(format!("{start_week}-{end_week}")));
        }
        Ok(Self {
            start_week,
            end_week,
        })
    }

    /// Number of weeks covered, both ends included.
    pub const fn week_count(&self) -> u32 {
        self.end_week - self.start_week + 1
    }

    /// Parse one piece of week text: `"23-30"` or `"31"`.
    pub fn parse(piece: &str) -> Result<Self> {
        let trimmed = piece.trim();
        let captures = WEEK_PIECE
            .captures(trimmed)
            .ok_or_else(|| Error::MalformedWeekRange(trimmed.to_string()))?;

        let number = |m: regex::Match<'_>| {
            m.as_str()
                .parse::<u32>()
                .map_err(|_| Error::MalformedWeekRange(trimmed.to_string()))
        };

        let start = number(captures.get(1).ok_or_else(|| {
            Error::MalformedWeekRange(trimmed.to_string())
        })?)?;
        let end = match captures.get(2) {
            Some(m) => number(m)?,
            None => start,
        };

        Self::new(start, end).map_err(|_| Error::MalformedWeekRange(trimmed.to_string()))
    }

    /// Parse a full week cell such as `"23-30, 32-35"`, keeping the source order.
    pub fn parse_list(text: &str) -> Result<Vec<Self>> {
        text.split(',').map(Self::parse).collect()
    }
}

impl fmt::Display for WeekRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_week == self.end_week {
            write!(f, "{}", self.start_week)
        } else {
            write!(f, "{}-{}", self.start_week, self.end_week)
        }
    }
}

/// One row of a weekday table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub module_code: String,
    pub module_name: String,
    /// Session kind as printed, e.g. "Lecture" or "Computing".
    pub event_type: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub location: String,
    pub staff: String,
    pub class_size: Option<String>,
    pub week_ranges: Vec<WeekRange>,
}

impl ScheduleRow {
    pub fn class_label(&self) -> String {
        class_label(&self.module_code, &self.module_name)
    }
}

/// Weekly repetition of an event on a single weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyRecurrence {
    /// Number of occurrences (COUNT).
    pub count: u32,
    /// Weekday of every occurrence (BYDAY).
    pub by_day: TeachingDay,
}

impl WeeklyRecurrence {
    /// RRULE value, without the `RRULE:` prefix.
    pub fn to_rrule(&self) -> String {
        format!(
            "FREQ=WEEKLY;COUNT={};BYDAY={}",
            self.count,
            self.by_day.ical_code()
        )
    }
}

/// A recurring calendar event for one week range of one schedule row.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub title: String,
    /// First occurrence start, in the source timezone.
    pub start: DateTime<Tz>,
    /// First occurrence end, in the source timezone.
    pub end: DateTime<Tz>,
    pub location: String,
    pub description: String,
    pub recurrence: WeeklyRecurrence,
}

/// Academic year, anchored on the Monday of week 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicYear {
    start: NaiveDate,
}

impl AcademicYear {
    /// Build from any date in week 1; the date is moved back to that week's Monday.
    pub fn new(date: NaiveDate) -> Self {
        let days_since_monday = date.weekday().num_days_from_monday();
        let start = date - Days::new(u64::from(days_since_monday));
        if days_since_monday != 0 {
            tracing::warn!(
                "Week 1 start {} is a {}, using Monday {} instead",
                date,
                date.weekday(),
                start
            );
        }
        Self { start }
    }

    pub fn from_date_str(date_str: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
            Error::Config(format!(
                "Invalid date format '{date_str}': {e}. Expected format: YYYY-MM-DD"
            ))
        })?;
        Ok(Self::new(date))
    }

    /// Monday of week 1.
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Monday of the given week, `None` for week 0 or past the calendar range.
    pub fn week_start(&self, week: u32) -> Option<NaiveDate> {
        let weeks_after = week.checked_sub(1)?;
        self.start
            .checked_add_days(Days::new(u64::from(weeks_after) * 7))
    }

    /// Display label, e.g. `2024/25` for a year starting in September 2024.
    pub fn label(&self) -> String {
        let year = self.start.year();
        let first = if self.start.month() >= 8 { year } else { year - 1 };
        format!("{}/{:02}", first, (first + 1).rem_euclid(100))
    }
}

/// Options for the generated calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcsOptions {
    /// Calendar name (X-WR-CALNAME)
    pub calendar_name: Option<String>,
    /// Timezone hint for clients (X-WR-TIMEZONE)
    pub timezone: Option<String>,
    /// Whether to write DESCRIPTION
    pub include_description: bool,
    /// Minutes before each occurrence to raise an alarm
    pub reminder_minutes: Option<u32>,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: Some("UNMC Timetable".to_string()),
            timezone: Some(SOURCE_TIMEZONE.name().to_string()),
            include_description: true,
            reminder_minutes: None,
        }
    }
}
