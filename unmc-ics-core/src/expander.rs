use std::collections::HashSet;

use chrono::{DateTime, Days, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::{
    AcademicYear, CalendarEvent, Error, Result, ScheduleRow, TeachingDay, WeekRange,
    WeeklyRecurrence, class_label, layout::SOURCE_TIMEZONE,
};

/// Decides whether a class goes into the calendar.
pub trait ClassFilter {
    fn include(&self, module_code: &str, module_name: &str, event_type: &str) -> bool;
}

impl<F> ClassFilter for F
where
    F: Fn(&str, &str, &str) -> bool,
{
    fn include(&self, module_code: &str, module_name: &str, event_type: &str) -> bool {
        self(module_code, module_name, event_type)
    }
}

/// Keeps the classes whose `"code - name"` label was selected, whatever the session type.
#[derive(Debug, Clone, Default)]
pub struct SelectedClasses {
    labels: HashSet<String>,
}

impl SelectedClasses {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectedClasses {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

impl ClassFilter for SelectedClasses {
    fn include(&self, module_code: &str, module_name: &str, _event_type: &str) -> bool {
        self.labels.contains(&class_label(module_code, module_name))
    }
}

/// Turns schedule rows into recurring calendar events.
#[derive(Debug, Clone, Copy)]
pub struct EventExpander {
    timezone: Tz,
}

impl EventExpander {
    pub const fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Expand one row into one weekly event per week range.
    ///
    /// Rows rejected by `filter` produce no events. Each range becomes its own event
    /// whose first occurrence is on `day` of the range's first week and which repeats
    /// once a week for every week of the range.
    pub fn expand(
        &self,
        row: &ScheduleRow,
        day: TeachingDay,
        year: &AcademicYear,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<Vec<CalendarEvent>> {
        if let Some(filter) = filter {
            if !filter.include(&row.module_code, &row.module_name, &row.event_type) {
                tracing::trace!("Filtered out {} ({})", row.class_label(), row.event_type);
                return Ok(Vec::new());
            }
        }

        if row.end_time < row.start_time {
            return Err(Error::MalformedScheduleData(format!(
                "{} ends at {} before it starts at {}",
                row.class_label(),
                row.end_time.format("%H:%M"),
                row.start_time.format("%H:%M")
            )));
        }

        row.week_ranges
            .iter()
            .map(|range| self.expand_range(row, *range, day, year))
            .collect()
    }

    fn expand_range(
        &self,
        row: &ScheduleRow,
        range: WeekRange,
        day: TeachingDay,
        year: &AcademicYear,
    ) -> Result<CalendarEvent> {
        if range.start_week == 0 || range.end_week < range.start_week {
            return Err(Error::MalformedScheduleData(format!(
                "{} has week range {}",
                row.class_label(),
                range
            )));
        }

        let date = year
            .week_start(range.start_week)
            .and_then(|monday| monday.checked_add_days(Days::new(u64::from(day.offset()))))
            .ok_or_else(|| {
                Error::MalformedScheduleData(format!(
                    "week {} is outside the supported date range",
                    range.start_week
                ))
            })?;

        let start = self.localize(date.and_time(row.start_time))?;
        let end = self.localize(date.and_time(row.end_time))?;

        Ok(CalendarEvent {
            title: format!("{} ({})", row.module_name, row.event_type),
            start,
            end,
            location: row.location.clone(),
            description: build_description(row),
            recurrence: WeeklyRecurrence {
                count: range.week_count(),
                by_day: day,
            },
        })
    }

    fn localize(&self, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
        self.timezone
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| {
                Error::MalformedScheduleData(format!(
                    "{} does not map to a single time in {}",
                    naive,
                    self.timezone.name()
                ))
            })
    }
}

impl Default for EventExpander {
    fn default() -> Self {
        Self::new(SOURCE_TIMEZONE)
    }
}

/// Event description: module code, staff and, when published, the class size.
pub fn build_description(row: &ScheduleRow) -> String {
    let mut description = format!("Module: {}\nStaff: {}", row.module_code, row.staff);
    if let Some(ref size) = row.class_size {
        description.push_str("\nSize: ");
        description.push_str(size);
    }
    description
}
