use std::{collections::HashSet, sync::LazyLock};

use chrono::NaiveTime;
use scraper::{ElementRef, Html, Selector};

use crate::{
    Error, Result, ScheduleRow, TeachingDay, WeekRange, class_label,
    expander::ClassFilter,
    layout::{TableLayout, UNMC_LAYOUT},
};

static HEADING_OR_TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p, table").unwrap());
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td, th").unwrap());

/// How rows that do not match the expected column count are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowPolicy {
    /// Every data row must have exactly `TableLayout::columns` cells.
    Strict,
    /// Rows shorter than `TableLayout::listing_min_columns` are skipped.
    Tolerant,
}

impl RowPolicy {
    /// Whether a row with `found` cells is read under this policy.
    pub const fn admits(self, layout: &TableLayout, found: usize) -> bool {
        match self {
            Self::Strict => found == layout.columns,
            Self::Tolerant => found >= layout.listing_min_columns,
        }
    }
}

/// Reads schedule rows out of a timetable page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableExtractor {
    layout: TableLayout,
}

impl TableExtractor {
    pub const fn new(layout: TableLayout) -> Self {
        Self { layout }
    }

    /// Rows of the table that follows the `day` heading.
    ///
    /// A day without a heading or without a following table has no rows. Any row with
    /// the wrong number of columns aborts the whole extraction.
    pub fn list_rows_for_weekday(&self, page: &Html, day: TeachingDay) -> Result<Vec<ScheduleRow>> {
        self.select_rows_for_weekday(page, day, None)
    }

    /// Like [`Self::list_rows_for_weekday`], keeping only the rows `filter` accepts.
    ///
    /// Every row still has to have the right number of columns, but the times and
    /// weeks of a rejected row are never read.
    pub fn select_rows_for_weekday(
        &self,
        page: &Html,
        day: TeachingDay,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<Vec<ScheduleRow>> {
        let mut rows = Vec::new();

        for table in day_tables(page, day) {
            for (number, cells) in data_rows(table) {
                if !RowPolicy::Strict.admits(&self.layout, cells.len()) {
                    return Err(Error::MalformedRow {
                        day: day.name().to_string(),
                        row: number,
                        expected: self.layout.columns,
                        found: cells.len(),
                    });
                }

                if let Some(filter) = filter {
                    let cell = |index: usize| column(&cells, index);
                    let (code, name, kind) = (
                        cell(self.layout.module_code)?,
                        cell(self.layout.module_name)?,
                        cell(self.layout.event_type)?,
                    );
                    if !filter.include(code, name, kind) {
                        tracing::trace!("Filtered out {} ({})", class_label(code, name), kind);
                        continue;
                    }
                }

                rows.push(self.parse_row(&cells)?);
            }
        }

        tracing::debug!("{}: {} rows", day, rows.len());
        Ok(rows)
    }

    /// Distinct `"code - name"` labels across every table on the page.
    ///
    /// Short rows are skipped rather than reported, so a partly broken page still
    /// lists whatever it can.
    pub fn list_available_classes(&self, page: &Html) -> HashSet<String> {
        let mut classes = HashSet::new();

        for table in page.select(&TABLE) {
            for (number, cells) in data_rows(table) {
                if !RowPolicy::Tolerant.admits(&self.layout, cells.len()) {
                    tracing::trace!("Skipping listing row {} with {} columns", number, cells.len());
                    continue;
                }

                let (Some(code), Some(name)) = (
                    cells.get(self.layout.module_code),
                    cells.get(self.layout.module_name),
                ) else {
                    continue;
                };
                classes.insert(class_label(code, name));
            }
        }

        tracing::debug!("Found {} distinct classes", classes.len());
        classes
    }

    fn parse_row(&self, cells: &[String]) -> Result<ScheduleRow> {
        let cell = |index: usize| column(cells, index);

        let class_size = cell(self.layout.class_size)?;

        Ok(ScheduleRow {
            module_code: cell(self.layout.module_code)?.to_string(),
            module_name: cell(self.layout.module_name)?.to_string(),
            event_type: cell(self.layout.event_type)?.to_string(),
            start_time: parse_time(cell(self.layout.start_time)?)?,
            end_time: parse_time(cell(self.layout.end_time)?)?,
            location: cell(self.layout.location)?.to_string(),
            staff: cell(self.layout.staff)?.to_string(),
            class_size: (!class_size.is_empty()).then(|| class_size.to_string()),
            week_ranges: WeekRange::parse_list(cell(self.layout.weeks)?)?,
        })
    }
}

/// Cell texts of every row after the header, with 1-based row numbers.
fn data_rows(table: ElementRef<'_>) -> impl Iterator<Item = (usize, Vec<String>)> + '_ {
    table
        .select(&ROW)
        .enumerate()
        .skip(1)
        .map(|(index, row)| (index + 1, row.select(&CELL).map(cell_text).collect::<Vec<_>>()))
}

/// Tables introduced by a `<p>` heading naming `day`, in document order.
///
/// A heading for another weekday closes the pending one, so an empty day never
/// borrows the next day's table.
fn day_tables(page: &Html, day: TeachingDay) -> Vec<ElementRef<'_>> {
    let mut tables = Vec::new();
    let mut after_heading = false;

    for element in page.select(&HEADING_OR_TABLE) {
        match element.value().name() {
            "p" => {
                if let Some(heading) = TeachingDay::from_name(&cell_text(element)) {
                    after_heading = heading == day;
                }
            }
            _ if after_heading => {
                tables.push(element);
                after_heading = false;
            }
            _ => {}
        }
    }

    tables
}

fn column(cells: &[String], index: usize) -> Result<&str> {
    cells
        .get(index)
        .map(String::as_str)
        .ok_or_else(|| Error::MalformedScheduleData(format!("missing column {index}")))
}

fn cell_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Parse `9:00` or `09:00`.
fn parse_time(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .map_err(|e| Error::MalformedScheduleData(format!("invalid time '{text}': {e}")))
}

/// Extractor for the UNMC list-view layout.
pub const UNMC_EXTRACTOR: TableExtractor = TableExtractor::new(UNMC_LAYOUT);
