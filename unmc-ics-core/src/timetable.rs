use scraper::Html;

use crate::{
    AcademicYear, CalendarEvent, Result, TeachingDay,
    expander::{ClassFilter, EventExpander},
    extractor::{TableExtractor, UNMC_EXTRACTOR},
    layout::TableLayout,
};

/// A parsed timetable page.
///
/// `Html` is not `Send`, so async callers should finish with a `Timetable` before their
/// next `.await`.
pub struct Timetable {
    document: Html,
    extractor: TableExtractor,
}

impl Timetable {
    /// Parse `markup` using the UNMC list-view layout.
    pub fn parse(markup: &str) -> Self {
        Self {
            document: Html::parse_document(markup),
            extractor: UNMC_EXTRACTOR,
        }
    }

    pub fn with_layout(markup: &str, layout: TableLayout) -> Self {
        Self {
            document: Html::parse_document(markup),
            extractor: TableExtractor::new(layout),
        }
    }

    /// Every `"code - name"` label on the page, ordered by module name.
    pub fn class_options(&self) -> Vec<String> {
        let mut options: Vec<String> = self
            .extractor
            .list_available_classes(&self.document)
            .into_iter()
            .collect();

        options.sort_by(|a, b| {
            sort_key(a)
                .cmp(sort_key(b))
                .then_with(|| a.cmp(b))
        });
        options
    }

    /// Calendar events for the whole week, in day then row order.
    ///
    /// Rows rejected by `filter` are dropped before their times and weeks are read, so
    /// only the selected classes need well-formed data. Every row must still have the
    /// expected number of columns.
    pub fn events(
        &self,
        year: &AcademicYear,
        filter: Option<&dyn ClassFilter>,
    ) -> Result<Vec<CalendarEvent>> {
        let expander = EventExpander::default();

        let mut rows = 0;
        let mut events = Vec::new();
        for day in TeachingDay::ALL {
            for row in self
                .extractor
                .select_rows_for_weekday(&self.document, day, filter)?
            {
                rows += 1;
                events.extend(expander.expand(&row, day, year, None)?);
            }
        }

        tracing::info!(
            "Built {} events from {} rows for {}",
            events.len(),
            rows,
            year.label()
        );
        Ok(events)
    }
}

/// Module name part of a class label.
fn sort_key(label: &str) -> &str {
    label
        .split_once(" - ")
        .map_or(label, |(_, name)| name)
}
