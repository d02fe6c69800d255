//! Fixed facts about the UNMC timetabling site.
//!
//! Everything that would have to change if the site changed its table format or
//! the campus moved timezone lives here.

use chrono_tz::Tz;

/// Timezone the timetable times are published in.
pub const SOURCE_TIMEZONE: Tz = chrono_tz::Asia::Kuala_Lumpur;

/// Product identifier written into generated calendars.
pub const PRODID: &str = "-//UNMC Timetable//EN";

/// Host serving the list-view timetables. The port differs per academic year.
pub const TIMETABLE_HOST: &str = "timetablingunmc.nottingham.ac.uk";

/// Path prefix of the list-view ("TextSpreadsheet") report.
pub const TIMETABLE_PATH_PREFIX: &str = "/reporting/TextSpreadsheet";

/// Default timeout for fetching a timetable page, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Column positions of a timetable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableLayout {
    /// Exact number of cells a schedule row must have.
    pub columns: usize,
    /// Minimum number of cells for a row to be listed as an available class.
    pub listing_min_columns: usize,
    pub module_code: usize,
    pub module_name: usize,
    pub event_type: usize,
    pub class_size: usize,
    pub start_time: usize,
    pub end_time: usize,
    pub location: usize,
    pub staff: usize,
    pub weeks: usize,
}

/// Layout of the list-view report. Columns 4, 7, 9 and 10 are not used.
pub const UNMC_LAYOUT: TableLayout = TableLayout {
    columns: 13,
    listing_min_columns: 12,
    module_code: 0,
    module_name: 1,
    event_type: 2,
    class_size: 3,
    start_time: 5,
    end_time: 6,
    location: 8,
    staff: 11,
    weeks: 12,
};

impl Default for TableLayout {
    fn default() -> Self {
        UNMC_LAYOUT
    }
}
