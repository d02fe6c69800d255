use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to fetch timetable from {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("Network timeout")]
    Timeout,

    #[error("Invalid timetable format: {day} table row {row} has {found} columns, expected {expected}")]
    MalformedRow {
        day: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Invalid week range: '{0}'")]
    MalformedWeekRange(String),

    #[error("Invalid schedule data: {0}")]
    MalformedScheduleData(String),

    #[error("Invalid timetable URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error was caused by the timetable content rather than by I/O.
    pub const fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::MalformedRow { .. } | Self::MalformedWeekRange(_) | Self::MalformedScheduleData(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
