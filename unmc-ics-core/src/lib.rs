//! UNMC ICS Core Library
//!
//! Turns the list-view timetable pages published by the UNMC timetabling system into
//! recurring ICS calendar events.

pub mod cache;
pub mod client;
pub mod error;
pub mod expander;
pub mod extractor;
pub mod ics;
pub mod layout;
pub mod timetable;
pub mod types;

// Re-export core types and error handling
pub use error::{Error, Result};
pub use expander::{ClassFilter, EventExpander, SelectedClasses};
pub use extractor::TableExtractor;
pub use timetable::Timetable;
pub use types::*;

/// Commonly used items
pub mod prelude {
    pub use crate::{
        cache::*, client::*, expander::*, extractor::*, ics::*, layout::*, timetable::*,
        types::*,
    };
}
