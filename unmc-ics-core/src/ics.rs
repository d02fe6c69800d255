use std::collections::BTreeMap;

use chrono::Utc;
use uuid::Uuid;

use crate::{CalendarEvent, IcsOptions, layout::PRODID};


/// Content lines longer than this many octets are folded.
const MAX_LINE_OCTETS: usize = 75;

/// ICS calendar generator
pub struct IcsGenerator {
    options: IcsOptions,
}

impl IcsGenerator {
    pub const fn new(options: IcsOptions) -> Self {
        Self { options }
    }

    /// Generate the calendar for `events`. An empty slice gives a calendar without events.
    pub fn generate(&self, events: &[CalendarEvent]) -> String {
        let mut ics_content = String::new();

        push_line(&mut ics_content, "BEGIN:VCALENDAR");
        push_line(&mut ics_content, "VERSION:2.0");
        push_line(&mut ics_content, &format!("PRODID:{PRODID}"));
        push_line(&mut ics_content, "CALSCALE:GREGORIAN");
        push_line(&mut ics_content, "METHOD:PUBLISH");

        if let Some(ref name) = self.options.calendar_name {
            push_line(
                &mut ics_content,
                &format!("X-WR-CALNAME:{}", escape_text(name)),
            );
        }

        if let Some(ref timezone) = self.options.timezone {
            push_line(&mut ics_content, &format!("X-WR-TIMEZONE:{timezone}"));
        }

        self.add_timezones(&mut ics_content, events);

        for event in events {
            self.add_event(&mut ics_content, event);
        }

        push_line(&mut ics_content, "END:VCALENDAR");

        tracing::debug!("Generated calendar with {} events", events.len());
        ics_content
    }

    /// One VTIMEZONE per zone referenced by `events`.
    ///
    /// Each zone is described by a single STANDARD observance that starts at its earliest
    /// event, which is exact for zones without daylight saving such as the campus zone.
    fn add_timezones(&self, ics_content: &mut String, events: &[CalendarEvent]) {
        let mut zones = BTreeMap::new();
        for event in events {
            zones
                .entry(event.start.timezone().name())
                .and_modify(|earliest: &mut &CalendarEvent| {
                    if event.start < earliest.start {
                        *earliest = event;
                    }
                })
                .or_insert(event);
        }

        for (tzid, earliest) in zones {
            let offset = earliest.start.format("%z");
            push_line(ics_content, "BEGIN:VTIMEZONE");
            push_line(ics_content, &format!("TZID:{tzid}"));
            push_line(ics_content, "BEGIN:STANDARD");
            push_line(
                ics_content,
                &format!("DTSTART:{}", earliest.start.format("%Y%m%dT%H%M%S")),
            );
            push_line(ics_content, &format!("TZOFFSETFROM:{offset}"));
            push_line(ics_content, &format!("TZOFFSETTO:{offset}"));
            push_line(ics_content, &format!("TZNAME:{}", earliest.start.format("%Z")));
            push_line(ics_content, "END:STANDARD");
            push_line(ics_content, "END:VTIMEZONE");
        }
    }

    /// Add a single event
    fn add_event(&self, ics_content: &mut String, event: &CalendarEvent) {
        let uid = Uuid::new_v4().to_string();
        let dtstamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let tzid = event.start.timezone().name();

        push_line(ics_content, "BEGIN:VEVENT");
        push_line(ics_content, &format!("UID:{uid}"));
        push_line(ics_content, &format!("DTSTAMP:{dtstamp}"));
        push_line(
            ics_content,
            &format!("DTSTART;TZID={tzid}:{}", event.start.format("%Y%m%dT%H%M%S")),
        );
        push_line(
            ics_content,
            &format!(
                "DTEND;TZID={}:{}",
                event.end.timezone().name(),
                event.end.format("%Y%m%dT%H%M%S")
            ),
        );
        push_line(
            ics_content,
            &format!("SUMMARY:{}", escape_text(&event.title)),
        );
        push_line(
            ics_content,
            &format!("LOCATION:{}", escape_text(&event.location)),
        );

        if self.options.include_description {
            push_line(
                ics_content,
                &format!("DESCRIPTION:{}", escape_text(&event.description)),
            );
        }

        push_line(
            ics_content,
            &format!("RRULE:{}", event.recurrence.to_rrule()),
        );

        if let Some(reminder_minutes) = self.options.reminder_minutes {
            push_line(ics_content, "BEGIN:VALARM");
            push_line(ics_content, "ACTION:DISPLAY");
            push_line(
                ics_content,
                &format!("DESCRIPTION:{}", escape_text(&event.title)),
            );
            push_line(ics_content, &format!("TRIGGER:-PT{reminder_minutes}M"));
            push_line(ics_content, "END:VALARM");
        }

        push_line(ics_content, "END:VEVENT");
    }
}

impl Default for IcsGenerator {
    fn default() -> Self {
        Self::new(IcsOptions::default())
    }
}

/// Escape ICS text values
fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('\r', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Append a content line, folding it at `MAX_LINE_OCTETS` without splitting characters.
fn push_line(ics_content: &mut String, line: &str) {
    let mut width = 0;
    for ch in line.chars() {
        let len = ch.len_utf8();
        if width + len > MAX_LINE_OCTETS {
            ics_content.push_str("\r\n ");
            width = 1;
        }
        ics_content.push(ch);
        width += len;
    }
    ics_content.push_str("\r\n");
}
