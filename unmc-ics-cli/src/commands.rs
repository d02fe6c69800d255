use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use unmc_ics_core::{
    AcademicYear, CalendarEvent, ClassFilter, IcsOptions, SelectedClasses, Timetable,
    cache::CacheManager,
    client::{TimetableClient, validate_url},
    ics::IcsGenerator,
    layout::DEFAULT_TIMEOUT_SECS,
};

use crate::cache::FileCache;

const CACHE_APP_NAME: &str = "unmc-ics";
const PAGE_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Where the timetable markup comes from.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Timetable URL, copied from the list view
    #[arg(short, long, required_unless_present = "file", conflicts_with = "file")]
    pub url: Option<String>,

    /// Read a saved timetable page instead of fetching it
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Skip the timetabling host check
    #[arg(long)]
    pub allow_any_host: bool,

    /// Always fetch, bypassing the page cache
    #[arg(long)]
    pub no_cache: bool,

    /// Request timeout in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,
}

/// Parameters of the generate command
pub struct GenerateParams {
    pub source: SourceArgs,
    pub start_date: String,
    pub classes: Vec<String>,
    pub output: PathBuf,
    pub calendar_name: Option<String>,
    pub reminder_minutes: Option<u32>,
    pub include_description: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    title: &'a str,
    start: String,
    end: String,
    location: &'a str,
    description: &'a str,
    rrule: String,
}

impl<'a> From<&'a CalendarEvent> for EventOutput<'a> {
    fn from(event: &'a CalendarEvent) -> Self {
        Self {
            title: &event.title,
            start: event.start.to_rfc3339(),
            end: event.end.to_rfc3339(),
            location: &event.location,
            description: &event.description,
            rrule: event.recurrence.to_rrule(),
        }
    }
}

async fn load_markup(source: &SourceArgs) -> Result<String> {
    if let Some(ref path) = source.file {
        tracing::info!("Reading timetable from {}", path.display());
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()));
    }

    let url = source
        .url
        .as_deref()
        .context("Either --url or --file is required")?;

    if !source.allow_any_host {
        validate_url(url)?;
    }

    let client = TimetableClient::with_timeout(source.timeout)?;
    if source.no_cache {
        return Ok(client.fetch(url).await?);
    }

    match FileCache::with_default_dir(CACHE_APP_NAME) {
        Ok(cache) => Ok(client
            .fetch_cached(url, &CacheManager::new(cache), PAGE_CACHE_TTL)
            .await?),
        Err(e) => {
            tracing::warn!("Page cache unavailable: {}", e);
            Ok(client.fetch(url).await?)
        }
    }
}

/// Lists the classes on a timetable
pub async fn classes_command(source: SourceArgs, json: bool) -> Result<()> {
    let markup = load_markup(&source).await?;
    let classes = Timetable::parse(&markup).class_options();

    if json {
        println!("{}", serde_json::to_string_pretty(&classes)?);
    } else if classes.is_empty() {
        println!("No classes found");
    } else {
        for class in &classes {
            println!("{class}");
        }
    }

    Ok(())
}

/// Builds the calendar, or prints its events as JSON
pub async fn generate_command(params: GenerateParams) -> Result<()> {
    let year = AcademicYear::from_date_str(&params.start_date)?;
    let markup = load_markup(&params.source).await?;

    let events = build_events(&markup, &year, &params.classes)?;
    tracing::info!("Generated {} events for {}", events.len(), year.label());

    if params.json {
        let output: Vec<EventOutput<'_>> = events.iter().map(EventOutput::from).collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let options = IcsOptions {
        calendar_name: Some(
            params
                .calendar_name
                .unwrap_or_else(|| format!("UNMC Timetable {}", year.label())),
        ),
        include_description: params.include_description,
        reminder_minutes: params.reminder_minutes,
        ..Default::default()
    };
    let ics_content = IcsGenerator::new(options).generate(&events);

    fs::write(&params.output, ics_content)
        .with_context(|| format!("Failed to write {}", params.output.display()))?;
    println!(
        "✓ {} events saved to {}",
        events.len(),
        params.output.display()
    );

    Ok(())
}

/// Expands the timetable, keeping only `classes` when any are given.
fn build_events(
    markup: &str,
    year: &AcademicYear,
    classes: &[String],
) -> Result<Vec<CalendarEvent>> {
    let timetable = Timetable::parse(markup);

    if classes.is_empty() {
        return Ok(timetable.events(year, None)?);
    }

    let available = timetable.class_options();
    for class in classes {
        if !available.contains(class) {
            tracing::warn!("Class not found in timetable: {}", class);
        }
    }

    let selected: SelectedClasses = classes.iter().cloned().collect();
    Ok(timetable.events(year, Some(&selected as &dyn ClassFilter))?)
}

/// Removes every cached timetable page
pub async fn clear_cache_command() -> Result<()> {
    let cache = FileCache::with_default_dir(CACHE_APP_NAME)?;
    let dir = cache.cache_dir().display().to_string();

    CacheManager::new(cache).clear().await?;
    println!("✓ Cleared page cache in {dir}");

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    const TIMETABLE: &str = "<html><body><p>Tuesday</p><table>\
        <tr><td>Activity</td><td>Module</td><td>Type</td><td>Size</td><td>Day</td><td>Start</td>\
        <td>End</td><td>Duration</td><td>Room</td><td>Room Size</td><td>Notes</td><td>Staff</td>\
        <td>Weeks</td></tr>\
        <tr><td>MATH1001</td><td>Calculus</td><td>Lecture</td><td>200</td><td>Tue</td>\
        <td>08:00</td><td>10:00</td><td>2:00</td><td>DEWAN</td><td>300</td><td></td>\
        <td>Dr Wong</td><td>1-10</td></tr>\
        <tr><td>MATH1002</td><td>Linear Algebra</td><td>Tutorial</td><td>30</td><td>Tue</td>\
        <td>13:00</td><td>14:00</td><td>1:00</td><td>BB57</td><td>30</td><td></td>\
        <td>Dr Wong</td><td>2-11</td></tr>\
        </table></body></html>";

    fn year() -> AcademicYear {
        AcademicYear::new(NaiveDate::from_ymd_opt(2024, 9, 2).unwrap())
    }

    fn file_source(path: PathBuf) -> SourceArgs {
        SourceArgs {
            url: None,
            file: Some(path),
            allow_any_host: false,
            no_cache: true,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[test]
    fn test_build_events() {
        let all = build_events(TIMETABLE, &year(), &[]).unwrap();
        assert_eq!(all.len(), 2);

        let events =
            build_events(TIMETABLE, &year(), &["MATH1002 - Linear Algebra".to_string()]).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Linear Algebra (Tutorial)");
        assert_eq!(events[0].recurrence.count, 10);

        let none = build_events(TIMETABLE, &year(), &["PHYS1001 - Mechanics".to_string()]).unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_load_markup_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.html");
        std::fs::write(&path, TIMETABLE).unwrap();

        assert_eq!(load_markup(&file_source(path)).await.unwrap(), TIMETABLE);
    }

    #[tokio::test]
    async fn test_load_markup_rejects_foreign_host() {
        let source = SourceArgs {
            url: Some("http://example.com/reporting/TextSpreadsheet".to_string()),
            file: None,
            allow_any_host: false,
            no_cache: true,
            timeout: 1,
        };
        let err = load_markup(&source).await.unwrap_err();
        assert!(err.to_string().contains("Invalid timetable URL"), "{err}");
    }

    #[tokio::test]
    async fn test_generate_writes_calendar() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("timetable.html");
        let output = dir.path().join("out.ics");
        std::fs::write(&input, TIMETABLE).unwrap();

        generate_command(GenerateParams {
            source: file_source(input),
            start_date: "2024-09-02".to_string(),
            classes: vec!["MATH1001 - Calculus".to_string()],
            output: output.clone(),
            calendar_name: None,
            reminder_minutes: Some(10),
            include_description: true,
            json: false,
        })
        .await
        .unwrap();

        let ics_content = std::fs::read_to_string(output).unwrap();
        assert!(ics_content.contains("X-WR-CALNAME:UNMC Timetable 2024/25\r\n"));
        assert!(ics_content.contains("SUMMARY:Calculus (Lecture)\r\n"));
        assert!(ics_content.contains("DTSTART;TZID=Asia/Kuala_Lumpur:20240903T080000\r\n"));
        assert!(ics_content.contains("RRULE:FREQ=WEEKLY;COUNT=10;BYDAY=TU\r\n"));
        assert!(ics_content.contains("TRIGGER:-PT10M\r\n"));
        assert!(!ics_content.contains("Linear Algebra"));
    }

    #[tokio::test]
    async fn test_generate_rejects_bad_date() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_command(GenerateParams {
            source: file_source(dir.path().join("missing.html")),
            start_date: "next monday".to_string(),
            classes: Vec::new(),
            output: dir.path().join("out.ics"),
            calendar_name: None,
            reminder_minutes: None,
            include_description: true,
            json: false,
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("Invalid configuration"), "{err}");
    }
}
