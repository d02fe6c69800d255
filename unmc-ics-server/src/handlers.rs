use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use unmc_ics_core::{
    AcademicYear, CalendarEvent, ClassFilter, IcsOptions, SelectedClasses, Timetable,
    cache::CacheManager,
    client::{TimetableClient, validate_url},
    ics::IcsGenerator,
};

use crate::{cache::RedisCache, server::ServerConfig};

const DOWNLOAD_FILENAME: &str = "unmc_timetable.ics";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub client: TimetableClient,
    pub page_cache: Option<CacheManager<RedisCache>>,
    pub page_cache_ttl: Duration,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

#[derive(Deserialize)]
struct ClassesQuery {
    url: String,
}

#[derive(Serialize)]
struct ClassesResponse {
    classes: Vec<String>,
}

/// Calendar request, taken from the query string on GET and the JSON body on POST.
#[derive(Deserialize)]
struct CalendarRequest {
    url: String,
    /// Monday of week 1, `YYYY-MM-DD`.
    start_date: String,
    /// `"code - name"` labels to keep; every class when absent.
    classes: Option<Vec<String>>,
    /// "json" or "ics", defaults to "ics".
    format: Option<String>,
    calendar_name: Option<String>,
    reminder_minutes: Option<u32>,
}

#[derive(Serialize)]
struct EventsResponse {
    academic_year: String,
    start_date: String,
    events: Vec<EventResponse>,
}

#[derive(Serialize)]
struct EventResponse {
    title: String,
    start: String,
    end: String,
    location: String,
    description: String,
    rrule: String,
}

impl From<&CalendarEvent> for EventResponse {
    fn from(event: &CalendarEvent) -> Self {
        Self {
            title: event.title.clone(),
            start: event.start.to_rfc3339(),
            end: event.end.to_rfc3339(),
            location: event.location.clone(),
            description: event.description.clone(),
            rrule: event.recurrence.to_rrule(),
        }
    }
}

pub async fn create_app(config: &ServerConfig) -> anyhow::Result<Router> {
    let client = TimetableClient::with_timeout(config.request_timeout_secs)?;

    let page_cache = match config.redis_url {
        Some(ref redis_url) => Some(CacheManager::new(RedisCache::new(redis_url, None).await?)),
        None => None,
    };

    Ok(router(AppState {
        client,
        page_cache,
        page_cache_ttl: config.page_cache_ttl,
    }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/classes", get(classes_handler))
        .route(
            "/calendar",
            get(calendar_query_handler).post(calendar_json_handler),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "UNMC Timetable to ICS Converter",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Converts UNMC list-view timetables into ICS calendars",
        "endpoints": {
            "health": "/health",
            "classes": "/classes?url=",
            "calendar": "/calendar?url=&start_date="
        }
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Lists the classes on a timetable, ordered by module name.
async fn classes_handler(
    Query(params): Query<ClassesQuery>,
    State(state): State<AppState>,
) -> Result<Json<ClassesResponse>, AppError> {
    let url = validate_url(&params.url)?;
    let markup = load_page(&state, url.as_str()).await?;

    let classes = Timetable::parse(&markup).class_options();
    tracing::info!("Listed {} classes for {}", classes.len(), url);

    Ok(Json(ClassesResponse { classes }))
}

async fn calendar_query_handler(
    Query(request): Query<CalendarRequest>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    calendar(&state, request).await
}

async fn calendar_json_handler(
    State(state): State<AppState>,
    Json(request): Json<CalendarRequest>,
) -> Result<Response, AppError> {
    calendar(&state, request).await
}

async fn calendar(state: &AppState, request: CalendarRequest) -> Result<Response, AppError> {
    let url = validate_url(&request.url)?;
    let year = AcademicYear::from_date_str(&request.start_date)?;

    let markup = load_page(state, url.as_str()).await?;
    let events = build_events(&markup, &year, request.classes.as_deref())?;

    match request.format.as_deref() {
        Some("json") => Ok(Json(EventsResponse {
            academic_year: year.label(),
            start_date: year.start().to_string(),
            events: events.iter().map(EventResponse::from).collect(),
        })
        .into_response()),
        _ => {
            let options = IcsOptions {
                calendar_name: Some(
                    request
                        .calendar_name
                        .unwrap_or_else(|| format!("UNMC Timetable {}", year.label())),
                ),
                reminder_minutes: request.reminder_minutes,
                ..Default::default()
            };
            Ok(ics_response(&IcsGenerator::new(options).generate(&events)))
        }
    }
}

async fn load_page(state: &AppState, url: &str) -> Result<String, AppError> {
    let markup = match state.page_cache {
        Some(ref cache) => {
            state
                .client
                .fetch_cached(url, cache, state.page_cache_ttl)
                .await?
        }
        None => state.client.fetch(url).await?,
    };
    Ok(markup)
}

/// Parses and expands in one synchronous step; the parsed document cannot cross an `.await`.
fn build_events(
    markup: &str,
    year: &AcademicYear,
    classes: Option<&[String]>,
) -> unmc_ics_core::Result<Vec<CalendarEvent>> {
    let selected: Option<SelectedClasses> = classes.map(|labels| labels.iter().cloned().collect());
    let filter = selected.as_ref().map(|s| s as &dyn ClassFilter);

    Timetable::parse(markup).events(year, filter)
}

fn ics_response(ics_content: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILENAME}\""),
            ),
        ],
        ics_content.to_string(),
    )
        .into_response()
}

/// Application error type
#[derive(Debug)]
struct AppError(unmc_ics_core::Error);

impl AppError {
    fn status(&self) -> (StatusCode, &'static str) {
        use unmc_ics_core::Error;

        match &self.0 {
            e if e.is_malformed() => (StatusCode::UNPROCESSABLE_ENTITY, "Invalid timetable format"),
            Error::Config(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            Error::InvalidUrl(_) => (StatusCode::BAD_REQUEST, "Invalid timetable URL"),
            Error::Fetch { .. } | Error::Http(_) => {
                (StatusCode::BAD_GATEWAY, "Failed to fetch timetable")
            }
            Error::Timeout => (StatusCode::GATEWAY_TIMEOUT, "Request timeout"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self.0);
        } else {
            tracing::warn!("{}", self.0);
        }

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message: self.0.to_string(),
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<unmc_ics_core::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
