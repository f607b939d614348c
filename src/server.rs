use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
};
use chrono::{NaiveDate, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::demand::chart::{ChartSpec, MAX_HORIZON_HOURS, ViewRequest, build_chart};
use crate::demand::plot::to_figure;
use crate::demand::{DateBounds, DemandError, TimeSeriesTable};

#[derive(Clone)]
pub struct AppState {
    table: Arc<TimeSeriesTable>,
}

impl AppState {
    pub fn new(table: TimeSeriesTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

impl IntoResponse for DemandError {
    fn into_response(self) -> Response {
        let status = match &self {
            DemandError::InvalidHorizon { .. }
            | DemandError::InvalidHour(_)
            | DemandError::InsufficientData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Chart request failed: {}", self);
        } else {
            warn!("Rejected chart request: {}", self);
        }

        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

/// Raw dashboard controls; any of them may still be unset
#[derive(Debug, Deserialize)]
struct ChartQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_as_none")]
    hour: Option<u32>,
    #[serde(default, deserialize_with = "empty_as_none")]
    horizon: Option<u32>,
}

/// A control sent with an empty value (`hour=`) counts as unset
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    use serde::de::Error;

    let raw: Option<String> = Deserialize::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(D::Error::custom),
    }
}

fn chart_for(state: &AppState, query: ChartQuery) -> Result<Option<ChartSpec>, DemandError> {
    let Some(request) = ViewRequest::from_inputs(query.date, query.hour, query.horizon)? else {
        return Ok(None);
    };

    build_chart(&state.table, &request).map(Some)
}

/// GET /api/v1/chart?date=YYYY-MM-DD&hour=H&horizon=N
/// Plotly figure for the selected window, 204 while a control is unset
async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Response, DemandError> {
    match chart_for(&state, query)? {
        Some(chart) => {
            debug!("Rendering chart with {} points", chart.visible_len());
            let figure = to_figure(&chart)?;
            Ok(Json(ApiResponse::success(figure)).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/chart-spec?date=YYYY-MM-DD&hour=H&horizon=N
/// Renderer-independent chart description
async fn get_chart_spec(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Response, DemandError> {
    match chart_for(&state, query)? {
        Some(chart) => Ok(Json(ApiResponse::success(chart)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// GET /api/v1/bounds
async fn get_bounds(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DateBounds>>, StatusCode> {
    state
        .table
        .bounds()
        .map(|bounds| Json(ApiResponse::success(bounds)))
        .ok_or(StatusCode::NOT_FOUND)
}

use askama::Template;

struct HourOption {
    value: u32,
    selected: bool,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    min_date: String,
    max_date: String,
    default_date: String,
    hours: Vec<HourOption>,
    max_horizon: u32,
}

impl DashboardTemplate {
    fn new(bounds: &DateBounds) -> Self {
        let default_hour = bounds.default_start.hour();
        Self {
            min_date: bounds.min_date.format("%Y-%m-%d").to_string(),
            max_date: bounds.max_date.format("%Y-%m-%d").to_string(),
            default_date: bounds.default_start.format("%Y-%m-%d").to_string(),
            hours: (0..=24)
                .map(|value| HourOption {
                    value,
                    selected: value == default_hour,
                })
                .collect(),
            max_horizon: MAX_HORIZON_HOURS,
        }
    }
}

/// GET /
async fn dashboard(State(state): State<AppState>) -> Result<impl IntoResponse, StatusCode> {
    let bounds = state.table.bounds().ok_or_else(|| {
        error!("Cannot render dashboard for an empty table");
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    let html = DashboardTemplate::new(&bounds).render().map_err(|e| {
        error!("Template rendering error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Html(html))
}

/// GET /health
async fn health() -> &'static str {
    "OK"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/v1/bounds", get(get_bounds))
        .route("/api/v1/chart", get(get_chart))
        .route("/api/v1/chart-spec", get(get_chart_spec))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start_server(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Dashboard running on http://{}", config.bind);
    info!("Available endpoints:");
    info!("  GET /");
    info!("  GET /health");
    info!("  GET /api/v1/bounds");
    info!("  GET /api/v1/chart?date=YYYY-MM-DD&hour=H&horizon=N");
    info!("  GET /api/v1/chart-spec?date=YYYY-MM-DD&hour=H&horizon=N");

    axum::serve(listener, app).await?;

    Ok(())
}
