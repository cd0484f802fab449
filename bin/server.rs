// Fiscal Shift - Web Server
// JSON API over the derived comparison views

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use fiscal_shift::chart::{self, ChartView};
use fiscal_shift::config::{Config, Overrides, SourceConfig};
use fiscal_shift::dashboard::{self, Dashboard};
use fiscal_shift::derive::{MetricCard, ParameterCard};
use fiscal_shift::heatmap::HeatmapMatrix;
use fiscal_shift::{logging, CategoryFilter, LoadState, Metadata};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

#[derive(Parser, Debug)]
#[command(name = "fiscal-server", version, about = "Serve fiscal baseline comparisons over HTTP")]
struct Args {
    /// Fetch snapshots over HTTP from this base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Read snapshots from this directory (expects data/*.json under it)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

/// Shared application state; both documents are loaded once at startup
#[derive(Clone)]
struct AppState {
    dashboard: Arc<Dashboard>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn reply<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

#[derive(Deserialize)]
struct CategoryQuery {
    category: Option<String>,
}

/// Cards response: metadata plus one card per parameter
#[derive(Serialize)]
struct CardsResponse {
    metadata: Option<Metadata>,
    filter: String,
    cards: Vec<ParameterCard>,
}

/// Aggregate response: three cards and the two charts
#[derive(Serialize)]
struct AggregatesResponse {
    years: Vec<String>,
    cards: Vec<MetricCard>,
    revenue_spending: Option<ChartView>,
    fiscal_balance: Option<ChartView>,
}

#[derive(Serialize)]
struct HeatmapResponse {
    filter: String,
    matrix: Option<HeatmapMatrix>,
}

/// Apply the `?category=` query to a copy of the shared dashboard
fn filtered(state: &AppState, query: &CategoryQuery) -> std::result::Result<Dashboard, Response> {
    let filter = match query.category.as_deref() {
        Some(raw) => raw
            .parse::<CategoryFilter>()
            .map_err(|e| reply(StatusCode::BAD_REQUEST, ApiResponse::<()>::err(e.to_string())))?,
        None => CategoryFilter::All,
    };

    let mut dash = Dashboard::clone(&state.dashboard);
    dash.set_filter(filter);
    Ok(dash)
}

/// Map a failed load to 502; Loading cannot happen after startup
fn load_error<T>(state: &LoadState<T>) -> Option<Response> {
    match state {
        LoadState::Failed(message) => Some(reply(StatusCode::BAD_GATEWAY, ApiResponse::<()>::err(message.clone()))),
        LoadState::Loading => Some(reply(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiResponse::<()>::err("Snapshots are still loading"),
        )),
        LoadState::Ready(_) => None,
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/cards?category= - One card per parameter
async fn get_cards(State(state): State<AppState>, Query(query): Query<CategoryQuery>) -> Response {
    let dash = match filtered(&state, &query) {
        Ok(dash) => dash,
        Err(response) => return response,
    };
    if let Some(response) = load_error(&dash.comparison) {
        return response;
    }

    let response = CardsResponse {
        metadata: dash.comparison.data().map(|doc| doc.metadata.clone()),
        filter: dash.filter.to_string(),
        cards: dash.cards(),
    };
    reply(StatusCode::OK, ApiResponse::ok(response))
}

/// GET /api/heatmap?category= - Percentage-change matrix
async fn get_heatmap(State(state): State<AppState>, Query(query): Query<CategoryQuery>) -> Response {
    let dash = match filtered(&state, &query) {
        Ok(dash) => dash,
        Err(response) => return response,
    };
    if let Some(response) = load_error(&dash.comparison) {
        return response;
    }

    let response = HeatmapResponse {
        filter: dash.filter.to_string(),
        matrix: dash.heatmap(),
    };
    reply(StatusCode::OK, ApiResponse::ok(response))
}

/// GET /api/parameters/:key/chart - Old vs new chart for one parameter
async fn get_parameter_chart(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    if let Some(response) = load_error(&state.dashboard.comparison) {
        return response;
    }

    // Decode URL-encoded key
    let decoded_key = urlencoding::decode(&key)
        .unwrap_or_else(|_| key.clone().into())
        .into_owned();

    let param = state
        .dashboard
        .comparison
        .data()
        .and_then(|doc| doc.parameter(&decoded_key));

    match param {
        Some(param) => reply(StatusCode::OK, ApiResponse::ok(chart::parameter_chart(param))),
        None => {
            tracing::debug!(key = %decoded_key, "unknown parameter");
            reply(
                StatusCode::NOT_FOUND,
                ApiResponse::<()>::err(format!("Unknown parameter: {}", decoded_key)),
            )
        }
    }
}

/// GET /api/aggregates - Revenue, spending and balance
async fn get_aggregates(State(state): State<AppState>) -> Response {
    if let Some(response) = load_error(&state.dashboard.aggregate) {
        return response;
    }

    let years = state
        .dashboard
        .aggregate
        .data()
        .map(|doc| doc.years.clone())
        .unwrap_or_default();
    let (revenue_spending, fiscal_balance) = match state.dashboard.aggregate_charts() {
        Some((a, b)) => (Some(a), Some(b)),
        None => (None, None),
    };

    let response = AggregatesResponse {
        years,
        cards: state.dashboard.metric_cards(),
        revenue_spending,
        fiscal_balance,
    };
    reply(StatusCode::OK, ApiResponse::ok(response))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(Overrides {
        base_url: args.base_url,
        data_dir: args.data_dir,
        log_json: args.log_json.then_some(true),
        bind: args.bind,
    })?;

    logging::init("info", config.log_json);

    let source = config.source.build();
    tracing::info!(source = %source.describe(), "loading snapshots");

    let dash = dashboard::load_once(source.as_ref()).await;
    for (name, error) in [
        ("comparison", dash.comparison.error()),
        ("aggregate", dash.aggregate.error()),
    ] {
        if let Some(error) = error {
            tracing::warn!(document = name, %error, "snapshot failed to load");
        }
    }

    let state = AppState {
        dashboard: Arc::new(dash),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/cards", get(get_cards))
        .route("/heatmap", get(get_heatmap))
        .route("/parameters/:key/chart", get(get_parameter_chart))
        .route("/aggregates", get(get_aggregates))
        .with_state(state);

    // Build main router; the raw documents are served as-is from a data directory
    let mut app = Router::new().nest("/api", api_routes);
    if let SourceConfig::Directory { root } = &config.source {
        app = app.nest_service("/data", ServeDir::new(root.join("data")));
    }
    let app = app.layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!(addr = %config.bind, "server running");
    println!("\n🚀 Server running on http://{}", config.bind);
    println!("   API: http://{}/api/cards", config.bind);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
