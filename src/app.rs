use crate::clock::{Clock, IstClock};
use crate::config::Config;
use crate::models::{keys, ApiResponse, ReportParams};
use crate::store::{IncidentStore, SqliteStore, UpsertOutcome};
use crate::window::{check_window, live_cutoff};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Query, Request, State},
    http::{header, StatusCode},
    routing::get,
    Form, Json, Router,
};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

const MAX_BODY_BYTES: usize = 64 * 1024;

const MSG_MISSING_ID: &str = "MISSING DSR ID - Data not stored.";
const MSG_INSERTED: &str = "Data inserted successfully";
const MSG_UPDATED: &str = "Data updated successfully";
const MSG_WRITE_FAILED: &str = "Storage failure - Data not stored.";
const MSG_NONE_RECENT: &str = "No incidents found in the last 24 hours.";
const MSG_RECENT: &str = "Incidents from the last 24 hours.";
const MSG_READ_FAILED: &str = "Storage failure - Unable to load incidents.";
const MSG_BAD_BODY: &str = "Invalid request body";

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn IncidentStore>,
    pub clock: Arc<dyn Clock>,
}

type Reply = (StatusCode, Json<ApiResponse>);

fn reply(status: StatusCode, body: ApiResponse) -> Reply {
    (status, Json(body))
}

pub async fn run_server(config: Config) -> Result<()> {
    let store = SqliteStore::open(&config.database_path, &config.table_prefix).with_context(|| {
        format!(
            "Failed to open incident database at {}",
            config.database_path.display()
        )
    })?;
    info!(
        "Using database {} (table {})",
        config.database_path.display(),
        store.table()
    );

    let state = AppState {
        store: Arc::new(store),
        clock: Arc::new(IstClock),
    };

    let app = build_router(state);

    info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/update", get(update_incident).post(update_incident))
        .route("/live-calls", get(live_calls))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api_routes())
        .nest("/dfes/v1", api_routes())
        .route("/health", get(health))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

/// Query string first, then the body on top of it, so body values win.
#[async_trait]
impl<S> FromRequest<S> for ReportParams
where
    S: Send + Sync,
{
    type Rejection = Reply;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bad_body = |status: StatusCode, reason: String| {
            warn!("Rejecting request: {}", reason);
            reply(status, ApiResponse::error(MSG_BAD_BODY))
        };

        let mut params = Map::new();
        let Query(query) = Query::<HashMap<String, String>>::try_from_uri(req.uri())
            .map_err(|e| bad_body(e.status(), format!("invalid query string: {}", e.body_text())))?;
        params.extend(query.into_iter().map(|(k, v)| (k, Value::String(v))));

        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(body) = Json::<Map<String, Value>>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.status(), format!("invalid JSON body: {}", e.body_text())))?;
            params.extend(body);
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(body) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.status(), format!("invalid form body: {}", e.body_text())))?;
            params.extend(body.into_iter().map(|(k, v)| (k, Value::String(v))));
        }

        Ok(ReportParams(params))
    }
}

async fn update_incident(State(state): State<AppState>, params: ReportParams) -> Reply {
    let now = state.clock.now();
    let raw_date = params.text(keys::DATE);

    let date = match check_window(&raw_date, now.timestamp()) {
        Ok(date) => date,
        Err(e) => {
            warn!(
                "Rejected report {:?}: {} (date={:?}, now={})",
                params.text(keys::DSR_ID),
                e,
                raw_date,
                now.to_rfc3339()
            );
            return reply(StatusCode::BAD_REQUEST, ApiResponse::error(e.to_string()));
        }
    };

    let report = params.to_report(date);
    if report.report_id.is_empty() {
        warn!("Rejected report without dsr_id");
        return reply(StatusCode::BAD_REQUEST, ApiResponse::error(MSG_MISSING_ID));
    }

    let report_id = report.report_id.clone();
    match state.store.upsert(report).await {
        Ok(UpsertOutcome::Inserted) => {
            info!("Inserted incident '{}'", report_id);
            reply(StatusCode::CREATED, ApiResponse::success(MSG_INSERTED))
        }
        Ok(UpsertOutcome::Updated) => {
            info!("Updated incident '{}'", report_id);
            reply(
                StatusCode::OK,
                ApiResponse::success(MSG_UPDATED).with_data(Value::Object(params.0)),
            )
        }
        Err(e) => {
            error!("Failed to store incident '{}': {}", report_id, e);
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::error(MSG_WRITE_FAILED),
            )
        }
    }
}

async fn live_calls(State(state): State<AppState>) -> Reply {
    let now = state.clock.now_epoch();
    let cutoff = live_cutoff(now);

    let read_failed = || {
        reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            ApiResponse::error(MSG_READ_FAILED),
        )
    };

    let rows = match state.store.recent(cutoff).await {
        Ok(rows) => rows,
        Err(e) => {
            error!("Failed to load live calls: {}", e);
            return read_failed();
        }
    };
    debug!(cutoff, count = rows.len(), "Loaded live calls");

    if rows.is_empty() {
        return reply(
            StatusCode::OK,
            ApiResponse::success(MSG_NONE_RECENT).with_data(Value::Array(Vec::new())),
        );
    }

    match serde_json::to_value(&rows) {
        Ok(data) => reply(StatusCode::OK, ApiResponse::success(MSG_RECENT).with_data(data)),
        Err(e) => {
            error!("Failed to encode live calls: {}", e);
            read_failed()
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM. A listener that cannot be installed is
/// logged and never fires, so the other one can still stop the server.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Ctrl+C listener unavailable: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("SIGTERM listener unavailable: {}", e);
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&str>();

    let source = tokio::select! {
        source = interrupt => source,
        source = terminate => source,
    };
    info!("{} received, draining in-flight requests", source);
}
