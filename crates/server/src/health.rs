use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use voicedesk_agent::ReconcileOutcome;
use voicedesk_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    default_agent: Option<ReconcileOutcome>,
}

impl HealthState {
    pub fn new(db_pool: DbPool, default_agent: Option<ReconcileOutcome>) -> Self {
        Self { db_pool, default_agent }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub default_agent: Option<ReconcileOutcome>,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn serve(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    axum::serve(listener, router(state)).with_graceful_shutdown(shutdown_signal()).await.map_err(
        |serve_error| {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %serve_error,
                "health endpoint server terminated unexpectedly"
            );
            serve_error
        },
    )
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "voicedesk-server initialized".to_string(),
        },
        database,
        default_agent: state.default_agent.clone(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

async fn shutdown_signal() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_failed",
            correlation_id = "shutdown",
            error = %signal_error,
            "could not listen for shutdown signal"
        );
    }
    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "shutting down");
}
