/*!
 * Liveness and readiness probes.
 *
 * - `GET /health` answers as long as the process is serving
 * - `GET /health/ready` pings the database and returns 503 when it is unreachable
 * - `GET /health/version` reports the build
 */

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use std::{collections::BTreeMap, sync::Arc, time::Instant};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

#[derive(Serialize, Debug, Clone)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct ReadinessReport {
    pub status: ProbeStatus,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub checks: BTreeMap<&'static str, ProbeResult>,
}

pub struct HealthState {
    db: Arc<DatabaseConnection>,
    started: Instant,
}

impl HealthState {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            started: Instant::now(),
        }
    }

    async fn probe_database(&self) -> ProbeResult {
        let began = Instant::now();
        let outcome = crate::db::check_connection(&self.db).await;
        ProbeResult {
            status: if outcome.is_ok() {
                ProbeStatus::Up
            } else {
                ProbeStatus::Down
            },
            latency_ms: began.elapsed().as_millis() as u64,
            // ping errors can include connection strings
            error: outcome.err().map(|_| "database unreachable".to_string()),
        }
    }

    pub async fn report(&self) -> ReadinessReport {
        let mut checks = BTreeMap::new();
        checks.insert("database", self.probe_database().await);

        let status = if checks.values().all(|c| c.status == ProbeStatus::Up) {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        };

        ReadinessReport {
            status,
            version: VERSION,
            timestamp: Utc::now(),
            uptime_seconds: self.started.elapsed().as_secs(),
            checks,
        }
    }
}

pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "status": ProbeStatus::Up,
        "version": VERSION,
        "timestamp": Utc::now(),
    }))
}

pub async fn readiness_check(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let report = state.report().await;
    let code = match report.status {
        ProbeStatus::Up => StatusCode::OK,
        ProbeStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };
    (code, Json(report))
}

pub async fn version_info() -> impl IntoResponse {
    Json(json!({ "service": env!("CARGO_PKG_NAME"), "version": VERSION }))
}

pub fn health_routes(db: Arc<DatabaseConnection>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/version", get(version_info))
        .with_state(Arc::new(HealthState::new(db)))
}
