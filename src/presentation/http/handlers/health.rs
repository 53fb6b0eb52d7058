//! Health Check Handlers
//!
//! # Endpoints
//! - `GET /health` - process is up
//! - `GET /health/live` - liveness probe
//! - `GET /health/ready` - readiness: database, credential store, upload directory
//!
//! Only the database decides readiness. A locked credential store or a
//! missing upload directory degrades the store but does not stop traffic.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::time::Instant;

use crate::startup::AppState;

static SERVER_START: Lazy<Instant> = Lazy::new(Instant::now);
static SERVER_START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Pin the uptime clock to process start
pub fn init_server_start() {
    Lazy::force(&SERVER_START);
    Lazy::force(&SERVER_START_TIME);
}

const SLOW_DATABASE_MS: u64 = 100;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
}

/// Readiness report
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub database: ComponentHealth,
    pub credential_store: CredentialStoreHealth,
    pub file_store: ComponentHealth,
}

/// State of one dependency
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    fn healthy() -> Self {
        Self {
            status: HealthStatus::Healthy,
            latency_ms: None,
            message: None,
        }
    }

    fn failing(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            latency_ms: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CredentialStoreHealth {
    pub status: HealthStatus,
    /// Master key loaded
    pub unlocked: bool,
    pub cached_entries: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn liveness() -> Json<LivenessResponse> {
    Json(LivenessResponse { status: "alive" })
}

/// 200 unless the database is unreachable
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state).await;
    let file_store = check_file_store(&state).await;

    let unlocked = state.credentials.is_unlocked();
    let credential_store = CredentialStoreHealth {
        status: if unlocked {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        unlocked,
        cached_entries: state.credential_cache.len(),
    };

    let status = overall_status(database.status, &[credential_store.status, file_store.status]);
    let code = match status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };

    let response = ReadinessResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: SERVER_START.elapsed().as_secs(),
        started_at: SERVER_START_TIME.to_rfc3339(),
        checks: ReadinessChecks {
            database,
            credential_store,
            file_store,
        },
    };

    (code, Json(response))
}

/// The database alone can make the service unready; everything else
/// at worst degrades it.
fn overall_status(database: HealthStatus, others: &[HealthStatus]) -> HealthStatus {
    if database == HealthStatus::Unhealthy {
        return HealthStatus::Unhealthy;
    }
    others
        .iter()
        .map(|s| (*s).min(HealthStatus::Degraded))
        .fold(database, HealthStatus::max)
}

async fn check_database(state: &AppState) -> ComponentHealth {
    let start = Instant::now();
    match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => {
            let latency = start.elapsed().as_millis() as u64;
            ComponentHealth {
                status: if latency < SLOW_DATABASE_MS {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Degraded
                },
                latency_ms: Some(latency),
                message: None,
            }
        }
        Err(e) => ComponentHealth::failing(
            HealthStatus::Unhealthy,
            format!("Database connection failed: {}", e),
        ),
    }
}

async fn check_file_store(state: &AppState) -> ComponentHealth {
    match tokio::fs::metadata(state.files.root()).await {
        Ok(meta) if meta.is_dir() => ComponentHealth::healthy(),
        Ok(_) => ComponentHealth::failing(HealthStatus::Degraded, "Upload path is not a directory"),
        Err(e) => ComponentHealth::failing(
            HealthStatus::Degraded,
            format!("Upload directory unavailable: {}", e),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(HealthStatus::Healthy, &[HealthStatus::Healthy], HealthStatus::Healthy ; "all healthy")]
    #[test_case(HealthStatus::Healthy, &[HealthStatus::Degraded], HealthStatus::Degraded ; "locked store degrades")]
    #[test_case(HealthStatus::Healthy, &[HealthStatus::Unhealthy], HealthStatus::Degraded ; "only the database is fatal")]
    #[test_case(HealthStatus::Degraded, &[HealthStatus::Healthy], HealthStatus::Degraded ; "slow database")]
    #[test_case(HealthStatus::Unhealthy, &[HealthStatus::Healthy], HealthStatus::Unhealthy ; "database down")]
    fn test_overall_status(database: HealthStatus, others: &[HealthStatus], expected: HealthStatus) {
        assert_eq!(overall_status(database, others), expected);
    }

    #[test]
    fn test_component_health_omits_empty_fields() {
        let json = serde_json::to_value(ComponentHealth::healthy()).unwrap();

        assert_eq!(json["status"], "healthy");
        assert!(json.get("latency_ms").is_none());
        assert!(json.get("message").is_none());
    }
}
