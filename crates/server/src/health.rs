use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use convoy_db::DbPool;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ready,
    Degraded,
}

impl ProbeStatus {
    fn is_ready(self) -> bool {
        matches!(self, ProbeStatus::Ready)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub status: ProbeStatus,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    pub status: ProbeStatus,
    pub service: ComponentHealth,
    pub database: ComponentHealth,
    pub checked_at: String,
}

#[derive(Clone)]
struct HealthState {
    db_pool: DbPool,
}

/// `GET /health`, merged onto the ingress router by `main`.
pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(probe)).with_state(HealthState { db_pool })
}

async fn probe(State(state): State<HealthState>) -> (StatusCode, Json<HealthSnapshot>) {
    let database = conversation_store_health(&state.db_pool).await;

    let status =
        if database.status.is_ready() { ProbeStatus::Ready } else { ProbeStatus::Degraded };
    let snapshot = HealthSnapshot {
        status,
        service: ComponentHealth {
            status: ProbeStatus::Ready,
            detail: "convoy-server accepting ingress traffic".to_string(),
        },
        database,
        checked_at: Utc::now().to_rfc3339(),
    };

    let code = if status.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(snapshot))
}

// Counts conversations rather than pinging; a reachable database with no
// schema reports as degraded.
async fn conversation_store_health(pool: &DbPool) -> ComponentHealth {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(1) FROM conversations").fetch_one(pool).await
    {
        Ok(count) => ComponentHealth {
            status: ProbeStatus::Ready,
            detail: format!("conversation store reachable ({count} conversations)"),
        },
        Err(error) => ComponentHealth {
            status: ProbeStatus::Degraded,
            detail: format!("conversation store check failed: {error}"),
        },
    }
}
