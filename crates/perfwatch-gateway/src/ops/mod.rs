//! Operational HTTP endpoints.
//!
//! - `/healthz` : liveness
//! - `/status/` : liveness plus profiling state (polled often, logged at debug)

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app_state::AppState;

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let profiling = match state.collector() {
        Some(c) => {
            let snap = c.snapshot();
            json!({
                "enabled": true,
                "active": snap.active,
                "owner_pid": snap.owner_pid,
                "slowest_secs": snap.slowest_duration_secs,
                "csv_path": snap.csv_path.map(|p| p.display().to_string()),
            })
        }
        None => json!({ "enabled": false, "active": false }),
    };
    Json(json!({ "status": "ok", "profiling": profiling }))
}
