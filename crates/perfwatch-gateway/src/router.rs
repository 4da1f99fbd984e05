//! Axum router wiring.
//!
//! Layer order, outermost first: access log, profiling, handler. The
//! profiling layer is only installed when a collector exists.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, obs, ops};

pub fn build_router(state: AppState) -> Router {
    let app = Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/status/", get(ops::status))
        .with_state(state.clone());
    with_observability(app, &state)
}

/// Wrap an application router with the observability layers.
pub fn with_observability(app: Router, state: &AppState) -> Router {
    let app = match state.collector() {
        Some(collector) => app.layer(middleware::from_fn_with_state(
            collector,
            obs::profiling::profiling_middleware,
        )),
        None => app,
    };
    app.layer(middleware::from_fn_with_state(
        state.access_rules(),
        obs::access_log::access_log_middleware,
    ))
}
