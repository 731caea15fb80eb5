//! Axum router wiring (HTTP -> WS upgrade).
//!
//! The hub exposes a single WebSocket route at `/`.

use axum::{routing::get, Router};

use crate::{app_state::AppState, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(transport::ws::ws_upgrade))
        .with_state(state)
}
