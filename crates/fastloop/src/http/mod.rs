// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The HTTP/event-ingress surface: `POST /{loop_name}`, the SSE and history
//! event-reading routes, and a couple of ambient ops routes every teacher
//! service in this workspace ships (`/healthz`, `/loops`).

pub mod dispatch;
pub mod events;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app::FastLoop;

/// Build the axum `Router` exposing every registered loop plus the fixed
/// event-reading and ops routes.
pub fn build_router(app: Arc<FastLoop>) -> Router {
    Router::new()
        .route("/healthz", get(events::healthz))
        .route("/loops", get(events::list_loops))
        .route("/events/{loop_id}/{event_type}", get(events::events_sse))
        .route("/events/{loop_id}/history", get(events::event_history))
        .route("/{loop_name}", post(dispatch::ingest))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
