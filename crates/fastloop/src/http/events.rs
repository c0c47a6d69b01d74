// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ops and event-reading routes: health, the loop roster, live server-event
//! streaming over SSE, and the durable event history.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;

use crate::app::FastLoop;
use crate::error::FastloopError;
use crate::r#loop::event::LoopEvent;
use crate::state::{LoopState, LoopStatus};

pub async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub struct ListLoopsQuery {
    status: Option<String>,
}

/// `GET /loops[?status=RUNNING]` — the current roster of loop records.
pub async fn list_loops(
    State(app): State<Arc<FastLoop>>,
    Query(query): Query<ListLoopsQuery>,
) -> Result<Json<Vec<LoopState>>, FastloopError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => Some(parse_status(raw)?),
    };
    let loops = app.state.get_all_loops(status).await?;
    Ok(Json(loops))
}

fn parse_status(raw: &str) -> Result<LoopStatus, FastloopError> {
    match raw.to_ascii_uppercase().as_str() {
        "RUNNING" => Ok(LoopStatus::Running),
        "IDLE" => Ok(LoopStatus::Idle),
        "PAUSED" => Ok(LoopStatus::Paused),
        "STOPPED" => Ok(LoopStatus::Stopped),
        other => Err(FastloopError::new(
            crate::error::ErrorCode::Validation,
            format!("unknown status filter: {other}"),
        )),
    }
}

/// `GET /events/{loop_id}/{event_type}` — live stream of server-emitted
/// events of `event_type`, closing once the loop stops.
pub async fn events_sse(
    State(app): State<Arc<FastLoop>>,
    Path((loop_id, event_type)): Path<(String, String)>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = app.manager.events(loop_id, event_type);
    let stream = events.map(|event| {
        let data = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_owned());
        Ok(Event::default().event(event.event_type.as_str()).data(data))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// `GET /events/{loop_id}/history` — the full durable event history.
pub async fn event_history(
    State(app): State<Arc<FastLoop>>,
    Path(loop_id): Path<String>,
) -> Result<Json<Vec<LoopEvent>>, FastloopError> {
    let history = app.state.get_event_history(&loop_id).await?;
    Ok(Json(history))
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
