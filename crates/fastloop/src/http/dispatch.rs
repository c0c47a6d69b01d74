// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /{loop_name}` — validate an inbound event, resolve/create the loop
//! it targets, and drive the registered handler under the claim.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;

use crate::app::FastLoop;
use crate::error::{ErrorCode, FastloopError};
use crate::r#loop::event::{LoopEvent, LoopEventSender};
use crate::state::LoopStatus;

/// `POST /{loop_name}` — ingest an event.
///
/// Body: a JSON object with `type`, optional `loop_id`, and payload fields.
/// Mirrors `FastLoop.loop`'s `_route_handler` in the Python original:
/// validate the type is registered and schema-conformant, resolve or create
/// the targeted loop, reject if it is STOPPED, persist the event, then drive
/// (or shelve, if a claim is already held) one handler invocation before
/// responding with the loop record.
pub async fn ingest(
    State(app): State<Arc<FastLoop>>,
    Path(loop_name): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<crate::state::LoopState>, FastloopError> {
    let registration = app.loops.get(&loop_name).ok_or_else(|| {
        FastloopError::new(ErrorCode::NotFound, format!("no loop registered under name '{loop_name}'"))
    })?;

    let event_type = body
        .get("type")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| FastloopError::new(ErrorCode::Validation, "event 'type' is required"))?
        .to_owned();

    if !app.events.contains(&event_type) {
        return Err(FastloopError::new(ErrorCode::UnknownEventType, format!("unknown event type: {event_type}")));
    }

    if let Err(field_errors) = app.events.validate(&event_type, &body) {
        return Err(FastloopError::new(ErrorCode::Validation, "invalid event data")
            .with_field_errors(field_errors));
    }

    let loop_id = body.get("loop_id").and_then(serde_json::Value::as_str).map(str::to_owned);

    if loop_id.is_none() && event_type != registration.start_event {
        return Err(FastloopError::new(
            ErrorCode::WrongStartEvent,
            format!("expected start event type '{}', got '{event_type}'", registration.start_event),
        ));
    }

    let (loop_state, created) = app
        .state
        .get_or_create_loop(Some(&loop_name), loop_id.as_deref(), registration.idle_timeout)
        .await?;

    if created {
        tracing::debug!(loop_id = %loop_state.loop_id, "created new loop");
    } else {
        tracing::debug!(loop_id = %loop_state.loop_id, "reused existing loop");
    }

    if loop_state.status == LoopStatus::Stopped {
        return Err(FastloopError::new(
            ErrorCode::LoopStopped,
            format!("loop {} is stopped", loop_state.loop_id),
        ));
    }

    let mut payload = body.clone();
    if let Some(obj) = payload.as_object_mut() {
        obj.remove("type");
        obj.remove("loop_id");
    }
    let mut event = LoopEvent::new(event_type, payload);
    event.sender = LoopEventSender::Client;
    event.loop_id = Some(loop_state.loop_id.clone());

    app.state.push_event(&loop_state.loop_id, &event).await?;

    let final_state = match app
        .manager
        .start(
            Arc::clone(&registration.handler),
            registration.on_loop_start.clone(),
            loop_state.clone(),
            Some(event),
        )
        .await?
    {
        Some(state) => state,
        None => {
            // Claim was already held elsewhere; the event is durably
            // enqueued and will be observed by the in-flight handler's own
            // `wait_for`. Report the loop's current record rather than
            // blocking on someone else's invocation.
            let (current, _) =
                app.state.get_or_create_loop(Some(&loop_name), Some(&loop_state.loop_id), registration.idle_timeout).await?;
            current
        }
    };

    Ok(Json(final_state))
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
