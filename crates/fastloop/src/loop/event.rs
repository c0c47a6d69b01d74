// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged event records routed to and emitted from loops.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Direction a [`LoopEvent`] travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopEventSender {
    Client,
    Server,
}

/// A tagged record routed to a loop, or emitted by one.
///
/// The envelope (`event_type`, `loop_id`, `sender`, `nonce`, `created_at`) is
/// language-neutral wire format; `payload` carries the per-type fields as a
/// JSON object so the queue/history backends never need to know concrete
/// payload types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub loop_id: Option<String>,
    pub sender: LoopEventSender,
    pub nonce: Option<u64>,
    pub created_at: i64,
    #[serde(flatten)]
    pub payload: serde_json::Value,
}

impl LoopEvent {
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            loop_id: None,
            sender: LoopEventSender::Client,
            nonce: None,
            created_at: now_unix_secs(),
            payload,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Deserialize `payload` into a concrete, statically-typed event payload.
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Current unix-epoch seconds. Kept as a tiny seam so tests can stub time
/// without pulling in a clock-injection crate the rest of the workspace
/// doesn't otherwise need.
pub fn now_unix_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A concrete event payload type a loop handler registers to receive.
///
/// Analogous to the Python original's `@fastloop.event("type_name")`
/// decorator, which stamps `cls.type` onto a `pydantic.BaseModel` subclass.
pub trait LoopEventPayload: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The wire `type` tag this payload is registered under.
    const TYPE: &'static str;
}

/// A [`LoopEvent`] whose payload has been decoded into a concrete type.
#[derive(Debug, Clone)]
pub struct TypedLoopEvent<T> {
    pub envelope: LoopEvent,
    pub payload: T,
}

type Validator = fn(&serde_json::Value) -> Result<(), Vec<String>>;

/// Registry of `type_tag -> payload schema`, populated at startup by each
/// registered event type. Unknown tags are a validation error at ingress.
#[derive(Default)]
pub struct EventRegistry {
    validators: HashMap<&'static str, Validator>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: LoopEventPayload>(&mut self) {
        self.validators.insert(T::TYPE, validate_as::<T>);
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.validators.contains_key(event_type)
    }

    /// Validate `payload` against the schema registered for `event_type`.
    /// Returns field-level error messages on failure, matching the
    /// Python original's pydantic `ValidationError` field-path reporting.
    pub fn validate(&self, event_type: &str, payload: &serde_json::Value) -> Result<(), Vec<String>> {
        match self.validators.get(event_type) {
            Some(validate) => validate(payload),
            None => Err(vec![format!("unknown event type: {event_type}")]),
        }
    }
}

fn validate_as<T: LoopEventPayload>(payload: &serde_json::Value) -> Result<(), Vec<String>> {
    serde_json::from_value::<T>(payload.clone())
        .map(|_| ())
        .map_err(|err| vec![err.to_string()])
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
