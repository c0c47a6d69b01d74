// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The handler-visible suspension/emission surface.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec;
use crate::constants::EVENT_POLL_INTERVAL;
use crate::error::ContextError;
use crate::r#loop::event::{LoopEvent, LoopEventPayload, LoopEventSender, TypedLoopEvent};
use crate::state::StateManager;

/// Per-invocation handle passed to a registered loop handler.
///
/// Owns the stop/pause request flags as shared [`AtomicBool`]s so
/// [`crate::r#loop::manager::LoopManager::stop_all`] can request a stop from
/// outside the handler's own call stack.
pub struct LoopContext {
    pub loop_id: String,
    pub initial_event: Option<LoopEvent>,
    state_manager: Arc<dyn StateManager>,
    stop_requested: Arc<AtomicBool>,
    pause_requested: Arc<AtomicBool>,
    event_this_cycle: bool,
    attributes: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl LoopContext {
    pub fn new(loop_id: String, initial_event: Option<LoopEvent>, state_manager: Arc<dyn StateManager>) -> Self {
        Self::with_flags(
            loop_id,
            initial_event,
            state_manager,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicBool::new(false)),
        )
    }

    pub(crate) fn with_flags(
        loop_id: String,
        initial_event: Option<LoopEvent>,
        state_manager: Arc<dyn StateManager>,
        stop_requested: Arc<AtomicBool>,
        pause_requested: Arc<AtomicBool>,
    ) -> Self {
        Self {
            loop_id,
            initial_event,
            state_manager,
            stop_requested,
            pause_requested,
            event_this_cycle: false,
            attributes: HashMap::new(),
        }
    }

    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_requested)
    }

    /// Request the loop to stop on the next iteration.
    pub fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    /// Request the loop to pause on the next iteration.
    pub fn pause(&mut self) {
        self.pause_requested.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    pub fn should_pause(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    pub fn event_this_cycle(&self) -> bool {
        self.event_this_cycle
    }

    /// Declared but intentionally unimplemented: no contract exists upstream
    /// for what a handler-visible sleep should do under the claim/watchdog
    /// model (would it hold the claim the whole time? count against
    /// idle_timeout?). Left as `NotImplemented` until one is defined.
    pub fn sleep(&self, _seconds: f64) -> Result<(), ContextError> {
        Err(ContextError::NotImplemented)
    }

    /// Suspend until an event of type `T` arrives on the client queue, or
    /// `timeout` elapses. Polls a change-notification subscription to avoid
    /// busy-looping, falling back to a ~1s poll in case a notification is
    /// missed.
    pub async fn wait_for<T: LoopEventPayload>(
        &mut self,
        timeout: Duration,
        raise_on_timeout: bool,
    ) -> Result<Option<TypedLoopEvent<T>>, ContextError> {
        if timeout.is_zero() {
            return Err(ContextError::InvalidTimeout);
        }

        let start = tokio::time::Instant::now();
        let mut sub = self.state_manager.subscribe_to_events(&self.loop_id).await?;

        loop {
            if self.should_stop() {
                return Err(ContextError::LoopStopped);
            }
            if start.elapsed() >= timeout {
                break;
            }
            if self.should_pause() {
                return Err(ContextError::LoopPaused);
            }

            if let Some(event) = self
                .state_manager
                .pop_event(&self.loop_id, T::TYPE, LoopEventSender::Client)
                .await?
            {
                self.event_this_cycle = true;
                let payload = event
                    .decode_payload::<T>()
                    .map_err(|err| ContextError::State(crate::error::StateError::Codec(err.to_string())))?;
                return Ok(Some(TypedLoopEvent { envelope: event, payload }));
            }

            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break;
            }
            let poll_timeout = remaining.min(EVENT_POLL_INTERVAL);
            let _ = self.state_manager.wait_for_event_notification(&mut sub, poll_timeout).await?;
        }

        if raise_on_timeout {
            Err(ContextError::EventTimeout(T::TYPE.to_string()))
        } else {
            Ok(None)
        }
    }

    /// Emit a server event: stamps sender/loop_id/nonce, persists it, and
    /// makes it visible to SSE/history consumers.
    pub async fn emit<T: LoopEventPayload>(&mut self, payload: &T) -> Result<(), ContextError> {
        let value = serde_json::to_value(payload)
            .map_err(|err| ContextError::State(crate::error::StateError::Codec(err.to_string())))?;
        let mut event = LoopEvent::new(T::TYPE, value);
        event.sender = LoopEventSender::Server;
        event.loop_id = Some(self.loop_id.clone());
        event.nonce = Some(self.state_manager.get_next_nonce(&self.loop_id).await?);
        self.event_this_cycle = true;
        self.state_manager.push_event(&self.loop_id, &event).await?;
        Ok(())
    }

    /// Store a context value. Unless `local`, it is also durably persisted
    /// so it survives process restarts and is visible to other processes.
    pub async fn set<T>(&mut self, key: &str, value: T, local: bool) -> Result<(), ContextError>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if !local {
            let bytes = codec::encode(&value)?;
            self.state_manager.set_context_value(&self.loop_id, key, bytes).await?;
        }
        self.attributes.insert(key.to_owned(), Box::new(value));
        Ok(())
    }

    /// Read a context value. Checks the in-process attribute cache first
    /// (read-your-writes within one invocation); otherwise reads through to
    /// the durable store unless `local`.
    pub async fn get<T>(&mut self, key: &str, default: Option<T>, local: bool) -> Result<Option<T>, ContextError>
    where
        T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    {
        if let Some(cached) = self.attributes.get(key).and_then(|boxed| boxed.downcast_ref::<T>()) {
            return Ok(Some(cached.clone()));
        }

        if !local {
            if let Some(bytes) = self.state_manager.get_context_value(&self.loop_id, key).await? {
                let value: T = codec::decode(&bytes)?;
                self.attributes.insert(key.to_owned(), Box::new(value.clone()));
                return Ok(Some(value));
            }
        }

        if let Some(default) = default {
            self.attributes.insert(key.to_owned(), Box::new(default.clone()));
            return Ok(Some(default));
        }

        Ok(None)
    }

    pub async fn delete(&mut self, key: &str, local: bool) -> Result<(), ContextError> {
        if !local {
            self.state_manager.delete_context_value(&self.loop_id, key).await?;
        }
        self.attributes.remove(key);
        Ok(())
    }

    pub async fn get_event_history(&self) -> Result<Vec<LoopEvent>, ContextError> {
        Ok(self.state_manager.get_event_history(&self.loop_id).await?)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
