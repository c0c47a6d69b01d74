// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable store abstraction: loops, event queues, event history,
//! context key/value, claims, and change notifications.

pub mod memory;
pub mod redis;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Config, RedisConfig, StateBackend};
use crate::error::StateError;
use crate::r#loop::event::{LoopEvent, LoopEventSender};

/// Lifecycle status of a [`LoopState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LoopStatus {
    Running,
    Idle,
    Paused,
    Stopped,
}

/// A durable session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopState {
    pub loop_id: String,
    pub loop_name: Option<String>,
    pub status: LoopStatus,
    pub idle_timeout: f64,
    pub last_event_at: i64,
}

impl LoopState {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn is_idle(&self, now: i64) -> bool {
        self.last_event_at + self.idle_timeout as i64 <= now
    }
}

/// Opaque token identifying ownership of a held claim, so a release can be
/// rejected if it no longer matches the current holder (TTL expired and
/// someone else acquired in the meantime).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken(pub String);

impl ClaimToken {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for ClaimToken {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered interest in change notifications for a single `loop_id`.
pub struct Subscription {
    pub loop_id: String,
    pub(crate) inner: SubscriptionInner,
}

pub(crate) enum SubscriptionInner {
    Memory(tokio::sync::watch::Receiver<u64>),
    Redis(::redis::aio::PubSub),
}

/// Durable store abstraction. Any backend realizing this trait may be used
/// by [`crate::r#loop::manager::LoopManager`] and
/// [`crate::r#loop::context::LoopContext`] interchangeably.
#[async_trait]
pub trait StateManager: Send + Sync {
    async fn get_or_create_loop(
        &self,
        loop_name: Option<&str>,
        loop_id: Option<&str>,
        idle_timeout: f64,
    ) -> Result<(LoopState, bool), StateError>;

    async fn update_loop(&self, loop_id: &str, state: &LoopState) -> Result<(), StateError>;

    /// Acquire the per-loop claim. Returns a token the caller must present
    /// to release it. Prefer [`with_claim`] over calling this directly.
    async fn acquire_claim(&self, loop_id: &str) -> Result<ClaimToken, StateError>;

    async fn release_claim(&self, loop_id: &str, token: &ClaimToken) -> Result<(), StateError>;

    async fn get_all_loops(&self, status: Option<LoopStatus>) -> Result<Vec<LoopState>, StateError>;

    async fn push_event(&self, loop_id: &str, event: &LoopEvent) -> Result<(), StateError>;

    async fn pop_event(
        &self,
        loop_id: &str,
        event_type: &str,
        sender: LoopEventSender,
    ) -> Result<Option<LoopEvent>, StateError>;

    async fn get_event_history(&self, loop_id: &str) -> Result<Vec<LoopEvent>, StateError>;

    async fn get_next_nonce(&self, loop_id: &str) -> Result<u64, StateError>;

    async fn get_context_value(&self, loop_id: &str, key: &str) -> Result<Option<Vec<u8>>, StateError>;

    async fn set_context_value(&self, loop_id: &str, key: &str, value: Vec<u8>) -> Result<(), StateError>;

    async fn delete_context_value(&self, loop_id: &str, key: &str) -> Result<(), StateError>;

    async fn subscribe_to_events(&self, loop_id: &str) -> Result<Subscription, StateError>;

    /// Block up to `timeout` for the next change notification on `sub`.
    /// Returns `true` if notified, `false` on timeout. False wakeups are
    /// allowed; callers must re-check the queues they care about.
    async fn wait_for_event_notification(
        &self,
        sub: &mut Subscription,
        timeout: Duration,
    ) -> Result<bool, StateError>;

    async fn set_loop_mapping(&self, external_key: &str, loop_id: &str) -> Result<(), StateError>;

    async fn get_loop_mapping(&self, external_key: &str) -> Result<Option<String>, StateError>;
}

/// Build the configured [`StateManager`] backend. Fails only for the Redis
/// backend, when the configured host/port/database do not form a valid
/// connection URL.
pub fn create_state_manager(config: &Config) -> Result<Arc<dyn StateManager>, StateError> {
    match config.state_type {
        StateBackend::Memory => Ok(Arc::new(memory::MemoryStateManager::new())),
        StateBackend::Redis => Ok(Arc::new(redis::RedisStateManager::new(config.redis_config())?)),
    }
}

pub fn create_redis_state_manager(config: RedisConfig) -> Result<Arc<dyn StateManager>, StateError> {
    Ok(Arc::new(redis::RedisStateManager::new(config)?))
}

/// RAII guard around a held claim. Releases on drop (best-effort,
/// fire-and-forget, to survive a panic unwinding through the guard) or,
/// preferably, via the explicit [`ClaimGuard::release`] on the happy path.
pub struct ClaimGuard {
    state: Arc<dyn StateManager>,
    loop_id: String,
    token: ClaimToken,
    released: AtomicBool,
}

impl ClaimGuard {
    pub fn loop_id(&self) -> &str {
        &self.loop_id
    }

    pub async fn release(self) -> Result<(), StateError> {
        self.released.store(true, Ordering::SeqCst);
        self.state.release_claim(&self.loop_id, &self.token).await
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = Arc::clone(&self.state);
        let loop_id = self.loop_id.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            if let Err(err) = state.release_claim(&loop_id, &token).await {
                tracing::warn!(loop_id = %loop_id, %err, "failed to release claim on drop");
            }
        });
    }
}

/// Scoped acquisition of the per-loop claim with guaranteed release.
pub async fn with_claim(
    state: Arc<dyn StateManager>,
    loop_id: &str,
) -> Result<ClaimGuard, StateError> {
    let token = state.acquire_claim(loop_id).await?;
    Ok(ClaimGuard {
        state,
        loop_id: loop_id.to_owned(),
        token,
        released: AtomicBool::new(false),
    })
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
