// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process [`StateManager`] backed by `tokio::sync::Mutex` maps.
//!
//! Single-process only: loops, events, and claims vanish on restart. Useful
//! for local development and the test suite; production deployments that
//! need durability across restarts or multiple processes use
//! [`super::redis::RedisStateManager`].

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};
use uuid::Uuid;

use super::{ClaimToken, LoopState, LoopStatus, StateManager, Subscription, SubscriptionInner};
use crate::error::StateError;
use crate::r#loop::event::{now_unix_secs, LoopEvent, LoopEventSender};

#[derive(Default)]
struct Queues {
    client: VecDeque<LoopEvent>,
    server: VecDeque<LoopEvent>,
}

struct LoopEntry {
    state: LoopState,
    queues: Queues,
    history: Vec<LoopEvent>,
    nonce: u64,
    claim: Option<ClaimToken>,
    notify: watch::Sender<u64>,
}

#[derive(Default)]
struct Inner {
    loops: HashMap<String, LoopEntry>,
    mappings: HashMap<String, String>,
}

pub struct MemoryStateManager {
    inner: Mutex<Inner>,
    context: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStateManager {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            context: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStateManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateManager for MemoryStateManager {
    async fn get_or_create_loop(
        &self,
        loop_name: Option<&str>,
        loop_id: Option<&str>,
        idle_timeout: f64,
    ) -> Result<(LoopState, bool), StateError> {
        let mut inner = self.inner.lock().await;
        if let Some(loop_id) = loop_id {
            if let Some(entry) = inner.loops.get(loop_id) {
                return Ok((entry.state.clone(), false));
            }
        }
        let loop_id = loop_id.map(str::to_owned).unwrap_or_else(|| Uuid::new_v4().to_string());
        let state = LoopState {
            loop_id: loop_id.clone(),
            loop_name: loop_name.map(str::to_owned),
            status: LoopStatus::Running,
            idle_timeout,
            last_event_at: now_unix_secs(),
        };
        let (notify, _) = watch::channel(0);
        inner.loops.insert(
            loop_id,
            LoopEntry {
                state: state.clone(),
                queues: Queues::default(),
                history: Vec::new(),
                nonce: 0,
                claim: None,
                notify,
            },
        );
        Ok((state, true))
    }

    async fn update_loop(&self, loop_id: &str, state: &LoopState) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get_mut(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        entry.state = state.clone();
        Ok(())
    }

    async fn acquire_claim(&self, loop_id: &str) -> Result<ClaimToken, StateError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get_mut(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        if entry.claim.is_some() {
            return Err(StateError::ClaimUnavailable(loop_id.to_owned()));
        }
        let token = ClaimToken::new();
        entry.claim = Some(token.clone());
        Ok(token)
    }

    async fn release_claim(&self, loop_id: &str, token: &ClaimToken) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        if let Some(entry) = inner.loops.get_mut(loop_id) {
            if entry.claim.as_ref() == Some(token) {
                entry.claim = None;
            }
        }
        Ok(())
    }

    async fn get_all_loops(&self, status: Option<LoopStatus>) -> Result<Vec<LoopState>, StateError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .loops
            .values()
            .map(|entry| entry.state.clone())
            .filter(|state| status.is_none_or(|s| s == state.status))
            .collect())
    }

    async fn push_event(&self, loop_id: &str, event: &LoopEvent) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get_mut(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        match event.sender {
            LoopEventSender::Client => entry.queues.client.push_back(event.clone()),
            LoopEventSender::Server => entry.queues.server.push_back(event.clone()),
        }
        entry.history.push(event.clone());
        entry.state.last_event_at = now_unix_secs();
        entry.notify.send_modify(|v| *v = v.wrapping_add(1));
        Ok(())
    }

    async fn pop_event(
        &self,
        loop_id: &str,
        event_type: &str,
        sender: LoopEventSender,
    ) -> Result<Option<LoopEvent>, StateError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get_mut(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        let queue = match sender {
            LoopEventSender::Client => &mut entry.queues.client,
            LoopEventSender::Server => &mut entry.queues.server,
        };
        let position = queue.iter().position(|event| event.event_type == event_type);
        Ok(position.and_then(|idx| queue.remove(idx)))
    }

    async fn get_event_history(&self, loop_id: &str) -> Result<Vec<LoopEvent>, StateError> {
        let inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        Ok(entry.history.clone())
    }

    async fn get_next_nonce(&self, loop_id: &str) -> Result<u64, StateError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get_mut(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        entry.nonce += 1;
        Ok(entry.nonce)
    }

    async fn get_context_value(&self, loop_id: &str, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        Ok(self.context.lock().await.get(&(loop_id.to_owned(), key.to_owned())).cloned())
    }

    async fn set_context_value(&self, loop_id: &str, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        self.context
            .lock()
            .await
            .insert((loop_id.to_owned(), key.to_owned()), value);
        Ok(())
    }

    async fn delete_context_value(&self, loop_id: &str, key: &str) -> Result<(), StateError> {
        self.context.lock().await.remove(&(loop_id.to_owned(), key.to_owned()));
        Ok(())
    }

    async fn subscribe_to_events(&self, loop_id: &str) -> Result<Subscription, StateError> {
        let inner = self.inner.lock().await;
        let entry = inner
            .loops
            .get(loop_id)
            .ok_or_else(|| StateError::Backend(format!("unknown loop {loop_id}")))?;
        Ok(Subscription {
            loop_id: loop_id.to_owned(),
            inner: SubscriptionInner::Memory(entry.notify.subscribe()),
        })
    }

    async fn wait_for_event_notification(
        &self,
        sub: &mut Subscription,
        timeout: Duration,
    ) -> Result<bool, StateError> {
        let SubscriptionInner::Memory(rx) = &mut sub.inner else {
            return Err(StateError::Backend("subscription backend mismatch".into()));
        };
        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(_)) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    async fn set_loop_mapping(&self, external_key: &str, loop_id: &str) -> Result<(), StateError> {
        self.inner
            .lock()
            .await
            .mappings
            .insert(external_key.to_owned(), loop_id.to_owned());
        Ok(())
    }

    async fn get_loop_mapping(&self, external_key: &str) -> Result<Option<String>, StateError> {
        Ok(self.inner.lock().await.mappings.get(external_key).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
