// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed [`StateManager`], the authoritative multi-process backend.
//!
//! Key layout mirrors the Python original's `RedisKeys` templates exactly,
//! so an operator inspecting the keyspace with `redis-cli` sees the same
//! shape regardless of which implementation wrote it.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use uuid::Uuid;

use super::{ClaimToken, LoopState, LoopStatus, StateManager, Subscription, SubscriptionInner};
use crate::config::RedisConfig;
use crate::error::StateError;
use crate::r#loop::event::{now_unix_secs, LoopEvent, LoopEventSender};

/// Key templates, parameterized the same way as the Python original's
/// `RedisKeys` class constants.
pub struct RedisKeys {
    prefix: String,
}

impl RedisKeys {
    fn new(prefix: &str) -> Self {
        Self { prefix: prefix.to_owned() }
    }

    fn index(&self) -> String {
        format!("{}:index", self.prefix)
    }

    fn state(&self, loop_id: &str) -> String {
        format!("{}:state:{loop_id}", self.prefix)
    }

    fn claim(&self, loop_id: &str) -> String {
        format!("{}:claim:{loop_id}", self.prefix)
    }

    fn event_history(&self, loop_id: &str) -> String {
        format!("{}:event_history:{loop_id}", self.prefix)
    }

    fn event_queue(&self, loop_id: &str, event_type: &str, sender: LoopEventSender) -> String {
        let direction = match sender {
            LoopEventSender::Server => "server",
            LoopEventSender::Client => "client",
        };
        format!("{}:events:{loop_id}:{event_type}:{direction}", self.prefix)
    }

    fn context(&self, loop_id: &str, key: &str) -> String {
        format!("{}:context:{loop_id}:{key}", self.prefix)
    }

    fn nonce(&self, loop_id: &str) -> String {
        format!("{}:nonce:{loop_id}", self.prefix)
    }

    fn notify_channel(&self, loop_id: &str) -> String {
        format!("{}:notify:{loop_id}", self.prefix)
    }

    fn mapping(&self, external_key: &str) -> String {
        format!("{}:mapping:{external_key}", self.prefix)
    }
}

const CLAIM_TTL_MS: u64 = crate::constants::CLAIM_TTL.as_secs() * 1000;

/// Lua script releasing the claim only if `token` still matches the value
/// stored at `key`, the standard compare-and-delete pattern for Redis locks
/// (prevents releasing a lock someone else has since acquired after TTL
/// expiry).
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

pub struct RedisStateManager {
    client: redis::Client,
    keys: RedisKeys,
    url: String,
}

impl RedisStateManager {
    /// Builds the manager. Does not dial out; the first command establishes
    /// (and the `redis` client subsequently pools/reuses) the multiplexed
    /// connection. Fails only if the configured host/port/database/password
    /// do not form a valid connection URL.
    pub fn new(config: RedisConfig) -> Result<Self, StateError> {
        let url = config.url();
        let client = redis::Client::open(url.as_str()).map_err(|err| StateError::Backend(err.to_string()))?;
        Ok(Self { client, keys: RedisKeys::new(&config.key_prefix), url })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, StateError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }
}

#[async_trait]
impl StateManager for RedisStateManager {
    async fn get_or_create_loop(
        &self,
        loop_name: Option<&str>,
        loop_id: Option<&str>,
        idle_timeout: f64,
    ) -> Result<(LoopState, bool), StateError> {
        let mut conn = self.conn().await?;
        let loop_id = loop_id.map(str::to_owned).unwrap_or_else(|| Uuid::new_v4().to_string());

        let existing: Option<String> = conn
            .get(self.keys.state(&loop_id))
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        if let Some(json) = existing {
            let state = LoopState::from_json(&json).map_err(|err| StateError::Codec(err.to_string()))?;
            return Ok((state, false));
        }

        let state = LoopState {
            loop_id: loop_id.clone(),
            loop_name: loop_name.map(str::to_owned),
            status: LoopStatus::Running,
            idle_timeout,
            last_event_at: now_unix_secs(),
        };
        let json = state.to_json().map_err(|err| StateError::Codec(err.to_string()))?;
        conn.set::<_, _, ()>(self.keys.state(&loop_id), json)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        conn.sadd::<_, _, ()>(self.keys.index(), &loop_id)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        Ok((state, true))
    }

    async fn update_loop(&self, loop_id: &str, state: &LoopState) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        let json = state.to_json().map_err(|err| StateError::Codec(err.to_string()))?;
        conn.set::<_, _, ()>(self.keys.state(loop_id), json)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn acquire_claim(&self, loop_id: &str) -> Result<ClaimToken, StateError> {
        let mut conn = self.conn().await?;
        let token = ClaimToken::new();
        let deadline = tokio::time::Instant::now() + crate::constants::CLAIM_ACQUIRE_TIMEOUT;
        loop {
            let acquired: bool = redis::cmd("SET")
                .arg(self.keys.claim(loop_id))
                .arg(&token.0)
                .arg("NX")
                .arg("PX")
                .arg(CLAIM_TTL_MS)
                .query_async::<Option<String>>(&mut conn)
                .await
                .map(|reply| reply.is_some())
                .map_err(|err| StateError::Backend(err.to_string()))?;
            if acquired {
                return Ok(token);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(StateError::ClaimUnavailable(loop_id.to_owned()));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn release_claim(&self, loop_id: &str, token: &ClaimToken) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        redis::Script::new(RELEASE_SCRIPT)
            .key(self.keys.claim(loop_id))
            .arg(&token.0)
            .invoke_async::<i64>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn get_all_loops(&self, status: Option<LoopStatus>) -> Result<Vec<LoopState>, StateError> {
        let mut conn = self.conn().await?;
        let loop_ids: Vec<String> = conn
            .smembers(self.keys.index())
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;

        let mut all = Vec::with_capacity(loop_ids.len());
        for loop_id in loop_ids {
            let json: Option<String> = conn
                .get(self.keys.state(&loop_id))
                .await
                .map_err(|err| StateError::Backend(err.to_string()))?;
            let Some(json) = json else {
                let _: Result<i64, _> = conn.srem(self.keys.index(), &loop_id).await;
                continue;
            };
            let Ok(state) = LoopState::from_json(&json) else {
                let _: Result<i64, _> = conn.srem(self.keys.index(), &loop_id).await;
                continue;
            };
            if status.is_some_and(|s| s != state.status) {
                continue;
            }
            all.push(state);
        }
        Ok(all)
    }

    async fn push_event(&self, loop_id: &str, event: &LoopEvent) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        let json = event.to_json().map_err(|err| StateError::Codec(err.to_string()))?;
        let queue_key = self.keys.event_queue(loop_id, &event.event_type, event.sender);

        conn.lpush::<_, _, ()>(&queue_key, &json)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        conn.lpush::<_, _, ()>(self.keys.event_history(loop_id), &json)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        conn.publish::<_, _, ()>(self.keys.notify_channel(loop_id), "1")
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;

        let (mut state, _) = self.get_or_create_loop(None, Some(loop_id), 60.0).await?;
        state.last_event_at = now_unix_secs();
        self.update_loop(loop_id, &state).await
    }

    async fn pop_event(
        &self,
        loop_id: &str,
        event_type: &str,
        sender: LoopEventSender,
    ) -> Result<Option<LoopEvent>, StateError> {
        let mut conn = self.conn().await?;
        let queue_key = self.keys.event_queue(loop_id, event_type, sender);
        let json: Option<String> = conn
            .rpop(&queue_key, None)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        json.map(|json| LoopEvent::from_json(&json).map_err(|err| StateError::Codec(err.to_string())))
            .transpose()
    }

    async fn get_event_history(&self, loop_id: &str) -> Result<Vec<LoopEvent>, StateError> {
        let mut conn = self.conn().await?;
        let raw: Vec<String> = conn
            .lrange(self.keys.event_history(loop_id), 0, -1)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        // Newest-first in the list (LPUSH order); reverse for chronological
        // append order, matching the data-model's append-order contract.
        raw.into_iter()
            .rev()
            .map(|json| LoopEvent::from_json(&json).map_err(|err| StateError::Codec(err.to_string())))
            .collect()
    }

    async fn get_next_nonce(&self, loop_id: &str) -> Result<u64, StateError> {
        let mut conn = self.conn().await?;
        conn.incr(self.keys.nonce(loop_id), 1)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn get_context_value(&self, loop_id: &str, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let mut conn = self.conn().await?;
        conn.get(self.keys.context(loop_id, key))
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn set_context_value(&self, loop_id: &str, key: &str, value: Vec<u8>) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(self.keys.context(loop_id, key), value)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn delete_context_value(&self, loop_id: &str, key: &str) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(self.keys.context(loop_id, key))
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn subscribe_to_events(&self, loop_id: &str) -> Result<Subscription, StateError> {
        let client = redis::Client::open(self.url.as_str()).map_err(|err| StateError::Backend(err.to_string()))?;
        let mut pubsub = client
            .get_async_pubsub()
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        pubsub
            .subscribe(self.keys.notify_channel(loop_id))
            .await
            .map_err(|err| StateError::Backend(err.to_string()))?;
        Ok(Subscription {
            loop_id: loop_id.to_owned(),
            inner: SubscriptionInner::Redis(pubsub),
        })
    }

    async fn wait_for_event_notification(
        &self,
        sub: &mut Subscription,
        timeout: Duration,
    ) -> Result<bool, StateError> {
        let SubscriptionInner::Redis(pubsub) = &mut sub.inner else {
            return Err(StateError::Backend("subscription backend mismatch".into()));
        };
        let mut stream = pubsub.on_message();
        match tokio::time::timeout(timeout, futures_util::StreamExt::next(&mut stream)).await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(_) => Ok(false),
        }
    }

    async fn set_loop_mapping(&self, external_key: &str, loop_id: &str) -> Result<(), StateError> {
        let mut conn = self.conn().await?;
        conn.set::<_, _, ()>(self.keys.mapping(external_key), loop_id)
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }

    async fn get_loop_mapping(&self, external_key: &str) -> Result<Option<String>, StateError> {
        let mut conn = self.conn().await?;
        conn.get(self.keys.mapping(external_key))
            .await
            .map_err(|err| StateError::Backend(err.to_string()))
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
