// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Starts/resumes/stops loop executions and owns the claim while a handler
//! runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::{self, Stream};
use tokio::sync::Mutex;

use crate::constants::EVENT_POLL_INTERVAL;
use crate::error::FastloopError;
use crate::r#loop::context::LoopContext;
use crate::r#loop::event::{LoopEvent, LoopEventSender};
use crate::state::{with_claim, LoopState, LoopStatus, StateError, StateManager};

/// A registered loop handler.
///
/// Implemented automatically for any closure shaped
/// `for<'a> Fn(&'a mut LoopContext) -> BoxFuture<'a, anyhow::Result<()>>`, so
/// ordinary `|ctx: &mut LoopContext| Box::pin(async move { ... })` closures
/// register directly. The higher-ranked bound (rather than a plain, separate
/// `Fut: 'static` type parameter) is required because a handler body awaits
/// on `ctx` itself across suspension points — the returned future borrows
/// `ctx` for exactly the call's lifetime, not `'static`.
pub trait LoopHandler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut LoopContext) -> BoxFuture<'a, anyhow::Result<()>>;
}

impl<F> LoopHandler for F
where
    F: for<'a> Fn(&'a mut LoopContext) -> BoxFuture<'a, anyhow::Result<()>> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut LoopContext) -> BoxFuture<'a, anyhow::Result<()>> {
        self(ctx)
    }
}

pub struct LoopManager {
    state: Arc<dyn StateManager>,
    loop_delay: Duration,
    active: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl LoopManager {
    pub fn new(state: Arc<dyn StateManager>, loop_delay: Duration) -> Self {
        Self { state, loop_delay, active: Mutex::new(HashMap::new()) }
    }

    /// Acquire the claim and drive one invocation of `handler` to
    /// completion. Returns the loop's final `LoopState`.
    ///
    /// If the claim is already held (another invocation is in flight
    /// somewhere in the fleet), returns `Ok(None)` rather than an error: the
    /// triggering event is already durably enqueued and will be observed by
    /// the in-flight handler's own `wait_for`.
    pub async fn start(
        &self,
        handler: Arc<dyn LoopHandler>,
        on_loop_start: Option<Arc<dyn LoopHandler>>,
        mut loop_state: LoopState,
        initial_event: Option<LoopEvent>,
    ) -> Result<Option<LoopState>, FastloopError> {
        let loop_id = loop_state.loop_id.clone();

        let guard = match with_claim(Arc::clone(&self.state), &loop_id).await {
            Ok(guard) => guard,
            Err(StateError::ClaimUnavailable(_)) => {
                tracing::debug!(loop_id = %loop_id, "claim unavailable, loop already executing");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let stop_flag = Arc::new(AtomicBool::new(false));
        self.active.lock().await.insert(loop_id.clone(), Arc::clone(&stop_flag));

        let mut ctx = LoopContext::with_flags(
            loop_id.clone(),
            initial_event,
            Arc::clone(&self.state),
            stop_flag,
            Arc::new(AtomicBool::new(false)),
        );

        if !self.loop_delay.is_zero() {
            tokio::time::sleep(self.loop_delay).await;
        }

        if let Some(on_start) = on_loop_start {
            if let Err(err) = on_start.call(&mut ctx).await {
                tracing::error!(loop_id = %loop_id, %err, "on_loop_start handler failed");
            }
        }

        let outcome = handler.call(&mut ctx).await;
        let new_status = match outcome {
            Err(err) => {
                tracing::error!(loop_id = %loop_id, %err, "loop handler returned an error");
                LoopStatus::Stopped
            }
            Ok(()) => {
                if ctx.should_stop() {
                    LoopStatus::Stopped
                } else if ctx.should_pause() {
                    LoopStatus::Paused
                } else {
                    LoopStatus::Idle
                }
            }
        };

        loop_state.status = new_status;
        self.state.update_loop(&loop_id, &loop_state).await?;
        self.active.lock().await.remove(&loop_id);
        guard.release().await?;

        Ok(Some(loop_state))
    }

    /// Server-sent-event-shaped stream of matching server-emitted events for
    /// `loop_id`, closing once the loop reaches `STOPPED`.
    pub fn events(&self, loop_id: String, event_type: String) -> impl Stream<Item = LoopEvent> + Send + 'static {
        let state = Arc::clone(&self.state);
        stream::unfold((state, loop_id, event_type, 0usize), |(state, loop_id, event_type, mut seen)| async move {
            loop {
                let history = state.get_event_history(&loop_id).await.ok()?;
                let matching: Vec<&LoopEvent> = history
                    .iter()
                    .filter(|event| event.event_type == event_type && event.sender == LoopEventSender::Server)
                    .collect();

                if matching.len() > seen {
                    let event = matching[seen].clone();
                    seen += 1;
                    return Some((event, (state, loop_id, event_type, seen)));
                }

                let loops = state.get_all_loops(None).await.ok()?;
                let stopped = loops
                    .iter()
                    .find(|candidate| candidate.loop_id == loop_id)
                    .is_some_and(|candidate| candidate.status == LoopStatus::Stopped);
                if stopped {
                    return None;
                }

                tokio::time::sleep(EVENT_POLL_INTERVAL).await;
            }
        })
    }

    /// Cooperatively stop every handler currently executing in this
    /// process. Sets each active loop's stop flag and waits (bounded) for
    /// its claim to be released.
    pub async fn stop_all(&self) {
        let flags: Vec<(String, Arc<AtomicBool>)> =
            self.active.lock().await.iter().map(|(id, flag)| (id.clone(), Arc::clone(flag))).collect();

        for (_, flag) in &flags {
            flag.store(true, Ordering::SeqCst);
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while tokio::time::Instant::now() < deadline {
            if self.active.lock().await.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tracing::warn!("stop_all timed out waiting for in-flight handlers to release their claims");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
