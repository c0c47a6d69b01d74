use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::*;
use crate::state::memory::MemoryStateManager;
use crate::state::StateManager;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Approved {
    ok: bool,
}

impl LoopEventPayload for Approved {
    const TYPE: &'static str = "approved";
}

async fn new_ctx() -> anyhow::Result<(Arc<dyn StateManager>, LoopContext)> {
    let state: Arc<dyn StateManager> = Arc::new(MemoryStateManager::new());
    let (loop_state, _) = state.get_or_create_loop(Some("demo"), None, 60.0).await?;
    let ctx = LoopContext::new(loop_state.loop_id, None, Arc::clone(&state));
    Ok((state, ctx))
}

#[tokio::test]
async fn wait_for_rejects_zero_timeout() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    match ctx.wait_for::<Approved>(Duration::ZERO, true).await {
        Err(crate::error::ContextError::InvalidTimeout) => Ok(()),
        other => panic!("expected InvalidTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_returns_event_already_queued() -> anyhow::Result<()> {
    let (state, mut ctx) = new_ctx().await?;
    let mut event = LoopEvent::new("approved", serde_json::json!({"ok": true}));
    event.loop_id = Some(ctx.loop_id.clone());
    state.push_event(&ctx.loop_id, &event).await?;

    let received = ctx
        .wait_for::<Approved>(Duration::from_secs(1), true)
        .await?
        .ok_or_else(|| anyhow::anyhow!("event should have been queued"))?;
    assert!(received.payload.ok);
    assert!(ctx.event_this_cycle());
    Ok(())
}

#[tokio::test]
async fn wait_for_times_out_without_raising() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    let result = ctx.wait_for::<Approved>(Duration::from_millis(50), false).await?;
    assert!(result.is_none());
    Ok(())
}

#[tokio::test]
async fn wait_for_raises_on_timeout_when_requested() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    match ctx.wait_for::<Approved>(Duration::from_millis(50), true).await {
        Err(crate::error::ContextError::EventTimeout(_)) => Ok(()),
        other => panic!("expected EventTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn wait_for_fails_fast_when_stop_requested() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    ctx.stop();
    match ctx.wait_for::<Approved>(Duration::from_secs(1), true).await {
        Err(crate::error::ContextError::LoopStopped) => Ok(()),
        other => panic!("expected LoopStopped, got {other:?}"),
    }
}

#[tokio::test]
async fn emit_assigns_nonce_and_stamps_envelope() -> anyhow::Result<()> {
    let (state, mut ctx) = new_ctx().await?;
    let loop_id = ctx.loop_id.clone();
    ctx.emit(&Approved { ok: true }).await?;
    ctx.emit(&Approved { ok: false }).await?;

    let history = state.get_event_history(&loop_id).await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].nonce, Some(1));
    assert_eq!(history[1].nonce, Some(2));
    assert_eq!(history[0].sender, LoopEventSender::Server);
    assert_eq!(history[0].loop_id.as_deref(), Some(loop_id.as_str()));
    assert!(ctx.event_this_cycle());
    Ok(())
}

#[tokio::test]
async fn set_then_get_returns_value_from_cache() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    ctx.set("count", 3i32, false).await?;
    let value: Option<i32> = ctx.get("count", None, false).await?;
    assert_eq!(value, Some(3));
    Ok(())
}

#[tokio::test]
async fn get_falls_back_to_store_when_not_cached() -> anyhow::Result<()> {
    let (state, mut ctx) = new_ctx().await?;
    let loop_id = ctx.loop_id.clone();
    state.set_context_value(&loop_id, "count", crate::codec::encode(&5i32)?).await?;

    let value: Option<i32> = ctx.get("count", None, false).await?;
    assert_eq!(value, Some(5));
    Ok(())
}

#[tokio::test]
async fn get_returns_default_when_absent() -> anyhow::Result<()> {
    let (_state, mut ctx) = new_ctx().await?;
    let value: Option<i32> = ctx.get("missing", Some(42), false).await?;
    assert_eq!(value, Some(42));
    Ok(())
}

#[tokio::test]
async fn local_set_never_reaches_store() -> anyhow::Result<()> {
    let (state, mut ctx) = new_ctx().await?;
    let loop_id = ctx.loop_id.clone();
    ctx.set("scratch", "in-process-only".to_owned(), true).await?;

    assert!(state.get_context_value(&loop_id, "scratch").await?.is_none());
    let value: Option<String> = ctx.get("scratch", None, true).await?;
    assert_eq!(value.as_deref(), Some("in-process-only"));
    Ok(())
}

#[tokio::test]
async fn delete_clears_cache_and_store() -> anyhow::Result<()> {
    let (state, mut ctx) = new_ctx().await?;
    let loop_id = ctx.loop_id.clone();
    ctx.set("k", 1i32, false).await?;
    ctx.delete("k", false).await?;

    assert!(state.get_context_value(&loop_id, "k").await?.is_none());
    let value: Option<i32> = ctx.get("k", None, false).await?;
    assert_eq!(value, None);
    Ok(())
}

#[test]
fn sleep_is_explicitly_unimplemented() {
    let state: Arc<dyn StateManager> = Arc::new(MemoryStateManager::new());
    let ctx = LoopContext::new("l1".to_owned(), None, state);
    assert!(matches!(ctx.sleep(1.0), Err(crate::error::ContextError::NotImplemented)));
}
