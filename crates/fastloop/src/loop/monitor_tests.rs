use std::sync::Arc;

use super::*;
use crate::r#loop::event::now_unix_secs;
use crate::state::memory::MemoryStateManager;
use crate::state::LoopState;

#[tokio::test]
async fn sweep_transitions_quiescent_loop_to_idle() -> anyhow::Result<()> {
    let state: Arc<dyn StateManager> = Arc::new(MemoryStateManager::new());
    let (mut loop_state, _) = state.get_or_create_loop(Some("demo"), None, 1.0).await?;
    loop_state.last_event_at = now_unix_secs() - 10;
    state.update_loop(&loop_state.loop_id, &loop_state).await?;

    sweep_once(&state).await?;

    let loops = state.get_all_loops(None).await?;
    assert_eq!(loops[0].status, LoopStatus::Idle);
    Ok(())
}

#[tokio::test]
async fn sweep_leaves_active_loop_running() -> anyhow::Result<()> {
    let state: Arc<dyn StateManager> = Arc::new(MemoryStateManager::new());
    let (loop_state, _) = state.get_or_create_loop(Some("demo"), None, 3600.0).await?;

    sweep_once(&state).await?;

    let loops = state.get_all_loops(None).await?;
    assert_eq!(loops[0].loop_id, loop_state.loop_id);
    assert_eq!(loops[0].status, LoopStatus::Running);
    Ok(())
}

#[tokio::test]
async fn sweep_skips_loop_whose_claim_is_held() -> anyhow::Result<()> {
    let state: Arc<dyn StateManager> = Arc::new(MemoryStateManager::new());
    let (mut loop_state, _) = state.get_or_create_loop(Some("demo"), None, 1.0).await?;
    loop_state.last_event_at = now_unix_secs() - 10;
    state.update_loop(&loop_state.loop_id, &loop_state).await?;

    let _token = state.acquire_claim(&loop_state.loop_id).await?;
    sweep_once(&state).await?;

    let loops = state.get_all_loops(None).await?;
    assert_eq!(loops[0].status, LoopStatus::Running);
    Ok(())
}

#[test]
fn is_idle_matches_boundary_exactly() {
    let now = now_unix_secs();
    let state = LoopState {
        loop_id: "l1".to_owned(),
        loop_name: None,
        status: LoopStatus::Running,
        idle_timeout: 5.0,
        last_event_at: now - 5,
    };
    assert!(state.is_idle(now));
}
