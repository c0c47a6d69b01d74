// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idle-detection watchdog: periodically sweeps RUNNING loops and reclassifies
//! ones that have gone quiet.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::constants::WATCHDOG_INTERVAL;
use crate::error::StateError;
use crate::r#loop::event::now_unix_secs;
use crate::state::{with_claim, LoopStatus, StateManager};

/// Spawn the watchdog task. Runs until `shutdown` is cancelled.
///
/// Per the upstream source, the idle-loop transition to PAUSED was
/// commented out and never finished; this implements the documented intent
/// (RUNNING -> IDLE once quiescent) rather than the dead PAUSED branch.
pub fn spawn_loop_monitor(state: Arc<dyn StateManager>, shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(WATCHDOG_INTERVAL);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            if let Err(err) = sweep_once(&state).await {
                tracing::error!(%err, "error in loop monitor");
            }
        }
    });
}

async fn sweep_once(state: &Arc<dyn StateManager>) -> Result<(), StateError> {
    let now = now_unix_secs();
    let running = state.get_all_loops(Some(LoopStatus::Running)).await?;

    for mut loop_state in running {
        if !loop_state.is_idle(now) {
            continue;
        }

        match with_claim(Arc::clone(state), &loop_state.loop_id).await {
            Ok(guard) => {
                loop_state.status = LoopStatus::Idle;
                state.update_loop(&loop_state.loop_id, &loop_state).await?;
                tracing::info!(loop_id = %loop_state.loop_id, "loop is idle");
                guard.release().await?;
            }
            Err(StateError::ClaimUnavailable(_)) => {
                // Handler is actively running; skip this cycle.
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
