// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `FastLoop` application registry: the handler-declaration surface a
//! caller uses to wire up loops and event types before serving, mirroring
//! the Python original's `FastLoop` class (`@app.event(...)`, `@app.loop(...)`
//! decorators) as an explicit builder instead of decorators, since Rust has
//! no decorator syntax.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::StateError;
use crate::r#loop::event::{EventRegistry, LoopEventPayload};
use crate::r#loop::manager::{LoopHandler, LoopManager};
use crate::r#loop::monitor::spawn_loop_monitor;
use crate::state::{create_state_manager, StateManager};

/// One registered loop: the start event it accepts for fresh instances, its
/// default idle timeout, and the handler (plus optional `on_loop_start`
/// hook) that drives it.
pub(crate) struct LoopRegistration {
    pub start_event: &'static str,
    pub idle_timeout: f64,
    pub handler: Arc<dyn LoopHandler>,
    pub on_loop_start: Option<Arc<dyn LoopHandler>>,
}

/// The application: owns the state manager, the loop manager, the event
/// schema registry, and the table of registered loop names.
///
/// Construct with [`FastLoop::new`], register event types and loops, then
/// hand an `Arc<FastLoop>` to [`crate::http::build_router`] or call
/// [`FastLoop::serve`] directly.
pub struct FastLoop {
    pub(crate) state: Arc<dyn StateManager>,
    pub(crate) manager: LoopManager,
    pub(crate) events: EventRegistry,
    pub(crate) loops: HashMap<String, LoopRegistration>,
    pub(crate) shutdown: CancellationToken,
}

impl FastLoop {
    pub fn new(config: &Config) -> Result<Self, StateError> {
        let state = create_state_manager(config)?;
        let manager = LoopManager::new(Arc::clone(&state), config.loop_delay());
        Ok(Self {
            state,
            manager,
            events: EventRegistry::new(),
            loops: HashMap::new(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Build directly on top of a caller-supplied state manager, bypassing
    /// config-driven backend selection. Used by tests and by callers
    /// embedding FastLoop with a backend the config layer doesn't know
    /// about.
    pub fn with_state_manager(state: Arc<dyn StateManager>, loop_delay: Duration) -> Self {
        let manager = LoopManager::new(Arc::clone(&state), loop_delay);
        Self {
            state,
            manager,
            events: EventRegistry::new(),
            loops: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register an event type's wire schema. Analogous to
    /// `@fastloop.event("type_name")` in the Python original.
    pub fn register_event<T: LoopEventPayload>(&mut self) -> &mut Self {
        self.events.register::<T>();
        self
    }

    /// Register a loop handler under `name`, accepting `start_event` as the
    /// type that creates a fresh instance. Analogous to
    /// `@app.loop("name", start_event=..., idle_timeout=...)`.
    pub fn register_loop<H: LoopHandler>(
        &mut self,
        name: impl Into<String>,
        start_event: &'static str,
        idle_timeout: f64,
        handler: H,
    ) -> &mut Self {
        self.loops.insert(
            name.into(),
            LoopRegistration {
                start_event,
                idle_timeout,
                handler: Arc::new(handler),
                on_loop_start: None,
            },
        );
        self
    }

    /// Like [`register_loop`](Self::register_loop), but also runs
    /// `on_loop_start` once before the handler's first invocation for a
    /// freshly created loop.
    pub fn register_loop_with_start<H: LoopHandler, S: LoopHandler>(
        &mut self,
        name: impl Into<String>,
        start_event: &'static str,
        idle_timeout: f64,
        handler: H,
        on_loop_start: S,
    ) -> &mut Self {
        self.loops.insert(
            name.into(),
            LoopRegistration {
                start_event,
                idle_timeout,
                handler: Arc::new(handler),
                on_loop_start: Some(Arc::new(on_loop_start)),
            },
        );
        self
    }

    pub fn state(&self) -> &Arc<dyn StateManager> {
        &self.state
    }

    pub fn manager(&self) -> &LoopManager {
        &self.manager
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serve the HTTP surface until a shutdown signal is received, spawning
    /// the idle-detection watchdog alongside it.
    pub async fn serve(self: Arc<Self>, host: &str, port: u16) -> anyhow::Result<()> {
        spawn_loop_monitor(Arc::clone(&self.state), self.shutdown.clone());

        let router = crate::http::build_router(Arc::clone(&self));
        let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
        tracing::info!(%host, %port, "fastloop listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal(self.shutdown.clone()))
            .await?;

        self.manager.stop_all().await;
        Ok(())
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        match &mut sigterm {
            Some(sigterm) => {
                sigterm.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
        _ = token.cancelled() => {}
    }

    token.cancel();
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
