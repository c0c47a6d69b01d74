// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! FastLoop: a durable, event-driven loop execution engine. A handler is
//! invoked once per event, runs under an exclusive per-loop claim so a
//! scaled-out fleet never double-drives the same instance, and can suspend
//! on `wait_for` across invocations by persisting its durable state through
//! a [`state::StateManager`] backend.

pub mod app;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod http;
pub mod r#loop;
pub mod state;

pub use app::FastLoop;
pub use config::Config;
pub use error::{ContextError, ErrorCode, FastloopError, StateError};
pub use r#loop::{LoopContext, LoopEvent, LoopEventPayload, LoopEventSender, LoopHandler, TypedLoopEvent};
pub use state::{LoopState, LoopStatus, StateManager};
