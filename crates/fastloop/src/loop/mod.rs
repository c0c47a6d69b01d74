// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The loop execution engine: tagged events, the handler-visible context,
//! the manager that drives one invocation under a claim, and the idle
//! watchdog.

pub mod context;
pub mod event;
pub mod manager;
pub mod monitor;

pub use context::LoopContext;
pub use event::{LoopEvent, LoopEventPayload, LoopEventSender, TypedLoopEvent};
pub use manager::{LoopHandler, LoopManager};
pub use monitor::spawn_loop_monitor;
