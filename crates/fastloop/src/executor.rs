// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional executors for offloading CPU-bound handler steps.
//!
//! Handler *coroutine bodies* always run on the main cooperative scheduler
//! (they need direct access to the state manager), but a handler may want to
//! run a synchronous, CPU-bound helper without blocking that scheduler. This
//! mirrors `fastloop/executors/executor.py`'s `Executor` hierarchy; there is
//! no Rust analog of `ProcessPoolExecutor` for arbitrary closures without
//! serialization machinery this repo doesn't otherwise need, so only the
//! asyncio- and thread-pool-equivalent variants are implemented.

use std::future::Future;

use tokio::task::JoinError;

/// Runs a synchronous closure somewhere relative to the main scheduler.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    async fn run_blocking<F, T>(&self, func: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static;
}

/// Runs the closure inline, on the calling task. Equivalent to the Python
/// original's `AsyncioExecutor` for synchronous callables.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

#[async_trait::async_trait]
impl Executor for InlineExecutor {
    async fn run_blocking<F, T>(&self, func: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        Ok(func())
    }
}

/// Runs the closure on tokio's blocking thread pool, so it cannot stall the
/// cooperative scheduler other loops share. Equivalent to the Python
/// original's `ThreadExecutor`.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingExecutor;

#[async_trait::async_trait]
impl Executor for BlockingExecutor {
    async fn run_blocking<F, T>(&self, func: F) -> Result<T, JoinError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(func).await
    }
}

/// Await a future to completion without leaving the cooperative scheduler.
/// Exists purely to name the "handler coroutine bodies always run on the
/// main cooperative scheduler" contract at a call site, matching the
/// Python original's `AsyncioExecutor.run` branch for coroutine functions.
pub async fn run_inline<F: Future>(fut: F) -> F::Output {
    fut.await
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
