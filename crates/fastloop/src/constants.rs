// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// TTL on a loop's claim lock. The holder is expected to finish well under
/// this, or the claim is considered abandoned and free for re-acquisition.
pub const CLAIM_TTL: Duration = Duration::from_secs(60);

/// How long `with_claim` will wait to acquire the lock before failing.
pub const CLAIM_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Watchdog sweep period for the idle monitor.
pub const WATCHDOG_INTERVAL: Duration = Duration::from_secs(5);

/// Poll fallback inside `wait_for` when a change notification is missed.
pub const EVENT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default key prefix for the Redis-backed state manager.
pub const DEFAULT_KEY_PREFIX: &str = "fastloop";

/// Default idle timeout (seconds) for a newly created loop.
pub const DEFAULT_IDLE_TIMEOUT_S: f64 = 60.0;
