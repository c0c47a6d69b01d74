// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Opaque binary codec for context values.
//!
//! The Python original uses `cloudpickle`, which can serialize arbitrary
//! Python objects including closures. Rust has no equivalent for arbitrary
//! types, so the codec here is scoped to `Serialize + DeserializeOwned`
//! values — every value a handler actually stores (scalars, byte strings,
//! nested maps/lists, event records) satisfies that bound. Encoding is
//! MessagePack via `rmp-serde`, which round-trips all of those shapes
//! losslessly and is compact enough for the Redis value store.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StateError;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StateError> {
    rmp_serde::to_vec(value).map_err(|err| StateError::Codec(err.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StateError> {
    rmp_serde::from_slice(bytes).map_err(|err| StateError::Codec(err.to_string()))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
