// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::constants::DEFAULT_KEY_PREFIX;

/// Top-level configuration for a FastLoop process.
#[derive(Debug, Clone, clap::Parser)]
pub struct Config {
    /// Host to bind the HTTP surface on.
    #[arg(long, default_value = "0.0.0.0", env = "FASTLOOP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8000, env = "FASTLOOP_PORT")]
    pub port: u16,

    /// Spacing between handler re-entries, in seconds.
    #[arg(long, default_value_t = 0.0, env = "FASTLOOP_LOOP_DELAY_S")]
    pub loop_delay_s: f64,

    /// State backend to use.
    #[arg(long, value_enum, default_value_t = StateBackend::Memory, env = "FASTLOOP_STATE_TYPE")]
    pub state_type: StateBackend,

    /// Redis host (only used when `state_type = redis`).
    #[arg(long, default_value = "127.0.0.1", env = "FASTLOOP_REDIS_HOST")]
    pub redis_host: String,

    /// Redis port.
    #[arg(long, default_value_t = 6379, env = "FASTLOOP_REDIS_PORT")]
    pub redis_port: u16,

    /// Redis logical database index.
    #[arg(long, default_value_t = 0, env = "FASTLOOP_REDIS_DATABASE")]
    pub redis_database: i64,

    /// Redis password, if required.
    #[arg(long, env = "FASTLOOP_REDIS_PASSWORD")]
    pub redis_password: Option<String>,

    /// Whether to connect to Redis over TLS.
    #[arg(long, default_value_t = false, env = "FASTLOOP_REDIS_SSL")]
    pub redis_ssl: bool,

    /// Key prefix for all Redis keys this process owns.
    #[arg(long, default_value = DEFAULT_KEY_PREFIX, env = "FASTLOOP_REDIS_KEY_PREFIX")]
    pub redis_key_prefix: String,

    /// Log level passed to the tracing env-filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info", env = "FASTLOOP_LOG_LEVEL")]
    pub log_level: String,

    /// Optional TOML config file. Values here fill in anything not set by
    /// a flag or environment variable (flags and env vars win over the file).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    Memory,
    Redis,
}

impl Config {
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            host: self.redis_host.clone(),
            port: self.redis_port,
            database: self.redis_database,
            password: self.redis_password.clone(),
            ssl: self.redis_ssl,
            key_prefix: self.redis_key_prefix.clone(),
        }
    }

    pub fn loop_delay(&self) -> Duration {
        Duration::from_secs_f64(self.loop_delay_s.max(0.0))
    }

    /// Merge in values from an on-disk TOML file, for any field the file
    /// sets and the CLI/env layer left at its built-in default.
    pub fn merge_file(&mut self, file: &FileConfig) {
        if let Some(host) = &file.host {
            if self.host == "0.0.0.0" {
                self.host = host.clone();
            }
        }
        if let Some(port) = file.port {
            if self.port == 8000 {
                self.port = port;
            }
        }
        if let Some(redis) = &file.redis {
            if self.redis_host == "127.0.0.1" {
                self.redis_host = redis.host.clone();
            }
            if self.redis_port == 6379 {
                self.redis_port = redis.port;
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: i64,
    pub password: Option<String>,
    pub ssl: bool,
    pub key_prefix: String,
}

impl RedisConfig {
    /// Build a `redis://` connection URL from the configured fields.
    pub fn url(&self) -> String {
        let scheme = if self.ssl { "rediss" } else { "redis" };
        match &self.password {
            Some(password) => {
                format!("{scheme}://:{password}@{}:{}/{}", self.host, self.port, self.database)
            }
            None => format!("{scheme}://{}:{}/{}", self.host, self.port, self.database),
        }
    }
}

/// Shape of an optional on-disk config file (lowest-precedence layer).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub redis: Option<FileRedisConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRedisConfig {
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
}

fn default_redis_port() -> u16 {
    6379
}

impl FileConfig {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
