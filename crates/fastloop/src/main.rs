// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use clap::Parser;
use fastloop::config::FileConfig;
use fastloop::{Config, FastLoop};
use tracing::error;

#[tokio::main]
async fn main() {
    let mut config = Config::parse();

    if let Some(path) = &config.config {
        match FileConfig::load(path) {
            Ok(file) => config.merge_file(&file),
            Err(err) => {
                eprintln!("failed to load config file {}: {err:#}", path.display());
                std::process::exit(1);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let app = match FastLoop::new(&config) {
        Ok(app) => Arc::new(app),
        Err(err) => {
            error!("fatal: {err:#}");
            std::process::exit(1);
        }
    };
    if let Err(err) = app.serve(&config.host, config.port).await {
        error!("fatal: {err:#}");
        std::process::exit(1);
    }
}
