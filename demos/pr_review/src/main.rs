// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sample FastLoop application: a bot that opens on a pull request, waits
//! for a review approval event, and either commits or pauses depending on
//! whether approval arrived before the wait window closed.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use fastloop::{Config, FastLoop, LoopContext, LoopEventPayload};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrOpened {
    repo_url: String,
    sha1: String,
}

impl LoopEventPayload for PrOpened {
    const TYPE: &'static str = "pr_opened";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrClosed {
    repo_url: String,
    sha1: String,
}

impl LoopEventPayload for PrClosed {
    const TYPE: &'static str = "pr_closed";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrMerged {
    repo_url: String,
    sha1: String,
}

impl LoopEventPayload for PrMerged {
    const TYPE: &'static str = "pr_merged";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChangesApproved {
    approved: bool,
}

impl LoopEventPayload for ChangesApproved {
    const TYPE: &'static str = "changes_approved";
}

/// Stand-in for a real code-hosting API client. A production handler would
/// load credentials and construct the real thing here instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MockClient;

impl MockClient {
    fn transcribe(&self, message: &str) -> String {
        format!("{message} - from the server")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    let mut app = FastLoop::new(&config)?;
    app.register_event::<PrOpened>()
        .register_event::<PrClosed>()
        .register_event::<PrMerged>()
        .register_event::<ChangesApproved>()
        .register_loop_with_start(
            "pr-review",
            PrOpened::TYPE,
            60.0,
            |ctx: &mut LoopContext| {
                Box::pin(async move {
                    tracing::info!("starting pr review loop");

                    let github_event: Option<PrOpened> = ctx.get("github_event", None, false).await?;
                    let github_event = match github_event {
                        Some(event) => event,
                        None => {
                            let received = ctx.wait_for::<PrOpened>(Duration::from_secs(30), true).await?;
                            let event = received
                                .map(|typed| typed.payload)
                                .ok_or_else(|| anyhow::anyhow!("wait_for with raise_on_timeout=true yielded none"))?;
                            ctx.set("github_event", event.clone(), false).await?;
                            event
                        }
                    };

                    tracing::info!(sha1 = %github_event.sha1, "waiting for approval");
                    let approval = ctx.wait_for::<ChangesApproved>(Duration::from_secs(5), false).await?;
                    match approval {
                        None => {
                            tracing::info!("no approval event received, pausing loop");
                            ctx.pause();
                        }
                        Some(typed) => {
                            tracing::info!(approved = typed.payload.approved, "approval event received, committing changes");
                            ctx.stop();
                        }
                    }
                    Ok(())
                })
            },
            |ctx: &mut LoopContext| {
                Box::pin(async move {
                    tracing::info!("loading client...");
                    let client = MockClient;
                    tracing::debug!(greeting = %client.transcribe("hello"), "client ready");
                    ctx.set("client", client, true).await?;
                    Ok(())
                })
            },
        );

    Arc::new(app).serve(&config.host, config.port).await
}
