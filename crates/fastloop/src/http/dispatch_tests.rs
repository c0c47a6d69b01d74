use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::app::FastLoop;
use crate::http::build_router;
use crate::r#loop::context::LoopContext;
use crate::r#loop::event::LoopEventPayload;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Greeting {
    message: String,
}

impl LoopEventPayload for Greeting {
    const TYPE: &'static str = "greeting";
}

fn demo_app() -> Arc<FastLoop> {
    let mut app = FastLoop::with_state_manager(
        Arc::new(crate::state::memory::MemoryStateManager::new()),
        Duration::ZERO,
    );
    app.register_event::<Greeting>();
    app.register_loop("greeter", "greeting", 60.0, |_ctx: &mut LoopContext| Box::pin(async { Ok(()) }));
    Arc::new(app)
}

#[tokio::test]
async fn unregistered_loop_name_is_not_found() -> anyhow::Result<()> {
    let server = axum_test::TestServer::new(build_router(demo_app()))?;
    let resp = server.post("/nope").json(&serde_json::json!({"type": "greeting", "message": "hi"})).await;
    resp.assert_status(StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn missing_type_field_is_a_validation_error() -> anyhow::Result<()> {
    let server = axum_test::TestServer::new(build_router(demo_app()))?;
    let resp = server.post("/greeter").json(&serde_json::json!({"message": "hi"})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["error"]["code"], "VALIDATION");
    Ok(())
}

#[tokio::test]
async fn unknown_event_type_is_rejected() -> anyhow::Result<()> {
    let server = axum_test::TestServer::new(build_router(demo_app()))?;
    let resp = server.post("/greeter").json(&serde_json::json!({"type": "nonsense"})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["error"]["code"], "UNKNOWN_EVENT_TYPE");
    Ok(())
}

#[tokio::test]
async fn malformed_payload_reports_field_errors() -> anyhow::Result<()> {
    let server = axum_test::TestServer::new(build_router(demo_app()))?;
    let resp = server.post("/greeter").json(&serde_json::json!({"type": "greeting"})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["error"]["code"], "VALIDATION");
    assert!(body["error"]["field_errors"].as_array().is_some_and(|errors| !errors.is_empty()));
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ping {
    nonce: u32,
}

impl LoopEventPayload for Ping {
    const TYPE: &'static str = "ping";
}

#[tokio::test]
async fn non_start_event_without_loop_id_is_rejected() -> anyhow::Result<()> {
    let mut app = FastLoop::with_state_manager(
        Arc::new(crate::state::memory::MemoryStateManager::new()),
        Duration::ZERO,
    );
    app.register_event::<Greeting>();
    app.register_event::<Ping>();
    app.register_loop("greeter", "greeting", 60.0, |_ctx: &mut LoopContext| Box::pin(async { Ok(()) }));
    let server = axum_test::TestServer::new(build_router(Arc::new(app)))?;

    // "ping" is registered as an event type but is not "greeter"'s start
    // event, so without a loop_id it cannot target a fresh instance.
    let resp = server.post("/greeter").json(&serde_json::json!({"type": "ping", "nonce": 1})).await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["error"]["code"], "WRONG_START_EVENT");
    Ok(())
}

#[tokio::test]
async fn start_event_creates_and_drives_a_loop() -> anyhow::Result<()> {
    let server = axum_test::TestServer::new(build_router(demo_app()))?;
    let resp = server.post("/greeter").json(&serde_json::json!({"type": "greeting", "message": "hi"})).await;
    resp.assert_status_ok();
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["status"], "IDLE");
    assert!(body["loop_id"].as_str().is_some());
    Ok(())
}

#[tokio::test]
async fn posting_to_a_stopped_loop_is_rejected() -> anyhow::Result<()> {
    let mut app = FastLoop::with_state_manager(
        Arc::new(crate::state::memory::MemoryStateManager::new()),
        Duration::ZERO,
    );
    app.register_event::<Greeting>();
    app.register_loop("greeter", "greeting", 60.0, |ctx: &mut LoopContext| {
        ctx.stop();
        Box::pin(async { Ok(()) })
    });
    let server = axum_test::TestServer::new(build_router(Arc::new(app)))?;

    let resp = server.post("/greeter").json(&serde_json::json!({"type": "greeting", "message": "hi"})).await;
    resp.assert_status_ok();
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    let loop_id =
        body["loop_id"].as_str().ok_or_else(|| anyhow::anyhow!("loop_id should be a string"))?.to_owned();
    assert_eq!(body["status"], "STOPPED");

    let resp = server
        .post("/greeter")
        .json(&serde_json::json!({"type": "greeting", "loop_id": loop_id, "message": "again"}))
        .await;
    resp.assert_status(StatusCode::BAD_REQUEST);
    let body: serde_json::Value = serde_json::from_str(&resp.text())?;
    assert_eq!(body["error"]["code"], "LOOP_STOPPED");
    Ok(())
}
