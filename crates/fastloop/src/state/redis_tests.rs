use super::*;

fn keys() -> RedisKeys {
    RedisKeys::new("fastloop")
}

#[test]
fn key_templates_match_the_documented_layout() {
    let keys = keys();
    assert_eq!(keys.index(), "fastloop:index");
    assert_eq!(keys.state("l1"), "fastloop:state:l1");
    assert_eq!(keys.claim("l1"), "fastloop:claim:l1");
    assert_eq!(keys.event_history("l1"), "fastloop:event_history:l1");
    assert_eq!(
        keys.event_queue("l1", "pr_opened", LoopEventSender::Server),
        "fastloop:events:l1:pr_opened:server"
    );
    assert_eq!(
        keys.event_queue("l1", "pr_opened", LoopEventSender::Client),
        "fastloop:events:l1:pr_opened:client"
    );
    assert_eq!(keys.context("l1", "repo"), "fastloop:context:l1:repo");
}

#[test]
fn custom_prefix_is_honored() {
    let keys = RedisKeys::new("custom");
    assert_eq!(keys.index(), "custom:index");
}
