use serde_json::json;

use crate::*;

#[tokio::test]
async fn test_status_before_any_session() {
    let launcher = Launcher::start().await.unwrap();

    let (code, body) = launcher.get("/status").await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["active_sessions"], 0);
    assert!(body["data"]["public_key"].is_null(), "status must not create a key");
    assert!(!launcher.key_dir.join("id_ed25519").exists());
}

/// Pasting a device's launch script yields a ready session that later
/// status checks and reconnects reuse.
#[tokio::test]
async fn test_connect_then_reuse() {
    let launcher = Launcher::start().await.unwrap();

    let (code, body) = launcher
        .post("/sessions", &json!({ "script": script_for("dev-42", 3) }))
        .await
        .unwrap();
    assert_eq!(code, 200, "connect failed: {body}");
    let data = &body["data"];
    assert_eq!(data["node_id"], "dev-42");
    assert_eq!(data["url"], "wss://zedcloud.example.com/edgeview");
    assert_eq!(data["instance_id"], 1);
    assert_eq!(data["max_instances"], 3);
    let port = data["port"].as_u64().unwrap();
    assert_ne!(port, 0);

    // The key is provisioned as part of establishment.
    assert!(launcher.key_dir.join("id_ed25519").exists());
    assert!(launcher.key_dir.join("id_ed25519.pub").exists());

    let (code, body) = launcher
        .post("/session-status", &json!({ "nodeId": "dev-42" }))
        .await
        .unwrap();
    assert_eq!(code, 200);
    assert_eq!(body["data"]["active"], true);
    assert_eq!(body["data"]["port"].as_u64(), Some(port));

    let (_, again) = launcher
        .post("/sessions", &json!({ "script": script_for("dev-42", 3) }))
        .await
        .unwrap();
    assert_eq!(again["data"]["port"].as_u64(), Some(port), "session was not reused");
}

#[tokio::test]
async fn test_single_instance_descriptor() {
    let launcher = Launcher::start().await.unwrap();

    let (_, body) = launcher
        .post("/sessions", &json!({ "script": script_for("dev-7", 1) }))
        .await
        .unwrap();
    assert_eq!(body["data"]["instance_id"], 0);
}

#[tokio::test]
async fn test_connect_rejects_malformed_script() {
    let launcher = Launcher::start().await.unwrap();

    let (code, body) = launcher
        .post("/sessions", &json!({ "script": "edgeview -token not-a-token" }))
        .await
        .unwrap();
    assert_eq!(code, 400);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (_, list) = launcher.get("/sessions").await.unwrap();
    assert_eq!(list["data"]["sessions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_connect_rejects_missing_claim() {
    let launcher = Launcher::start().await.unwrap();
    let claims = json!({
        "dep": "https://zedcloud.example.com/edgeview",
        "sub": "dev-1",
        "key": "nonce",
    });

    let (code, body) = launcher
        .post("/sessions", &json!({ "script": format!("-token {}", token(&claims)) }))
        .await
        .unwrap();
    assert_eq!(code, 400);
    assert!(body["error"].as_str().unwrap().contains("num"), "{body}");
}

#[tokio::test]
async fn test_connect_rejects_expired_descriptor() {
    let launcher = Launcher::start().await.unwrap();
    let claims = json!({
        "dep": "https://zedcloud.example.com/edgeview",
        "sub": "dev-1",
        "num": 2,
        "key": "nonce",
        "exp": 1_000_000_000u64,
    });

    let (code, _) = launcher
        .post("/sessions", &json!({ "script": format!("-token {}", token(&claims)) }))
        .await
        .unwrap();
    assert_eq!(code, 400);
    assert!(launcher.manager.lookup("dev-1").is_none());
}

#[tokio::test]
async fn test_connect_rejects_target_mismatch() {
    let launcher = Launcher::start().await.unwrap();

    let (code, _) = launcher
        .post(
            "/sessions",
            &json!({ "script": script_for("dev-1", 1), "node_id": "dev-2" }),
        )
        .await
        .unwrap();
    assert_eq!(code, 400);
}

#[tokio::test]
async fn test_inspect_unknown_session() {
    let launcher = Launcher::start().await.unwrap();

    let (code, body) = launcher.get("/sessions/dev-missing").await.unwrap();
    assert_eq!(code, 404);
    assert_eq!(body["success"], false);

    let (code, body) = launcher
        .post("/session-status", &json!({ "node_id": "dev-missing" }))
        .await
        .unwrap();
    assert_eq!(code, 200);
    assert_eq!(body["data"]["active"], false);
}

#[tokio::test]
async fn test_drop_session() {
    let launcher = Launcher::start().await.unwrap();
    launcher
        .post("/sessions", &json!({ "script": script_for("dev-9", 2) }))
        .await
        .unwrap();

    let (code, body) = launcher.delete("/sessions/dev-9").await.unwrap();
    assert_eq!(code, 200);
    assert_eq!(body["data"]["dropped"], true);

    let (_, body) = launcher
        .post("/session-status", &json!({ "nodeId": "dev-9" }))
        .await
        .unwrap();
    assert_eq!(body["data"]["active"], false);

    let (_, body) = launcher.delete("/sessions/dev-9").await.unwrap();
    assert_eq!(body["data"]["dropped"], false);
}

#[tokio::test]
async fn test_list_sessions_sorted() {
    let launcher = Launcher::start().await.unwrap();
    for target in ["dev-b", "dev-a"] {
        let (code, _) = launcher
            .post("/sessions", &json!({ "script": script_for(target, 1) }))
            .await
            .unwrap();
        assert_eq!(code, 200);
    }

    let (_, body) = launcher.get("/sessions").await.unwrap();
    let ids: Vec<&str> = body["data"]["sessions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["node_id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["dev-a", "dev-b"]);

    let (_, status) = launcher.get("/status").await.unwrap();
    assert_eq!(status["data"]["active_sessions"], 2);
}

#[tokio::test]
async fn test_ssh_key_endpoint() {
    let launcher = Launcher::start().await.unwrap();

    let (code, body) = launcher.get("/ssh-key").await.unwrap();
    assert_eq!(code, 200);
    let public_key = body["data"]["public_key"].as_str().unwrap().to_string();
    assert!(public_key.starts_with("ssh-ed25519 "));

    let (_, again) = launcher.get("/ssh-key").await.unwrap();
    assert_eq!(again["data"]["public_key"], public_key.as_str());

    let (_, status) = launcher.get("/status").await.unwrap();
    assert_eq!(status["data"]["public_key"], public_key.as_str());
}

#[tokio::test]
async fn test_ssh_key_endpoint_reports_corrupt_key() {
    let launcher = Launcher::start().await.unwrap();
    std::fs::create_dir_all(&launcher.key_dir).unwrap();
    std::fs::write(launcher.key_dir.join("id_ed25519"), "garbage").unwrap();

    let (code, body) = launcher.get("/ssh-key").await.unwrap();
    assert_eq!(code, 500);
    assert_eq!(body["success"], false);

    // A broken key also blocks establishment rather than being replaced.
    let (code, _) = launcher
        .post("/sessions", &json!({ "script": script_for("dev-1", 1) }))
        .await
        .unwrap();
    assert_eq!(code, 500);
    assert_eq!(
        std::fs::read_to_string(launcher.key_dir.join("id_ed25519")).unwrap(),
        "garbage"
    );
}
