//! End-to-end test against a live `serve_on_listener` instance: spawn the server on a random
//! port, hit it with a real HTTP client. All `FLEET_*` paths are pointed at a fresh tempdir
//! so the test never touches the running user's real config/registry.
//!
//! Everything that needs env isolation lives in one test function - `std::env::set_var` is
//! process-global, and cargo runs test functions within a binary concurrently by default.

use tokio::net::TcpListener;

async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(fleet_serve::serve_on_listener(listener));
    format!("http://{addr}")
}

#[tokio::test]
async fn e2e_healthz_models_and_bad_request() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("config.toml");
    std::fs::write(&config_path, "").unwrap();
    std::env::set_var("FLEET_CONFIG", &config_path);
    std::env::set_var("FLEET_REGISTRY", tmp.path().join("tools_registry.json"));
    std::env::set_var("FLEET_TOOLS_DIR", tmp.path().join("tools"));
    std::env::set_var("FLEET_CACHE_DIR", tmp.path().join("cache"));

    // An empty document parses into a config with zero backends, so the server boots with
    // nothing to auto-start.
    let base_url = spawn_server().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{base_url}/healthz"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let models: serde_json::Value = client
        .get(format!("{base_url}/v1/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(models["object"], "list");
    assert!(models["data"].as_array().unwrap().is_empty());

    let bad_response = client
        .post(format!("{base_url}/v1/chat/completions"))
        .json(&serde_json::json!({
            "model": "whatever",
            "messages": [{"role": "narrator", "content": "hi"}],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_response.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: serde_json::Value = bad_response.json().await.unwrap();
    assert_eq!(body["error"]["type"], "invalid_request");
}
