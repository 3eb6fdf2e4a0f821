mod common;

use common::*;
use portkeeper::ports::{ResolverKind, resolver_for};
use portkeeper::supervisor::Supervisor;
use portkeeper::{probe, web};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// A control API on an ephemeral port, shut down on drop.
struct Api {
    base: String,
    client: reqwest::Client,
    _shutdown: oneshot::Sender<()>,
}

impl Api {
    async fn start(env: &TestEnv) -> Self {
        probe::install_crypto_provider();
        let supervisor = Arc::new(Supervisor::new(Arc::new(env.config())));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(web::serve_on(listener, supervisor, async {
            let _ = rx.await;
        }));
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            _shutdown: tx,
        }
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let res = self
            .client
            .get(format!("{}{path}", self.base))
            .send()
            .await
            .unwrap();
        let status = res.status().as_u16();
        let bytes = res.bytes().await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Option<&str>) -> (u16, Value) {
        let mut req = self.client.post(format!("{}{path}", self.base));
        if let Some(body) = body {
            req = req
                .header("content-type", "application/json")
                .body(body.to_string());
        }
        let res = req.send().await.unwrap();
        let status = res.status().as_u16();
        let bytes = res.bytes().await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn start_server(&self, port: u16, script: &str) -> (u16, Value) {
        let body = json!({ "port": port, "script": script }).to_string();
        self.post("/start-server", Some(&body)).await
    }

    async fn is_running(&self, port: u16) -> bool {
        let (status, body) = self.get(&format!("/server-status/{port}")).await;
        assert_eq!(status, 200);
        assert_eq!(body["port"], port);
        body["isRunning"].as_bool().unwrap()
    }
}

#[tokio::test]
async fn test_health_and_listing() {
    let env = TestEnv::new();
    env.create_toml(&server_toml(4500));
    let api = Api::start(&env).await;

    let res = api
        .client
        .get(format!("{}/health", api.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(res.text().await.unwrap(), "OK");

    let (status, body) = api.get("/servers").await;
    assert_eq!(status, 200);
    assert_eq!(body[0]["key"], "web:4500");
    assert_eq!(body[0]["port"], 4500);
}

#[tokio::test]
async fn test_kill_empty_port_is_idempotent() {
    let env = TestEnv::new();
    env.create_toml("");
    let api = Api::start(&env).await;
    let port = free_port();

    for _ in 0..2 {
        let (status, body) = api.post(&format!("/kill-server/{port}"), None).await;
        assert_eq!(status, 200);
        assert_eq!(body["success"], true);
        assert_eq!(body["killed"], 0);
        assert_eq!(body["pids"], json!([]));
    }
}

#[tokio::test]
async fn test_bad_requests() {
    let env = TestEnv::new();
    let port = free_port();
    env.create_toml(&server_toml(port));
    let api = Api::start(&env).await;

    let (status, body) = api.start_server(port, "dev:nope").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "unknown_script");

    let (status, body) = api
        .post("/start-server", Some(&json!({ "port": port }).to_string()))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = api.post("/start-server", Some("not json")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = api.start_server(0, &format!("web:{port}")).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = api
        .post(
            "/start-server",
            Some(&json!({ "port": 70000, "script": "web" }).to_string()),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "bad_request");

    let (status, body) = api.get("/server-status/abc").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_port");

    let (status, body) = api.post("/kill-server/abc", None).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_port");

    // nothing was launched for the rejected requests
    assert!(env.read_log(port).is_empty());
}

#[tokio::test]
async fn test_spawn_failure_is_500() {
    let env = TestEnv::new();
    let port = free_port();
    env.create_toml(&format!(
        "[servers.broken]\nrun = \"python3 -c 'import sys; sys.exit(4)'\"\nport = {port}\n"
    ));
    if !has_python() {
        return;
    }
    let api = Api::start(&env).await;

    let (status, body) = api.start_server(port, "broken").await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "spawn_failure");
    assert!(body["message"].as_str().unwrap().contains("exit code 4"));
}

#[tokio::test]
async fn test_start_status_kill() {
    if !has_python() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let env = TestEnv::new();
    let port = free_port();
    env.create_toml(&server_toml(port));
    let api = Api::start(&env).await;

    assert!(!api.is_running(port).await);

    let (status, body) = api.start_server(port, &format!("web:{port}")).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["killedExisting"], 0);
    let pid = body["pid"].as_u64().unwrap();
    assert!(pid > 0);

    assert!(wait_for_async(Duration::from_secs(5), || api.is_running(port)).await);
    assert!(env.read_log(port).contains(&format!("--- launching web:{port}")));

    let (status, body) = api.post(&format!("/kill-server/{port}"), None).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["killed"], 1);
    assert_eq!(body["pids"], json!([pid]));
    assert_eq!(body["survivors"], json!([]));

    assert!(!api.is_running(port).await);
}

#[tokio::test]
async fn test_start_replaces_rogue_occupant() {
    if !has_python() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let env = TestEnv::new();
    let port = free_port();
    env.create_toml(&server_toml(port));

    let mut rogue = std::process::Command::new("python3")
        .args(["-m", "http.server", &port.to_string(), "--bind", "127.0.0.1"])
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .unwrap();
    assert!(wait_for(Duration::from_secs(5), || is_listening(port)));

    let api = Api::start(&env).await;
    let (status, body) = api.start_server(port, &format!("web:{port}")).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["killedExisting"], 1);
    assert_ne!(body["pid"].as_u64().unwrap(), rogue.id() as u64);
    rogue.wait().unwrap();

    assert!(wait_for_async(Duration::from_secs(5), || api.is_running(port)).await);
    api.post(&format!("/kill-server/{port}"), None).await;
}

#[tokio::test]
async fn test_concurrent_starts_leave_one_listener() {
    if !has_python() {
        eprintln!("python3 not found, skipping");
        return;
    }
    let env = TestEnv::new();
    let port = free_port();
    env.create_toml(&server_toml(port));
    let api = Api::start(&env).await;
    let script = format!("web:{port}");

    let (a, b) = tokio::join!(api.start_server(port, &script), api.start_server(port, &script));
    assert_eq!(a.0, 200, "{}", a.1);
    assert_eq!(b.0, 200, "{}", b.1);
    assert_ne!(a.1["pid"], b.1["pid"]);

    assert!(wait_for_async(Duration::from_secs(5), || api.is_running(port)).await);
    let resolver = resolver_for(ResolverKind::Auto);
    let listeners = resolver.resolve(port);
    assert!(listeners.len() <= 1, "expected one listener, got {listeners:?}");

    let (_, body) = api.post(&format!("/kill-server/{port}"), None).await;
    assert_eq!(body["success"], true);
}
