//! End-to-end tests: start the server on a random port and drive it with
//! reqwest, with throw-away axum agents standing in for real services.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::post;
use axum::Json;
use futures::StreamExt;
use serde_json::{json, Value};

use aether_core::state::{AppState, AppStateInner};
use aether_core::{CoreConfig, Database};
use aether_server::{start_server_with_state, ServerConfig};

struct TestServer {
    base: String,
    client: reqwest::Client,
}

impl TestServer {
    async fn start() -> Self {
        let db = Database::open_in_memory().unwrap();
        let state: AppState = Arc::new(AppStateInner::new(db, CoreConfig::default()));
        let config = ServerConfig {
            port: 0,
            probe_enabled: false,
            ..ServerConfig::default()
        };
        let addr = start_server_with_state(config, state).await.unwrap();
        Self {
            base: format!("http://{}", addr),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self.client.post(self.url(path)).json(&body).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    async fn delete(&self, path: &str) -> u16 {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .unwrap()
            .status()
            .as_u16()
    }

    async fn register(&self, slug: &str, endpoint: &str) -> String {
        let (status, body) = self
            .post("/api/agents", json!({ "slug": slug, "endpoint": endpoint }))
            .await;
        assert_eq!(status, 200, "register failed: {body}");
        body["agent"]["id"].as_str().unwrap().to_string()
    }

    async fn endpoint_task(&self, agent_id: &str, name: &str, path: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/agents/{}/tasks", agent_id),
                json!({ "name": name, "type": "endpoint", "method": "POST", "path": path }),
            )
            .await;
        assert_eq!(status, 200, "task create failed: {body}");
        body["task"]["id"].as_str().unwrap().to_string()
    }
}

async fn spawn_agent(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Mimics the translator and summarizer services the dashboard talks to.
async fn spawn_text_agents() -> String {
    spawn_agent(
        axum::Router::new()
            .route(
                "/api/translate",
                post(|Json(body): Json<Value>| async move {
                    let text = body["text"].as_str().unwrap_or_default().to_string();
                    let target = body["target_language"].as_str().unwrap_or("English").to_string();
                    Json(json!({ "success": true, "text": format!("[{}] {}", target, text) }))
                }),
            )
            .route(
                "/api/summarize",
                post(|Json(body): Json<Value>| async move {
                    match body["text"].as_str() {
                        Some(text) => (
                            axum::http::StatusCode::OK,
                            Json(json!({ "success": true, "summary": text.to_uppercase() })),
                        ),
                        None => (
                            axum::http::StatusCode::BAD_REQUEST,
                            Json(json!({ "error": "Text is required" })),
                        ),
                    }
                }),
            ),
    )
    .await
}

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let (status, body) = server.get("/api/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["server"], "aether-server");
}

#[tokio::test]
async fn test_duplicate_slug_is_409() {
    let server = TestServer::start().await;
    server.register("translator", "http://localhost:3000").await;

    let (status, body) = server
        .post(
            "/api/agents",
            json!({ "slug": "translator", "endpoint": "http://other:4000" }),
        )
        .await;
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("translator"));

    let (_, body) = server.get("/api/agents").await;
    assert_eq!(body["agents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let server = TestServer::start().await;
    assert_eq!(server.get("/api/agents/ghost").await.0, 404);
    assert_eq!(server.get("/api/tasks/ghost").await.0, 404);
    assert_eq!(server.get("/api/flows/ghost").await.0, 404);
    assert_eq!(server.delete("/api/flows/ghost").await, 404);

    let (status, body) = server
        .post("/api/flows/ghost/execute", json!({ "payload": {} }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["kind"], "flowNotFound");
}

#[tokio::test]
async fn test_execute_chains_agents_end_to_end() {
    let server = TestServer::start().await;
    let agents = spawn_text_agents().await;

    let translator = server.register("translator", &agents).await;
    let summarizer = server.register("summarizer", &agents).await;
    let translate = server.endpoint_task(&translator, "translate", "/api/translate").await;
    let summarize = server.endpoint_task(&summarizer, "summarize", "/api/summarize").await;

    let (_, body) = server.post("/api/flows", json!({ "name": "translate-then-summarize" })).await;
    let flow_id = body["flow"]["id"].as_str().unwrap().to_string();

    // Added out of order; execution follows stepOrder.
    let (status, _) = server
        .post(
            &format!("/api/flows/{}/steps", flow_id),
            json!({ "taskId": summarize, "stepOrder": 2 }),
        )
        .await;
    assert_eq!(status, 200);
    server
        .post(
            &format!("/api/flows/{}/steps", flow_id),
            json!({ "taskId": translate, "stepOrder": 1, "config": { "target_language": "French" } }),
        )
        .await;

    let (status, detail) = server.get(&format!("/api/flows/{}", flow_id)).await;
    assert_eq!(status, 200);
    assert_eq!(detail["agentsChain"], json!(["translator", "summarizer"]));

    let (status, body) = server
        .post(
            &format!("/api/flows/{}/execute", flow_id),
            json!({ "payload": { "text": "hola" } }),
        )
        .await;
    assert_eq!(status, 200, "execute failed: {body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["output"]["summary"], "[FRENCH] HOLA");
    assert_eq!(body["steps"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_execute_reports_failing_step() {
    let server = TestServer::start().await;
    let agents = spawn_text_agents().await;

    let summarizer = server.register("summarizer", &agents).await;
    let summarize = server.endpoint_task(&summarizer, "summarize", "/api/summarize").await;
    let (_, body) = server.post("/api/flows", json!({ "name": "summary-only" })).await;
    let flow_id = body["flow"]["id"].as_str().unwrap().to_string();
    let (_, step) = server
        .post(
            &format!("/api/flows/{}/steps", flow_id),
            json!({ "taskId": summarize, "stepOrder": 1 }),
        )
        .await;

    let (status, body) = server
        .post(
            &format!("/api/flows/{}/execute", flow_id),
            json!({ "payload": { "content": "no text field" } }),
        )
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "stepExecutionFailed");
    assert_eq!(body["error"]["stepId"], step["step"]["id"]);
    assert_eq!(body["error"]["cause"]["status"], 400);
}

#[tokio::test]
async fn test_bad_envelope_is_400() {
    let server = TestServer::start().await;
    let (_, body) = server.post("/api/flows", json!({ "name": "f" })).await;
    let flow_id = body["flow"]["id"].as_str().unwrap().to_string();
    let path = format!("/api/flows/{}/execute", flow_id);

    assert_eq!(server.post(&path, json!({ "text": "hola" })).await.0, 400);
    assert_eq!(server.post(&path, json!({ "payload": "hola" })).await.0, 400);
    assert_eq!(server.post(&path, json!([1, 2])).await.0, 400);
}

#[tokio::test]
async fn test_empty_flow_is_422() {
    let server = TestServer::start().await;
    let (_, body) = server.post("/api/flows", json!({ "name": "empty" })).await;
    let flow_id = body["flow"]["id"].as_str().unwrap().to_string();

    let (status, body) = server
        .post(&format!("/api/flows/{}/execute", flow_id), json!({ "payload": {} }))
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"]["kind"], "emptyFlow");
}

#[tokio::test]
async fn test_duplicate_step_order_is_409() {
    let server = TestServer::start().await;
    let agent = server.register("translator", "http://localhost:3000").await;
    let task = server.endpoint_task(&agent, "translate", "/api/translate").await;
    let (_, body) = server.post("/api/flows", json!({ "name": "f" })).await;
    let steps = format!("/api/flows/{}/steps", body["flow"]["id"].as_str().unwrap());

    assert_eq!(server.post(&steps, json!({ "taskId": task, "stepOrder": 1 })).await.0, 200);
    assert_eq!(server.post(&steps, json!({ "taskId": task, "stepOrder": 1 })).await.0, 409);
    assert_eq!(server.post(&steps, json!({ "taskId": "ghost", "stepOrder": 2 })).await.0, 404);
}

#[tokio::test]
async fn test_direct_invoke_and_probe() {
    let server = TestServer::start().await;
    let agents = spawn_text_agents().await;
    let translator = server.register("translator", &agents).await;
    let translate = server.endpoint_task(&translator, "translate", "/api/translate").await;

    let (status, body) = server.post("/api/agents/probe", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["summary"]["ready"], 1);

    let (status, body) = server
        .post(
            &format!("/api/agents/{}/tasks/{}/invoke", translator, translate),
            json!({ "payload": { "text": "hola" } }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["output"]["text"], "[English] hola");
}

#[tokio::test]
async fn test_live_feed_sends_snapshot_on_connect() {
    let server = TestServer::start().await;
    server.register("translator", "http://localhost:3000").await;

    let resp = server.client.get(server.url("/api/agents/live")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let mut stream = resp.bytes_stream();
    let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("snapshot should arrive without a registry change")
        .unwrap()
        .unwrap();
    let text = String::from_utf8_lossy(&chunk);
    assert!(text.contains("event: snapshot"), "got: {text}");
    assert!(text.contains("translator"), "got: {text}");
}

#[tokio::test]
async fn test_list_all_tasks_across_agents() {
    let server = TestServer::start().await;
    let translator = server.register("translator", "http://localhost:3000").await;
    let summarizer = server.register("summarizer", "http://localhost:3001").await;
    server.endpoint_task(&translator, "translate", "/api/translate").await;
    server.endpoint_task(&summarizer, "condense", "/api/summarize").await;

    let (status, body) = server.get("/api/tasks").await;
    assert_eq!(status, 200);
    let names: Vec<&str> = body["tasks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["condense", "translate"]);
}

#[tokio::test]
async fn test_malformed_create_bodies_are_400_with_error_field() {
    let server = TestServer::start().await;
    let agent = server.register("translator", "http://localhost:3000").await;
    let (_, body) = server.post("/api/flows", json!({ "name": "f" })).await;
    let flow_id = body["flow"]["id"].as_str().unwrap().to_string();

    for (path, payload) in [
        ("/api/agents".to_string(), json!({ "slug": "no-endpoint" })),
        (format!("/api/agents/{}/tasks", agent), json!({ "type": "endpoint" })),
        ("/api/flows".to_string(), json!({ "description": "nameless" })),
        (format!("/api/flows/{}/steps", flow_id), json!({ "stepOrder": 1 })),
    ] {
        let (status, body) = server.post(&path, payload).await;
        assert_eq!(status, 400, "{path}: {body}");
        assert!(body["error"].is_string(), "{path}: {body}");
    }
}
