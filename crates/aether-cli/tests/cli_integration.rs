//! Integration tests for the aether-cli commands.
//!
//! These tests exercise the same code paths as the binary, against
//! throw-away SQLite databases.

use std::time::Duration;

use aether_cli::commands::{self, agent, flow, task};
use aether_core::state::AppState;
use aether_core::CoreConfig;

fn test_state(dir: &tempfile::TempDir) -> AppState {
    let path = dir.path().join("aether.db");
    commands::init_state(path.to_str().unwrap(), CoreConfig::default())
        .expect("Failed to open test database")
}

async fn endpoint_task(state: &AppState, agent: &str, name: &str) -> String {
    let result = task::create(
        state,
        task::CreateArgs {
            agent,
            name,
            kind: "endpoint",
            description: None,
            method: None,
            path: Some("/run"),
            descriptor: None,
        },
    )
    .await
    .unwrap();
    result["task"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_agent_register_and_list() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);

    let result = agent::register(&state, "translator", "http://localhost:3000", Some("agents/translator"))
        .await
        .unwrap();
    assert_eq!(result["agent"]["slug"], "translator");
    assert_eq!(result["agent"]["status"], "PENDING");

    let result = agent::list(&state).await.unwrap();
    assert_eq!(result["agents"].as_array().unwrap().len(), 1);

    // Lookup works by slug as well as by id.
    let result = agent::get(&state, "translator").await.unwrap();
    assert_eq!(result["agent"]["endpoint"], "http://localhost:3000");

    let err = agent::register(&state, "translator", "http://localhost:4000", None)
        .await
        .unwrap_err();
    assert!(err.contains("already registered"), "got: {err}");
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let state = test_state(&dir);
        agent::register(&state, "summarizer", "http://localhost:3001", None)
            .await
            .unwrap();
    }
    let state = test_state(&dir);
    let result = agent::list(&state).await.unwrap();
    assert_eq!(result["agents"][0]["slug"], "summarizer");
}

#[tokio::test]
async fn test_task_create_validates_type() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    agent::register(&state, "translator", "http://localhost:3000", None)
        .await
        .unwrap();

    let err = task::create(
        &state,
        task::CreateArgs {
            agent: "translator",
            name: "translate",
            kind: "webhook",
            description: None,
            method: None,
            path: None,
            descriptor: None,
        },
    )
    .await
    .unwrap_err();
    assert!(err.contains("Invalid task type"));

    let err = task::create(
        &state,
        task::CreateArgs {
            agent: "translator",
            name: "clean",
            kind: "script",
            description: None,
            method: None,
            path: None,
            descriptor: Some("{not json"),
        },
    )
    .await
    .unwrap_err();
    assert!(err.contains("--descriptor"));
}

#[tokio::test]
async fn test_flow_build_show_and_remove_step() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    agent::register(&state, "translator", "http://localhost:3000", None)
        .await
        .unwrap();
    agent::register(&state, "summarizer", "http://localhost:3001", None)
        .await
        .unwrap();
    let translate = endpoint_task(&state, "translator", "translate").await;
    let summarize = endpoint_task(&state, "summarizer", "summarize").await;

    let all = task::list(&state, None).await.unwrap();
    assert_eq!(all["tasks"].as_array().unwrap().len(), 2);
    let own = task::list(&state, Some("summarizer")).await.unwrap();
    assert_eq!(own["tasks"][0]["name"], "summarize");

    let created = flow::create(&state, "pipeline", Some("translate then summarize"))
        .await
        .unwrap();
    let flow_id = created["flow"]["id"].as_str().unwrap().to_string();

    flow::add_step(&state, &flow_id, &summarize, 20, None).await.unwrap();
    let first = flow::add_step(&state, &flow_id, &translate, 10, Some(r#"{"target_language":"French"}"#))
        .await
        .unwrap();

    let detail = flow::show(&state, &flow_id).await.unwrap();
    assert_eq!(detail["agentsChain"], serde_json::json!(["translator", "summarizer"]));
    assert_eq!(detail["steps"][0]["config"]["target_language"], "French");

    let step_id = first["step"]["id"].as_str().unwrap();
    flow::remove_step(&state, &flow_id, step_id).await.unwrap();
    let detail = flow::show(&state, &flow_id).await.unwrap();
    assert_eq!(detail["agentsChain"], serde_json::json!(["summarizer"]));
}

#[tokio::test]
async fn test_flow_run_reports_structured_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = CoreConfig::default();
    config.executor.step_timeout = Duration::from_secs(2);
    let path = dir.path().join("aether.db");
    let state = commands::init_state(path.to_str().unwrap(), config).unwrap();

    // Nothing listens on port 9 of the loopback interface.
    agent::register(&state, "ghost", "http://127.0.0.1:9", None)
        .await
        .unwrap();
    let ghost_task = endpoint_task(&state, "ghost", "vanish").await;
    let created = flow::create(&state, "doomed", None).await.unwrap();
    let flow_id = created["flow"]["id"].as_str().unwrap().to_string();
    flow::add_step(&state, &flow_id, &ghost_task, 1, None).await.unwrap();

    let err = flow::run(&state, &flow_id, r#"{"text":"hola"}"#).await.unwrap_err();
    let failure: serde_json::Value = serde_json::from_str(&err).unwrap();
    assert_eq!(failure["success"], false);
    assert_eq!(failure["error"]["kind"], "stepExecutionFailed");

    let err = flow::run(&state, &flow_id, r#""not an object""#).await.unwrap_err();
    assert!(err.contains("object"), "got: {err}");
}
