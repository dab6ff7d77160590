#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;

use assert_cmd::cargo::cargo_bin_cmd;
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;

#[derive(Default)]
struct FakePlanner {
    applied: Vec<String>,
    available: Vec<String>,
}

type Shared = Arc<Mutex<FakePlanner>>;

async fn get_rules(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock();
    Json(json!({
        "applied_rules": state.applied,
        "non_applied_rules": state.available,
    }))
}

async fn post_rules(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let rules: Vec<String> = serde_json::from_value(body["applied_rules"].clone())
        .expect("applied_rules array");
    state.lock().applied = rules;
    Json(json!({"status": 0}))
}

async fn post_query(Json(body): Json<Value>) -> Json<Value> {
    match body["query"].as_str() {
        Some("SELECT 1") => Json(json!({
            "headers": ["1"],
            "results": [[1]],
            "plan_cost": 1.0,
            "best_cost": 1.0,
            "exec_time": 0.001,
        })),
        _ => Json(json!({"status": -1, "msg": "syntax error"})),
    }
}

async fn list_ds() -> Json<Value> {
    Json(json!({"status": 0, "datasets": ["animation", "musical"]}))
}

async fn spawn_planner() -> (String, Shared) {
    let state: Shared = Arc::new(Mutex::new(FakePlanner {
        applied: vec!["FilterMergeRule".into(), "FilterPushDownRule".into()],
        available: vec!["SimSelectionSwapRule".into()],
    }));
    let app = Router::new()
        .route("/rules", get(get_rules).post(post_rules))
        .route("/query", post(post_query))
        .route("/ds", get(list_ds))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake planner");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake planner");
    });
    (format!("http://{addr}/"), state)
}

fn run_json(config: &Path, url: &str, args: &[&str]) -> Value {
    let output = cargo_bin_cmd!("plansync")
        .arg("--config")
        .arg(config)
        .args(["--url", url, "--format", "json", "--quiet"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("valid json")
}

#[test]
fn help_lists_subcommands() {
    let output = cargo_bin_cmd!("plansync")
        .arg("--help")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8 help");
    for command in ["rules", "query", "datasets", "config", "completions"] {
        assert!(text.contains(command), "help is missing {command}");
    }
    assert!(text.contains("--color"));
}

#[test]
fn completions_are_generated() {
    let output = cargo_bin_cmd!("plansync")
        .args(["completions", "bash"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("plansync"));
}

#[test]
fn config_init_writes_once() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("conf").join("client.toml");

    cargo_bin_cmd!("plansync")
        .arg("--config")
        .arg(&path)
        .args(["--url", "http://planner.test:9000/", "--quiet", "config", "init"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).expect("config written");
    assert!(written.contains("http://planner.test:9000/"));

    cargo_bin_cmd!("plansync")
        .arg("--config")
        .arg(&path)
        .args(["--quiet", "config", "init"])
        .assert()
        .failure();

    let output = cargo_bin_cmd!("plansync")
        .arg("--config")
        .arg(&path)
        .args(["--format", "json", "config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let shown: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(shown["server"]["base_url"], "http://planner.test:9000/");
}

#[tokio::test(flavor = "multi_thread")]
async fn query_prints_result_and_history() {
    let (url, _) = spawn_planner().await;
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("client.toml");

    let report = tokio::task::spawn_blocking(move || {
        run_json(&config, &url, &["query", "SELECT 1"])
    })
    .await
    .expect("cli task");

    assert_eq!(report["failed"], 0);
    assert_eq!(report["outcomes"][0]["outcome"], "applied");
    assert_eq!(report["table"]["headers"], json!(["#", "1"]));
    assert_eq!(report["history"][0]["query"], "SELECT 1");
    assert_eq!(
        report["history"][0]["rules"],
        json!(["FilterMergeRule", "FilterPushDownRule"])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_query_exits_non_zero() {
    let (url, _) = spawn_planner().await;
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("client.toml");

    let stderr = tokio::task::spawn_blocking(move || {
        cargo_bin_cmd!("plansync")
            .arg("--config")
            .arg(&config)
            .args(["--url", url.as_str(), "--quiet", "query", "SELECT nothing"])
            .assert()
            .failure()
            .get_output()
            .stderr
            .clone()
    })
    .await
    .expect("cli task");

    let stderr = String::from_utf8_lossy(&stderr);
    assert!(stderr.contains("Query execution failed"));
    assert!(stderr.contains("1 of 1 queries failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn rules_up_reorders_on_the_planner() {
    let (url, state) = spawn_planner().await;
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("client.toml");

    let report = tokio::task::spawn_blocking(move || {
        run_json(
            &config,
            &url,
            &["--query", "SELECT 1", "rules", "up", "FilterPushDownRule"],
        )
    })
    .await
    .expect("cli task");

    assert_eq!(report["changed"], true);
    assert_eq!(report["committed"], true);
    assert_eq!(
        report["applied"],
        json!(["FilterPushDownRule", "FilterMergeRule"])
    );
    assert_eq!(report["execution"]["outcome"], "applied");
    assert_eq!(
        state.lock().applied,
        vec!["FilterPushDownRule", "FilterMergeRule"]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn datasets_are_listed() {
    let (url, _) = spawn_planner().await;
    let dir = TempDir::new().expect("tempdir");
    let config = dir.path().join("client.toml");

    let report = tokio::task::spawn_blocking(move || run_json(&config, &url, &["datasets"]))
        .await
        .expect("cli task");

    assert_eq!(
        report["datasets"],
        json!([{"name": "animation"}, {"name": "musical"}])
    );
}

#[test]
fn unreachable_planner_fails_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    let output = cargo_bin_cmd!("plansync")
        .arg("--config")
        .arg(dir.path().join("client.toml"))
        .args(["--url", "http://127.0.0.1:9/", "--quiet", "rules"])
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    assert!(String::from_utf8_lossy(&output).contains("could not load rules"));
}
