#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::Mutex;
use plansync::{
    api::{HttpPlanner, PlannerApi},
    catalog::Direction,
    model::DatasetUpload,
    notify::RecordingNotifier,
    session::{Session, SessionOptions},
    ClientError,
};
use reqwest::Url;
use serde_json::{json, Value};

#[derive(Default)]
struct FakePlanner {
    applied: Vec<String>,
    available: Vec<String>,
    datasets: Vec<String>,
    fail_listing: bool,
    posted_rules: Vec<Vec<String>>,
    queries: Vec<String>,
    uploads: Vec<Upload>,
}

#[derive(Clone, Debug)]
struct Upload {
    field: String,
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
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
    let mut state = state.lock();
    state.posted_rules.push(rules.clone());
    if state.applied == rules {
        return Json(json!({"status": -1, "msg": "Rules did not change."}));
    }
    state.available.retain(|name| !rules.contains(name));
    state.applied = rules;
    Json(json!({"status": 0}))
}

async fn post_query(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    state.lock().queries.push(query.clone());
    match query.as_str() {
        "SELECT 1" => Json(json!({
            "headers": ["1"],
            "results": [[1]],
            "plan_cost": 1.0,
            "best_cost": 1.0,
            "exec_time": 0.001,
        }))
        .into_response(),
        "SELECT crash" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"msg": "planner crashed"})),
        )
            .into_response(),
        "SELECT garbage" => "not json".into_response(),
        _ => Json(json!({"status": -1, "msg": "syntax error"})).into_response(),
    }
}

async fn list_ds(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock();
    if state.fail_listing {
        return Json(json!({"status": -1, "msg": "boom"}));
    }
    Json(json!({"status": 0, "datasets": state.datasets}))
}

async fn upload_ds(State(state): State<Shared>, mut multipart: Multipart) -> Json<Value> {
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.expect("field bytes").to_vec();
        let mut state = state.lock();
        if let Some(file) = file_name.as_deref() {
            let dataset = file.split('.').next().unwrap_or(file).to_string();
            state.datasets.push(dataset);
        }
        state.uploads.push(Upload {
            field: name,
            file_name,
            content_type,
            bytes,
        });
    }
    Json(json!({"status": 0}))
}

async fn delete_ds(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let name = params.get("name").cloned().unwrap_or_default();
    let mut state = state.lock();
    match state.datasets.iter().position(|ds| *ds == name) {
        Some(index) => {
            state.datasets.remove(index);
            Json(json!({"status": 0}))
        }
        None => Json(json!({"status": -1, "msg": format!("Dataset {name} not exists.")})),
    }
}

async fn spawn(state: Shared) -> Url {
    let app = Router::new()
        .route("/rules", get(get_rules).post(post_rules))
        .route("/query", post(post_query))
        .route("/ds", get(list_ds).post(upload_ds).delete(delete_ds))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake planner");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake planner");
    });
    Url::parse(&format!("http://{addr}/")).expect("fake planner url")
}

fn seeded() -> Shared {
    Arc::new(Mutex::new(FakePlanner {
        applied: vec!["FilterMergeRule".into(), "FilterPushDownRule".into()],
        available: vec!["SimSelectionSwapRule".into()],
        datasets: vec!["movies".into()],
        ..FakePlanner::default()
    }))
}

#[tokio::test]
async fn rules_round_trip_over_http() {
    let state = seeded();
    let planner = HttpPlanner::new(spawn(state.clone()).await).unwrap();

    let sets = planner.fetch_rules().await.unwrap();
    assert_eq!(sets.applied_rules, vec!["FilterMergeRule", "FilterPushDownRule"]);
    assert_eq!(sets.non_applied_rules, vec!["SimSelectionSwapRule"]);

    let order = vec!["FilterPushDownRule".to_string(), "FilterMergeRule".to_string()];
    planner.replace_rules(&order).await.unwrap();
    assert_eq!(state.lock().posted_rules, vec![order.clone()]);

    planner.replace_rules(&order).await.unwrap();
    assert_eq!(state.lock().posted_rules.len(), 2);
}

#[tokio::test]
async fn query_responses_map_to_results_and_errors() {
    let state = seeded();
    let planner = HttpPlanner::new(spawn(state.clone()).await).unwrap();

    let result = planner.run_query("SELECT 1").await.unwrap();
    assert_eq!(result.headers, vec!["1"]);
    assert_eq!(result.rows, vec![vec![json!(1)]]);

    let rejected = planner.run_query("SELEC 1").await.unwrap_err();
    assert!(matches!(rejected, ClientError::ServerRejection { .. }));
    assert_eq!(rejected.to_string(), "syntax error");

    let crashed = planner.run_query("SELECT crash").await.unwrap_err();
    assert_eq!(crashed.to_string(), "planner crashed");

    let garbage = planner.run_query("SELECT garbage").await.unwrap_err();
    assert!(matches!(garbage, ClientError::Decode { .. }));

    assert_eq!(state.lock().queries.len(), 4);
}

#[tokio::test]
async fn dataset_endpoints_use_status_envelopes() {
    let state = seeded();
    let planner = HttpPlanner::new(spawn(state.clone()).await).unwrap();

    assert_eq!(planner.list_datasets().await.unwrap(), vec!["movies"]);

    planner
        .upload_dataset(DatasetUpload {
            file_name: "people.csv".into(),
            content_type: "text/csv".into(),
            contents: b"id,name\n1,Ada\n".to_vec(),
        })
        .await
        .unwrap();
    let upload = state.lock().uploads[0].clone();
    assert_eq!(upload.field, "file");
    assert_eq!(upload.file_name.as_deref(), Some("people.csv"));
    assert_eq!(upload.content_type.as_deref(), Some("text/csv"));
    assert_eq!(upload.bytes, b"id,name\n1,Ada\n");

    planner.delete_dataset("people").await.unwrap();
    let missing = planner.delete_dataset("my data").await.unwrap_err();
    assert_eq!(missing.to_string(), "Dataset my data not exists.");

    state.lock().fail_listing = true;
    let err = planner.list_datasets().await.unwrap_err();
    assert_eq!(err.to_string(), "boom");
}

#[tokio::test]
async fn unreachable_planner_is_a_fetch_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let planner = HttpPlanner::new(Url::parse(&format!("http://{addr}/")).unwrap()).unwrap();
    let err = planner.fetch_rules().await.unwrap_err();
    assert!(matches!(err, ClientError::Fetch { .. }));
}

#[tokio::test]
async fn session_reorders_and_executes_over_http() {
    let state = seeded();
    let planner = HttpPlanner::new(spawn(state.clone()).await).unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let options = SessionOptions {
        query: "SELECT 1".into(),
        ..SessionOptions::default()
    };
    let mut session = Session::new(Arc::new(planner), options, notifier.clone());

    let startup = session.start().await;
    assert!(startup.rules_loaded && startup.datasets_loaded);
    assert!(state.lock().queries.is_empty());

    session.rules_mut().select("FilterPushDownRule").unwrap();
    let report = session
        .rules_mut()
        .move_selected(Direction::Up)
        .await
        .unwrap();

    assert!(report.committed);
    assert_eq!(
        state.lock().applied,
        vec!["FilterPushDownRule", "FilterMergeRule"]
    );
    let record = &session.executor().history()[0];
    assert_eq!(record.rules, vec!["FilterPushDownRule", "FilterMergeRule"]);
    assert_eq!(record.query, "SELECT 1");
    assert!(notifier.notices().is_empty());
}
