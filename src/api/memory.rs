use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{endpoint, PlannerApi};
use crate::error::{ClientError, Result};
use crate::model::{DatasetUpload, QueryResult, RuleSets};

/// One call received by an [`InMemoryPlanner`].
#[derive(Clone, Debug, PartialEq)]
pub enum ApiCall {
    /// `GET /rules`
    FetchRules,
    /// `POST /rules` with the submitted order.
    ReplaceRules(Vec<String>),
    /// `POST /query` with the submitted text.
    RunQuery(String),
    /// `GET /ds`
    ListDatasets,
    /// `POST /ds` with the uploaded file name.
    UploadDataset(String),
    /// `DELETE /ds` with the dataset name.
    DeleteDataset(String),
}

/// Failure injected into the next call of an endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Failure {
    /// The request never reaches the planner.
    Transport,
    /// The planner answers with `status: -1` and this message.
    Rejection(String),
}

/// Holds back the response of a gated query until released or dropped.
#[derive(Debug)]
pub struct QueryGate {
    release: oneshot::Sender<()>,
}

impl QueryGate {
    /// Lets the gated query respond.
    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[derive(Default)]
struct PlannerState {
    registry: Vec<String>,
    applied: Vec<String>,
    datasets: Vec<String>,
    results: HashMap<String, QueryResult>,
    failures: HashMap<&'static str, VecDeque<Failure>>,
    gates: HashMap<String, VecDeque<oneshot::Receiver<()>>>,
    journal: Vec<ApiCall>,
}

impl PlannerState {
    fn record(&mut self, endpoint: &'static str, call: ApiCall) -> Result<()> {
        self.journal.push(call);
        match self
            .failures
            .get_mut(endpoint)
            .and_then(|queue| queue.pop_front())
        {
            None => Ok(()),
            Some(Failure::Transport) => {
                Err(ClientError::fetch(endpoint, "connection refused"))
            }
            Some(Failure::Rejection(msg)) => Err(ClientError::rejected(endpoint, msg)),
        }
    }
}

/// In-process [`PlannerApi`] that mirrors the planner service's bookkeeping.
///
/// Queries only answer when a result was scripted for their exact text.
/// Every call is journaled so callers can assert on network traffic.
#[derive(Default)]
pub struct InMemoryPlanner {
    state: Mutex<PlannerState>,
}

impl InMemoryPlanner {
    /// Creates a planner that knows `rules`, none of them applied.
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let planner = Self::default();
        planner.state.lock().registry = rules.into_iter().map(Into::into).collect();
        planner
    }

    /// Marks `applied` as the planner's current rule order.
    pub fn with_applied<I, S>(self, applied: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().applied = applied.into_iter().map(Into::into).collect();
        self
    }

    /// Registers datasets that exist before the session starts.
    pub fn with_datasets<I, S>(self, datasets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().datasets = datasets.into_iter().map(Into::into).collect();
        self
    }

    /// Answers `query` with `result` from now on.
    pub fn script_query(&self, query: impl Into<String>, result: QueryResult) {
        self.state.lock().results.insert(query.into(), result);
    }

    /// Makes the next call to `endpoint` fail. Queued failures are consumed
    /// in order.
    pub fn fail_next(&self, endpoint: &'static str, failure: Failure) {
        self.state
            .lock()
            .failures
            .entry(endpoint)
            .or_default()
            .push_back(failure);
    }

    /// Holds the next execution of `query` until the returned gate is
    /// released.
    pub fn gate_query(&self, query: impl Into<String>) -> QueryGate {
        let (tx, rx) = oneshot::channel();
        self.state
            .lock()
            .gates
            .entry(query.into())
            .or_default()
            .push_back(rx);
        QueryGate { release: tx }
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().journal.clone()
    }

    /// Forgets the call journal.
    pub fn clear_calls(&self) {
        self.state.lock().journal.clear();
    }

    /// Planner-side applied rule order.
    pub fn applied_rules(&self) -> Vec<String> {
        self.state.lock().applied.clone()
    }

    /// Planner-side dataset names.
    pub fn datasets(&self) -> Vec<String> {
        self.state.lock().datasets.clone()
    }
}

impl PlannerApi for InMemoryPlanner {
    async fn fetch_rules(&self) -> Result<RuleSets> {
        let mut state = self.state.lock();
        state.record(endpoint::RULES_GET, ApiCall::FetchRules)?;
        let non_applied = state
            .registry
            .iter()
            .filter(|name| !state.applied.contains(name))
            .cloned()
            .collect();
        Ok(RuleSets {
            applied_rules: state.applied.clone(),
            non_applied_rules: non_applied,
        })
    }

    async fn replace_rules(&self, applied: &[String]) -> Result<()> {
        let mut state = self.state.lock();
        state.record(
            endpoint::RULES_POST,
            ApiCall::ReplaceRules(applied.to_vec()),
        )?;
        if let Some(unknown) = applied.iter().find(|name| !state.registry.contains(name)) {
            return Err(ClientError::rejected(
                endpoint::RULES_POST,
                format!("unknown rule '{unknown}'"),
            ));
        }
        state.applied = applied.to_vec();
        Ok(())
    }

    async fn run_query(&self, query: &str) -> Result<QueryResult> {
        let gate = {
            let mut state = self.state.lock();
            state.record(endpoint::QUERY, ApiCall::RunQuery(query.to_string()))?;
            state
                .gates
                .get_mut(query)
                .and_then(|queue| queue.pop_front())
        };
        if let Some(gate) = gate {
            // A dropped gate releases the query too.
            let _ = gate.await;
        }
        self.state
            .lock()
            .results
            .get(query)
            .cloned()
            .ok_or_else(|| {
                ClientError::rejected(endpoint::QUERY, format!("cannot execute query: {query}"))
            })
    }

    async fn list_datasets(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.record(endpoint::DS_LIST, ApiCall::ListDatasets)?;
        Ok(state.datasets.clone())
    }

    async fn upload_dataset(&self, upload: DatasetUpload) -> Result<()> {
        let mut state = self.state.lock();
        state.record(
            endpoint::DS_UPLOAD,
            ApiCall::UploadDataset(upload.file_name.clone()),
        )?;
        if upload.file_name.split('.').count() > 2 {
            return Err(ClientError::rejected(
                endpoint::DS_UPLOAD,
                "Invalid dataset filename, at most one dot symbol can be included in it.",
            ));
        }
        let name = upload
            .file_name
            .split('.')
            .next()
            .unwrap_or_default()
            .to_string();
        if state.datasets.contains(&name) {
            return Err(ClientError::rejected(
                endpoint::DS_UPLOAD,
                format!("Dataset '{name}' already exists. Please remove it first."),
            ));
        }
        state.datasets.push(name);
        Ok(())
    }

    async fn delete_dataset(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record(endpoint::DS_DELETE, ApiCall::DeleteDataset(name.to_string()))?;
        match state.datasets.iter().position(|existing| existing == name) {
            Some(index) => {
                state.datasets.remove(index);
                Ok(())
            }
            None => Err(ClientError::rejected(
                endpoint::DS_DELETE,
                format!("Dataset {name} not exists."),
            )),
        }
    }
}
