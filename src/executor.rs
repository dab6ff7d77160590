//! Query submission and the state a successful response updates.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::api::PlannerApi;
use crate::catalog::SharedCatalog;
use crate::error::{ClientError, Result};
use crate::history::{HistoryEntry, HistoryLog};
use crate::model::{HistoryRecord, QueryResult};
use crate::notify::{Notice, Notifier};
use crate::render::{render, DisplayTable};
use crate::viz::PlanImages;

/// Message shown whenever an execution fails, whatever the cause.
pub const QUERY_FAILED_MESSAGE: &str = "Query execution failed, please check if your query has \
     syntax errors or database tables do not exist.";

/// Which responses may update the visible state when executions overlap.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseOrdering {
    /// Every successful response applies; the last one to arrive is what the
    /// user sees.
    #[default]
    LastResponseWins,
    /// Only the response to the most recently issued request applies.
    LatestRequestOnly,
}

/// State updated by one applied response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Execution {
    /// Generation of the request this response answered.
    pub generation: u64,
    /// Raw result.
    pub result: QueryResult,
    /// Rendered result.
    pub table: DisplayTable,
    /// History record appended for this execution.
    pub record: HistoryRecord,
    /// Image handles after the refresh.
    pub images: PlanImages,
}

/// What became of a successful response.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The response updated the table, images and history.
    Applied(Execution),
    /// A newer request was issued before this response arrived and the
    /// ordering policy discarded it.
    Superseded {
        /// Generation of the discarded request.
        generation: u64,
    },
}

impl ExecutionOutcome {
    /// The applied execution, if any.
    pub fn applied(&self) -> Option<&Execution> {
        match self {
            ExecutionOutcome::Applied(execution) => Some(execution),
            ExecutionOutcome::Superseded { .. } => None,
        }
    }
}

#[derive(Default)]
struct ExecutorState {
    table: Option<DisplayTable>,
    images: PlanImages,
    history: HistoryLog,
}

/// Submits queries and applies their results.
///
/// Overlapping executions are neither cancelled nor serialized. Each request
/// takes the next generation number; the [`ResponseOrdering`] decides whether
/// a late response for an older generation still applies.
pub struct QueryExecutor<A> {
    api: Arc<A>,
    catalog: SharedCatalog,
    notifier: Arc<dyn Notifier>,
    ordering: ResponseOrdering,
    issued: AtomicU64,
    state: Mutex<ExecutorState>,
}

impl<A: PlannerApi> QueryExecutor<A> {
    /// Creates an executor that reads applied rule names from `catalog`.
    pub fn new(api: Arc<A>, catalog: SharedCatalog, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            catalog,
            notifier,
            ordering: ResponseOrdering::default(),
            issued: AtomicU64::new(0),
            state: Mutex::new(ExecutorState::default()),
        }
    }

    /// Sets the response ordering policy.
    pub fn with_ordering(mut self, ordering: ResponseOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Uses `images` as the visualization handles.
    pub fn with_images(self, images: PlanImages) -> Self {
        self.state.lock().images = images;
        self
    }

    /// Runs `query` against the planner's current rule configuration.
    ///
    /// On success the result table is replaced, both plan images are
    /// refreshed and a history record is appended. On failure the user gets
    /// a generic notice and nothing else changes. Under
    /// [`ResponseOrdering::LatestRequestOnly`] a failed superseded request
    /// returns its error without notifying.
    pub async fn execute(&self, query: &str) -> Result<ExecutionOutcome> {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(generation, "query submitted");

        let result = match self.api.run_query(query).await {
            Ok(result) => result,
            Err(err) => return Err(self.fail(generation, err)),
        };
        let table = match render(&result) {
            Ok(table) => table,
            Err(err) => return Err(self.fail(generation, err)),
        };

        if self.is_superseded(generation) {
            tracing::info!(generation, "discarding response to superseded query");
            return Ok(ExecutionOutcome::Superseded { generation });
        }

        let rules = self.catalog.lock().applied_names();
        let mut state = self.state.lock();
        state.table = Some(table.clone());
        state.images.refresh();
        let record = state
            .history
            .append(HistoryEntry {
                query: query.to_string(),
                rules,
                plan_cost: result.plan_cost,
                best_cost: result.best_cost,
                exec_time: result.exec_time,
            })
            .clone();
        tracing::info!(
            generation,
            record = record.id,
            rows = table.len(),
            plan_cost = result.plan_cost,
            best_cost = result.best_cost,
            "query result applied"
        );
        Ok(ExecutionOutcome::Applied(Execution {
            generation,
            result,
            table,
            record,
            images: state.images.clone(),
        }))
    }

    fn is_superseded(&self, generation: u64) -> bool {
        self.ordering == ResponseOrdering::LatestRequestOnly
            && generation != self.issued.load(Ordering::SeqCst)
    }

    // A stale failure must not contradict the newer result on screen.
    fn fail(&self, generation: u64, err: ClientError) -> ClientError {
        if self.is_superseded(generation) {
            tracing::debug!(generation, error = %err, "superseded query failed");
            return err;
        }
        tracing::warn!(generation, error = %err, "query execution failed");
        self.notifier.notify(Notice::error(QUERY_FAILED_MESSAGE));
        err
    }

    /// Number of executions issued so far.
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    /// Response ordering policy in use.
    pub fn ordering(&self) -> ResponseOrdering {
        self.ordering
    }

    /// Table of the last applied response.
    pub fn table(&self) -> Option<DisplayTable> {
        self.state.lock().table.clone()
    }

    /// Current image handles.
    pub fn images(&self) -> PlanImages {
        self.state.lock().images.clone()
    }

    /// Snapshot of the history, oldest first.
    pub fn history(&self) -> Vec<HistoryRecord> {
        self.state.lock().history.records().to_vec()
    }

    /// Runs `f` against the history log.
    pub fn with_history<R>(&self, f: impl FnOnce(&HistoryLog) -> R) -> R {
        f(&self.state.lock().history)
    }
}
