//! One client session: the components wired together over a shared planner.

use std::sync::Arc;

use serde::Serialize;

use crate::api::PlannerApi;
use crate::catalog::RuleCatalog;
use crate::config::ClientConfig;
use crate::controller::RuleOrderController;
use crate::datasets::DatasetManager;
use crate::error::Result;
use crate::executor::{ExecutionOutcome, QueryExecutor, ResponseOrdering};
use crate::notify::Notifier;
use crate::viz::PlanImages;

/// Settings a session is built from.
#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// Initial query text.
    pub query: String,
    /// Policy for overlapping executions.
    pub ordering: ResponseOrdering,
    /// Plan image handles.
    pub images: PlanImages,
}

impl SessionOptions {
    /// Options taken from a loaded configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            query: config.default_query().to_string(),
            ordering: config.response_ordering(),
            images: config.plan_images(),
        }
    }
}

/// What the startup fetches achieved. Failures were already surfaced to the
/// user; the session stays usable either way.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct StartupReport {
    /// Rule lists were loaded.
    pub rules_loaded: bool,
    /// Dataset list was loaded.
    pub datasets_loaded: bool,
}

/// Rule controller, executor and dataset manager sharing one planner and one
/// catalog.
pub struct Session<A> {
    rules: RuleOrderController<A>,
    datasets: DatasetManager<A>,
    executor: Arc<QueryExecutor<A>>,
}

impl<A: PlannerApi> Session<A> {
    /// Wires a session. Nothing is fetched until [`Session::start`].
    pub fn new(api: Arc<A>, options: SessionOptions, notifier: Arc<dyn Notifier>) -> Self {
        let catalog = RuleCatalog::new().shared();
        let executor = Arc::new(
            QueryExecutor::new(api.clone(), catalog.clone(), notifier.clone())
                .with_ordering(options.ordering)
                .with_images(options.images),
        );
        let mut rules =
            RuleOrderController::new(api.clone(), catalog, executor.clone(), notifier.clone());
        rules.set_query_text(options.query);
        let datasets = DatasetManager::new(api, notifier);
        Self {
            rules,
            datasets,
            executor,
        }
    }

    /// Loads rules and datasets. Does not execute anything.
    pub async fn start(&mut self) -> StartupReport {
        let rules_loaded = self.rules.load_rules().await.is_ok();
        let datasets_loaded = self.datasets.list().await.is_ok();
        StartupReport {
            rules_loaded,
            datasets_loaded,
        }
    }

    /// Current query text.
    pub fn query_text(&self) -> &str {
        self.rules.query_text()
    }

    /// Replaces the query text without running it.
    pub fn set_query_text(&mut self, text: impl Into<String>) {
        self.rules.set_query_text(text);
    }

    /// The query input lost focus: run the current text.
    pub async fn on_query_blur(&self) -> Result<ExecutionOutcome> {
        self.executor.execute(self.rules.query_text()).await
    }

    /// Rule controller.
    pub fn rules(&self) -> &RuleOrderController<A> {
        &self.rules
    }

    /// Rule controller, for mutations.
    pub fn rules_mut(&mut self) -> &mut RuleOrderController<A> {
        &mut self.rules
    }

    /// Dataset manager.
    pub fn datasets(&self) -> &DatasetManager<A> {
        &self.datasets
    }

    /// Dataset manager, for mutations.
    pub fn datasets_mut(&mut self) -> &mut DatasetManager<A> {
        &mut self.datasets
    }

    /// Query executor.
    pub fn executor(&self) -> &Arc<QueryExecutor<A>> {
        &self.executor
    }
}
