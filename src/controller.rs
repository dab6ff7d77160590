//! Rule ordering: selection, mutations and synchronization with the planner.

use std::sync::Arc;

use serde::Serialize;

use crate::api::PlannerApi;
use crate::catalog::{Direction, RuleCatalog, SharedCatalog};
use crate::error::{ClientError, Result, SelectionScope};
use crate::executor::{ExecutionOutcome, QueryExecutor};
use crate::model::{Rule, RuleId};
use crate::notify::{Notice, Notifier};

/// Single selection inside the picker of available rules. Lives only while
/// the picker is open.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RulePicker {
    selected: Option<RuleId>,
}

impl RulePicker {
    /// Currently picked rule.
    pub fn selected(&self) -> Option<RuleId> {
        self.selected
    }
}

/// Outcome of one user mutation of the applied rules.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MutationReport {
    /// Whether the applied order changed. Edge moves leave it unchanged and
    /// skip all network traffic.
    pub changed: bool,
    /// Whether the new order reached the planner.
    pub committed: bool,
    /// Applied rule names after the mutation.
    pub applied: Vec<String>,
    /// Result of the re-execution triggered by the mutation, if it succeeded.
    pub execution: Option<ExecutionOutcome>,
}

/// Sole writer of the rule catalog.
///
/// Every mutation updates the local catalog first, then commits the full
/// applied order to the planner, then re-executes the current query text.
/// A failed commit is reported but not rolled back, so local and planner order
/// may differ until the next successful commit.
pub struct RuleOrderController<A> {
    api: Arc<A>,
    catalog: SharedCatalog,
    executor: Arc<QueryExecutor<A>>,
    notifier: Arc<dyn Notifier>,
    selected: Option<RuleId>,
    picker: Option<RulePicker>,
    query_text: String,
}

impl<A: PlannerApi> RuleOrderController<A> {
    /// Creates a controller over `catalog`. The executor must share the same
    /// catalog so history records see the committed order.
    pub fn new(
        api: Arc<A>,
        catalog: SharedCatalog,
        executor: Arc<QueryExecutor<A>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            api,
            catalog,
            executor,
            notifier,
            selected: None,
            picker: None,
            query_text: String::new(),
        }
    }

    /// Text re-executed after every mutation.
    pub fn query_text(&self) -> &str {
        &self.query_text
    }

    /// Replaces the text re-executed after every mutation.
    pub fn set_query_text(&mut self, text: impl Into<String>) {
        self.query_text = text.into();
    }

    /// Runs `f` against the catalog.
    pub fn with_catalog<R>(&self, f: impl FnOnce(&RuleCatalog) -> R) -> R {
        f(&self.catalog.lock())
    }

    /// Applied rules in execution order.
    pub fn applied(&self) -> Vec<Rule> {
        self.catalog.lock().applied().to_vec()
    }

    /// Rules not in effect.
    pub fn available(&self) -> Vec<Rule> {
        self.catalog.lock().available().to_vec()
    }

    /// Applied rule names in execution order.
    pub fn applied_names(&self) -> Vec<String> {
        self.catalog.lock().applied_names()
    }

    /// Replaces the catalog with the planner's rule lists. On failure the
    /// catalog is left as it was.
    pub async fn load_rules(&mut self) -> Result<()> {
        let sets = match self.api.fetch_rules().await {
            Ok(sets) => sets,
            Err(err) => {
                tracing::warn!(error = %err, "loading rules failed");
                self.notifier.notify(Notice::error(err.to_string()));
                return Err(err);
            }
        };
        self.catalog.lock().replace(&sets);
        self.selected = None;
        self.picker = None;
        tracing::info!(
            applied = sets.applied_rules.len(),
            available = sets.non_applied_rules.len(),
            "rules loaded"
        );
        Ok(())
    }

    /// Active rule of the applied list.
    pub fn selected(&self) -> Option<RuleId> {
        self.selected
    }

    /// Activates the first applied rule called `name`, deactivating any
    /// previous one.
    pub fn select(&mut self, name: &str) -> Result<RuleId> {
        let id = self
            .catalog
            .lock()
            .find_applied(name)
            .ok_or_else(|| ClientError::UnknownRule(name.to_string()))?;
        self.selected = Some(id);
        Ok(id)
    }

    /// Activates the applied rule `id`.
    pub fn select_id(&mut self, id: RuleId) -> Result<()> {
        let catalog = self.catalog.lock();
        if !catalog.is_applied(id) {
            let name = catalog
                .get(id)
                .map(|rule| rule.name.clone())
                .unwrap_or_else(|| id.to_string());
            return Err(ClientError::UnknownRule(name));
        }
        drop(catalog);
        self.selected = Some(id);
        Ok(())
    }

    /// Clears the active rule.
    pub fn deselect(&mut self) {
        self.selected = None;
    }

    /// Opens the picker with nothing picked.
    pub fn open_picker(&mut self) {
        self.picker = Some(RulePicker::default());
    }

    /// Picks the first available rule called `name`. Opens the picker if it
    /// was closed.
    pub fn pick(&mut self, name: &str) -> Result<RuleId> {
        let id = self
            .catalog
            .lock()
            .find_available(name)
            .ok_or_else(|| ClientError::UnknownRule(name.to_string()))?;
        self.picker.get_or_insert_with(RulePicker::default).selected = Some(id);
        Ok(id)
    }

    /// Closes the picker, dropping its selection.
    pub fn close_picker(&mut self) {
        self.picker = None;
    }

    /// The open picker, if any.
    pub fn picker(&self) -> Option<&RulePicker> {
        self.picker.as_ref()
    }

    /// Moves the active rule one step. Without an active rule nothing is sent
    /// and [`ClientError::NoSelection`] is returned.
    pub async fn move_selected(&mut self, direction: Direction) -> Result<MutationReport> {
        let id = self.active_rule()?;
        let changed = self.catalog.lock().move_applied(id, direction)?;
        if !changed {
            tracing::debug!(rule = %id, ?direction, "rule already at the edge");
            return Ok(self.unchanged());
        }
        Ok(self.synchronize().await)
    }

    /// Moves the available rule called `name` to the end of the applied list.
    pub async fn promote(&mut self, name: &str) -> Result<MutationReport> {
        let id = self
            .catalog
            .lock()
            .find_available(name)
            .ok_or_else(|| ClientError::UnknownRule(name.to_string()))?;
        self.promote_id(id).await
    }

    /// Promotes the picked rule and closes the picker.
    pub async fn promote_picked(&mut self) -> Result<MutationReport> {
        let id = self
            .picker
            .as_ref()
            .and_then(RulePicker::selected)
            .ok_or(ClientError::NoSelection(SelectionScope::RulePicker))?;
        self.picker = None;
        self.promote_id(id).await
    }

    async fn promote_id(&mut self, id: RuleId) -> Result<MutationReport> {
        self.catalog.lock().promote(id)?;
        Ok(self.synchronize().await)
    }

    /// Moves the applied rule called `name` to the end of the available list.
    pub async fn demote(&mut self, name: &str) -> Result<MutationReport> {
        let id = self
            .catalog
            .lock()
            .find_applied(name)
            .ok_or_else(|| ClientError::UnknownRule(name.to_string()))?;
        self.demote_id(id).await
    }

    /// Demotes the active rule.
    pub async fn demote_selected(&mut self) -> Result<MutationReport> {
        let id = self.active_rule()?;
        self.demote_id(id).await
    }

    async fn demote_id(&mut self, id: RuleId) -> Result<MutationReport> {
        self.catalog.lock().demote(id)?;
        if self.selected == Some(id) {
            self.selected = None;
        }
        Ok(self.synchronize().await)
    }

    /// Sends the full applied order to the planner, replacing its
    /// configuration. Last write wins.
    pub async fn commit(&self) -> Result<()> {
        let applied = self.applied_names();
        match self.api.replace_rules(&applied).await {
            Ok(()) => {
                tracing::info!(rules = ?applied, "rule order committed");
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, rules = ?applied, "rule order commit failed");
                self.notifier.notify(Notice::warning(err.to_string()));
                Err(err)
            }
        }
    }

    fn active_rule(&mut self) -> Result<RuleId> {
        let id = self
            .selected
            .ok_or(ClientError::NoSelection(SelectionScope::AppliedRules))?;
        if !self.catalog.lock().is_applied(id) {
            self.selected = None;
            return Err(ClientError::NoSelection(SelectionScope::AppliedRules));
        }
        Ok(id)
    }

    fn unchanged(&self) -> MutationReport {
        MutationReport {
            changed: false,
            committed: false,
            applied: self.applied_names(),
            execution: None,
        }
    }

    async fn synchronize(&self) -> MutationReport {
        let committed = self.commit().await.is_ok();
        let execution = self.executor.execute(&self.query_text).await.ok();
        MutationReport {
            changed: true,
            committed,
            applied: self.applied_names(),
            execution,
        }
    }
}
