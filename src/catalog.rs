//! Client-side mirror of the planner's rule configuration.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ClientError, Result};
use crate::model::{Rule, RuleId, RuleSets};

/// Catalog shared between the controller (sole writer) and the executor.
pub type SharedCatalog = Arc<Mutex<RuleCatalog>>;

/// Direction of a single-step reorder in the applied list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Direction {
    /// Towards the front (earlier execution).
    Up,
    /// Towards the back (later execution).
    Down,
}

/// Applied and available rules.
///
/// A rule lives in exactly one of the two lists. The order of `applied` is the
/// order in which the planner runs the transformations; the order of
/// `available` carries no meaning.
#[derive(Clone, Debug, Default)]
pub struct RuleCatalog {
    applied: Vec<Rule>,
    available: Vec<Rule>,
    next_id: u64,
}

impl RuleCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from the planner's rule lists.
    pub fn from_sets(sets: &RuleSets) -> Self {
        let mut catalog = Self::new();
        catalog.replace(sets);
        catalog
    }

    /// Wraps the catalog for sharing with the executor.
    pub fn shared(self) -> SharedCatalog {
        Arc::new(Mutex::new(self))
    }

    /// Replaces both lists wholesale. Ids keep increasing across replacements
    /// so stale ids never resolve to a new rule.
    pub fn replace(&mut self, sets: &RuleSets) {
        let applied: Vec<Rule> = sets
            .applied_rules
            .iter()
            .map(|name| self.mint(name))
            .collect();
        let available: Vec<Rule> = sets
            .non_applied_rules
            .iter()
            .map(|name| self.mint(name))
            .collect();
        self.applied = applied;
        self.available = available;
    }

    fn mint(&mut self, name: &str) -> Rule {
        self.next_id += 1;
        Rule {
            id: RuleId(self.next_id),
            name: name.to_string(),
        }
    }

    /// Rules in effect, in execution order.
    pub fn applied(&self) -> &[Rule] {
        &self.applied
    }

    /// Rules not in effect.
    pub fn available(&self) -> &[Rule] {
        &self.available
    }

    /// Applied rule names in execution order, as sent to `POST /rules`.
    pub fn applied_names(&self) -> Vec<String> {
        self.applied.iter().map(|rule| rule.name.clone()).collect()
    }

    /// Available rule names.
    pub fn available_names(&self) -> Vec<String> {
        self.available.iter().map(|rule| rule.name.clone()).collect()
    }

    /// First applied rule called `name`.
    pub fn find_applied(&self, name: &str) -> Option<RuleId> {
        self.applied
            .iter()
            .find(|rule| rule.name == name)
            .map(|rule| rule.id)
    }

    /// First available rule called `name`.
    pub fn find_available(&self, name: &str) -> Option<RuleId> {
        self.available
            .iter()
            .find(|rule| rule.name == name)
            .map(|rule| rule.id)
    }

    /// Whether `id` is currently applied.
    pub fn is_applied(&self, id: RuleId) -> bool {
        self.applied.iter().any(|rule| rule.id == id)
    }

    /// Looks a rule up in either list.
    pub fn get(&self, id: RuleId) -> Option<&Rule> {
        self.applied
            .iter()
            .chain(self.available.iter())
            .find(|rule| rule.id == id)
    }

    /// Swaps an applied rule with its neighbour. Returns `false` without
    /// touching anything when the rule already sits at that edge.
    pub fn move_applied(&mut self, id: RuleId, direction: Direction) -> Result<bool> {
        let index = position(&self.applied, id).ok_or_else(|| self.unknown(id))?;
        let target = match direction {
            Direction::Up if index == 0 => return Ok(false),
            Direction::Up => index - 1,
            Direction::Down if index + 1 == self.applied.len() => return Ok(false),
            Direction::Down => index + 1,
        };
        self.applied.swap(index, target);
        Ok(true)
    }

    /// Moves an available rule to the end of the applied list.
    pub fn promote(&mut self, id: RuleId) -> Result<()> {
        let index = position(&self.available, id).ok_or_else(|| self.unknown(id))?;
        let rule = self.available.remove(index);
        self.applied.push(rule);
        Ok(())
    }

    /// Moves an applied rule to the end of the available list.
    pub fn demote(&mut self, id: RuleId) -> Result<()> {
        let index = position(&self.applied, id).ok_or_else(|| self.unknown(id))?;
        let rule = self.applied.remove(index);
        self.available.push(rule);
        Ok(())
    }

    fn unknown(&self, id: RuleId) -> ClientError {
        let name = self
            .get(id)
            .map(|rule| rule.name.clone())
            .unwrap_or_else(|| id.to_string());
        ClientError::UnknownRule(name)
    }
}

fn position(rules: &[Rule], id: RuleId) -> Option<usize> {
    rules.iter().position(|rule| rule.id == id)
}
