//! Handles on the plan images produced by the planner.
//!
//! The planner rewrites the same image files on every execution, so a handle
//! only has to change its query string to make viewers reload them.

use serde::Serialize;
use time::OffsetDateTime;

/// Default path of the image for the plan as written.
pub const DEFAULT_PLAN_IMAGE: &str = "static/img/plan.gv.svg";
/// Default path of the image for the best plan found.
pub const DEFAULT_BEST_PLAN_IMAGE: &str = "static/img/best_plan.gv.svg";

/// One externally generated image addressed by a fixed relative path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct VisualizationHandle {
    path: String,
    stamp: Option<i64>,
}

impl VisualizationHandle {
    /// Handle on the image at `path`, not yet refreshed.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            stamp: None,
        }
    }

    /// Fixed path of the image.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Timestamp of the last refresh, in milliseconds.
    pub fn stamp(&self) -> Option<i64> {
        self.stamp
    }

    /// Current source reference: the path plus the cache-busting parameter
    /// once the handle has been refreshed.
    pub fn src(&self) -> String {
        match self.stamp {
            Some(stamp) => format!("{}?timestamp={stamp}", self.path),
            None => self.path.clone(),
        }
    }

    /// Points the handle at a fresh timestamp. A clock that has not moved
    /// since the previous refresh still yields a new value.
    pub fn refresh(&mut self, now_millis: i64) {
        let next = match self.stamp {
            Some(prev) if now_millis <= prev => prev + 1,
            _ => now_millis,
        };
        self.stamp = Some(next);
    }
}

/// The two images refreshed after every successful execution.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PlanImages {
    /// Plan as written.
    pub plan: VisualizationHandle,
    /// Best plan after applying the rules.
    pub best_plan: VisualizationHandle,
}

impl PlanImages {
    /// Handles on the images at the given paths.
    pub fn new(plan: impl Into<String>, best_plan: impl Into<String>) -> Self {
        Self {
            plan: VisualizationHandle::new(plan),
            best_plan: VisualizationHandle::new(best_plan),
        }
    }

    /// Refreshes both handles with the current wall-clock time.
    pub fn refresh(&mut self) {
        let now = now_millis();
        self.plan.refresh(now);
        self.best_plan.refresh(now);
    }
}

impl Default for PlanImages {
    fn default() -> Self {
        Self::new(DEFAULT_PLAN_IMAGE, DEFAULT_BEST_PLAN_IMAGE)
    }
}

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
