//! Transport seam between the client and the remote planner.
//!
//! Every component talks to the planner through [`PlannerApi`]. The HTTP
//! implementation is [`HttpPlanner`]; [`InMemoryPlanner`] keeps the same
//! contract in process.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};
use crate::model::{DatasetUpload, QueryResult, RuleSets};

mod http;
mod memory;

pub use http::HttpPlanner;
pub use memory::{ApiCall, Failure, InMemoryPlanner, QueryGate};

/// `status` value reporting success in planner envelopes.
pub const STATUS_SUCCESS: i64 = 0;
/// `status` value reporting failure in planner envelopes.
pub const STATUS_FAILURE: i64 = -1;

/// Endpoint labels used in errors and logs.
pub mod endpoint {
    /// `GET /rules`
    pub const RULES_GET: &str = "GET /rules";
    /// `POST /rules`
    pub const RULES_POST: &str = "POST /rules";
    /// `POST /query`
    pub const QUERY: &str = "POST /query";
    /// `GET /ds`
    pub const DS_LIST: &str = "GET /ds";
    /// `POST /ds`
    pub const DS_UPLOAD: &str = "POST /ds";
    /// `DELETE /ds`
    pub const DS_DELETE: &str = "DELETE /ds";
}

/// Operations the client needs from the remote planner.
///
/// Implementations report transport problems as [`ClientError::Fetch`],
/// undecodable bodies as [`ClientError::Decode`] and `status: -1` envelopes
/// as [`ClientError::ServerRejection`].
pub trait PlannerApi: Send + Sync {
    /// `GET /rules`
    fn fetch_rules(&self) -> impl Future<Output = Result<RuleSets>> + Send;

    /// `POST /rules`, replacing the planner's applied rules with `applied`.
    fn replace_rules(&self, applied: &[String]) -> impl Future<Output = Result<()>> + Send;

    /// `POST /query`
    fn run_query(&self, query: &str) -> impl Future<Output = Result<QueryResult>> + Send;

    /// `GET /ds`
    fn list_datasets(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// `POST /ds` as a multipart form with a single `file` field.
    fn upload_dataset(&self, upload: DatasetUpload) -> impl Future<Output = Result<()>> + Send;

    /// `DELETE /ds?name=...`
    fn delete_dataset(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Serialize)]
pub(crate) struct ReplaceRulesRequest<'a> {
    pub applied_rules: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query: &'a str,
}

/// Generic `{status, msg}` envelope used by `/ds` and acknowledged by `/rules`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StatusEnvelope {
    #[serde(default)]
    pub status: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub datasets: Option<Vec<String>>,
}

impl StatusEnvelope {
    /// Converts a `status: -1` envelope into a rejection.
    pub(crate) fn into_result(self, endpoint: &'static str) -> Result<Self> {
        match self.status {
            Some(STATUS_SUCCESS) => Ok(self),
            Some(_) => Err(ClientError::rejected(
                endpoint,
                self.msg
                    .unwrap_or_else(|| format!("{endpoint} reported a failure")),
            )),
            None => Err(ClientError::decode(endpoint, "missing status field")),
        }
    }
}

/// Body of a failed `/query` call.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    pub msg: String,
}
