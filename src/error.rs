//! Error type shared by the client components.

use std::fmt;
use std::io;

use thiserror::Error;

/// Result type alias used throughout the client.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Which selection an operation expected to find populated.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectionScope {
    /// The active rule in the applied-rule list.
    AppliedRules,
    /// The rule picker used when promoting an available rule.
    RulePicker,
    /// The dataset list.
    Datasets,
}

impl fmt::Display for SelectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            SelectionScope::AppliedRules => "No rule selected",
            SelectionScope::RulePicker => "Please select the rule to add.",
            SelectionScope::Datasets => "Please select the dataset to remove.",
        };
        f.write_str(message)
    }
}

/// Errors surfaced by the synchronization client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connection refused, reset, ...).
    #[error("request to {endpoint} failed: {reason}")]
    Fetch {
        /// Endpoint the request targeted.
        endpoint: &'static str,
        /// Transport-level reason.
        reason: String,
    },
    /// The response body could not be decoded into the expected shape.
    #[error("malformed response from {endpoint}: {reason}")]
    Decode {
        /// Endpoint the response came from.
        endpoint: &'static str,
        /// Decoder message.
        reason: String,
    },
    /// The server answered with a failure status.
    #[error("{message}")]
    ServerRejection {
        /// Endpoint that rejected the request.
        endpoint: &'static str,
        /// Server-provided (or synthesized) message.
        message: String,
    },
    /// An operation needed a selected item and nothing was selected.
    #[error("{0}")]
    NoSelection(SelectionScope),
    /// Client-side validation rejected the input.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The named rule is not in the list the operation reads from.
    #[error("rule '{0}' not found")]
    UnknownRule(String),
    /// The named dataset is not tracked locally.
    #[error("dataset '{0}' not found")]
    UnknownDataset(String),
    /// Local I/O failure (reading an upload file).
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    pub(crate) fn fetch(endpoint: &'static str, reason: impl fmt::Display) -> Self {
        ClientError::Fetch {
            endpoint,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn decode(endpoint: &'static str, reason: impl fmt::Display) -> Self {
        ClientError::Decode {
            endpoint,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn rejected(endpoint: &'static str, message: impl Into<String>) -> Self {
        ClientError::ServerRejection {
            endpoint,
            message: message.into(),
        }
    }

    /// Returns true when the error came from talking to the server rather
    /// than from local state.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            ClientError::Fetch { .. }
                | ClientError::Decode { .. }
                | ClientError::ServerRejection { .. }
        )
    }
}
