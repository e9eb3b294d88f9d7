//! Terminal records of automaton runs.

use super::error::RunError;
use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;
use uuid::Uuid;

/// Why a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    /// The automaton moved to the terminal marker.
    Natural,
    /// The run outlived its max age.
    Age,
    /// An invariant violation or an unrecovered domain error.
    Error,
    /// `stop()` was requested.
    Manual,
}

impl StopReason {
    /// Everything but `Error` is an expected shutdown.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error)
    }
}

/// Immutable record of how a run ended, delivered exactly once per run.
#[derive(Clone, Debug, Serialize)]
#[serde(bound(serialize = "S: State"))]
pub struct StopDescriptor<S: State> {
    pub run_id: Uuid,
    pub reason: StopReason,
    #[serde(serialize_with = "error_message")]
    pub error: Option<RunError>,
    /// Elapsed ticker time between start and stop.
    pub age: Duration,
    /// State the run was in when it stopped; after a natural stop this is
    /// the last state that executed.
    pub last_state: Option<S>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl<S: State> StopDescriptor<S> {
    pub fn is_failure(&self) -> bool {
        self.reason.is_failure()
    }

    /// Render as JSON for reporting.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn error_message<S: Serializer>(error: &Option<RunError>, serializer: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(error) => serializer.serialize_some(&error.to_string()),
        None => serializer.serialize_none(),
    }
}
