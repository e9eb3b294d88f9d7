//! Serializable automaton settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration that can be loaded from JSON and applied to a builder with
/// [`AutomatonBuilder::settings`](super::AutomatonBuilder::settings).
///
/// Missing fields are `None` and leave the builder's value untouched.
///
/// # Example
///
/// ```rust
/// use automatons::builder::AutomatonSettings;
///
/// let settings = AutomatonSettings::from_json(r#"{ "name": "poller", "max_age_ms": 1500 }"#).unwrap();
/// assert_eq!(settings.name.as_deref(), Some("poller"));
/// assert_eq!(settings.restartable, None);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomatonSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_stop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restartable: Option<bool>,
}

impl AutomatonSettings {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn max_age(&self) -> Option<Duration> {
        self.max_age_ms.map(Duration::from_millis)
    }
}
