//! Managed instance model.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_id::InstanceId;

/// Lifecycle state of a compute instance, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
}

impl InstanceState {
    /// True for instances that no longer exist in any recoverable form.
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// True for instances already reclaimed to the degree possible.
    ///
    /// These are excluded from idle evaluation: there is no workload to
    /// probe on a stopped or terminated instance.
    pub fn is_reclaimed(&self) -> bool {
        matches!(self, Self::Stopped | Self::Terminated)
    }

    /// True once the provider has finished a transition (nothing pending).
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Running | Self::Stopped | Self::Terminated)
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminating => "terminating",
            Self::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compute instance carrying this system's management marker.
///
/// The provider owns the instance; this is a transient read view. Tag keys
/// are unique by provider convention, not enforced here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedInstance {
    pub id: InstanceId,
    pub state: InstanceState,
    pub launch_time: DateTime<Utc>,
    pub tags: BTreeMap<String, String>,
}

impl ManagedInstance {
    /// Looks up a tag value on this view of the instance.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Tag keys distinguishing managed instances and carrying the idle marker.
///
/// Shared between provider implementations (which stamp new instances) and
/// the reaper (which reads and refreshes the idle marker).
#[derive(Debug, Clone)]
pub struct FleetTags {
    /// Key of the management marker tag.
    pub managed_key: String,

    /// Value of the management marker tag.
    pub managed_value: String,

    /// Key of the idle-marker tag (last instant observed non-idle,
    /// RFC 3339 UTC).
    pub idle_key: String,
}

impl Default for FleetTags {
    fn default() -> Self {
        Self {
            managed_key: "managed-by".to_string(),
            managed_value: "warden".to_string(),
            idle_key: "last-active-at".to_string(),
        }
    }
}

impl FleetTags {
    /// True if the tag set carries this system's management marker.
    pub fn is_managed(&self, tags: &BTreeMap<String, String>) -> bool {
        tags.get(&self.managed_key)
            .is_some_and(|v| v == &self.managed_value)
    }
}
