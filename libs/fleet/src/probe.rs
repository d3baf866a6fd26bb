//! Remote probe interface.
//!
//! The probe executes a command on an instance and reports the outcome
//! within a bounded wall-clock budget. The controller uses it for idleness
//! detection; the transport (agent, SSH, provider-native dispatch) is a
//! deployment concern.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warden_id::{CommandId, InstanceId};

use crate::error::ProbeError;

/// Terminal status of a dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// The command ran to completion with a zero exit status.
    Success,

    /// The command ran and failed.
    Failed,

    /// No terminal result arrived within the wait budget.
    Inconclusive,
}

/// Result of awaiting a dispatched command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,

    /// Captured stdout, present only on [`ProbeStatus::Success`].
    pub output: Option<String>,
}

impl ProbeResult {
    /// Convenience constructor for an inconclusive (timed out) result.
    pub fn inconclusive() -> Self {
        Self {
            status: ProbeStatus::Inconclusive,
            output: None,
        }
    }
}

/// Remote command dispatch against a single instance.
#[async_trait]
pub trait RemoteProbe: Send + Sync {
    /// Dispatches a command on the instance, returning a handle for
    /// collecting the result. Fails with [`ProbeError::Unreachable`] when
    /// the instance cannot accept commands.
    async fn run_command(&self, id: &InstanceId, command: &str) -> Result<CommandId, ProbeError>;

    /// Waits for the command's result, polling at a fixed short interval
    /// up to `max_wait`. Returns an [`ProbeStatus::Inconclusive`] result
    /// when the budget elapses; never blocks indefinitely.
    async fn await_result(
        &self,
        command: &CommandId,
        id: &InstanceId,
        max_wait: Duration,
    ) -> Result<ProbeResult, ProbeError>;
}
