//! Idle evaluation via the remote probe.
//!
//! Dispatches the configured liveness command on an instance and interprets
//! the result. The contract for the command: exit successfully and print
//! the number of active workload processes, so a trimmed output of `0`
//! means idle.
//!
//! Evaluation fails closed. An unreachable probe, a failed or inconclusive
//! command, or unparseable output all report "not idle" — inconclusive
//! evidence must never get a possibly-busy instance reclaimed.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use warden_fleet::{ProbeStatus, RemoteProbe};
use warden_id::InstanceId;

/// Decides whether an instance is currently idle.
pub struct IdleEvaluator {
    probe: Arc<dyn RemoteProbe>,
    command: String,
    wait: Duration,
}

impl IdleEvaluator {
    pub fn new(probe: Arc<dyn RemoteProbe>, command: impl Into<String>, wait: Duration) -> Self {
        Self {
            probe,
            command: command.into(),
            wait,
        }
    }

    /// Returns true only when the probe positively confirms idleness.
    pub async fn is_idle(&self, id: &InstanceId) -> bool {
        let command = match self.probe.run_command(id, &self.command).await {
            Ok(command) => command,
            Err(e) => {
                debug!(instance_id = %id, error = %e, "Probe dispatch failed; treating as not idle");
                return false;
            }
        };

        let result = match self.probe.await_result(&command, id, self.wait).await {
            Ok(result) => result,
            Err(e) => {
                debug!(instance_id = %id, error = %e, "Probe await failed; treating as not idle");
                return false;
            }
        };

        match result.status {
            ProbeStatus::Success => {
                let active = result
                    .output
                    .as_deref()
                    .map(str::trim)
                    .and_then(|s| s.parse::<u64>().ok());

                match active {
                    Some(0) => true,
                    Some(_) => false,
                    None => {
                        debug!(
                            instance_id = %id,
                            output = result.output.as_deref().unwrap_or(""),
                            "Unparseable probe output; treating as not idle"
                        );
                        false
                    }
                }
            }
            ProbeStatus::Failed | ProbeStatus::Inconclusive => {
                debug!(
                    instance_id = %id,
                    status = ?result.status,
                    "Probe did not confirm idleness; treating as not idle"
                );
                false
            }
        }
    }
}
