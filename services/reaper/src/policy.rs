//! Reclamation policy: stop vs. terminate for expired instances.
//!
//! Terminate is destructive but cheap; a stopped instance stays
//! recoverable for inspection but keeps accruing storage cost. The policy
//! stops expired instances until a configured ceiling is reached over the
//! process lifetime, then terminates the rest. The counter lives on the
//! policy object itself — constructed once per process and handed to the
//! control loop — so there is no hidden global state and the policy tests
//! in isolation.

use std::sync::Arc;

use tracing::{info, warn};
use warden_fleet::{FleetProvider, ManagedInstance};

/// Outcome counts from one reclamation pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReclaimStats {
    pub stopped: u32,
    pub terminated: u32,
    pub failed: u32,
}

/// Decides and issues the reclamation action for each expired instance.
pub struct ReclamationPolicy {
    provider: Arc<dyn FleetProvider>,
    max_stopped: u32,

    /// Expired instances stopped (not terminated) so far in this process's
    /// lifetime. Resets only on restart.
    stopped_total: u32,
}

impl ReclamationPolicy {
    pub fn new(provider: Arc<dyn FleetProvider>, max_stopped: u32) -> Self {
        Self {
            provider,
            max_stopped,
            stopped_total: 0,
        }
    }

    /// Total stop actions issued over the policy's lifetime.
    pub fn stopped_total(&self) -> u32 {
        self.stopped_total
    }

    /// Reclaims the given expired instances, in the order supplied.
    ///
    /// Exactly one provider mutating call per instance and no retries
    /// here; a failed action is logged and retried naturally on the next
    /// cycle, since the instance will still classify as expired.
    pub async fn reclaim(&mut self, expired: &[ManagedInstance]) -> ReclaimStats {
        let mut stats = ReclaimStats::default();

        for instance in expired {
            if self.stopped_total < self.max_stopped {
                match self
                    .provider
                    .stop_instances(std::slice::from_ref(&instance.id))
                    .await
                {
                    Ok(()) => {
                        self.stopped_total += 1;
                        stats.stopped += 1;
                        info!(
                            instance_id = %instance.id,
                            stopped_total = self.stopped_total,
                            max_stopped = self.max_stopped,
                            "Stopped expired instance"
                        );
                    }
                    Err(e) => {
                        stats.failed += 1;
                        warn!(instance_id = %instance.id, error = %e, "Failed to stop instance");
                    }
                }
            } else {
                match self
                    .provider
                    .terminate_instances(std::slice::from_ref(&instance.id))
                    .await
                {
                    Ok(()) => {
                        stats.terminated += 1;
                        info!(instance_id = %instance.id, "Terminated expired instance");
                    }
                    Err(e) => {
                        stats.failed += 1;
                        warn!(
                            instance_id = %instance.id,
                            error = %e,
                            "Failed to terminate instance"
                        );
                    }
                }
            }
        }

        stats
    }
}
