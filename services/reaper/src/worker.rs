//! Reaper background worker.
//!
//! Runs the idle-detection and reclamation cycle on a fixed interval,
//! forever. Cycles are strictly sequential — the sleep between them is the
//! only scheduling primitive — and each cycle runs to completion once
//! started. All durable state lives in provider tags, so an interrupted
//! cycle leaves nothing to clean up and the next run starts from scratch.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};
use warden_fleet::{FleetProvider, ManagedInstance, RemoteProbe};

use crate::config::Config;
use crate::expiry::{ClassifyError, ExpiryClassifier};
use crate::idle::IdleEvaluator;
use crate::ledger::TagLedger;
use crate::policy::ReclamationPolicy;

/// Statistics from a single reclamation cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub instances: usize,
    pub idle: u32,
    pub refreshed: u32,
    pub expired: u32,
    pub stopped: u32,
    pub terminated: u32,
    pub skipped: u32,
}

impl CycleStats {
    fn had_activity(&self) -> bool {
        self.refreshed > 0 || self.expired > 0 || self.skipped > 0
    }
}

/// The reaper worker: one instance per process, owning the policy counter.
pub struct ReaperWorker {
    provider: Arc<dyn FleetProvider>,
    evaluator: IdleEvaluator,
    ledger: TagLedger,
    classifier: ExpiryClassifier,
    policy: ReclamationPolicy,
    interval: std::time::Duration,
}

impl ReaperWorker {
    /// Wires the cycle components from configuration.
    pub fn new(
        provider: Arc<dyn FleetProvider>,
        probe: Arc<dyn RemoteProbe>,
        config: &Config,
    ) -> Self {
        let ledger = TagLedger::new(provider.clone(), config.tags.idle_key.clone());
        let evaluator = IdleEvaluator::new(probe, config.probe_command.clone(), config.probe_wait);
        let classifier = ExpiryClassifier::new(ledger.clone(), config.max_life_span_secs);
        let policy = ReclamationPolicy::new(provider.clone(), config.max_stopped);

        Self {
            provider,
            evaluator,
            ledger,
            classifier,
            policy,
            interval: config.check_interval,
        }
    }

    /// Run cycles until shutdown is signaled.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting reaper worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Reaper worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Runs a single cycle: list, evaluate idleness, classify, reclaim.
    ///
    /// Never fails: per-instance errors are logged and skipped, and a
    /// failure to even list instances just ends the cycle early — the next
    /// tick retries from scratch.
    pub async fn run_cycle(&mut self) -> CycleStats {
        let mut stats = CycleStats::default();

        let instances = match self.provider.list_managed_instances().await {
            Ok(instances) => instances,
            Err(e) => {
                error!(error = %e, "Failed to list managed instances; skipping cycle");
                return stats;
            }
        };
        stats.instances = instances.len();
        debug!(count = instances.len(), "Fetched managed instances");

        self.evaluate_idleness(&instances, &mut stats).await;

        let expired = self.collect_expired(&instances, &mut stats).await;
        stats.expired = expired.len() as u32;

        let reclaimed = self.policy.reclaim(&expired).await;
        stats.stopped = reclaimed.stopped;
        stats.terminated = reclaimed.terminated;
        stats.skipped += reclaimed.failed;

        if stats.had_activity() {
            info!(
                instances = stats.instances,
                idle = stats.idle,
                refreshed = stats.refreshed,
                expired = stats.expired,
                stopped = stats.stopped,
                terminated = stats.terminated,
                skipped = stats.skipped,
                "Reclamation cycle complete"
            );
        }

        stats
    }

    /// Idle pass: refresh the marker for every non-reclaimed instance that
    /// is not positively idle. Idle instances keep their marker untouched
    /// so uptime-since-last-active accumulates.
    async fn evaluate_idleness(&self, instances: &[ManagedInstance], stats: &mut CycleStats) {
        for instance in instances {
            if instance.state.is_reclaimed() {
                continue;
            }

            if self.evaluator.is_idle(&instance.id).await {
                stats.idle += 1;
                continue;
            }

            match self.ledger.refresh_marker(&instance.id, Utc::now()).await {
                Ok(()) => {
                    stats.refreshed += 1;
                    debug!(instance_id = %instance.id, "Refreshed idle marker");
                }
                Err(e) => {
                    // Stale marker this cycle; the next cycle retries.
                    stats.skipped += 1;
                    warn!(instance_id = %instance.id, error = %e, "Failed to refresh idle marker");
                }
            }
        }
    }

    /// Classification pass: collect every expired instance, in listing
    /// order.
    async fn collect_expired(
        &self,
        instances: &[ManagedInstance],
        stats: &mut CycleStats,
    ) -> Vec<ManagedInstance> {
        let now = Utc::now();
        let mut expired = Vec::new();

        for instance in instances {
            if instance.state.is_terminated() {
                continue;
            }

            match self.classifier.classify(instance, now).await {
                Ok(decision) if decision.expired => {
                    debug!(
                        instance_id = %instance.id,
                        state = %instance.state,
                        uptime_secs = decision.uptime.num_seconds(),
                        "Instance expired"
                    );
                    expired.push(instance.clone());
                }
                Ok(_) => {}
                Err(ClassifyError::MissingMarker(_)) => {
                    stats.skipped += 1;
                    warn!(
                        instance_id = %instance.id,
                        "Instance has no idle marker; treating as not yet expired"
                    );
                }
                Err(e) => {
                    stats.skipped += 1;
                    warn!(instance_id = %instance.id, error = %e, "Failed to classify instance");
                }
            }
        }

        expired
    }
}
