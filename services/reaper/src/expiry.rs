//! Expiry classification.
//!
//! An instance is expired once its uptime since the reference instant —
//! the later of launch time and the idle marker — exceeds the configured
//! maximum life span. All instants are `DateTime<Utc>`, so naive/aware
//! timestamp mixing cannot occur.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use warden_fleet::{InstanceState, ManagedInstance};
use warden_id::InstanceId;

use crate::ledger::{LedgerError, TagLedger};

/// Per-instance, per-cycle classification result.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryDecision {
    pub expired: bool,

    /// `max(launch_time, idle_marker)`; non-decreasing across cycles.
    pub reference: DateTime<Utc>,

    /// `now - reference` at classification time.
    pub uptime: Duration,
}

/// Errors classifying a single instance. Never fatal to the cycle.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Data-integrity gap: an instance past creation has no idle marker.
    /// Treated by callers as not-yet-expired; the idle pass repopulates
    /// the marker going forward.
    #[error("instance {0} has no idle marker")]
    MissingMarker(InstanceId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Computes expiry decisions against the tag ledger.
pub struct ExpiryClassifier {
    ledger: TagLedger,
    max_life_span: Duration,
}

impl ExpiryClassifier {
    pub fn new(ledger: TagLedger, max_life_span_secs: u64) -> Self {
        Self {
            ledger,
            max_life_span: Duration::seconds(max_life_span_secs as i64),
        }
    }

    /// Classifies one instance at instant `now`.
    ///
    /// - Terminated instances are never expired.
    /// - Stopped instances are always expired, regardless of timestamps.
    /// - Otherwise, expired iff `uptime > max_life_span` — equality is not
    ///   expired.
    pub async fn classify(
        &self,
        instance: &ManagedInstance,
        now: DateTime<Utc>,
    ) -> Result<ExpiryDecision, ClassifyError> {
        match instance.state {
            InstanceState::Terminated => {
                return Ok(ExpiryDecision {
                    expired: false,
                    reference: instance.launch_time,
                    uptime: now - instance.launch_time,
                });
            }
            InstanceState::Stopped => {
                return Ok(ExpiryDecision {
                    expired: true,
                    reference: instance.launch_time,
                    uptime: now - instance.launch_time,
                });
            }
            _ => {}
        }

        let marker = self
            .ledger
            .idle_marker(&instance.id)
            .await?
            .ok_or_else(|| ClassifyError::MissingMarker(instance.id.clone()))?;

        // A marker earlier than launch (skew, or a stale tag from a
        // recycled identifier) loses to the launch time.
        let reference = instance.launch_time.max(marker);
        let uptime = now - reference;

        Ok(ExpiryDecision {
            expired: uptime > self.max_life_span,
            reference,
            uptime,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rstest::rstest;
    use warden_fleet::{FleetProvider, FleetTags, InMemoryFleet};

    use super::*;

    const MAX_LIFE_SPAN: u64 = 240;

    struct Harness {
        fleet: Arc<InMemoryFleet>,
        classifier: ExpiryClassifier,
        id: InstanceId,
    }

    async fn harness() -> Harness {
        let fleet = Arc::new(InMemoryFleet::default());
        let image = fleet.add_image("fleet-server-v1").await;
        let created = fleet
            .create_instances(&image, 1, "standard-xlarge")
            .await
            .unwrap();
        let id = created[0].id.clone();
        fleet.get_instance(&id).await.unwrap();

        let ledger = TagLedger::new(
            fleet.clone() as Arc<dyn FleetProvider>,
            FleetTags::default().idle_key,
        );
        let classifier = ExpiryClassifier::new(ledger, MAX_LIFE_SPAN);

        Harness {
            fleet,
            classifier,
            id,
        }
    }

    impl Harness {
        async fn instance(&self) -> ManagedInstance {
            self.fleet.peek(&self.id).await.unwrap()
        }

        async fn set_marker(&self, at: DateTime<Utc>) {
            self.fleet
                .set_tag(&self.id, "last-active-at", &at.to_rfc3339())
                .await
                .unwrap();
        }
    }

    #[rstest]
    #[case::well_under(10, false)]
    #[case::just_under(239, false)]
    #[case::exactly_at_limit(240, false)]
    #[case::just_over(241, true)]
    #[tokio::test]
    async fn test_strict_greater_than_threshold(#[case] elapsed_secs: i64, #[case] expired: bool) {
        let h = harness().await;
        let now = Utc::now();
        let launched = now - Duration::seconds(elapsed_secs);

        h.fleet.set_launch_time(&h.id, launched).await;
        h.set_marker(launched).await;

        let decision = h.classifier.classify(&h.instance().await, now).await.unwrap();
        assert_eq!(decision.expired, expired);
        assert_eq!(decision.reference, launched);
    }

    #[tokio::test]
    async fn test_terminated_is_never_expired() {
        let h = harness().await;
        let now = Utc::now();
        h.fleet
            .set_launch_time(&h.id, now - Duration::seconds(100_000))
            .await;
        h.fleet
            .set_state(&h.id, InstanceState::Terminated)
            .await;

        let decision = h.classifier.classify(&h.instance().await, now).await.unwrap();
        assert!(!decision.expired);
    }

    #[tokio::test]
    async fn test_stopped_is_always_expired() {
        let h = harness().await;
        // Fresh instance, stopped seconds after launch.
        h.fleet.set_state(&h.id, InstanceState::Stopped).await;

        let decision = h
            .classifier
            .classify(&h.instance().await, Utc::now())
            .await
            .unwrap();
        assert!(decision.expired);
    }

    #[tokio::test]
    async fn test_marker_refresh_defers_expiry() {
        let h = harness().await;
        let now = Utc::now();

        h.fleet
            .set_launch_time(&h.id, now - Duration::seconds(100_000))
            .await;
        h.set_marker(now - Duration::seconds(30)).await;

        let decision = h.classifier.classify(&h.instance().await, now).await.unwrap();
        assert!(!decision.expired);
        assert_eq!(decision.uptime, Duration::seconds(30));
    }

    #[tokio::test]
    async fn test_marker_before_launch_loses_to_launch_time() {
        let h = harness().await;
        let now = Utc::now();
        let launched = now - Duration::seconds(60);

        h.fleet.set_launch_time(&h.id, launched).await;
        // Stale marker from before launch (skew or recycled identifier).
        h.set_marker(launched - Duration::seconds(1_000)).await;

        let decision = h.classifier.classify(&h.instance().await, now).await.unwrap();
        assert_eq!(decision.reference, launched);
        assert!(!decision.expired);
    }

    #[tokio::test]
    async fn test_missing_marker_is_reported() {
        // Provider stamps a different idle key, so the ledger's key is
        // absent — the same shape as an out-of-band tag wipe.
        let fleet = Arc::new(InMemoryFleet::new(FleetTags {
            idle_key: "some-other-key".to_string(),
            ..FleetTags::default()
        }));
        let image = fleet.add_image("fleet-server-v1").await;
        let created = fleet
            .create_instances(&image, 1, "standard-xlarge")
            .await
            .unwrap();
        let id = created[0].id.clone();
        let instance = fleet.get_instance(&id).await.unwrap().unwrap();

        let ledger = TagLedger::new(
            fleet.clone() as Arc<dyn FleetProvider>,
            FleetTags::default().idle_key,
        );
        let classifier = ExpiryClassifier::new(ledger, MAX_LIFE_SPAN);

        let err = classifier.classify(&instance, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::MissingMarker(_)));
    }

    #[tokio::test]
    async fn test_monotonic_in_time() {
        let h = harness().await;
        let launched = Utc::now() - Duration::seconds(10);
        h.fleet.set_launch_time(&h.id, launched).await;
        h.set_marker(launched).await;
        let instance = h.instance().await;

        let before = launched + Duration::seconds(MAX_LIFE_SPAN as i64);
        let after = before + Duration::seconds(2);

        let d1 = h.classifier.classify(&instance, before).await.unwrap();
        let d2 = h.classifier.classify(&instance, after).await.unwrap();

        assert!(!d1.expired);
        assert!(d2.expired);
        // Reference never moves backward between the two classifications.
        assert!(d2.reference >= d1.reference);
    }

    #[tokio::test]
    async fn test_malformed_marker_fails_that_instance_only() {
        let h = harness().await;
        h.fleet
            .set_tag(&h.id, "last-active-at", "yesterday-ish")
            .await
            .unwrap();

        let err = h
            .classifier
            .classify(&h.instance().await, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Ledger(LedgerError::MalformedMarker { .. })
        ));
    }
}
