//! End-to-end lifecycle test.
//!
//! This test validates the complete fleet lifecycle against the in-memory
//! provider, verifying:
//!
//! 1. Launch from the latest versioned image (readiness, profile, tags)
//! 2. Idle markers refresh while a workload is active
//! 3. Idle instances expire once past the life span
//! 4. Reclamation splits stop/terminate at the configured ceiling
//! 5. A workload finishing later leads to eventual reclamation
//!
//! Time is advanced by rewriting launch timestamps and idle markers rather
//! than by sleeping.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p warden-e2e --test lifecycle
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use warden_fleet::provision::{launch_fleet, LaunchSpec};
use warden_fleet::{FleetProvider, InMemoryFleet, InstanceState};
use warden_id::InstanceId;
use warden_reaper::config::Config;
use warden_reaper::worker::ReaperWorker;

const MAX_LIFE_SPAN: u64 = 240;

/// Shifts an instance's launch time and idle marker into the past.
async fn age_instance(fleet: &InMemoryFleet, config: &Config, id: &InstanceId, secs: i64) {
    let then = Utc::now() - Duration::seconds(secs);
    fleet.set_launch_time(id, then).await;
    fleet
        .set_tag(id, &config.tags.idle_key, &then.to_rfc3339())
        .await
        .expect("backdate idle marker");
}

#[tokio::test]
async fn full_lifecycle() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let config = Config {
        max_life_span_secs: MAX_LIFE_SPAN,
        max_stopped: 1,
        ..Config::default()
    };

    let fleet = Arc::new(InMemoryFleet::new(config.tags.clone()));
    fleet.add_image("fleet-server-v1").await;
    fleet.add_image("fleet-server-v3").await;
    fleet.add_image("fleet-server-v2").await;

    // 1. Launch three instances from the newest image version.
    let spec = LaunchSpec::new(&config.image_pattern, 3, config.instance_type.clone());
    let launched = launch_fleet(fleet.as_ref(), &spec)
        .await
        .expect("launch fleet");
    assert_eq!(launched.len(), 3);

    for instance in &launched {
        assert_eq!(instance.state, InstanceState::Running);
        assert_eq!(instance.tag("managed-by"), Some("warden"));
        assert!(instance.tag("last-active-at").is_some());
        assert!(
            fleet.attached_profile(&instance.id).await.is_some(),
            "profile attached after readiness"
        );
    }

    let worker_id = launched[0].id.clone();
    let idle_a = launched[1].id.clone();
    let idle_b = launched[2].id.clone();

    let mut reaper = ReaperWorker::new(fleet.clone(), fleet.clone(), &config);

    // 2. One instance runs a workload; the first cycles refresh its marker
    //    and reclaim nothing.
    fleet.set_busy(&worker_id, true).await;
    for _ in 0..2 {
        let stats = reaper.run_cycle().await;
        assert_eq!(stats.instances, 3);
        assert_eq!(stats.refreshed, 1);
        assert_eq!(stats.expired, 0);
    }

    // 3. The whole fleet ages past the life span. The busy instance's
    //    marker keeps moving forward, so only the idle pair expires.
    for id in [&worker_id, &idle_a, &idle_b] {
        age_instance(&fleet, &config, id, MAX_LIFE_SPAN as i64 + 60).await;
    }

    let stats = reaper.run_cycle().await;
    assert_eq!(stats.expired, 2);
    assert_eq!(stats.stopped, 1);
    assert_eq!(stats.terminated, 1);
    assert_eq!(
        fleet.peek(&worker_id).await.expect("worker exists").state,
        InstanceState::Running
    );

    // 4. The stop ceiling is spent, so the surviving stopped instance is
    //    escalated on the next cycle.
    let stopped_id = if fleet.peek(&idle_a).await.expect("idle_a").state == InstanceState::Stopped {
        idle_a.clone()
    } else {
        idle_b.clone()
    };
    let stats = reaper.run_cycle().await;
    assert_eq!(stats.terminated, 1);
    assert_eq!(
        fleet.peek(&stopped_id).await.expect("stopped exists").state,
        InstanceState::Terminated
    );

    // 5. The workload finishes. Once the marker stops refreshing and falls
    //    behind the life span, the last instance is reclaimed too.
    fleet.set_busy(&worker_id, false).await;
    age_instance(&fleet, &config, &worker_id, MAX_LIFE_SPAN as i64 + 1).await;

    let stats = reaper.run_cycle().await;
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.terminated, 1);
    assert_eq!(
        fleet.peek(&worker_id).await.expect("worker exists").state,
        InstanceState::Terminated
    );

    // Quiescent fleet: further cycles are no-ops.
    let stats = reaper.run_cycle().await;
    assert_eq!(stats.expired, 0);
    assert_eq!(stats.stopped, 0);
    assert_eq!(stats.terminated, 0);

    let remaining: Vec<_> = fleet
        .list_managed_instances()
        .await
        .expect("list")
        .into_iter()
        .filter(|i| !i.state.is_terminated())
        .collect();
    assert!(remaining.is_empty(), "every instance reclaimed");
}
