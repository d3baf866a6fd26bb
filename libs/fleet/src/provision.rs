//! Fleet provisioning: launch instances from the latest versioned image.
//!
//! Resolves the image, creates the requested number of instances, waits for
//! each to settle with a bounded poll, and attaches the instance profile.
//! This is support plumbing for operators; the reaper loop never calls it.

use std::time::Duration;

use tracing::{info, warn};
use warden_id::InstanceId;

use crate::instance::{InstanceState, ManagedInstance};
use crate::provider::{FleetProvider, ProviderResult};

/// What to launch and how long to wait for readiness.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Versioned image naming pattern, e.g. `fleet-server-v\d+`.
    pub image_pattern: String,

    /// Number of instances to create.
    pub count: u32,

    /// Provider instance type/class.
    pub instance_type: String,

    /// Total budget for a single instance to leave `pending`.
    pub ready_timeout: Duration,

    /// Fixed delay between readiness polls.
    pub poll_interval: Duration,
}

impl LaunchSpec {
    /// Spec with default readiness budgets.
    pub fn new(image_pattern: impl Into<String>, count: u32, instance_type: impl Into<String>) -> Self {
        Self {
            image_pattern: image_pattern.into(),
            count,
            instance_type: instance_type.into(),
            ready_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Outcome of waiting for an instance to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// The instance reached `running`.
    Ready,

    /// The deadline elapsed with the instance still in transition.
    TimedOut,

    /// The instance stopped, terminated, or disappeared while waiting.
    Gone,
}

/// Launches a fleet of instances from the latest matching image.
///
/// Instances that time out or vanish during readiness are left as-is (the
/// reaper reclaims them once they expire); the launch itself only fails on
/// image resolution or creation errors.
pub async fn launch_fleet(
    provider: &dyn FleetProvider,
    spec: &LaunchSpec,
) -> ProviderResult<Vec<ManagedInstance>> {
    let (image, version) = provider.resolve_latest_image(&spec.image_pattern).await?;
    info!(image = %image, version, pattern = %spec.image_pattern, "Resolved latest image");

    let created = provider
        .create_instances(&image, spec.count, &spec.instance_type)
        .await?;
    info!(count = created.len(), instance_type = %spec.instance_type, "Created instances");

    let profile = provider.ensure_instance_profile().await?;

    let mut launched = Vec::with_capacity(created.len());
    for instance in created {
        match wait_for_ready(provider, &instance.id, spec.ready_timeout, spec.poll_interval).await?
        {
            ReadyOutcome::Ready => {
                provider.attach_profile(&instance.id, &profile).await?;
                info!(instance_id = %instance.id, profile_id = %profile, "Instance ready");
            }
            ReadyOutcome::TimedOut => {
                warn!(
                    instance_id = %instance.id,
                    timeout_secs = spec.ready_timeout.as_secs(),
                    "Instance did not become ready in time"
                );
            }
            ReadyOutcome::Gone => {
                warn!(instance_id = %instance.id, "Instance went away during startup");
            }
        }

        // Hand back the freshest view the provider has.
        if let Some(fresh) = provider.get_instance(&instance.id).await? {
            launched.push(fresh);
        }
    }

    Ok(launched)
}

/// Polls the provider until the instance settles, with an explicit
/// deadline and fixed poll interval.
pub async fn wait_for_ready(
    provider: &dyn FleetProvider,
    id: &InstanceId,
    timeout: Duration,
    poll_interval: Duration,
) -> ProviderResult<ReadyOutcome> {
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match provider.get_instance(id).await? {
            None => return Ok(ReadyOutcome::Gone),
            Some(instance) => match instance.state {
                InstanceState::Running => return Ok(ReadyOutcome::Ready),
                InstanceState::Stopped | InstanceState::Terminated => {
                    return Ok(ReadyOutcome::Gone)
                }
                InstanceState::Pending | InstanceState::Stopping | InstanceState::Terminating => {}
            },
        }

        if tokio::time::Instant::now() >= deadline {
            return Ok(ReadyOutcome::TimedOut);
        }
        tokio::time::sleep(poll_interval).await;
    }
}
