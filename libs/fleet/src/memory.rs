//! In-memory fleet for development and testing.
//!
//! Implements both [`FleetProvider`] and [`RemoteProbe`] against state held
//! behind a lock, the same way the node runtime is mocked out in dev mode.
//! Tests can inject transient failures and control per-instance busyness;
//! freshly created instances sit in `pending` until observed once, so
//! readiness polling has something real to wait on.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use warden_id::{CommandId, ImageId, InstanceId, ProfileId};

use crate::error::{ProbeError, ProviderError};
use crate::image::{select_latest_image, ImageRecord};
use crate::instance::{FleetTags, InstanceState, ManagedInstance};
use crate::probe::{ProbeResult, ProbeStatus, RemoteProbe};
use crate::provider::{FleetProvider, ProviderResult};

/// How many observations a new instance stays `pending` before the fleet
/// reports it `running`.
const PENDING_OBSERVATIONS: u32 = 1;

struct InstanceRecord {
    instance: ManagedInstance,
    #[allow(dead_code)]
    instance_type: String,
    profile: Option<ProfileId>,
    busy: bool,
    pending_observations: u32,
}

struct CommandRecord {
    busy_at_dispatch: bool,
}

struct FleetState {
    instances: BTreeMap<InstanceId, InstanceRecord>,
    images: Vec<ImageRecord>,
    profile: Option<ProfileId>,
    commands: HashMap<CommandId, CommandRecord>,
    tag_write_failures: u32,
    list_failures: u32,
    probe_reachable: bool,
    forced_probe_status: Option<ProbeStatus>,
}

impl Default for FleetState {
    fn default() -> Self {
        Self {
            instances: BTreeMap::new(),
            images: Vec::new(),
            profile: None,
            commands: HashMap::new(),
            tag_write_failures: 0,
            list_failures: 0,
            probe_reachable: true,
            forced_probe_status: None,
        }
    }
}

/// In-memory [`FleetProvider`] and [`RemoteProbe`] implementation.
pub struct InMemoryFleet {
    tags: FleetTags,
    inner: RwLock<FleetState>,
}

impl InMemoryFleet {
    /// Creates an empty fleet stamping the given tag scheme on new
    /// instances.
    pub fn new(tags: FleetTags) -> Self {
        Self {
            tags,
            inner: RwLock::new(FleetState::default()),
        }
    }

    /// Registers a machine image and returns its ID.
    pub async fn add_image(&self, name: &str) -> ImageId {
        let id = ImageId::new();
        let mut state = self.inner.write().await;
        state.images.push(ImageRecord {
            id: id.clone(),
            name: name.to_string(),
        });
        id
    }

    /// Marks an instance as busy (non-idle) or idle for probe purposes.
    pub async fn set_busy(&self, id: &InstanceId, busy: bool) {
        let mut state = self.inner.write().await;
        if let Some(record) = state.instances.get_mut(id) {
            record.busy = busy;
        }
    }

    /// Forces an instance into a lifecycle state.
    pub async fn set_state(&self, id: &InstanceId, instance_state: InstanceState) {
        let mut state = self.inner.write().await;
        if let Some(record) = state.instances.get_mut(id) {
            record.instance.state = instance_state;
            record.pending_observations = 0;
        }
    }

    /// Rewrites an instance's launch timestamp.
    pub async fn set_launch_time(&self, id: &InstanceId, launch_time: DateTime<Utc>) {
        let mut state = self.inner.write().await;
        if let Some(record) = state.instances.get_mut(id) {
            record.instance.launch_time = launch_time;
        }
    }

    /// Makes the probe transport unreachable (or reachable again).
    pub async fn set_probe_reachable(&self, reachable: bool) {
        self.inner.write().await.probe_reachable = reachable;
    }

    /// Forces every awaited command to report the given status instead of
    /// a real result. `None` restores normal behavior.
    pub async fn force_probe_status(&self, status: Option<ProbeStatus>) {
        self.inner.write().await.forced_probe_status = status;
    }

    /// Fails the next `count` tag writes with `ProviderError::Unavailable`.
    pub async fn fail_tag_writes(&self, count: u32) {
        self.inner.write().await.tag_write_failures = count;
    }

    /// Fails the next `count` listings with `ProviderError::Unavailable`.
    pub async fn fail_listings(&self, count: u32) {
        self.inner.write().await.list_failures = count;
    }

    /// Reads an instance view without counting as an observation.
    pub async fn peek(&self, id: &InstanceId) -> Option<ManagedInstance> {
        let state = self.inner.read().await;
        state.instances.get(id).map(|r| r.instance.clone())
    }

    /// Returns the profile attached to an instance, if any.
    pub async fn attached_profile(&self, id: &InstanceId) -> Option<ProfileId> {
        let state = self.inner.read().await;
        state.instances.get(id).and_then(|r| r.profile.clone())
    }

    fn observe(record: &mut InstanceRecord) {
        if record.instance.state == InstanceState::Pending && record.pending_observations > 0 {
            record.pending_observations -= 1;
            if record.pending_observations == 0 {
                record.instance.state = InstanceState::Running;
            }
        }
    }
}

impl Default for InMemoryFleet {
    fn default() -> Self {
        Self::new(FleetTags::default())
    }
}

#[async_trait]
impl FleetProvider for InMemoryFleet {
    async fn list_managed_instances(&self) -> ProviderResult<Vec<ManagedInstance>> {
        let mut state = self.inner.write().await;

        if state.list_failures > 0 {
            state.list_failures -= 1;
            return Err(ProviderError::Unavailable(
                "injected listing failure".to_string(),
            ));
        }

        let tags = self.tags.clone();
        let mut listed = Vec::new();
        for record in state.instances.values_mut() {
            Self::observe(record);
            if tags.is_managed(&record.instance.tags) {
                listed.push(record.instance.clone());
            }
        }

        Ok(listed)
    }

    async fn get_instance(&self, id: &InstanceId) -> ProviderResult<Option<ManagedInstance>> {
        let mut state = self.inner.write().await;
        Ok(state.instances.get_mut(id).map(|record| {
            Self::observe(record);
            record.instance.clone()
        }))
    }

    async fn create_instances(
        &self,
        image: &ImageId,
        count: u32,
        instance_type: &str,
    ) -> ProviderResult<Vec<ManagedInstance>> {
        let now = Utc::now();
        let mut state = self.inner.write().await;

        let mut created = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let id = InstanceId::new();

            let mut tags = BTreeMap::new();
            tags.insert(
                self.tags.managed_key.clone(),
                self.tags.managed_value.clone(),
            );
            tags.insert(self.tags.idle_key.clone(), now.to_rfc3339());

            let instance = ManagedInstance {
                id: id.clone(),
                state: InstanceState::Pending,
                launch_time: now,
                tags,
            };

            info!(
                instance_id = %id,
                image = %image,
                instance_type,
                "[MEM] Created instance"
            );

            state.instances.insert(
                id,
                InstanceRecord {
                    instance: instance.clone(),
                    instance_type: instance_type.to_string(),
                    profile: None,
                    busy: false,
                    pending_observations: PENDING_OBSERVATIONS,
                },
            );
            created.push(instance);
        }

        Ok(created)
    }

    async fn stop_instances(&self, ids: &[InstanceId]) -> ProviderResult<()> {
        let mut state = self.inner.write().await;
        for id in ids {
            let Some(record) = state.instances.get_mut(id) else {
                continue;
            };
            if record.instance.state.is_reclaimed() {
                // Stop is a no-op on already-reclaimed instances.
                debug!(instance_id = %id, state = %record.instance.state, "[MEM] Stop ignored");
                continue;
            }
            info!(instance_id = %id, "[MEM] Stopping instance");
            record.instance.state = InstanceState::Stopped;
            record.pending_observations = 0;
        }
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[InstanceId]) -> ProviderResult<()> {
        let mut state = self.inner.write().await;
        for id in ids {
            let Some(record) = state.instances.get_mut(id) else {
                continue;
            };
            if record.instance.state.is_terminated() {
                debug!(instance_id = %id, "[MEM] Terminate ignored");
                continue;
            }
            info!(instance_id = %id, "[MEM] Terminating instance");
            record.instance.state = InstanceState::Terminated;
            record.pending_observations = 0;
        }
        Ok(())
    }

    async fn get_tag(&self, id: &InstanceId, key: &str) -> ProviderResult<Option<String>> {
        let state = self.inner.read().await;
        let record = state
            .instances
            .get(id)
            .ok_or_else(|| ProviderError::InstanceNotFound(id.clone()))?;
        Ok(record.instance.tags.get(key).cloned())
    }

    async fn set_tag(&self, id: &InstanceId, key: &str, value: &str) -> ProviderResult<()> {
        let mut state = self.inner.write().await;

        if state.tag_write_failures > 0 {
            state.tag_write_failures -= 1;
            return Err(ProviderError::Unavailable(
                "injected tag-write failure".to_string(),
            ));
        }

        let record = state
            .instances
            .get_mut(id)
            .ok_or_else(|| ProviderError::InstanceNotFound(id.clone()))?;
        record
            .instance
            .tags
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn resolve_latest_image(&self, pattern: &str) -> ProviderResult<(ImageId, u64)> {
        let state = self.inner.read().await;
        let (image, version) = select_latest_image(&state.images, pattern)?;
        Ok((image.id.clone(), version))
    }

    async fn ensure_instance_profile(&self) -> ProviderResult<ProfileId> {
        let mut state = self.inner.write().await;
        if let Some(profile) = &state.profile {
            return Ok(profile.clone());
        }
        let profile = ProfileId::new();
        info!(profile_id = %profile, "[MEM] Created instance profile");
        state.profile = Some(profile.clone());
        Ok(profile)
    }

    async fn attach_profile(&self, id: &InstanceId, profile: &ProfileId) -> ProviderResult<()> {
        let mut state = self.inner.write().await;
        let record = state
            .instances
            .get_mut(id)
            .ok_or_else(|| ProviderError::InstanceNotFound(id.clone()))?;
        debug!(instance_id = %id, profile_id = %profile, "[MEM] Attached profile");
        record.profile = Some(profile.clone());
        Ok(())
    }
}

#[async_trait]
impl RemoteProbe for InMemoryFleet {
    async fn run_command(&self, id: &InstanceId, command: &str) -> Result<CommandId, ProbeError> {
        let mut state = self.inner.write().await;

        if !state.probe_reachable {
            return Err(ProbeError::Unreachable(id.clone()));
        }

        let busy = match state.instances.get(id) {
            Some(record) if record.instance.state == InstanceState::Running => record.busy,
            _ => return Err(ProbeError::Unreachable(id.clone())),
        };

        let command_id = CommandId::new();
        debug!(instance_id = %id, command_id = %command_id, command, "[MEM] Dispatched command");
        state.commands.insert(
            command_id.clone(),
            CommandRecord {
                busy_at_dispatch: busy,
            },
        );
        Ok(command_id)
    }

    async fn await_result(
        &self,
        command: &CommandId,
        id: &InstanceId,
        _max_wait: Duration,
    ) -> Result<ProbeResult, ProbeError> {
        // Results are immediate here; the wait budget only matters for real
        // transports.
        let mut state = self.inner.write().await;

        let record = state
            .commands
            .remove(command)
            .ok_or_else(|| ProbeError::UnknownCommand(command.clone()))?;

        if let Some(status) = state.forced_probe_status {
            debug!(instance_id = %id, status = ?status, "[MEM] Forced probe status");
            return Ok(ProbeResult {
                status,
                output: None,
            });
        }

        let output = if record.busy_at_dispatch { "1" } else { "0" };
        Ok(ProbeResult {
            status: ProbeStatus::Success,
            output: Some(output.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn fleet_with_instance() -> (InMemoryFleet, InstanceId) {
        let fleet = InMemoryFleet::default();
        let image = fleet.add_image("fleet-server-v1").await;
        let created = fleet
            .create_instances(&image, 1, "standard-xlarge")
            .await
            .unwrap();
        let id = created[0].id.clone();
        // Settle the pending state.
        fleet.get_instance(&id).await.unwrap();
        (fleet, id)
    }

    #[tokio::test]
    async fn test_create_stamps_marker_and_idle_tags() {
        let (fleet, id) = fleet_with_instance().await;

        let instance = fleet.peek(&id).await.unwrap();
        assert_eq!(instance.tag("managed-by"), Some("warden"));
        assert!(instance.tag("last-active-at").is_some());
    }

    #[tokio::test]
    async fn test_pending_promotes_to_running_on_observation() {
        let fleet = InMemoryFleet::default();
        let image = fleet.add_image("fleet-server-v1").await;
        let created = fleet
            .create_instances(&image, 1, "standard-xlarge")
            .await
            .unwrap();
        let id = created[0].id.clone();

        assert_eq!(created[0].state, InstanceState::Pending);

        let observed = fleet.get_instance(&id).await.unwrap().unwrap();
        assert_eq!(observed.state, InstanceState::Running);
    }

    #[tokio::test]
    async fn test_list_filters_unmanaged_instances() {
        let fleet = InMemoryFleet::default();
        let image = fleet.add_image("fleet-server-v1").await;
        let created = fleet
            .create_instances(&image, 2, "standard-xlarge")
            .await
            .unwrap();

        fleet
            .set_tag(&created[0].id, "managed-by", "someone-else")
            .await
            .unwrap();

        let listed = fleet.list_managed_instances().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created[1].id);
    }

    #[tokio::test]
    async fn test_stop_and_terminate_are_idempotent() {
        let (fleet, id) = fleet_with_instance().await;

        fleet.stop_instances(std::slice::from_ref(&id)).await.unwrap();
        assert_eq!(fleet.peek(&id).await.unwrap().state, InstanceState::Stopped);

        // Stop on a stopped instance is a no-op.
        fleet.stop_instances(std::slice::from_ref(&id)).await.unwrap();
        assert_eq!(fleet.peek(&id).await.unwrap().state, InstanceState::Stopped);

        // Terminate escalates a stopped instance.
        fleet
            .terminate_instances(std::slice::from_ref(&id))
            .await
            .unwrap();
        assert_eq!(
            fleet.peek(&id).await.unwrap().state,
            InstanceState::Terminated
        );

        // Terminate on a terminated instance is a no-op.
        fleet
            .terminate_instances(std::slice::from_ref(&id))
            .await
            .unwrap();
        assert_eq!(
            fleet.peek(&id).await.unwrap().state,
            InstanceState::Terminated
        );
    }

    #[tokio::test]
    async fn test_tag_write_failure_injection() {
        let (fleet, id) = fleet_with_instance().await;

        fleet.fail_tag_writes(1).await;
        let err = fleet.set_tag(&id, "k", "v").await.unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));

        // Next write goes through.
        fleet.set_tag(&id, "k", "v").await.unwrap();
        assert_eq!(fleet.get_tag(&id, "k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_probe_reports_busyness() {
        let (fleet, id) = fleet_with_instance().await;

        let cmd = fleet.run_command(&id, "probe").await.unwrap();
        let result = fleet
            .await_result(&cmd, &id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.status, ProbeStatus::Success);
        assert_eq!(result.output.as_deref(), Some("0"));

        fleet.set_busy(&id, true).await;
        let cmd = fleet.run_command(&id, "probe").await.unwrap();
        let result = fleet
            .await_result(&cmd, &id, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.output.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_probe_unreachable_when_not_running() {
        let (fleet, id) = fleet_with_instance().await;
        fleet.set_state(&id, InstanceState::Stopped).await;

        let err = fleet.run_command(&id, "probe").await.unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_probe_outage_injection() {
        let (fleet, id) = fleet_with_instance().await;
        fleet.set_probe_reachable(false).await;

        let err = fleet.run_command(&id, "probe").await.unwrap_err();
        assert!(matches!(err, ProbeError::Unreachable(_)));
    }
}
