//! Fleet provider interface.
//!
//! The provider is the external collaborator that owns all instances and
//! their durable tag state. The controller only consumes this interface;
//! the wire protocol behind it is a deployment concern.

use async_trait::async_trait;
use warden_id::{ImageId, InstanceId, ProfileId};

use crate::error::ProviderError;
use crate::instance::ManagedInstance;

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Operations the lifecycle controller needs from a compute provider.
///
/// All durable state (instance existence, lifecycle state, tags) lives on
/// the provider side. Implementations must tolerate repeated stop/terminate
/// calls on already-reclaimed instances: cycles are idempotent and may
/// re-issue actions after an interrupted run.
#[async_trait]
pub trait FleetProvider: Send + Sync {
    /// Lists all instances carrying the management marker tag, in any
    /// lifecycle state (including terminated).
    async fn list_managed_instances(&self) -> ProviderResult<Vec<ManagedInstance>>;

    /// Fetches a single instance by ID, or `None` if it no longer exists.
    async fn get_instance(&self, id: &InstanceId) -> ProviderResult<Option<ManagedInstance>>;

    /// Creates `count` instances from the given image, tagging each with
    /// the management marker and an initial idle marker set to the
    /// creation instant.
    async fn create_instances(
        &self,
        image: &ImageId,
        count: u32,
        instance_type: &str,
    ) -> ProviderResult<Vec<ManagedInstance>>;

    /// Stops the given instances. A no-op for instances already stopped
    /// or terminated.
    async fn stop_instances(&self, ids: &[InstanceId]) -> ProviderResult<()>;

    /// Terminates the given instances. A no-op for instances already
    /// terminated; escalates stopped instances.
    async fn terminate_instances(&self, ids: &[InstanceId]) -> ProviderResult<()>;

    /// Reads a tag value. Every call round-trips to the provider; tag
    /// state can change out-of-band and must never be cached here.
    async fn get_tag(&self, id: &InstanceId, key: &str) -> ProviderResult<Option<String>>;

    /// Upserts a tag value.
    async fn set_tag(&self, id: &InstanceId, key: &str, value: &str) -> ProviderResult<()>;

    /// Resolves the highest-versioned image whose name matches the given
    /// pattern. Returns the image ID and the embedded version number.
    async fn resolve_latest_image(&self, pattern: &str) -> ProviderResult<(ImageId, u64)>;

    /// Returns the instance profile to attach to new instances, creating
    /// it (and its backing role) if it does not exist yet.
    async fn ensure_instance_profile(&self) -> ProviderResult<ProfileId>;

    /// Attaches an instance profile to an instance.
    async fn attach_profile(&self, id: &InstanceId, profile: &ProfileId) -> ProviderResult<()>;
}
