//! # warden-fleet
//!
//! Domain model and external interfaces for the fleetwarden lifecycle
//! controller.
//!
//! The controller consumes two narrow interfaces:
//!
//! - [`FleetProvider`]: lists, creates, stops, and terminates instances,
//!   and reads/writes instance tags. The provider owns all durable state;
//!   the controller only ever holds transient views.
//! - [`RemoteProbe`]: executes a command on an instance and reports the
//!   result within a bounded wall-clock budget. Used for idleness detection.
//!
//! Both are async traits so deployments can bind them to their compute
//! provider. An in-memory implementation ([`InMemoryFleet`]) backs
//! development mode and tests.

mod error;
mod image;
mod instance;
mod memory;
mod probe;
mod provider;
pub mod provision;

pub use error::{ProbeError, ProviderError};
pub use image::{select_latest_image, ImageRecord};
pub use instance::{FleetTags, InstanceState, ManagedInstance};
pub use memory::InMemoryFleet;
pub use probe::{ProbeResult, ProbeStatus, RemoteProbe};
pub use provider::{FleetProvider, ProviderResult};
