//! Typed ID definitions for all fleet resources.
//!
//! Each ID type has a unique prefix that identifies the resource type.
//! Tokens are provider-issued and treated as opaque.

use crate::define_id;

// =============================================================================
// Compute
// =============================================================================

define_id!(InstanceId, "i");
define_id!(ImageId, "img");

// =============================================================================
// Identity
// =============================================================================

define_id!(ProfileId, "prof");

// =============================================================================
// Remote command dispatch
// =============================================================================

define_id!(CommandId, "cmd");
