//! # warden-id
//!
//! Typed identifiers for fleet resources managed through a compute provider.
//!
//! ## Design Principles
//!
//! - Identifiers are provider-issued and opaque; this crate never interprets
//!   the token beyond its prefix
//! - All IDs have a canonical string representation with strict parsing
//! - IDs support roundtrip serialization (parse → format → parse)
//! - IDs are typed to prevent mixing different resource types
//!
//! ## ID Format
//!
//! All resource IDs use a prefixed format: `{prefix}-{token}`
//!
//! Examples:
//! - `i-0f3a9c1e2b4d5a6f7`
//! - `img-8c1d2e3f4a5b6c7d8`
//! - `cmd-5e6f7a8b9c0d1e2f3`
//!
//! The prefix carries the resource type; the token is whatever the provider
//! handed back. Locally generated IDs (the in-memory fleet, request
//! correlation) use a random hex token in the same shape so the two are
//! indistinguishable to consumers.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Generates a random 17-character lowercase hex token.
///
/// Used by `new()` on each ID type when a locally unique identifier is
/// needed (mirrors the shape of provider-issued tokens).
#[doc(hidden)]
pub fn random_token() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 9] = rng.random();
    let mut token = String::with_capacity(17);
    for b in bytes {
        token.push_str(&format!("{b:02x}"));
    }
    token.truncate(17);
    token
}
