//! fleetwarden reaper library.
//!
//! This crate primarily ships a `reaper` binary, but we expose a small
//! library surface to enable integration testing and reuse.

pub mod config;
pub mod expiry;
pub mod idle;
pub mod ledger;
pub mod policy;
pub mod worker;
