//! Tag ledger: the durable record of "last observed active" timestamps.
//!
//! Backed entirely by the provider's tag storage. Every read and write
//! round-trips to the provider — tag state can change out-of-band, so
//! nothing is cached here. Writes are upserts and forward-only: the marker
//! never moves backward, which guards against clock skew producing
//! oscillating un-expiry.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;
use warden_fleet::{FleetProvider, ProviderError};
use warden_id::InstanceId;

use std::sync::Arc;

/// Errors reading or writing the idle marker.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The marker tag exists but does not parse as an RFC 3339 instant.
    #[error("malformed idle marker '{value}': {source}")]
    MalformedMarker {
        value: String,
        source: chrono::ParseError,
    },
}

/// Read/write access to the per-instance idle marker tag.
#[derive(Clone)]
pub struct TagLedger {
    provider: Arc<dyn FleetProvider>,
    idle_key: String,
}

impl TagLedger {
    pub fn new(provider: Arc<dyn FleetProvider>, idle_key: impl Into<String>) -> Self {
        Self {
            provider,
            idle_key: idle_key.into(),
        }
    }

    /// Reads the instant the instance was last observed non-idle.
    ///
    /// `None` is valid only immediately after creation, before the first
    /// idle pass has run; callers decide how to treat it.
    pub async fn idle_marker(&self, id: &InstanceId) -> Result<Option<DateTime<Utc>>, LedgerError> {
        let Some(value) = self.provider.get_tag(id, &self.idle_key).await? else {
            return Ok(None);
        };

        let parsed = DateTime::parse_from_rfc3339(&value).map_err(|source| {
            LedgerError::MalformedMarker {
                value: value.clone(),
                source,
            }
        })?;

        Ok(Some(parsed.with_timezone(&Utc)))
    }

    /// Moves the idle marker forward to `now`.
    ///
    /// If the stored marker is already at or past `now` the write is
    /// skipped: the reference instant is monotonically non-decreasing. A
    /// malformed stored marker is overwritten (the refresh self-heals it).
    pub async fn refresh_marker(&self, id: &InstanceId, now: DateTime<Utc>) -> Result<(), LedgerError> {
        match self.idle_marker(id).await {
            Ok(Some(existing)) if existing >= now => {
                debug!(
                    instance_id = %id,
                    existing = %existing,
                    "Idle marker already ahead; leaving in place"
                );
                return Ok(());
            }
            Ok(_) => {}
            Err(LedgerError::MalformedMarker { value, .. }) => {
                debug!(instance_id = %id, value, "Overwriting malformed idle marker");
            }
            Err(e) => return Err(e),
        }

        self.provider
            .set_tag(id, &self.idle_key, &now.to_rfc3339())
            .await?;
        Ok(())
    }
}
