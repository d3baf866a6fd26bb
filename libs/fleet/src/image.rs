//! Versioned image selection.
//!
//! Machine images follow a versioned naming convention (for example
//! `fleet-server-v12`) so callers can ask for "the latest" instead of
//! pinning an ever-changing image ID.

use regex::Regex;
use serde::{Deserialize, Serialize};
use warden_id::ImageId;

use crate::error::ProviderError;

/// A machine image known to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub name: String,
}

/// Selects the highest-versioned image whose name matches `pattern`.
///
/// The version is the first run of decimal digits embedded in the image
/// name; images without one are ignored. Returns the winning record and
/// its version, or [`ProviderError::ImageNotFound`] when nothing matches.
pub fn select_latest_image<'a>(
    images: &'a [ImageRecord],
    pattern: &str,
) -> Result<(&'a ImageRecord, u64), ProviderError> {
    let re = Regex::new(pattern)?;

    let mut selected: Option<(&ImageRecord, u64)> = None;
    for image in images {
        if !re.is_match(&image.name) {
            continue;
        }

        let Some(version) = embedded_version(&image.name) else {
            continue;
        };

        match selected {
            Some((_, best)) if version <= best => {}
            _ => selected = Some((image, version)),
        }
    }

    selected.ok_or_else(|| ProviderError::ImageNotFound {
        pattern: pattern.to_string(),
    })
}

/// Extracts the first run of decimal digits from an image name.
fn embedded_version(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse().ok()
}
