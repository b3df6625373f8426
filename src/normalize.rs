//! Record sanitization and backend-specific splitting.
//!
//! Pure transformations: the [`Normalizer`] redacts privileged identity
//! fields from a raw profile, and [`split_profile`] carves a sanitized
//! record into the sub-documents the split-storage backend persists
//! (presentations without `detail`, publications filtered to the
//! allow-list, the profile core without nested collections). The
//! single-file backend stores the sanitized record whole and never splits.

use serde_json::{Map, Value};

use crate::config::SanitizeConfig;
use crate::error::SyncError;
use crate::models::{NormalizedProfile, SplitProfile};

/// Privileged identity fields removed when sanitization is enabled.
pub const DEFAULT_PRIVILEGED_FIELDS: [&str; 2] = ["uid", "universityId"];

/// Publication attributes retained by the split-storage backend.
pub const PUBLICATION_FIELDS: [&str; 4] = ["doiId", "doiUrl", "webOfScienceId", "webOfScienceUrl"];

/// Applies the configured sanitization policy to raw profile records.
pub struct Normalizer {
    enabled: bool,
    privileged_fields: Vec<String>,
}

impl Normalizer {
    pub fn from_config(config: &SanitizeConfig) -> Self {
        Self {
            enabled: config.enabled,
            privileged_fields: config.privileged_fields.clone(),
        }
    }

    /// Sanitize one raw record and lift out the fields the pipeline needs.
    ///
    /// Records without an integer `profileId` are rejected; the caller
    /// logs and skips them without aborting the page.
    pub fn process(&self, raw: Value) -> Result<NormalizedProfile, SyncError> {
        let mut record = match raw {
            Value::Object(map) => map,
            other => {
                return Err(SyncError::Record(format!(
                    "expected a JSON object, got {other}"
                )))
            }
        };

        let id = record
            .get("profileId")
            .and_then(Value::as_i64)
            .ok_or_else(|| SyncError::Record("missing or non-integer profileId".to_string()))?;

        if self.enabled {
            for field in &self.privileged_fields {
                record.remove(field);
            }
        }

        let last_modified = record
            .get("lastModified")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(NormalizedProfile {
            id,
            last_modified,
            record,
        })
    }
}

/// Split a sanitized record into the split-storage sub-documents.
///
/// Missing nested collections become empty sequences, matching what the
/// split backend persists for a profile with no presentations or
/// publications.
pub fn split_profile(record: &Map<String, Value>) -> SplitProfile {
    let mut core = record.clone();
    core.remove("profileId");

    let presentations = match core.remove("presentations") {
        Some(Value::Array(items)) => items.into_iter().map(strip_presentation_detail).collect(),
        _ => Vec::new(),
    };

    let publications = match core.remove("publications") {
        Some(Value::Array(items)) => items.into_iter().map(filter_publication).collect(),
        _ => Vec::new(),
    };

    SplitProfile {
        core,
        presentations,
        publications,
    }
}

fn strip_presentation_detail(mut item: Value) -> Value {
    if let Value::Object(map) = &mut item {
        map.remove("detail");
    }
    item
}

fn filter_publication(item: Value) -> Value {
    match item {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| PUBLICATION_FIELDS.contains(&key.as_str()))
                .collect(),
        ),
        other => other,
    }
}
