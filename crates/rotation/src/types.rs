use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    credvault_config::RotationConfig,
    credvault_vault::version_of,
    serde::{Deserialize, Serialize},
};

use crate::error::{Error, RecordFailure, Result};

/// Lifecycle state of a stored credential. Only active records are rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Active,
    Revoked,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// A marketplace OAuth credential whose tokens are stored as envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub marketplace: String,
    pub status: RecordStatus,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRecord {
    pub fn new(id: impl Into<String>, marketplace: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            marketplace: marketplace.into(),
            status: RecordStatus::Active,
            access_token: None,
            refresh_token: None,
            updated_at: Utc::now(),
        }
    }

    /// Non-empty envelope fields: access token first, then refresh token.
    pub fn envelopes(&self) -> impl Iterator<Item = &str> {
        [self.access_token.as_deref(), self.refresh_token.as_deref()]
            .into_iter()
            .flatten()
            .filter(|value| !value.is_empty())
    }

    pub(crate) fn envelope_fields_mut(&mut self) -> [&mut Option<String>; 2] {
        [&mut self.access_token, &mut self.refresh_token]
    }

    #[must_use]
    pub fn has_secrets(&self) -> bool {
        self.envelopes().next().is_some()
    }

    /// Version of the first envelope field, if any.
    #[must_use]
    pub fn current_version(&self) -> Option<u32> {
        self.envelopes().next().map(version_of)
    }

    /// Whether rotating to `target` would change this record.
    ///
    /// With `only_version` set, the record must also hold at least one
    /// envelope at that version.
    #[must_use]
    pub fn needs_rotation(&self, target: u32, only_version: Option<u32>) -> bool {
        let versions: Vec<u32> = self.envelopes().map(version_of).collect();
        if versions.is_empty() {
            return false;
        }
        if let Some(only) = only_version
            && !versions.contains(&only)
        {
            return false;
        }
        versions.iter().any(|&v| v != target)
    }
}

/// Parameters of one rotation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationOptions {
    pub dry_run: bool,
    pub batch_size: usize,
    /// Defaults to the registry's latest version.
    pub target_version: Option<u32>,
    /// Only rotate records that hold an envelope at this version.
    pub only_version: Option<u32>,
    /// Record ids listed per version in a dry-run preview.
    pub preview_limit: usize,
}

impl Default for RotationOptions {
    fn default() -> Self {
        Self::from_config(&RotationConfig::default())
    }
}

impl RotationOptions {
    #[must_use]
    pub fn from_config(config: &RotationConfig) -> Self {
        Self {
            dry_run: false,
            batch_size: config.batch_size,
            target_version: None,
            only_version: None,
            preview_limit: config.preview_limit,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::invalid_options("batch_size must be at least 1"));
        }
        if self.target_version == Some(0) {
            return Err(Error::invalid_options("target_version must be at least 1"));
        }
        if self.only_version == Some(0) {
            return Err(Error::invalid_options("only_version must be at least 1"));
        }
        Ok(())
    }
}

/// Records awaiting rotation at one source version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VersionPreview {
    pub count: usize,
    /// At most `preview_limit` ids, in scan order.
    pub sample_ids: Vec<String>,
}

/// What a live run would touch, grouped by current version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationPreview {
    pub by_version: BTreeMap<u32, VersionPreview>,
}

impl RotationPreview {
    pub fn build<'a>(records: impl IntoIterator<Item = &'a CredentialRecord>, limit: usize) -> Self {
        let mut by_version: BTreeMap<u32, VersionPreview> = BTreeMap::new();
        for record in records {
            let Some(version) = record.current_version() else {
                continue;
            };
            let entry = by_version.entry(version).or_default();
            entry.count += 1;
            if entry.sample_ids.len() < limit {
                entry.sample_ids.push(record.id.clone());
            }
        }
        Self { by_version }
    }

    /// Ids left out of the listing for `version`.
    #[must_use]
    pub fn truncated(&self, version: u32) -> usize {
        self.by_version
            .get(&version)
            .map_or(0, |p| p.count.saturating_sub(p.sample_ids.len()))
    }
}

/// Result of a rotation run.
#[derive(Debug, Clone, Serialize)]
pub struct RotationStatistics {
    pub total_records: usize,
    pub records_to_rotate: usize,
    pub records_rotated: usize,
    pub records_failed: usize,
    pub errors: Vec<RecordFailure>,
    pub dry_run: bool,
    pub target_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<RotationPreview>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RotationStatistics {
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }

    /// True when a live run left records unrotated because of errors.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.dry_run && self.records_failed > 0
    }
}

/// Point-in-time distribution of key versions across active records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    pub total_records: usize,
    pub version_distribution: BTreeMap<u32, usize>,
    pub latest_version: u32,
    pub records_needing_rotation: usize,
    pub generated_at: DateTime<Utc>,
}
