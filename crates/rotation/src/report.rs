//! Key-version usage across stored credentials.

use std::{collections::BTreeMap, sync::Arc};

use {chrono::Utc, credvault_vault::KeyRegistry, tracing::debug};

use crate::{error::Result, store::CredentialStore, types::UsageReport};

/// Tallies which key version each active record is encrypted under.
///
/// Reads envelope prefixes only; nothing is decrypted.
pub struct UsageReporter {
    store: Arc<dyn CredentialStore>,
    registry: Arc<KeyRegistry>,
}

impl UsageReporter {
    pub fn new(store: Arc<dyn CredentialStore>, registry: Arc<KeyRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn report(&self) -> Result<UsageReport> {
        let latest_version = self.registry.latest()?;
        let records = self.store.find_active_records_with_secrets().await?;

        let mut version_distribution = BTreeMap::new();
        let mut records_needing_rotation = 0;
        let mut total_records = 0;
        for record in &records {
            let Some(version) = record.current_version() else {
                continue;
            };
            total_records += 1;
            *version_distribution.entry(version).or_insert(0) += 1;
            if record.needs_rotation(latest_version, None) {
                records_needing_rotation += 1;
            }
        }

        debug!(
            total_records,
            latest_version,
            records_needing_rotation,
            "key usage report generated"
        );

        Ok(UsageReport {
            total_records,
            version_distribution,
            latest_version,
            records_needing_rotation,
            generated_at: Utc::now(),
        })
    }
}
