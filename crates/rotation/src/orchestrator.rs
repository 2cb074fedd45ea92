//! Bulk re-encryption of stored credentials onto a target key version.

use std::sync::Arc;

use {
    chrono::Utc,
    credvault_vault::{EnvelopeCodec, KeyRegistry, VaultError},
    futures::future::join_all,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use credvault_metrics::{counter, histogram, labels, rotation as rotation_metrics};

use crate::{
    error::{RecordFailure, Result},
    store::CredentialStore,
    types::{CredentialRecord, RotationOptions, RotationPreview, RotationStatistics},
};

/// Moves every active credential onto one key version.
///
/// Runs are idempotent: records already at the target are skipped, so an
/// interrupted run can simply be started again. Only registry problems and a
/// failed initial scan abort a run; per-record failures are collected in the
/// returned statistics.
pub struct RotationOrchestrator {
    store: Arc<dyn CredentialStore>,
    registry: Arc<KeyRegistry>,
    codec: EnvelopeCodec,
}

impl RotationOrchestrator {
    pub fn new(store: Arc<dyn CredentialStore>, registry: Arc<KeyRegistry>) -> Self {
        Self {
            store,
            registry,
            codec: EnvelopeCodec::new(),
        }
    }

    pub async fn rotate(&self, options: &RotationOptions) -> Result<RotationStatistics> {
        options.validate()?;
        let started_at = Utc::now();
        #[cfg(feature = "metrics")]
        let timer = std::time::Instant::now();

        let target = self.resolve_target(options)?;

        #[cfg(feature = "metrics")]
        counter!(
            rotation_metrics::RUNS_TOTAL,
            labels::MODE => if options.dry_run { "dry_run" } else { "live" }
        )
        .increment(1);

        let records = self.store.find_active_records_with_secrets().await?;
        let total_records = records.len();
        let pending: Vec<CredentialRecord> = records
            .into_iter()
            .filter(|r| r.needs_rotation(target, options.only_version))
            .collect();

        if !options.dry_run && !pending.is_empty() {
            self.refuse_insecure_target(target)?;
        }

        info!(
            target_version = target,
            only_version = ?options.only_version,
            total_records,
            records_to_rotate = pending.len(),
            dry_run = options.dry_run,
            "starting key rotation"
        );

        #[cfg(feature = "metrics")]
        counter!(rotation_metrics::RECORDS_SKIPPED_TOTAL)
            .increment((total_records - pending.len()) as u64);

        let mut stats = RotationStatistics {
            total_records,
            records_to_rotate: pending.len(),
            records_rotated: 0,
            records_failed: 0,
            errors: Vec::new(),
            dry_run: options.dry_run,
            target_version: target,
            preview: None,
            started_at,
            completed_at: started_at,
        };

        if options.dry_run {
            stats.preview = Some(RotationPreview::build(&pending, options.preview_limit));
        } else {
            for (index, batch) in pending.chunks(options.batch_size).enumerate() {
                debug!(batch = index + 1, size = batch.len(), "rotating batch");
                let outcomes =
                    join_all(batch.iter().map(|record| self.rotate_record(record, target))).await;
                for outcome in outcomes {
                    match outcome {
                        Ok(()) => stats.records_rotated += 1,
                        Err(failure) => {
                            warn!(
                                record_id = %failure.record_id,
                                kind = failure.kind.as_str(),
                                error = %failure.message,
                                "record rotation failed"
                            );
                            #[cfg(feature = "metrics")]
                            counter!(
                                rotation_metrics::RECORDS_FAILED_TOTAL,
                                labels::ERROR_TYPE => failure.kind.as_str()
                            )
                            .increment(1);
                            stats.records_failed += 1;
                            stats.errors.push(failure);
                        },
                    }
                }
            }
        }

        stats.completed_at = Utc::now();

        #[cfg(feature = "metrics")]
        {
            counter!(rotation_metrics::RECORDS_ROTATED_TOTAL)
                .increment(stats.records_rotated as u64);
            histogram!(rotation_metrics::RUN_DURATION_SECONDS)
                .record(timer.elapsed().as_secs_f64());
        }

        info!(
            target_version = target,
            records_rotated = stats.records_rotated,
            records_failed = stats.records_failed,
            dry_run = stats.dry_run,
            duration_ms = stats.duration().num_milliseconds(),
            "key rotation finished"
        );

        Ok(stats)
    }

    /// Resolve the target version. It must be loaded.
    fn resolve_target(&self, options: &RotationOptions) -> Result<u32> {
        self.registry.initialize()?;
        let target = match options.target_version {
            Some(version) => version,
            None => self.registry.latest()?,
        };
        self.registry.get(target)?;
        Ok(target)
    }

    /// Live writes onto the development key are never allowed.
    fn refuse_insecure_target(&self, target: u32) -> Result<()> {
        if self.registry.get(target)?.is_insecure() {
            return Err(VaultError::configuration(format!(
                "refusing to rotate records onto key version {target}: it is the insecure development key"
            ))
            .into());
        }
        Ok(())
    }

    async fn rotate_record(
        &self,
        record: &CredentialRecord,
        target: u32,
    ) -> std::result::Result<(), RecordFailure> {
        let mut updated = record.clone();
        for field in updated.envelope_fields_mut() {
            if let Some(wire) = field.as_deref().filter(|w| !w.is_empty()) {
                let fresh = self
                    .codec
                    .reencrypt(wire, &self.registry, Some(target))
                    .map_err(|e| RecordFailure::vault(&record.id, &e))?;
                *field = Some(fresh);
            }
        }
        updated.updated_at = Utc::now();

        self.store
            .save_record(record, &updated)
            .await
            .map_err(|e| RecordFailure::store(&record.id, &e))?;

        debug!(record_id = %record.id, target_version = target, "record rotated");
        Ok(())
    }
}
