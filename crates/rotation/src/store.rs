//! Persistence trait for credential records.

use async_trait::async_trait;

use crate::{error::StoreResult, types::CredentialRecord};

/// The two operations rotation and reporting need from storage.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active records with at least one non-empty token field.
    async fn find_active_records_with_secrets(&self) -> StoreResult<Vec<CredentialRecord>>;

    /// Persist the token fields and `updated_at` of an existing record.
    ///
    /// The write only lands if the stored tokens still equal those in
    /// `scanned`. Otherwise it fails with [`StoreError::ConcurrentModification`]
    /// and the row is left untouched.
    ///
    /// [`StoreError::ConcurrentModification`]: crate::error::StoreError::ConcurrentModification
    async fn save_record(
        &self,
        scanned: &CredentialRecord,
        record: &CredentialRecord,
    ) -> StoreResult<()>;
}
