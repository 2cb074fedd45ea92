//! Key rotation and key-usage reporting over stored marketplace credentials.
//!
//! [`RotationOrchestrator`] re-encrypts every active credential onto one key
//! version in sequential batches. [`UsageReporter`] shows how far a rotation
//! has progressed. Both talk to storage through [`CredentialStore`].

pub mod error;
pub mod orchestrator;
pub mod report;
pub mod store;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, RecordFailure, RecordFailureKind, Result, StoreError, StoreResult},
    orchestrator::RotationOrchestrator,
    report::UsageReporter,
    store::CredentialStore,
    types::{
        CredentialRecord, RecordStatus, RotationOptions, RotationPreview, RotationStatistics,
        UsageReport, VersionPreview,
    },
};

/// Run database migrations for the rotation crate.
///
/// Creates the `marketplace_credentials` table. Call at startup before
/// [`store_sqlite::SqliteStore::with_pool`].
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> StoreResult<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
