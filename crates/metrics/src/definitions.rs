//! Metric name and label definitions.
//!
//! Every metric credvault emits is named here so dashboards and alerts have a
//! single reference.

/// Envelope encryption metrics
pub mod vault {
    /// Values encrypted, labelled by key version
    pub const ENCRYPTIONS_TOTAL: &str = "credvault_vault_encryptions_total";
    /// Values decrypted, labelled by key version
    pub const DECRYPTIONS_TOTAL: &str = "credvault_vault_decryptions_total";
    /// Decryption failures, labelled by key version and error type
    pub const DECRYPTION_FAILURES_TOTAL: &str = "credvault_vault_decryption_failures_total";
    /// Highest loaded key version
    pub const LATEST_KEY_VERSION: &str = "credvault_vault_latest_key_version";
}

/// Key rotation metrics
pub mod rotation {
    /// Rotation runs started, labelled by mode (dry_run / live)
    pub const RUNS_TOTAL: &str = "credvault_rotation_runs_total";
    /// Records successfully re-encrypted
    pub const RECORDS_ROTATED_TOTAL: &str = "credvault_rotation_records_rotated_total";
    /// Records that failed to rotate, labelled by error type
    pub const RECORDS_FAILED_TOTAL: &str = "credvault_rotation_records_failed_total";
    /// Records already at the target version
    pub const RECORDS_SKIPPED_TOTAL: &str = "credvault_rotation_records_skipped_total";
    /// Duration of a full rotation run in seconds
    pub const RUN_DURATION_SECONDS: &str = "credvault_rotation_run_duration_seconds";
}

/// Common label keys used across metrics
pub mod labels {
    pub const KEY_VERSION: &str = "key_version";
    pub const ERROR_TYPE: &str = "error_type";
    pub const MODE: &str = "mode";
}
