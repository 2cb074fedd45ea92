use {credvault_vault::VaultError, serde::Serialize, thiserror::Error};

/// Failures of the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("credential record not found: {record_id}")]
    RecordNotFound { record_id: String },

    /// The stored tokens changed after the record was read.
    #[error("credential record {record_id} was modified concurrently")]
    ConcurrentModification { record_id: String },

    #[error("{message}")]
    Message { message: String },
}

impl StoreError {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn record_not_found(record_id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            record_id: record_id.into(),
        }
    }

    #[must_use]
    pub fn concurrent_modification(record_id: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            record_id: record_id.into(),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors that abort a whole rotation or report.
#[derive(Debug, Error)]
pub enum Error {
    /// Registry could not be initialised, or the target version is unusable.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The record set could not be read.
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid rotation options: {message}")]
    InvalidOptions { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// What went wrong for a single record. Collected, never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFailureKind {
    KeyNotFound,
    Decryption,
    Encryption,
    Configuration,
    /// Tokens were rewritten by someone else mid-run; the next run retries.
    ConcurrentlyModified,
    Store,
}

impl RecordFailureKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::KeyNotFound => "key_not_found",
            Self::Decryption => "decryption",
            Self::Encryption => "encryption",
            Self::Configuration => "configuration",
            Self::ConcurrentlyModified => "concurrently_modified",
            Self::Store => "store",
        }
    }
}

/// A per-record rotation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("record {record_id}: {message}")]
pub struct RecordFailure {
    pub record_id: String,
    pub kind: RecordFailureKind,
    pub message: String,
}

impl RecordFailure {
    #[must_use]
    pub fn vault(record_id: impl Into<String>, err: &VaultError) -> Self {
        let kind = match err {
            VaultError::KeyNotFound { .. } => RecordFailureKind::KeyNotFound,
            VaultError::Decryption { .. } => RecordFailureKind::Decryption,
            VaultError::Encryption { .. } => RecordFailureKind::Encryption,
            VaultError::Configuration { .. } => RecordFailureKind::Configuration,
        };
        Self {
            record_id: record_id.into(),
            kind,
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn store(record_id: impl Into<String>, err: &StoreError) -> Self {
        let kind = match err {
            StoreError::ConcurrentModification { .. } => RecordFailureKind::ConcurrentlyModified,
            _ => RecordFailureKind::Store,
        };
        Self {
            record_id: record_id.into(),
            kind,
            message: err.to_string(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vault_errors_map_to_kinds() {
        let f = RecordFailure::vault("r1", &VaultError::KeyNotFound { version: 3 });
        assert_eq!(f.kind, RecordFailureKind::KeyNotFound);
        assert!(f.message.contains('3'));

        let f = RecordFailure::vault("r1", &VaultError::decryption("bad tag"));
        assert_eq!(f.kind, RecordFailureKind::Decryption);
        assert_eq!(f.to_string(), "record r1: decryption failed: bad tag");
    }

    #[test]
    fn store_failure_keeps_message() {
        let f = RecordFailure::store("r9", &StoreError::record_not_found("r9"));
        assert_eq!(f.kind, RecordFailureKind::Store);
        assert_eq!(f.message, "credential record not found: r9");
    }

    #[test]
    fn concurrent_write_has_its_own_kind() {
        let f = RecordFailure::store("r2", &StoreError::concurrent_modification("r2"));
        assert_eq!(f.kind, RecordFailureKind::ConcurrentlyModified);
        assert_eq!(f.kind.as_str(), "concurrently_modified");
    }

    #[test]
    fn failure_serializes_kind_snake_case() {
        let f = RecordFailure::store("r1", &StoreError::message("disk full"));
        let json = serde_json::to_value(&f).unwrap();
        assert_eq!(json["kind"], "store");
        assert_eq!(json["record_id"], "r1");
    }
}
