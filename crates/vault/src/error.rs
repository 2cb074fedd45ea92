//! Vault error types.

/// Errors produced by key registry and envelope operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Key material is missing, malformed, or forbidden in the current profile.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// An envelope references a key version that was never loaded.
    #[error("encryption key version {version} is not loaded")]
    KeyNotFound { version: u32 },

    /// Authentication failed or the envelope is malformed. Never recovered
    /// into a default value.
    #[error("decryption failed: {reason}")]
    Decryption { reason: String },

    /// The cipher refused to encrypt (should not happen with valid keys).
    #[error("encryption failed: {reason}")]
    Encryption { reason: String },
}

impl VaultError {
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decryption(reason: impl Into<String>) -> Self {
        Self::Decryption {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn encryption(reason: impl Into<String>) -> Self {
        Self::Encryption {
            reason: reason.into(),
        }
    }
}

impl From<base64::DecodeError> for VaultError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decryption(format!("invalid base64: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, VaultError>;
