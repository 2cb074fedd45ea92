//! Cipher trait for swappable authenticated encryption backends.

use crate::error::VaultError;

/// Key length in bytes (256-bit keys).
pub const KEY_LEN: usize = 32;
/// Nonce length in bytes carried in every envelope.
pub const NONCE_LEN: usize = 16;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one [`Cipher::seal`] call, split into its envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
    pub ciphertext: Vec<u8>,
}

/// Authenticated encryption over a fixed 32-byte key.
///
/// `seal` draws a fresh random nonce on every call. Callers never supply a
/// nonce for encryption, so a nonce cannot be reused with the same key.
pub trait Cipher: Send + Sync {
    /// Short algorithm name for logs and diagnostics.
    fn name(&self) -> &'static str;

    fn seal(&self, key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Sealed, VaultError>;

    /// Verify `tag` and decrypt. Must fail with [`VaultError::Decryption`]
    /// when authentication fails.
    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        tag: &[u8; TAG_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, VaultError>;
}
