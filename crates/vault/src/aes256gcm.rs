//! AES-256-GCM implementation of the [`Cipher`] trait.
//!
//! Uses a 128-bit nonce rather than the common 96-bit one so that envelopes
//! stay byte-compatible with stores already written in this layout.

use {
    aes_gcm::{
        AesGcm,
        aead::{AeadInPlace, KeyInit, consts::U16, generic_array::GenericArray},
        aes::Aes256,
    },
    rand::RngCore,
};

use crate::{
    error::VaultError,
    traits::{Cipher, KEY_LEN, NONCE_LEN, Sealed, TAG_LEN},
};

/// AES-256 in GCM mode with a 16-byte nonce and 16-byte tag.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// No associated data is bound; the envelope layout has no slot for it.
const NO_AAD: &[u8] = b"";

/// AES-256-GCM AEAD cipher.
#[derive(Debug, Clone, Copy, Default)]
pub struct AesGcmCipher;

impl AesGcmCipher {
    fn instance(key: &[u8; KEY_LEN]) -> Result<Aes256Gcm16, VaultError> {
        Aes256Gcm16::new_from_slice(key).map_err(|e| VaultError::configuration(e.to_string()))
    }
}

impl Cipher for AesGcmCipher {
    fn name(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn seal(&self, key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<Sealed, VaultError> {
        let cipher = Self::instance(key)?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&nonce), NO_AAD, &mut buffer)
            .map_err(|e| VaultError::encryption(e.to_string()))?;

        let mut tag_bytes = [0u8; TAG_LEN];
        tag_bytes.copy_from_slice(tag.as_slice());

        Ok(Sealed {
            nonce,
            tag: tag_bytes,
            ciphertext: buffer,
        })
    }

    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        tag: &[u8; TAG_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let cipher = Self::instance(key)?;

        let mut buffer = ciphertext.to_vec();
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(nonce),
                NO_AAD,
                &mut buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| VaultError::decryption("authentication tag mismatch"))?;

        Ok(buffer)
    }
}
