//! Versioned envelope encryption for stored credentials.
//!
//! Every value is sealed with AES-256-GCM under one generation of key
//! material and tagged `v<N>:` with that generation. Old generations stay
//! loaded so existing values keep decrypting while a rotation moves them
//! forward. Trait-based [`Cipher`] design allows swapping the backend.

pub mod aes256gcm;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod traits;

pub use {
    aes256gcm::AesGcmCipher,
    codec::{EnvelopeCodec, KeyCheck},
    envelope::{Envelope, LEGACY_VERSION, is_versioned, version_of},
    error::{Result, VaultError},
    registry::{KeyOrigin, KeyRegistry, KeyVersion, decode_key_hex, generate_key_hex},
    traits::{Cipher, KEY_LEN, Sealed},
};
