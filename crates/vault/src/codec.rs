//! Envelope encryption and decryption against a [`KeyRegistry`].

use {rand::RngCore, serde::Serialize, zeroize::Zeroizing};

#[cfg(feature = "metrics")]
use credvault_metrics::{counter, labels, vault as vault_metrics};

use crate::{
    aes256gcm::AesGcmCipher,
    envelope::{Envelope, SALT_LEN, split_prefix},
    error::{Result, VaultError},
    registry::KeyRegistry,
    traits::Cipher,
};

/// Fixed probe value used by [`EnvelopeCodec::verify_keys`].
const PROBE_PLAINTEXT: &str = "credvault-key-self-test";

/// Outcome of a self-test against one key version.
#[derive(Debug, Clone, Serialize)]
pub struct KeyCheck {
    pub version: u32,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Encrypts values under the latest key and decrypts any loaded version.
///
/// Stateless apart from the cipher; the registry is passed per call so one
/// codec can serve several registries (tests build a fresh one each time).
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec<C: Cipher = AesGcmCipher> {
    cipher: C,
}

impl EnvelopeCodec<AesGcmCipher> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<C: Cipher> EnvelopeCodec<C> {
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Encrypt under the latest loaded version.
    pub fn encrypt(&self, plaintext: &str, registry: &KeyRegistry) -> Result<String> {
        let version = registry.latest()?;
        self.encrypt_with_version(plaintext, registry, version)
    }

    /// Encrypt under a specific loaded version.
    pub fn encrypt_with_version(
        &self,
        plaintext: &str,
        registry: &KeyRegistry,
        version: u32,
    ) -> Result<String> {
        let key = registry.get(version)?;

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill_bytes(&mut salt);

        let sealed = self.cipher.seal(key.secret(), plaintext.as_bytes())?;
        let envelope = Envelope {
            version,
            salt,
            nonce: sealed.nonce,
            tag: sealed.tag,
            ciphertext: sealed.ciphertext,
        };

        #[cfg(feature = "metrics")]
        counter!(vault_metrics::ENCRYPTIONS_TOTAL, labels::KEY_VERSION => version.to_string())
            .increment(1);

        Ok(envelope.encode())
    }

    /// Decrypt a tagged or legacy envelope.
    ///
    /// The key version is resolved from the prefix before the body is decoded,
    /// so an envelope for an unloaded version reports
    /// [`VaultError::KeyNotFound`] even if its body is also damaged.
    pub fn decrypt(&self, wire: &str, registry: &KeyRegistry) -> Result<String> {
        let (version, body) = split_prefix(wire);
        let result = self.decrypt_parts(version, body, registry);

        #[cfg(feature = "metrics")]
        match &result {
            Ok(_) => {
                counter!(vault_metrics::DECRYPTIONS_TOTAL, labels::KEY_VERSION => version.to_string())
                    .increment(1);
            },
            Err(e) => {
                counter!(
                    vault_metrics::DECRYPTION_FAILURES_TOTAL,
                    labels::KEY_VERSION => version.to_string(),
                    labels::ERROR_TYPE => error_label(e)
                )
                .increment(1);
            },
        }

        #[cfg(feature = "tracing")]
        if let Err(e) = &result {
            tracing::debug!(version, error = %e, "envelope decryption failed");
        }

        result
    }

    fn decrypt_parts(&self, version: u32, body: &str, registry: &KeyRegistry) -> Result<String> {
        let key = registry.get(version)?;
        let envelope = Envelope::decode_body(version, body)?;
        let plaintext = self.cipher.open(
            key.secret(),
            &envelope.nonce,
            &envelope.tag,
            &envelope.ciphertext,
        )?;
        String::from_utf8(plaintext)
            .map_err(|_| VaultError::decryption("plaintext is not valid UTF-8"))
    }

    /// Decrypt and encrypt again under `target` (latest when `None`).
    ///
    /// Always produces a new envelope, even when the source is already at the
    /// target version.
    pub fn reencrypt(
        &self,
        wire: &str,
        registry: &KeyRegistry,
        target: Option<u32>,
    ) -> Result<String> {
        let target = match target {
            Some(version) => version,
            None => registry.latest()?,
        };
        let plaintext = Zeroizing::new(self.decrypt(wire, registry)?);
        self.encrypt_with_version(&plaintext, registry, target)
    }

    /// Key version of an envelope, read from its prefix.
    #[must_use]
    pub fn version_of(&self, wire: &str) -> u32 {
        crate::envelope::version_of(wire)
    }

    /// Encrypt and decrypt a probe value under every loaded version.
    ///
    /// Fails only when the registry itself cannot be initialised; per-version
    /// problems are reported in the returned checks.
    pub fn verify_keys(&self, registry: &KeyRegistry) -> Result<Vec<KeyCheck>> {
        let versions = registry.available()?;
        let checks = versions
            .into_iter()
            .map(|version| {
                let outcome = self
                    .encrypt_with_version(PROBE_PLAINTEXT, registry, version)
                    .and_then(|wire| self.decrypt(&wire, registry))
                    .and_then(|plain| {
                        if plain == PROBE_PLAINTEXT {
                            Ok(())
                        } else {
                            Err(VaultError::decryption("probe value changed in round trip"))
                        }
                    });
                match outcome {
                    Ok(()) => KeyCheck {
                        version,
                        ok: true,
                        error: None,
                    },
                    Err(e) => KeyCheck {
                        version,
                        ok: false,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect();

        #[cfg(feature = "metrics")]
        credvault_metrics::gauge!(vault_metrics::LATEST_KEY_VERSION)
            .set(f64::from(registry.latest()?));

        Ok(checks)
    }

    /// Name of the underlying cipher.
    pub fn cipher_name(&self) -> &'static str {
        self.cipher.name()
    }
}

#[cfg(feature = "metrics")]
fn error_label(err: &VaultError) -> &'static str {
    match err {
        VaultError::Configuration { .. } => "configuration",
        VaultError::KeyNotFound { .. } => "key_not_found",
        VaultError::Decryption { .. } => "decryption",
        VaultError::Encryption { .. } => "encryption",
    }
}
