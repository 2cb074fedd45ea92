//! Key registry: which key versions exist and what their material is.
//!
//! Raw material is validated once, on first use, and cached for the lifetime
//! of the registry. Concurrent first callers block on the same
//! initialisation; afterwards every read is lock-free.

use std::collections::BTreeMap;

use {
    credvault_config::{CredvaultConfig, Environment, KeyMaterial, collect_key_material},
    once_cell::sync::OnceCell,
    rand::RngCore,
    sha2::{Digest, Sha256},
    zeroize::Zeroizing,
};

use crate::{
    error::{Result, VaultError},
    traits::KEY_LEN,
};

/// Seed for the insecure development key. Anyone can derive it.
const DEVELOPMENT_KEY_SEED: &[u8] = b"credvault-insecure-development-key-never-use-in-production";

/// Where a key version's material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    /// A `<prefix>_V<N>` variable.
    Versioned,
    /// The unversioned `<prefix>` variable, treated as version 1.
    LegacyPrimary,
    /// Derived from a public seed because nothing was configured.
    DevelopmentFallback,
}

impl std::fmt::Display for KeyOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Versioned => write!(f, "versioned"),
            Self::LegacyPrimary => write!(f, "legacy primary"),
            Self::DevelopmentFallback => write!(f, "INSECURE development fallback"),
        }
    }
}

/// One generation of key material.
pub struct KeyVersion {
    version: u32,
    secret: Zeroizing<[u8; KEY_LEN]>,
    origin: KeyOrigin,
}

impl KeyVersion {
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    #[must_use]
    pub fn secret(&self) -> &[u8; KEY_LEN] {
        &self.secret
    }

    #[must_use]
    pub fn origin(&self) -> KeyOrigin {
        self.origin
    }

    /// True only for the development fallback key.
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        self.origin == KeyOrigin::DevelopmentFallback
    }

    /// Hex of the first 8 bytes of SHA-256 over the key. Safe to display.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.secret[..]);
        hex::encode(&digest[..8])
    }
}

impl std::fmt::Debug for KeyVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyVersion")
            .field("version", &self.version)
            .field("secret", &"[REDACTED]")
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Debug)]
struct LoadedKeys {
    versions: BTreeMap<u32, KeyVersion>,
    latest: u32,
}

/// Source of truth for the loaded key versions.
///
/// Construct once at startup and share by reference (or `Arc`). Tests build a
/// fresh registry with fabricated material instead of touching globals.
#[derive(Debug)]
pub struct KeyRegistry {
    material: KeyMaterial,
    environment: Environment,
    loaded: OnceCell<LoadedKeys>,
}

impl KeyRegistry {
    /// Create a registry over raw material. Nothing is validated until first use.
    #[must_use]
    pub fn new(material: KeyMaterial, environment: Environment) -> Self {
        Self {
            material,
            environment,
            loaded: OnceCell::new(),
        }
    }

    /// Create a registry from the process environment using `config.keys`.
    #[must_use]
    pub fn from_config(config: &CredvaultConfig) -> Self {
        Self::new(collect_key_material(&config.keys), config.environment)
    }

    /// Build an already-initialised registry from raw 32-byte keys.
    pub fn from_secrets(secrets: impl IntoIterator<Item = (u32, [u8; KEY_LEN])>) -> Result<Self> {
        let versions: BTreeMap<u32, KeyVersion> = secrets
            .into_iter()
            .map(|(version, secret)| {
                (version, KeyVersion {
                    version,
                    secret: Zeroizing::new(secret),
                    origin: KeyOrigin::Versioned,
                })
            })
            .collect();
        let loaded = finish(versions)?;

        let registry = Self::new(KeyMaterial::default(), Environment::Test);
        registry
            .loaded
            .set(loaded)
            .map_err(|_| VaultError::configuration("registry already initialised"))?;
        Ok(registry)
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Validate and cache all configured keys. Repeated calls are no-ops once
    /// a call has succeeded.
    pub fn initialize(&self) -> Result<()> {
        self.keys().map(|_| ())
    }

    /// Highest loaded version.
    pub fn latest(&self) -> Result<u32> {
        Ok(self.keys()?.latest)
    }

    /// Key material for `version`.
    pub fn get(&self, version: u32) -> Result<&KeyVersion> {
        self.keys()?
            .versions
            .get(&version)
            .ok_or(VaultError::KeyNotFound { version })
    }

    /// All loaded versions, ascending.
    pub fn available(&self) -> Result<Vec<u32>> {
        Ok(self.keys()?.versions.keys().copied().collect())
    }

    /// Loaded key versions, ascending.
    pub fn versions(&self) -> Result<impl Iterator<Item = &KeyVersion>> {
        Ok(self.keys()?.versions.values())
    }

    /// Whether the insecure development fallback is in use.
    pub fn uses_development_key(&self) -> Result<bool> {
        Ok(self.keys()?.versions.values().any(KeyVersion::is_insecure))
    }

    fn keys(&self) -> Result<&LoadedKeys> {
        self.loaded
            .get_or_try_init(|| load(&self.material, self.environment))
    }
}

fn load(material: &KeyMaterial, environment: Environment) -> Result<LoadedKeys> {
    let production = environment.is_production();
    let mut versions = BTreeMap::new();

    for raw in &material.keys {
        match decode_key_hex(raw.trimmed()) {
            Ok(secret) => {
                let origin = if raw.legacy {
                    KeyOrigin::LegacyPrimary
                } else {
                    KeyOrigin::Versioned
                };
                versions.insert(raw.version, KeyVersion {
                    version: raw.version,
                    secret,
                    origin,
                });
            },
            Err(reason) if production => {
                return Err(VaultError::configuration(format!(
                    "{} is invalid: {reason}",
                    raw.variable
                )));
            },
            Err(reason) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    variable = %raw.variable,
                    version = raw.version,
                    reason = %reason,
                    "skipping malformed encryption key"
                );
                #[cfg(not(feature = "tracing"))]
                let _ = reason;
            },
        }
    }

    if versions.is_empty() && !material.keys.is_empty() {
        return Err(VaultError::configuration(
            "encryption keys are configured but none could be decoded; refusing to use the development fallback",
        ));
    }

    if versions.is_empty() {
        if production {
            return Err(VaultError::configuration(
                "no encryption key configured; the production profile does not allow the development fallback",
            ));
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(
            environment = %environment,
            "no encryption key configured, using the INSECURE development key; never use this outside development"
        );
        versions.insert(1, development_key());
    }

    let loaded = finish(versions)?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        versions = ?loaded.versions.keys().collect::<Vec<_>>(),
        latest = loaded.latest,
        environment = %environment,
        "encryption keys loaded"
    );

    Ok(loaded)
}

fn finish(versions: BTreeMap<u32, KeyVersion>) -> Result<LoadedKeys> {
    if versions.contains_key(&0) {
        return Err(VaultError::configuration("key versions start at 1"));
    }
    let latest = versions
        .keys()
        .next_back()
        .copied()
        .ok_or_else(|| VaultError::configuration("no key versions loaded"))?;
    Ok(LoadedKeys { versions, latest })
}

fn development_key() -> KeyVersion {
    let digest = Sha256::digest(DEVELOPMENT_KEY_SEED);
    let mut secret = Zeroizing::new([0u8; KEY_LEN]);
    secret.copy_from_slice(&digest);
    KeyVersion {
        version: 1,
        secret,
        origin: KeyOrigin::DevelopmentFallback,
    }
}

/// Decode a 64-character hex string into a 32-byte key.
pub fn decode_key_hex(text: &str) -> std::result::Result<Zeroizing<[u8; KEY_LEN]>, String> {
    let bytes = Zeroizing::new(hex::decode(text).map_err(|e| format!("not valid hex ({e})"))?);
    if bytes.len() != KEY_LEN {
        return Err(format!(
            "expected {KEY_LEN} bytes ({} hex characters), got {} bytes",
            KEY_LEN * 2,
            bytes.len()
        ));
    }
    let mut secret = Zeroizing::new([0u8; KEY_LEN]);
    secret.copy_from_slice(&bytes);
    Ok(secret)
}

/// Generate a fresh random key, hex-encoded, ready for a `<prefix>_V<N>` variable.
#[must_use]
pub fn generate_key_hex() -> String {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    rand::rng().fill_bytes(key.as_mut());
    hex::encode(&key[..])
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const HEX_A: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";
    const HEX_B: &str = "ffeeddccbbaa99887766554433221100ffeeddccbbaa99887766554433221100";

    fn registry(pairs: &[(u32, &str)], env: Environment) -> KeyRegistry {
        KeyRegistry::new(KeyMaterial::from_pairs(pairs.iter().copied()), env)
    }

    #[test]
    fn loads_versions_and_latest() {
        let reg = registry(&[(1, HEX_A), (3, HEX_B)], Environment::Production);
        assert_eq!(reg.latest().unwrap(), 3);
        assert_eq!(reg.available().unwrap(), vec![1, 3]);
        assert_eq!(reg.get(1).unwrap().secret()[31], 0x1f);
        assert!(!reg.uses_development_key().unwrap());
    }

    #[test]
    fn missing_version_is_key_not_found() {
        let reg = registry(&[(1, HEX_A), (3, HEX_B)], Environment::Development);
        assert!(matches!(
            reg.get(2),
            Err(VaultError::KeyNotFound { version: 2 })
        ));
    }

    #[test]
    fn initialize_is_idempotent() {
        let reg = registry(&[(1, HEX_A)], Environment::Production);
        reg.initialize().unwrap();
        let first = reg.get(1).unwrap() as *const KeyVersion;
        reg.initialize().unwrap();
        let second = reg.get(1).unwrap() as *const KeyVersion;
        assert_eq!(first, second);
    }

    #[test]
    fn production_without_keys_fails_fast() {
        let reg = registry(&[], Environment::Production);
        assert!(matches!(
            reg.initialize(),
            Err(VaultError::Configuration { .. })
        ));
        assert!(reg.latest().is_err());
    }

    #[test]
    fn development_without_keys_uses_flagged_fallback() {
        let reg = registry(&[], Environment::Development);
        reg.initialize().unwrap();
        assert_eq!(reg.available().unwrap(), vec![1]);
        let key = reg.get(1).unwrap();
        assert!(key.is_insecure());
        assert_eq!(key.origin(), KeyOrigin::DevelopmentFallback);
        assert!(reg.uses_development_key().unwrap());

        let again = registry(&[], Environment::Test);
        assert_eq!(again.get(1).unwrap().secret(), key.secret());
    }

    #[test]
    fn malformed_key_is_fatal_in_production() {
        let reg = registry(&[(1, HEX_A), (2, "not-hex")], Environment::Production);
        let err = reg.initialize().unwrap_err();
        assert!(err.to_string().contains("inline_v2"));
    }

    #[test]
    fn malformed_key_is_skipped_outside_production() {
        let reg = registry(&[(1, HEX_A), (2, "abcd")], Environment::Development);
        assert_eq!(reg.available().unwrap(), vec![1]);
        assert_eq!(reg.latest().unwrap(), 1);
    }

    #[test]
    fn only_key_malformed_does_not_fall_back() {
        let reg = registry(&[(1, "abcd")], Environment::Development);
        assert!(matches!(
            reg.initialize(),
            Err(VaultError::Configuration { .. })
        ));
        assert!(reg.uses_development_key().is_err());
    }

    #[test]
    fn legacy_origin_is_recorded() {
        let mut material = KeyMaterial::from_pairs([(1, HEX_A)]);
        material.keys[0].legacy = true;
        let reg = KeyRegistry::new(material, Environment::Production);
        assert_eq!(reg.get(1).unwrap().origin(), KeyOrigin::LegacyPrimary);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        assert!(decode_key_hex(&HEX_A[..62]).is_err());
        assert!(decode_key_hex(&format!("{HEX_A}00")).is_err());
        assert!(decode_key_hex("zz").is_err());
        assert!(decode_key_hex(&HEX_A.to_uppercase()).is_ok());
    }

    #[test]
    fn generated_keys_decode() {
        let a = generate_key_hex();
        let b = generate_key_hex();
        assert_eq!(a.len(), 64);
        assert_ne!(a, b);
        assert!(decode_key_hex(&a).is_ok());
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let reg = KeyRegistry::from_secrets([(1, [7u8; KEY_LEN])]).unwrap();
        let fp = reg.get(1).unwrap().fingerprint();
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, reg.get(1).unwrap().fingerprint());
    }

    #[test]
    fn from_secrets_rejects_empty_and_zero() {
        assert!(KeyRegistry::from_secrets(Vec::<(u32, [u8; KEY_LEN])>::new()).is_err());
        assert!(KeyRegistry::from_secrets([(0, [1u8; KEY_LEN])]).is_err());
    }

    #[test]
    fn debug_redacts_secret() {
        let reg = KeyRegistry::from_secrets([(1, [9u8; KEY_LEN])]).unwrap();
        let dbg = format!("{:?}", reg.get(1).unwrap());
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("9, 9"));
    }

    #[test]
    fn concurrent_first_access_initialises_once() {
        let reg = std::sync::Arc::new(registry(&[(1, HEX_A), (2, HEX_B)], Environment::Production));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = std::sync::Arc::clone(&reg);
                std::thread::spawn(move || reg.get(2).unwrap() as *const KeyVersion as usize)
            })
            .collect();
        let ptrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(ptrs.windows(2).all(|w| w[0] == w[1]));
    }
}
