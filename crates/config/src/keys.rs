//! Discovery of raw (still hex-encoded) key material from the environment.
//!
//! Decoding and validation happen later in the vault's key registry; this
//! module only decides which variable supplies which version.

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, warn},
};

use crate::schema::KeysConfig;

/// One configured key, exactly as found in the environment.
#[derive(Debug)]
pub struct RawKey {
    pub version: u32,
    /// Variable the value was read from, e.g. `ENCRYPTION_KEY_V2`.
    pub variable: String,
    /// Whether the value came from the legacy unversioned variable.
    pub legacy: bool,
    pub value: Secret<String>,
}

/// All keys discovered for one process, ascending by version.
#[derive(Debug, Default)]
pub struct KeyMaterial {
    pub keys: Vec<RawKey>,
}

impl KeyMaterial {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Build material from `(version, hex)` pairs. Intended for tests and embedding.
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (u32, &'a str)>) -> Self {
        let mut keys: Vec<RawKey> = pairs
            .into_iter()
            .map(|(version, hex)| RawKey {
                version,
                variable: format!("inline_v{version}"),
                legacy: false,
                value: Secret::new(hex.to_string()),
            })
            .collect();
        keys.sort_by_key(|k| k.version);
        Self { keys }
    }
}

/// Collect key material from the process environment.
pub fn collect_key_material(config: &KeysConfig) -> KeyMaterial {
    collect_key_material_with(config, |name| std::env::var(name).ok())
}

/// Collect key material using a custom lookup function.
///
/// Version 1 comes from `<prefix>_V1`, falling back to the legacy `<prefix>`.
/// Versions `2..=max_version` are probed individually, so gaps are allowed.
pub fn collect_key_material_with(
    config: &KeysConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> KeyMaterial {
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    let mut keys = Vec::new();

    let explicit = read(&config.versioned_name(1));
    let legacy = read(&config.legacy_name());
    if let (Some(v1), Some(old)) = (&explicit, &legacy)
        && v1.trim() != old.trim()
    {
        warn!(
            explicit = %config.versioned_name(1),
            legacy = %config.legacy_name(),
            "both primary key variables are set with different values, using the explicit one"
        );
    }

    match (explicit, legacy) {
        (Some(value), _) => keys.push(RawKey {
            version: 1,
            variable: config.versioned_name(1),
            legacy: false,
            value: Secret::new(value),
        }),
        (None, Some(value)) => keys.push(RawKey {
            version: 1,
            variable: config.legacy_name(),
            legacy: true,
            value: Secret::new(value),
        }),
        (None, None) => debug!(prefix = %config.env_prefix, "no primary key configured"),
    }

    for version in 2..=config.max_version {
        let variable = config.versioned_name(version);
        if let Some(value) = read(&variable) {
            keys.push(RawKey {
                version,
                variable,
                legacy: false,
                value: Secret::new(value),
            });
        }
    }

    debug!(
        versions = ?keys.iter().map(|k| k.version).collect::<Vec<_>>(),
        "discovered key material"
    );
    KeyMaterial { keys }
}

impl RawKey {
    /// The configured value with surrounding whitespace removed.
    #[must_use]
    pub fn trimmed(&self) -> &str {
        self.value.expose_secret().trim()
    }
}
