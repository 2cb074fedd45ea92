//! Configuration loading, validation, env substitution, and key-material discovery.
//!
//! Config files: `credvault.toml`, `credvault.yaml`, or `credvault.json`
//! Searched in `./` then `~/.config/credvault/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values. Key material itself
//! is never read from the config file; it is discovered from the environment
//! under `<prefix>`, `<prefix>_V1` .. `<prefix>_V<max_version>`.

pub mod env_subst;
pub mod error;
pub mod keys;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    keys::{KeyMaterial, RawKey, collect_key_material, collect_key_material_with},
    loader::{
        apply_env_overrides, apply_env_overrides_with, config_dir, discover_and_load,
        discover_in, load_config, load_or_discover,
    },
    schema::{CredvaultConfig, DatabaseConfig, Environment, KeysConfig, RotationConfig},
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
