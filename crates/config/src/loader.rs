use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::{CredvaultConfig, Environment},
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "credvault.toml",
    "credvault.yaml",
    "credvault.yml",
    "credvault.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<CredvaultConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::read(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./credvault.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/credvault/credvault.{toml,yaml,yml,json}` (user-global)
///
/// Returns `CredvaultConfig::default()` only when no config file exists. A
/// file that is found but cannot be read or parsed is an error.
pub fn discover_and_load() -> Result<CredvaultConfig> {
    let mut dirs = vec![PathBuf::from(".")];
    dirs.extend(config_dir());
    discover_in(&dirs)
}

/// Load the first config file found in `dirs`, or defaults if there is none.
pub fn discover_in(dirs: &[PathBuf]) -> Result<CredvaultConfig> {
    match find_config_file(dirs) {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)
        },
        None => {
            debug!("no config file found, using defaults");
            Ok(CredvaultConfig::default())
        },
    }
}

/// Load an explicit path when given, otherwise discover.
pub fn load_or_discover(path: Option<&Path>) -> Result<CredvaultConfig> {
    match path {
        Some(path) => load_config(path),
        None => discover_and_load(),
    }
}

/// Apply `CREDVAULT_ENV` and `DATABASE_URL` from the process environment.
pub fn apply_env_overrides(config: &mut CredvaultConfig) -> Result<()> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

/// Apply environment overrides using a custom lookup function.
///
/// An unrecognised `CREDVAULT_ENV` is an error, never a silent fall back to
/// development.
pub fn apply_env_overrides_with(
    config: &mut CredvaultConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(raw) = lookup("CREDVAULT_ENV") {
        config.environment =
            Environment::parse(&raw).ok_or_else(|| ConfigError::InvalidEnvironment {
                variable: "CREDVAULT_ENV".into(),
                value: raw,
            })?;
    }

    if let Some(url) = lookup("DATABASE_URL").filter(|u| !u.trim().is_empty()) {
        config.database.url = url;
    }
    Ok(())
}

/// Find the first config file, trying every file name in a directory before
/// moving to the next one.
fn find_config_file(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/credvault/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "credvault").map(|d| d.config_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> Result<CredvaultConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(ConfigError::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
