//! Config schema types (environment, key discovery, rotation defaults, database).

use serde::{Deserialize, Serialize};

/// Deployment profile. Only `Production` enables fail-fast key validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Parse the value of `CREDVAULT_ENV`. Unknown values yield `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "test" => Some(Self::Test),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Test => write!(f, "test"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredvaultConfig {
    pub environment: Environment,
    pub keys: KeysConfig,
    pub rotation: RotationConfig,
    pub database: DatabaseConfig,
}

/// Where and how far to look for key versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    /// Environment variable prefix. `ENCRYPTION_KEY` yields `ENCRYPTION_KEY`,
    /// `ENCRYPTION_KEY_V1`, `ENCRYPTION_KEY_V2`, ...
    pub env_prefix: String,
    /// Highest version slot probed during discovery.
    pub max_version: u32,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            env_prefix: "ENCRYPTION_KEY".into(),
            max_version: 10,
        }
    }
}

impl KeysConfig {
    /// Name of the legacy, unversioned primary key variable.
    #[must_use]
    pub fn legacy_name(&self) -> String {
        self.env_prefix.clone()
    }

    /// Name of the variable holding key `version`.
    #[must_use]
    pub fn versioned_name(&self, version: u32) -> String {
        format!("{}_V{version}", self.env_prefix)
    }
}

/// Defaults applied to rotation runs when the CLI does not override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Records re-encrypted per sequential batch.
    pub batch_size: usize,
    /// Record ids listed per version in a dry-run preview.
    pub preview_limit: usize,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            preview_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:credvault.db?mode=rwc".into(),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("production", Some(Environment::Production))]
    #[case("PROD", Some(Environment::Production))]
    #[case(" dev ", Some(Environment::Development))]
    #[case("test", Some(Environment::Test))]
    #[case("staging", None)]
    #[case("", None)]
    fn parses_environment(#[case] input: &str, #[case] expected: Option<Environment>) {
        assert_eq!(Environment::parse(input), expected);
    }

    #[test]
    fn defaults_are_development() {
        let cfg = CredvaultConfig::default();
        assert_eq!(cfg.environment, Environment::Development);
        assert!(!cfg.environment.is_production());
        assert_eq!(cfg.keys.max_version, 10);
        assert_eq!(cfg.rotation.batch_size, 50);
    }

    #[test]
    fn key_variable_names() {
        let keys = KeysConfig::default();
        assert_eq!(keys.legacy_name(), "ENCRYPTION_KEY");
        assert_eq!(keys.versioned_name(1), "ENCRYPTION_KEY_V1");
        assert_eq!(keys.versioned_name(7), "ENCRYPTION_KEY_V7");
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: CredvaultConfig = toml::from_str(
            r#"
            environment = "production"

            [rotation]
            batch_size = 5
            "#,
        )
        .unwrap();
        assert!(cfg.environment.is_production());
        assert_eq!(cfg.rotation.batch_size, 5);
        assert_eq!(cfg.rotation.preview_limit, 10);
        assert_eq!(cfg.keys.env_prefix, "ENCRYPTION_KEY");
    }
}
