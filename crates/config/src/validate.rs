//! Semantic validation of a loaded configuration.

use crate::schema::CredvaultConfig;

/// Highest key version slot the discovery loop will accept.
const MAX_VERSION_LIMIT: u32 = 99;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "rotation.batch_size"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn new(severity: Severity, path: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Check a configuration for values that would make rotation unsafe or useless.
#[must_use]
pub fn validate(config: &CredvaultConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if config.rotation.batch_size == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "rotation.batch_size",
            "must be at least 1",
        ));
    }

    if config.rotation.preview_limit == 0 {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "rotation.preview_limit",
            "dry-run previews will list no record ids",
        ));
    }

    if !(1..=MAX_VERSION_LIMIT).contains(&config.keys.max_version) {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "keys.max_version",
            format!("must be between 1 and {MAX_VERSION_LIMIT}"),
        ));
    }

    if config.keys.env_prefix.trim().is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Error,
            "keys.env_prefix",
            "must not be empty",
        ));
    }

    if config.environment.is_production() && config.database.url.contains(":memory:") {
        diagnostics.push(Diagnostic::new(
            Severity::Warning,
            "database.url",
            "production profile is using an in-memory database",
        ));
    }

    ValidationResult { diagnostics }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::schema::Environment};

    #[test]
    fn default_config_is_clean() {
        let result = validate(&CredvaultConfig::default());
        assert!(result.diagnostics.is_empty());
        assert!(!result.has_errors());
    }

    #[test]
    fn zero_batch_size_is_error() {
        let mut cfg = CredvaultConfig::default();
        cfg.rotation.batch_size = 0;
        let result = validate(&cfg);
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "rotation.batch_size");
    }

    #[test]
    fn out_of_range_max_version() {
        let mut cfg = CredvaultConfig::default();
        cfg.keys.max_version = 0;
        assert!(validate(&cfg).has_errors());
        cfg.keys.max_version = 100;
        assert!(validate(&cfg).has_errors());
        cfg.keys.max_version = 99;
        assert!(!validate(&cfg).has_errors());
    }

    #[test]
    fn production_memory_database_warns() {
        let mut cfg = CredvaultConfig::default();
        cfg.environment = Environment::Production;
        cfg.database.url = "sqlite::memory:".into();
        cfg.rotation.preview_limit = 0;
        let result = validate(&cfg);
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 2);
    }
}
