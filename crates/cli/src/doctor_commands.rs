//! `credvault doctor`: configuration, key material and database checks.
//!
//! Prints a report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or `[info]`
//! status indicators per item.

use std::{process::ExitCode, sync::Arc};

use {
    credvault_config::{CredvaultConfig, Severity},
    credvault_rotation::UsageReporter,
    credvault_vault::{EnvelopeCodec, KeyRegistry},
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Skip => "skip",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Skip => DIM,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

struct Section {
    title: String,
    items: Vec<CheckItem>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push(CheckItem {
            status,
            message: message.into(),
        });
    }
}

fn print_report(sections: &[Section]) -> (usize, usize) {
    let mut errors = 0usize;
    let mut warnings = 0usize;

    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for item in &section.items {
            let color = item.status.color();
            let label = item.status.label();
            eprintln!("  [{color}{label}{RESET}]  {}", item.message);
            match item.status {
                Status::Fail => errors += 1,
                Status::Warn => warnings += 1,
                _ => {},
            }
        }
        eprintln!();
    }

    (errors, warnings)
}

pub async fn handle_doctor(config: &CredvaultConfig) -> anyhow::Result<ExitCode> {
    eprintln!("{BOLD}credvault doctor{RESET}");
    eprintln!("{BOLD}================{RESET}\n");

    let registry = Arc::new(KeyRegistry::from_config(config));

    let mut sections = vec![check_config(config), check_keys(config, &registry)];
    sections.push(check_database(config, &registry).await);

    let (errors, warnings) = print_report(&sections);
    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    Ok(if errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn check_config(config: &CredvaultConfig) -> Section {
    let mut section = Section::new("Config");
    section.push(Status::Info, format!("environment: {}", config.environment));

    let result = credvault_config::validate(config);
    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "no problems found");
    }
    for d in &result.diagnostics {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
            Severity::Info => Status::Info,
        };
        section.push(status, format!("{}: {}", d.path, d.message));
    }
    section
}

fn check_keys(config: &CredvaultConfig, registry: &KeyRegistry) -> Section {
    let mut section = Section::new(format!("Encryption keys ({}*)", config.keys.env_prefix));

    if let Err(e) = registry.initialize() {
        section.push(Status::Fail, e.to_string());
        return section;
    }

    if registry.uses_development_key().unwrap_or(false) {
        section.push(
            Status::Warn,
            "no key configured; using the INSECURE development key",
        );
    }

    match EnvelopeCodec::new().verify_keys(registry) {
        Ok(checks) => {
            let latest = registry.latest().unwrap_or_default();
            for check in checks {
                let origin = registry
                    .get(check.version)
                    .map(|k| format!("{}, {}", k.origin(), k.fingerprint()))
                    .unwrap_or_default();
                let latest_marker = if check.version == latest {
                    ", latest"
                } else {
                    ""
                };
                match check.error {
                    None => section.push(
                        Status::Ok,
                        format!("v{} ({origin}{latest_marker})", check.version),
                    ),
                    Some(error) => section.push(
                        Status::Fail,
                        format!("v{} ({origin}): {error}", check.version),
                    ),
                }
            }
        },
        Err(e) => section.push(Status::Fail, e.to_string()),
    }
    section
}

async fn check_database(config: &CredvaultConfig, registry: &Arc<KeyRegistry>) -> Section {
    let mut section = Section::new(format!("Database ({})", config.database.url));

    let store = match crate::open_store(config).await {
        Ok(store) => {
            section.push(Status::Ok, "connected, migrations applied");
            store
        },
        Err(e) => {
            section.push(Status::Fail, format!("cannot open database: {e}"));
            return section;
        },
    };

    if registry.initialize().is_err() {
        section.push(Status::Skip, "key usage (keys did not load)");
        return section;
    }

    match UsageReporter::new(store, Arc::clone(registry)).report().await {
        Ok(report) if report.records_needing_rotation > 0 => section.push(
            Status::Warn,
            format!(
                "{} of {} active record(s) not on v{}; run `credvault rotate`",
                report.records_needing_rotation, report.total_records, report.latest_version
            ),
        ),
        Ok(report) => section.push(
            Status::Ok,
            format!(
                "{} active record(s), all on v{}",
                report.total_records, report.latest_version
            ),
        ),
        Err(e) => section.push(Status::Fail, format!("cannot read credentials: {e}")),
    }
    section
}
