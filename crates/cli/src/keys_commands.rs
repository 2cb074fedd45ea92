use std::process::ExitCode;

use {
    clap::Subcommand,
    credvault_config::CredvaultConfig,
    credvault_vault::{EnvelopeCodec, KeyRegistry, generate_key_hex},
};

#[derive(Subcommand)]
pub enum KeyAction {
    /// List loaded key versions with their origin and fingerprint.
    List,
    /// Print a new random 256-bit key as hex.
    Generate {
        /// Print as an assignment to the variable for this key version.
        #[arg(long, value_name = "N")]
        for_version: Option<u32>,
    },
    /// Encrypt and decrypt a probe value with every loaded key version.
    Verify,
}

pub fn handle_keys(config: &CredvaultConfig, action: &KeyAction) -> anyhow::Result<ExitCode> {
    match action {
        KeyAction::List => list_keys(config),
        KeyAction::Generate { for_version } => {
            let key = generate_key_hex();
            match for_version {
                Some(v) => println!("{}={key}", config.keys.versioned_name(*v)),
                None => println!("{key}"),
            }
            Ok(ExitCode::SUCCESS)
        },
        KeyAction::Verify => verify_keys(config),
    }
}

fn list_keys(config: &CredvaultConfig) -> anyhow::Result<ExitCode> {
    let registry = KeyRegistry::from_config(config);
    let latest = registry.latest()?;

    println!("Environment: {}", registry.environment());
    for key in registry.versions()? {
        let marker = if key.version() == latest {
            "  (latest)"
        } else {
            ""
        };
        println!(
            "  v{:<3} {}  {}{marker}",
            key.version(),
            key.fingerprint(),
            key.origin()
        );
    }
    if registry.uses_development_key()? {
        eprintln!(
            "warning: no {} key is configured; the insecure development key is in use",
            config.keys.env_prefix
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn verify_keys(config: &CredvaultConfig) -> anyhow::Result<ExitCode> {
    let registry = KeyRegistry::from_config(config);
    let checks = EnvelopeCodec::new().verify_keys(&registry)?;

    let mut failed = 0usize;
    for check in &checks {
        match &check.error {
            None => println!("  v{}: ok", check.version),
            Some(error) => {
                failed += 1;
                println!("  v{}: FAILED ({error})", check.version);
            },
        }
    }

    if failed > 0 {
        eprintln!("{failed} of {} key version(s) failed", checks.len());
        return Ok(ExitCode::FAILURE);
    }
    println!("{} key version(s) verified", checks.len());
    Ok(ExitCode::SUCCESS)
}
