mod db_commands;
mod doctor_commands;
mod keys_commands;
mod rotate_commands;

use std::{path::PathBuf, process::ExitCode, sync::Arc};

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    credvault_config::{CredvaultConfig, Severity},
    credvault_rotation::store_sqlite::SqliteStore,
    tracing::{debug, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(
    name = "credvault",
    version,
    about = "Envelope encryption and key rotation for stored marketplace credentials"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery of ./credvault.toml and ~/.config/credvault/).
    #[arg(long, global = true, env = "CREDVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL (overrides `database.url`).
    #[arg(long, global = true, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-encrypt stored credentials onto a key version.
    Rotate(rotate_commands::RotateArgs),
    /// Show which key versions stored credentials are encrypted with.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Encryption key management.
    Keys {
        #[command(subcommand)]
        action: keys_commands::KeyAction,
    },
    /// Database management.
    Db {
        #[command(subcommand)]
        action: db_commands::DbAction,
    },
    /// Check configuration, key material and database in one pass.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config file, then `CREDVAULT_ENV` / `DATABASE_URL`, then command-line flags.
fn resolve_config(cli: &Cli) -> anyhow::Result<CredvaultConfig> {
    let mut config = credvault_config::load_or_discover(cli.config.as_deref())?;
    credvault_config::apply_env_overrides(&mut config)?;
    if let Some(url) = &cli.database_url {
        config.database.url.clone_from(url);
    }
    debug!(environment = %config.environment, "configuration resolved");
    Ok(config)
}

/// [`resolve_config`] plus validation. Errors abort, warnings are logged.
fn load_settings(cli: &Cli) -> anyhow::Result<CredvaultConfig> {
    let config = resolve_config(cli)?;
    let result = credvault_config::validate(&config);
    for diagnostic in &result.diagnostics {
        if diagnostic.severity == Severity::Warning {
            warn!(path = %diagnostic.path, "{}", diagnostic.message);
        }
    }
    if result.has_errors() {
        let errors: Vec<String> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(ToString::to_string)
            .collect();
        bail!("invalid configuration:\n  {}", errors.join("\n  "));
    }
    Ok(config)
}

async fn open_store(config: &CredvaultConfig) -> anyhow::Result<Arc<SqliteStore>> {
    let store = SqliteStore::new(&config.database.url).await?;
    Ok(Arc::new(store))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    debug!(version = env!("CARGO_PKG_VERSION"), "credvault starting");

    match &cli.command {
        Commands::Rotate(args) => {
            let config = load_settings(&cli)?;
            rotate_commands::handle_rotate(&config, args).await
        },
        Commands::Status { json } => {
            let config = load_settings(&cli)?;
            rotate_commands::handle_status(&config, *json).await
        },
        Commands::Keys { action } => {
            let config = load_settings(&cli)?;
            keys_commands::handle_keys(&config, action)
        },
        Commands::Db { action } => {
            let config = load_settings(&cli)?;
            db_commands::handle_db(&config, action).await
        },
        Commands::Doctor => {
            let config = resolve_config(&cli)?;
            doctor_commands::handle_doctor(&config).await
        },
    }
}
