use std::process::ExitCode;

use {
    clap::Subcommand, credvault_config::CredvaultConfig, sqlx::sqlite::SqlitePoolOptions,
    tracing::info,
};

#[derive(Subcommand)]
pub enum DbAction {
    /// Run all pending database migrations.
    Migrate,
}

pub async fn handle_db(config: &CredvaultConfig, action: &DbAction) -> anyhow::Result<ExitCode> {
    match action {
        DbAction::Migrate => run_migrations(&config.database.url).await,
    }
}

async fn run_migrations(url: &str) -> anyhow::Result<ExitCode> {
    let pool = SqlitePoolOptions::new().max_connections(1).connect(url).await?;
    credvault_rotation::run_migrations(&pool).await?;
    pool.close().await;

    info!("migrations applied");
    println!("Database migrations applied.");
    Ok(ExitCode::SUCCESS)
}
