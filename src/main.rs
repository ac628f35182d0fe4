use clap::Parser;
use sqlx::migrate::Migrator;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use kwacha_core::cli::{self, Cli, Commands, DbCommands, PaymentCommands, ProviderCommands};
use kwacha_core::config::Config;
use kwacha_core::services::{gateway_from_config, PaymentProcessor, ReferenceCodeGenerator};
use kwacha_core::{create_app, db, startup, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Payments(PaymentCommands::Expire) => {
            let pool = db::create_pool(&config).await?;
            let processor = build_processor(&config, pool);
            cli::handle_payments_expire(&processor).await
        }
        Commands::Payments(PaymentCommands::Remind { reference_code }) => {
            let pool = db::create_pool(&config).await?;
            let processor = build_processor(&config, pool.clone());
            cli::handle_payments_remind(&pool, &processor, &reference_code).await
        }
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Providers(ProviderCommands::Seed) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_providers_seed(&pool).await
        }
        Commands::Config => cli::handle_config_validate(&config),
    }
}

fn build_processor(config: &Config, pool: sqlx::PgPool) -> PaymentProcessor {
    PaymentProcessor::new(
        pool,
        config.payment.clone(),
        Arc::new(ReferenceCodeGenerator::new()),
        gateway_from_config(config),
    )
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;

    let migrator = Migrator::new(Path::new("./migrations")).await?;
    migrator.run(&pool).await?;
    tracing::info!("Database migrations completed");

    let report = startup::validate_environment(&config, &pool).await?;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("startup validation failed");
    }

    let processor = build_processor(&config, pool.clone());

    // Periodic expiry sweep; each pass is one bulk conditional update.
    let sweep = processor.clone();
    let sweep_interval = config.payment.sweep_interval_secs;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(tokio::time::Duration::from_secs(sweep_interval));
        loop {
            ticker.tick().await;
            if let Err(err) = sweep.expire_pending().await {
                tracing::error!(error = %err, "expiry sweep failed");
            }
        }
    });

    let app_state = AppState {
        db: pool,
        processor,
    };
    let app = create_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
