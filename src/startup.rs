use crate::config::{Config, SmsGatewayMode};
use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub sms_gateway: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.environment && self.database && self.sms_gateway
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("SMS Gateway Config:    {}", status(self.sms_gateway));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        sms_gateway: true,
        errors: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if let Err(e) = validate_sms_gateway(config) {
        report.sms_gateway = false;
        report.errors.push(format!("SMS Gateway: {}", e));
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.payment.timeout_minutes <= 0 {
        anyhow::bail!("PAYMENT_TIMEOUT_MINUTES must be greater than 0");
    }
    if config.payment.sweep_interval_secs == 0 {
        anyhow::bail!("PAYMENT_SWEEP_INTERVAL_SECS must be greater than 0");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    // Check if migrations are up to date
    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

fn validate_sms_gateway(config: &Config) -> Result<()> {
    if config.sms_gateway_mode == SmsGatewayMode::Log {
        return Ok(());
    }

    url::Url::parse(&config.sms_gateway_url).context("SMS_GATEWAY_URL is not a valid URL")?;

    if config.sms_username.is_empty() {
        anyhow::bail!("SMS_USERNAME is required in http mode");
    }
    if config.sms_api_key.is_empty() {
        anyhow::bail!("SMS_API_KEY is required in http mode");
    }

    Ok(())
}
