use dotenvy::dotenv;
use serde::Deserialize;
use sqlx::types::BigDecimal;
use std::env;

const DEFAULT_TIMEOUT_MINUTES: i64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

const DEFAULT_INSTRUCTIONS_TEMPLATE: &str = "Complete your payment of {amount} {currency} \
for {course_title}. Dial {ussd_code} and use reference: {reference_code}";
const DEFAULT_CONFIRMED_TEMPLATE: &str = "Payment confirmed! You now have access to \
{course_title}. Reference: {reference_code}";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub sms_gateway_mode: SmsGatewayMode,
    pub sms_gateway_url: String,
    pub sms_username: String,
    pub sms_api_key: String,
    pub sms_sender_id: String,
    pub payment: PaymentSettings,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsGatewayMode {
    /// Log outbound messages instead of sending. Development default.
    Log,
    /// POST to the configured SMS gateway.
    Http,
}

/// Payment workflow tuning, passed to the processor at construction time.
/// There is no settings row in the database; callers own the defaults.
#[derive(Debug, Deserialize, Clone)]
pub struct PaymentSettings {
    pub timeout_minutes: i64,
    pub sweep_interval_secs: u64,
    pub instructions_template: String,
    pub confirmed_template: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            timeout_minutes: DEFAULT_TIMEOUT_MINUTES,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            instructions_template: DEFAULT_INSTRUCTIONS_TEMPLATE.to_string(),
            confirmed_template: DEFAULT_CONFIRMED_TEMPLATE.to_string(),
        }
    }
}

impl PaymentSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            timeout_minutes: match env::var("PAYMENT_TIMEOUT_MINUTES") {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.timeout_minutes,
            },
            sweep_interval_secs: match env::var("PAYMENT_SWEEP_INTERVAL_SECS") {
                Ok(raw) => raw.parse()?,
                Err(_) => defaults.sweep_interval_secs,
            },
            instructions_template: env::var("PAYMENT_INSTRUCTIONS_TEMPLATE")
                .unwrap_or(defaults.instructions_template),
            confirmed_template: env::var("PAYMENT_CONFIRMED_TEMPLATE")
                .unwrap_or(defaults.confirmed_template),
        })
    }

    pub fn timeout(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.timeout_minutes)
    }

    pub fn render_instructions(
        &self,
        amount: &BigDecimal,
        currency: &str,
        course_title: &str,
        ussd_code: &str,
        reference_code: &str,
    ) -> String {
        self.instructions_template
            .replace("{amount}", &amount.to_string())
            .replace("{currency}", currency)
            .replace("{course_title}", course_title)
            .replace("{ussd_code}", ussd_code)
            .replace("{reference_code}", reference_code)
    }

    pub fn render_confirmed(&self, course_title: &str, reference_code: &str) -> String {
        self.confirmed_template
            .replace("{course_title}", course_title)
            .replace("{reference_code}", reference_code)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let sms_gateway_mode = match env::var("SMS_GATEWAY_MODE")
            .unwrap_or_else(|_| "log".to_string())
            .to_lowercase()
            .as_str()
        {
            "http" => SmsGatewayMode::Http,
            _ => SmsGatewayMode::Log,
        };

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            sms_gateway_mode,
            sms_gateway_url: env::var("SMS_GATEWAY_URL")
                .unwrap_or_else(|_| "https://api.africastalking.com".to_string()),
            sms_username: env::var("SMS_USERNAME").unwrap_or_default(),
            sms_api_key: env::var("SMS_API_KEY").unwrap_or_default(),
            sms_sender_id: env::var("SMS_SENDER_ID").unwrap_or_default(),
            payment: PaymentSettings::from_env()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn default_timeout_is_thirty_minutes() {
        let settings = PaymentSettings::default();
        assert_eq!(settings.timeout().num_seconds(), 1800);
    }

    #[test]
    fn renders_instruction_template() {
        let settings = PaymentSettings::default();
        let amount = BigDecimal::from_str("150.00").unwrap();

        let body = settings.render_instructions(
            &amount,
            "ZMW",
            "Grade 12 Mathematics",
            "*778#",
            "12345678",
        );

        assert!(body.contains("150.00 ZMW"));
        assert!(body.contains("Grade 12 Mathematics"));
        assert!(body.contains("*778#"));
        assert!(body.contains("reference: 12345678"));
    }

    #[test]
    fn renders_confirmation_template() {
        let settings = PaymentSettings::default();
        let body = settings.render_confirmed("Grade 12 Mathematics", "12345678");

        assert!(body.contains("Payment confirmed"));
        assert!(body.contains("Grade 12 Mathematics"));
        assert!(body.contains("12345678"));
    }

    #[test]
    fn custom_template_wins_over_default() {
        let settings = PaymentSettings {
            confirmed_template: "Paid: {reference_code}".to_string(),
            ..PaymentSettings::default()
        };

        assert_eq!(settings.render_confirmed("ignored", "87654321"), "Paid: 87654321");
    }
}
