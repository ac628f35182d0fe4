//! Outbound SMS channel.
//!
//! The gateway is a send-only seam: callers record the notification row
//! first and treat dispatch failures as non-fatal.

use async_trait::async_trait;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, SmsGatewayMode};
use crate::error::AppError;

#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, message: &str) -> Result<(), AppError>;
}

/// Africa's Talking style messaging API client.
#[derive(Clone)]
pub struct HttpSmsGateway {
    client: Client,
    base_url: String,
    username: String,
    api_key: String,
    sender_id: String,
}

impl HttpSmsGateway {
    pub fn new(base_url: String, username: String, api_key: String, sender_id: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            username,
            api_key,
            sender_id,
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &str, message: &str) -> Result<(), AppError> {
        let url = format!(
            "{}/version1/messaging",
            self.base_url.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("apiKey", &self.api_key)
            .header(header::ACCEPT, "application/json")
            .form(&[
                ("username", self.username.as_str()),
                ("to", to),
                ("message", message),
                ("from", self.sender_id.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Dispatch(format!("SMS gateway request failed: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::Dispatch(format!(
                "SMS gateway returned status {}",
                response.status()
            )))
        }
    }
}

/// Logs instead of sending. Default outside production so the workflow can
/// be exercised without a gateway account.
pub struct LogSmsGateway;

#[async_trait]
impl SmsGateway for LogSmsGateway {
    async fn send(&self, to: &str, message: &str) -> Result<(), AppError> {
        tracing::info!(to = %to, message = %message, "sms (log gateway)");
        Ok(())
    }
}

pub fn gateway_from_config(config: &Config) -> Arc<dyn SmsGateway> {
    match config.sms_gateway_mode {
        SmsGatewayMode::Http => Arc::new(HttpSmsGateway::new(
            config.sms_gateway_url.clone(),
            config.sms_username.clone(),
            config.sms_api_key.clone(),
            config.sms_sender_id.clone(),
        )),
        SmsGatewayMode::Log => Arc::new(LogSmsGateway),
    }
}
