//! Inbound SMS webhook.
//!
//! Deliberately unauthenticated and lenient: the upstream SMS aggregator
//! forwards everything it receives, most of which is unrelated traffic.
//! A non-matching message still gets a 200 so the aggregator does not
//! retry; only an unusable payload is a client error.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;

use crate::domain::InboundSmsOutcome;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SmsWebhookPayload {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub from: String,
}

pub async fn sms_webhook(
    State(state): State<AppState>,
    Json(payload): Json<SmsWebhookPayload>,
) -> Result<impl IntoResponse, AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::Validation("No message content".to_string()));
    }

    let outcome = state
        .processor
        .update_from_inbound_message(&payload.message, &payload.from)
        .await?;

    let (success, message) = match outcome {
        InboundSmsOutcome::MatchedSuccess => (true, "SMS processed successfully"),
        InboundSmsOutcome::MatchedFailure => (false, "Payment failure recorded"),
        InboundSmsOutcome::NoMatch => (false, "No matching transaction found"),
    };

    Ok(Json(json!({ "success": success, "message": message })))
}
