//! Payment workflow endpoints.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::types::BigDecimal;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{MobileProvider, TransactionDetail};
use crate::db::queries;
use crate::error::AppError;
use crate::middleware::UserId;
use crate::phone;
use crate::services::instructions;
use crate::validation;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    pub course_id: Uuid,
    pub provider: String,
    pub phone_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: Uuid,
    pub reference_code: String,
    pub provider_name: String,
    pub course_title: String,
    pub phone_number: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub is_expired: bool,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub failure_reason: Option<String>,
}

impl From<TransactionDetail> for TransactionResponse {
    fn from(detail: TransactionDetail) -> Self {
        let is_expired = detail.is_expired();
        Self {
            id: detail.id,
            reference_code: detail.reference_code,
            provider_name: detail.provider_name,
            course_title: detail.course_title,
            phone_number: phone::format_for_display(&detail.phone_number),
            amount: detail.amount,
            currency: detail.currency,
            status: detail.status,
            is_expired,
            expires_at: detail.expires_at,
            confirmed_at: detail.confirmed_at,
            created_at: detail.created_at,
            failure_reason: detail.failure_reason,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub reference_code: String,
    pub status: String,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub currency: String,
    pub provider: String,
    pub course_title: String,
    pub expires_at: DateTime<Utc>,
    pub is_expired: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TransactionDetail> for StatusResponse {
    fn from(detail: TransactionDetail) -> Self {
        let is_expired = detail.is_expired();
        Self {
            reference_code: detail.reference_code,
            status: detail.status,
            amount: detail.amount,
            currency: detail.currency,
            provider: detail.provider_name,
            course_title: detail.course_title,
            expires_at: detail.expires_at,
            is_expired,
            created_at: detail.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderResponse {
    pub name: String,
    pub display_name: String,
    pub ussd_code: String,
    pub phone_prefixes: Vec<String>,
    pub instructions: String,
}

impl From<MobileProvider> for ProviderResponse {
    fn from(provider: MobileProvider) -> Self {
        Self {
            name: provider.name,
            display_name: provider.display_name,
            ussd_code: provider.ussd_code,
            phone_prefixes: provider.phone_prefixes,
            instructions: provider.instructions,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidatePhoneRequest {
    pub phone_number: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ValidatePhoneResponse {
    pub is_valid: bool,
    pub formatted_phone: String,
    pub detected_provider: Option<String>,
    pub clean_phone: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_provider_name(&payload.provider)?;
    validation::validate_phone_number(&payload.phone_number)?;

    let course = queries::get_course(&state.db, payload.course_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    queries::ensure_user(&state.db, user_id).await?;

    // Free courses never reach the payment manager; enroll directly.
    if course.is_free || course.price <= BigDecimal::from(0) {
        let mut db_tx = state.db.begin().await?;
        let enrollment =
            queries::get_or_create_enrollment(&mut db_tx, user_id, course.id, &course.price, "free")
                .await?;
        db_tx.commit().await?;

        return Ok(Json(json!({
            "message": "Enrolled successfully. This course is free.",
            "enrollment": enrollment,
        })));
    }

    if queries::enrollment_exists(&state.db, user_id, course.id).await? {
        return Err(AppError::Conflict(
            "Already enrolled in this course".to_string(),
        ));
    }

    // Idempotent retry: an unexpired attempt in flight is returned as-is
    // instead of minting a second reference code.
    if let Some(existing) = queries::find_active_transaction(&state.db, user_id, course.id).await? {
        if !existing.is_expired() {
            let detail = queries::get_transaction_detail(&state.db, &existing.reference_code)
                .await?
                .ok_or_else(|| AppError::Internal("active transaction vanished".to_string()))?;

            return Ok(Json(json!({
                "message": "Payment already in progress",
                "transaction": TransactionResponse::from(detail),
            })));
        }
    }

    let transaction = state
        .processor
        .initiate(user_id, &course, &payload.provider, &payload.phone_number)
        .await?;

    let provider = queries::get_provider_by_id(&state.db, transaction.provider_id)
        .await?
        .ok_or_else(|| AppError::Internal("provider row vanished".to_string()))?;
    let ussd = instructions::for_transaction(&provider, &transaction);

    let detail = queries::get_transaction_detail(&state.db, &transaction.reference_code)
        .await?
        .ok_or_else(|| AppError::Internal("transaction detail vanished".to_string()))?;

    Ok(Json(json!({
        "transaction": TransactionResponse::from(detail),
        "instructions": ussd,
        "message": "Payment initiated successfully. Follow the USSD instructions to complete payment.",
    })))
}

#[utoipa::path(
    get,
    path = "/payments/status/{reference_code}",
    params(
        ("reference_code" = String, Path, description = "8-digit payment reference code")
    ),
    responses(
        (status = 200, description = "Current transaction status", body = StatusResponse),
        (status = 404, description = "Unknown reference code")
    ),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(reference_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let detail = queries::get_transaction_detail(&state.db, &reference_code)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(StatusResponse::from(detail)))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(reference_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let not_cancellable =
        || AppError::NotFound("Transaction not found or cannot be cancelled".to_string());

    let transaction = queries::get_transaction_for_user(&state.db, &reference_code, user_id)
        .await?
        .filter(|t| t.status().is_some_and(|s| s.is_cancellable()))
        .ok_or_else(not_cancellable)?;

    // The conditional update can still lose to a concurrent confirmation
    // or the expiry sweep; report that the same way as "not found".
    if state.processor.cancel(&transaction).await? {
        Ok(Json(json!({ "message": "Payment cancelled successfully" })))
    } else {
        Err(not_cancellable())
    }
}

pub async fn payment_instructions(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(reference_code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let transaction = queries::get_transaction_for_user(&state.db, &reference_code, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    let provider = queries::get_provider_by_id(&state.db, transaction.provider_id)
        .await?
        .ok_or_else(|| AppError::Internal("provider row vanished".to_string()))?;
    let ussd = instructions::for_transaction(&provider, &transaction);
    let qr_code_data = format!("tel:{}", ussd.ussd_code);

    let detail = queries::get_transaction_detail(&state.db, &reference_code)
        .await?
        .ok_or_else(|| AppError::Internal("transaction detail vanished".to_string()))?;

    Ok(Json(json!({
        "transaction": TransactionResponse::from(detail),
        "instructions": ussd,
        "qr_code_data": qr_code_data,
    })))
}

#[utoipa::path(
    post,
    path = "/payments/validate-phone",
    request_body = ValidatePhoneRequest,
    responses(
        (status = 200, description = "Validation verdict", body = ValidatePhoneResponse)
    ),
    tag = "Payments"
)]
pub async fn validate_phone(
    Json(payload): Json<ValidatePhoneRequest>,
) -> Result<impl IntoResponse, AppError> {
    validation::validate_required("phone_number", &payload.phone_number)?;

    let clean_phone = phone::clean(&payload.phone_number);

    Ok(Json(ValidatePhoneResponse {
        is_valid: clean_phone.len() == 9,
        formatted_phone: phone::format_for_display(&payload.phone_number),
        detected_provider: phone::detect_provider(&payload.phone_number).map(str::to_string),
        clean_phone,
    }))
}

pub async fn list_providers(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let providers = queries::list_active_providers(&state.db).await?;

    Ok(Json(
        providers
            .into_iter()
            .map(ProviderResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn list_transactions(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse, AppError> {
    let limit = pagination.limit.unwrap_or(20).clamp(1, 100);
    let offset = pagination.offset.unwrap_or(0).max(0);

    let details =
        queries::list_user_transaction_details(&state.db, user_id, limit, offset).await?;

    Ok(Json(
        details
            .into_iter()
            .map(TransactionResponse::from)
            .collect::<Vec<_>>(),
    ))
}
