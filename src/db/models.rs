use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::BigDecimal;
use uuid::Uuid;

use crate::domain::TransactionStatus;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub provider_id: Uuid,
    /// Normalized 9-digit local subscriber number.
    pub phone_number: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub reference_code: String,
    pub external_reference: Option<String>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        user_id: Uuid,
        course_id: Uuid,
        provider_id: Uuid,
        phone_number: String,
        amount: BigDecimal,
        currency: String,
        reference_code: String,
        timeout: chrono::Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            provider_id,
            phone_number,
            amount,
            currency,
            reference_code,
            external_reference: None,
            status: TransactionStatus::Initiated.as_str().to_string(),
            failure_reason: None,
            // expires_at is fixed at creation and never moves afterward
            expires_at: now + timeout,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> Option<TransactionStatus> {
        TransactionStatus::parse(&self.status)
    }

    /// Past its deadline while still waiting on the payer.
    pub fn is_expired(&self) -> bool {
        self.status().is_some_and(|s| s.is_active()) && Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MobileProvider {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub ussd_code: String,
    pub merchant_code: Option<String>,
    pub business_number: Option<String>,
    pub payee_code: Option<String>,
    pub phone_prefixes: Vec<String>,
    pub instructions: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub method: String,
    pub verified_by: Option<Uuid>,
    pub is_successful: bool,
    pub notes: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct SmsNotification {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub phone_number: String,
    pub message: String,
    pub kind: String,
    pub delivered: bool,
    pub delivery_status: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub price: BigDecimal,
    pub currency: String,
    pub is_free: bool,
}

#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub amount_paid: BigDecimal,
    pub payment_status: String,
    pub payment_method: String,
    pub enrolled_at: DateTime<Utc>,
}

/// Transaction row joined with its provider and course display fields,
/// the shape the API serializes.
#[derive(Debug, FromRow, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub phone_number: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub reference_code: String,
    pub status: String,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub provider_name: String,
    pub course_title: String,
}

impl TransactionDetail {
    pub fn is_expired(&self) -> bool {
        TransactionStatus::parse(&self.status).is_some_and(|s| s.is_active())
            && Utc::now() > self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn sample_transaction() -> Transaction {
        Transaction::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "977123456".to_string(),
            BigDecimal::from_str("150.00").unwrap(),
            "ZMW".to_string(),
            "12345678".to_string(),
            chrono::Duration::minutes(30),
        )
    }

    #[test]
    fn new_transaction_starts_initiated() {
        let tx = sample_transaction();
        assert_eq!(tx.status(), Some(TransactionStatus::Initiated));
        assert!(tx.confirmed_at.is_none());
        assert!(tx.failure_reason.is_none());
    }

    #[test]
    fn expiry_window_matches_timeout() {
        let tx = sample_transaction();
        assert_eq!((tx.expires_at - tx.created_at).num_seconds(), 1800);
    }

    #[test]
    fn fresh_transaction_is_not_expired() {
        let tx = sample_transaction();
        assert!(!tx.is_expired());
    }

    #[test]
    fn past_deadline_pending_is_expired() {
        let mut tx = sample_transaction();
        tx.status = TransactionStatus::Pending.as_str().to_string();
        tx.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(tx.is_expired());
    }

    #[test]
    fn terminal_statuses_never_report_expired() {
        let mut tx = sample_transaction();
        tx.status = TransactionStatus::Confirmed.as_str().to_string();
        tx.expires_at = Utc::now() - chrono::Duration::minutes(1);
        assert!(!tx.is_expired());
    }
}
