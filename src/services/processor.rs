//! Payment transaction manager.
//!
//! Owns the lifecycle of a mobile money payment attempt: initiation,
//! confirmation, failure, cancellation and the periodic expiry sweep.
//! Every status transition is a single conditional update in the store,
//! so concurrent callers (an admin click racing an inbound SMS, or the
//! sweep racing a confirmation) cannot double-apply side effects.

use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::PaymentSettings;
use crate::db::models::{Course, Transaction};
use crate::db::queries;
use crate::domain::{InboundSmsOutcome, NotificationKind, TransactionStatus, VerificationMethod};
use crate::error::AppError;
use crate::phone;
use crate::services::reference::ReferenceCodeGenerator;
use crate::services::sms::SmsGateway;
use crate::validation::{validate_positive_amount, NOTES_MAX_LEN};

const SUCCESS_KEYWORDS: &[&str] = &["successful", "confirmed", "completed", "received"];
const FAILURE_KEYWORDS: &[&str] =
    &["failed", "insufficient", "declined", "reversed", "unsuccessful"];

const PAYMENT_METHOD: &str = "mobile_money";

#[derive(Clone)]
pub struct PaymentProcessor {
    pool: PgPool,
    settings: PaymentSettings,
    codes: Arc<ReferenceCodeGenerator>,
    gateway: Arc<dyn SmsGateway>,
}

impl PaymentProcessor {
    pub fn new(
        pool: PgPool,
        settings: PaymentSettings,
        codes: Arc<ReferenceCodeGenerator>,
        gateway: Arc<dyn SmsGateway>,
    ) -> Self {
        Self {
            pool,
            settings,
            codes,
            gateway,
        }
    }

    pub fn settings(&self) -> &PaymentSettings {
        &self.settings
    }

    /// Start a payment attempt for (payer, course) on the named network.
    ///
    /// The duplicate-enrollment and already-in-progress checks belong to the
    /// caller; this only validates the phone/provider pairing, creates the
    /// row and dispatches the instruction SMS. The transaction advances to
    /// `pending` only when dispatch succeeds; otherwise it stays `initiated`
    /// so the caller can retry dispatch later.
    pub async fn initiate(
        &self,
        user_id: Uuid,
        course: &Course,
        provider_name: &str,
        raw_phone: &str,
    ) -> Result<Transaction, AppError> {
        // Zero-amount courses never reach the manager; anything non-positive
        // here is a data error upstream.
        validate_positive_amount(&course.price)?;

        let clean_phone = phone::clean(raw_phone);
        if clean_phone.len() != 9 {
            return Err(AppError::Validation(
                "invalid Zambian phone number format".to_string(),
            ));
        }

        let provider = queries::get_provider_by_name(&self.pool, provider_name)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| {
                AppError::ProviderUnavailable(format!("Provider {} not available", provider_name))
            })?;

        // The payer's explicit provider choice is what disambiguates
        // overlapping prefixes; membership in the chosen provider's set is
        // the only hard requirement.
        let prefix = &clean_phone[..3];
        if !provider.phone_prefixes.iter().any(|p| p == prefix) {
            let detected = phone::detect_provider(raw_phone).unwrap_or("unknown");
            return Err(AppError::Validation(format!(
                "Phone number doesn't match {} network. Detected: {}",
                provider_name, detected
            )));
        }

        let mut transaction = loop {
            let candidate = Transaction::new(
                user_id,
                course.id,
                provider.id,
                clean_phone.clone(),
                course.price.clone(),
                course.currency.clone(),
                self.codes.draw(),
                self.settings.timeout(),
            );

            match queries::insert_transaction(&self.pool, &candidate).await {
                Ok(row) => break row,
                Err(err) if queries::is_unique_violation(&err) => {
                    tracing::debug!("reference code collision, drawing again");
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        };

        let body = self.settings.render_instructions(
            &transaction.amount,
            &transaction.currency,
            &course.title,
            &provider.ussd_code,
            &transaction.reference_code,
        );

        if self
            .dispatch(&transaction, NotificationKind::PaymentInstructions, &body)
            .await
        {
            if queries::mark_pending(&self.pool, transaction.id).await? > 0 {
                transaction.status = TransactionStatus::Pending.as_str().to_string();
            }
        } else {
            tracing::warn!(
                reference = %transaction.reference_code,
                "instruction dispatch failed; transaction stays initiated"
            );
        }

        Ok(transaction)
    }

    /// Confirm a pending payment: flip the status, record the verification,
    /// and create-or-fetch the enrollment, all in one store transaction.
    ///
    /// Returns `false` without side effects when the transaction is not in
    /// `pending` — including when a concurrent caller confirmed it first.
    pub async fn confirm(
        &self,
        transaction: &Transaction,
        method: VerificationMethod,
        verified_by: Option<Uuid>,
        notes: &str,
    ) -> Result<bool, AppError> {
        let mut db_tx = self.pool.begin().await?;

        if queries::confirm_transaction(&mut db_tx, transaction.id).await? == 0 {
            db_tx.rollback().await?;
            return Ok(false);
        }

        queries::insert_verification(
            &mut db_tx,
            transaction.id,
            method.as_str(),
            verified_by,
            true,
            notes,
        )
        .await?;
        queries::get_or_create_enrollment(
            &mut db_tx,
            transaction.user_id,
            transaction.course_id,
            &transaction.amount,
            PAYMENT_METHOD,
        )
        .await?;

        db_tx.commit().await?;

        tracing::info!(
            reference = %transaction.reference_code,
            method = method.as_str(),
            "payment confirmed"
        );

        // The status change is already committed; a lost SMS must not undo it.
        if let Some(course) = queries::get_course(&self.pool, transaction.course_id).await? {
            let body = self
                .settings
                .render_confirmed(&course.title, &transaction.reference_code);
            self.dispatch(transaction, NotificationKind::PaymentConfirmed, &body)
                .await;
        }

        Ok(true)
    }

    /// Mark a pending payment failed, recording the provider's reason.
    pub async fn fail(
        &self,
        transaction: &Transaction,
        method: VerificationMethod,
        reason: &str,
    ) -> Result<bool, AppError> {
        let mut db_tx = self.pool.begin().await?;

        if queries::fail_transaction(&mut db_tx, transaction.id, reason).await? == 0 {
            db_tx.rollback().await?;
            return Ok(false);
        }

        queries::insert_verification(
            &mut db_tx,
            transaction.id,
            method.as_str(),
            None,
            false,
            reason,
        )
        .await?;

        db_tx.commit().await?;

        tracing::info!(reference = %transaction.reference_code, "payment marked failed");

        Ok(true)
    }

    /// Cancel a not-yet-settled payment. No notification is sent.
    pub async fn cancel(&self, transaction: &Transaction) -> Result<bool, AppError> {
        Ok(queries::cancel_transaction(&self.pool, transaction.id).await? > 0)
    }

    /// Bulk-expire pending payments past their deadline. Idempotent.
    pub async fn expire_pending(&self) -> Result<u64, AppError> {
        let expired = queries::expire_pending(&self.pool).await?;
        if expired > 0 {
            tracing::info!(count = expired, "expired stale pending payments");
        }

        Ok(expired)
    }

    /// Re-send a nudge for a payment that is still waiting on the payer.
    pub async fn send_reminder(&self, transaction: &Transaction) -> Result<bool, AppError> {
        if transaction.status() != Some(TransactionStatus::Pending) || transaction.is_expired() {
            return Ok(false);
        }

        let title = queries::get_course(&self.pool, transaction.course_id)
            .await?
            .map(|c| c.title)
            .unwrap_or_else(|| "your course".to_string());
        let minutes_left = (transaction.expires_at - chrono::Utc::now())
            .num_minutes()
            .max(0);

        let body = format!(
            "Reminder: Complete your payment of {} {} for {}. Reference: {}. \
             Payment expires in {} minutes.",
            transaction.amount,
            transaction.currency,
            title,
            transaction.reference_code,
            minutes_left
        );

        Ok(self
            .dispatch(transaction, NotificationKind::PaymentReminder, &body)
            .await)
    }

    /// Feed an inbound provider SMS through the matcher.
    ///
    /// Success keywords confirm the referenced pending transaction; failure
    /// keywords mark it failed with the message as reason; anything else is
    /// indistinguishable from unrelated traffic and reported as `NoMatch`.
    pub async fn update_from_inbound_message(
        &self,
        body: &str,
        sender: &str,
    ) -> Result<InboundSmsOutcome, AppError> {
        let Some(code) = extract_reference_code(body) else {
            return Ok(InboundSmsOutcome::NoMatch);
        };

        let Some(transaction) = queries::get_pending_by_reference(&self.pool, &code).await? else {
            tracing::debug!(
                reference = %code,
                sender = %sender,
                "inbound sms referenced no pending transaction"
            );
            return Ok(InboundSmsOutcome::NoMatch);
        };

        match classify_message(body) {
            SmsVerdict::Success => {
                let notes = format!("SMS confirmation: {}", truncate(body, NOTES_MAX_LEN));
                if self
                    .confirm(&transaction, VerificationMethod::Sms, None, &notes)
                    .await?
                {
                    Ok(InboundSmsOutcome::MatchedSuccess)
                } else {
                    Ok(InboundSmsOutcome::NoMatch)
                }
            }
            SmsVerdict::Failure => {
                if self
                    .fail(
                        &transaction,
                        VerificationMethod::Sms,
                        &truncate(body, NOTES_MAX_LEN),
                    )
                    .await?
                {
                    Ok(InboundSmsOutcome::MatchedFailure)
                } else {
                    Ok(InboundSmsOutcome::NoMatch)
                }
            }
            SmsVerdict::Ambiguous => Ok(InboundSmsOutcome::NoMatch),
        }
    }

    /// Record and send one outbound SMS. Returns whether dispatch succeeded;
    /// the notification row is written either way.
    async fn dispatch(
        &self,
        transaction: &Transaction,
        kind: NotificationKind,
        body: &str,
    ) -> bool {
        let record = match queries::insert_sms_notification(
            &self.pool,
            transaction.id,
            &transaction.phone_number,
            body,
            kind.as_str(),
        )
        .await
        {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(error = %err, "failed to record sms notification");
                return false;
            }
        };

        let to = format!("+260{}", transaction.phone_number);
        let (delivered, status) = match self.gateway.send(&to, body).await {
            Ok(()) => (true, "delivered"),
            Err(err) => {
                tracing::warn!(error = %err, kind = kind.as_str(), "sms dispatch failed");
                (false, "failed")
            }
        };

        if let Err(err) =
            queries::mark_notification_delivery(&self.pool, record.id, delivered, status).await
        {
            tracing::error!(error = %err, "failed to record sms delivery status");
        }

        delivered
    }
}

enum SmsVerdict {
    Success,
    Failure,
    Ambiguous,
}

/// Pull the 8-digit code following the literal token "Reference" (any case,
/// separated by ':' and/or whitespace). Longer digit runs match on their
/// first 8 digits.
fn extract_reference_code(body: &str) -> Option<String> {
    let lower = body.to_lowercase();
    let mut search_from = 0;

    while let Some(pos) = lower[search_from..].find("reference") {
        let after_token = search_from + pos + "reference".len();
        let rest = &lower[after_token..];
        let digits_at = rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace());

        // require at least one separator between the token and the digits
        if digits_at.len() < rest.len() {
            let code: String = digits_at
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .take(8)
                .collect();
            if code.len() == 8 {
                return Some(code);
            }
        }

        search_from = after_token;
    }

    None
}

fn classify_message(body: &str) -> SmsVerdict {
    let lower = body.to_lowercase();

    // Failure first: "unsuccessful" contains "successful".
    if FAILURE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        SmsVerdict::Failure
    } else if SUCCESS_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        SmsVerdict::Success
    } else {
        SmsVerdict::Ambiguous
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
