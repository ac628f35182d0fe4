mod common;

use std::sync::Arc;

use async_trait::async_trait;

use common::*;
use kwacha_core::config::PaymentSettings;
use kwacha_core::db::queries;
use kwacha_core::domain::{InboundSmsOutcome, VerificationMethod};
use kwacha_core::error::AppError;
use kwacha_core::services::{PaymentProcessor, ReferenceCodeGenerator, SmsGateway};

struct FailingGateway;

#[async_trait]
impl SmsGateway for FailingGateway {
    async fn send(&self, _to: &str, _message: &str) -> Result<(), AppError> {
        Err(AppError::Dispatch("gateway down".to_string()))
    }
}

#[tokio::test]
async fn dispatch_failure_leaves_transaction_initiated() {
    let (state, _container) = setup_with_gateway(Arc::new(FailingGateway)).await;

    let user = insert_user(&state.db).await;
    let course_id = insert_course(&state.db, "Accounting", "130.00", false).await;
    let course = queries::get_course(&state.db, course_id).await.unwrap().unwrap();

    let tx = state
        .processor
        .initiate(user, &course, "airtel", "0977123456")
        .await
        .expect("initiate must survive dispatch failure");

    assert_eq!(tx.status, "initiated");
    assert_eq!(transaction_status(&state.db, &tx.reference_code).await, "initiated");

    // the attempt was recorded but not delivered
    let (delivered, delivery_status): (bool, String) = sqlx::query_as(
        "SELECT delivered, delivery_status FROM sms_notifications WHERE transaction_id = $1",
    )
    .bind(tx.id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert!(!delivered);
    assert_eq!(delivery_status, "failed");
}

#[tokio::test]
async fn expiry_sweep_only_touches_overdue_pending_rows() {
    let (state, _container) = setup_state().await;

    let payer_a = insert_user(&state.db).await;
    let payer_b = insert_user(&state.db).await;
    let course_a = insert_course(&state.db, "Algebra", "100.00", false).await;
    let course_b = insert_course(&state.db, "Statistics", "100.00", false).await;

    let course = queries::get_course(&state.db, course_a).await.unwrap().unwrap();
    let overdue = state
        .processor
        .initiate(payer_a, &course, "airtel", "0977111222")
        .await
        .unwrap();
    force_expiry(&state.db, &overdue.reference_code).await;

    let course = queries::get_course(&state.db, course_b).await.unwrap().unwrap();
    let confirmed = state
        .processor
        .initiate(payer_b, &course, "mtn", "0987111222")
        .await
        .unwrap();
    assert!(state
        .processor
        .confirm(&confirmed, VerificationMethod::Manual, None, "paid at desk")
        .await
        .unwrap());

    let swept = state.processor.expire_pending().await.unwrap();
    assert_eq!(swept, 1);
    assert_eq!(
        transaction_status(&state.db, &overdue.reference_code).await,
        "expired"
    );
    assert_eq!(
        transaction_status(&state.db, &confirmed.reference_code).await,
        "confirmed"
    );

    // idempotent: nothing left to expire
    assert_eq!(state.processor.expire_pending().await.unwrap(), 0);
}

#[tokio::test]
async fn confirm_refuses_non_pending_transactions() {
    let (state, _container) = setup_state().await;

    let user = insert_user(&state.db).await;
    let course_id = insert_course(&state.db, "Botany", "140.00", false).await;
    let course = queries::get_course(&state.db, course_id).await.unwrap().unwrap();

    let tx = state
        .processor
        .initiate(user, &course, "airtel", "0977333444")
        .await
        .unwrap();

    assert!(state
        .processor
        .confirm(&tx, VerificationMethod::Admin, Some(user), "first")
        .await
        .unwrap());
    assert_eq!(count_enrollments(&state.db, user, course_id).await, 1);

    // a second confirmation observes 'confirmed', not 'pending', and no-ops
    assert!(!state
        .processor
        .confirm(&tx, VerificationMethod::Admin, Some(user), "second")
        .await
        .unwrap());
    assert_eq!(count_enrollments(&state.db, user, course_id).await, 1);

    let (verifications,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM payment_verifications WHERE transaction_id = $1")
            .bind(tx.id)
            .fetch_one(&state.db)
            .await
            .unwrap();
    assert_eq!(verifications, 1);
}

#[tokio::test]
async fn cancel_loses_to_a_prior_confirmation() {
    let (state, _container) = setup_state().await;

    let user = insert_user(&state.db).await;
    let course_id = insert_course(&state.db, "Zoology", "125.00", false).await;
    let course = queries::get_course(&state.db, course_id).await.unwrap().unwrap();

    let tx = state
        .processor
        .initiate(user, &course, "airtel", "0977555666")
        .await
        .unwrap();

    assert!(state
        .processor
        .confirm(&tx, VerificationMethod::Manual, None, "")
        .await
        .unwrap());
    assert!(!state.processor.cancel(&tx).await.unwrap());
    assert_eq!(transaction_status(&state.db, &tx.reference_code).await, "confirmed");
}

#[tokio::test]
async fn colliding_reference_codes_are_redrawn() {
    let (state, _container) = setup_state().await;

    // two processors with identical seeds draw identical first codes; the
    // unique index forces the second insert to re-draw
    let twin = PaymentProcessor::new(
        state.db.clone(),
        PaymentSettings::default(),
        Arc::new(ReferenceCodeGenerator::seeded(42)),
        Arc::new(kwacha_core::services::LogSmsGateway),
    );

    let payer_a = insert_user(&state.db).await;
    let payer_b = insert_user(&state.db).await;
    let course_a = insert_course(&state.db, "Music", "55.00", false).await;
    let course_b = insert_course(&state.db, "Drama", "65.00", false).await;

    let course = queries::get_course(&state.db, course_a).await.unwrap().unwrap();
    let first = state
        .processor
        .initiate(payer_a, &course, "airtel", "0977000111")
        .await
        .unwrap();

    let course = queries::get_course(&state.db, course_b).await.unwrap().unwrap();
    let second = twin
        .initiate(payer_b, &course, "airtel", "0977000222")
        .await
        .unwrap();

    assert_ne!(first.reference_code, second.reference_code);
    assert_eq!(second.reference_code.len(), 8);
}

#[tokio::test]
async fn ambiguous_inbound_sms_leaves_transaction_pending() {
    let (state, _container) = setup_state().await;

    let user = insert_user(&state.db).await;
    let course_id = insert_course(&state.db, "Latin", "85.00", false).await;
    let course = queries::get_course(&state.db, course_id).await.unwrap().unwrap();

    let tx = state
        .processor
        .initiate(user, &course, "airtel", "0977888999")
        .await
        .unwrap();

    let body = format!("Reference: {}", tx.reference_code);
    let outcome = state
        .processor
        .update_from_inbound_message(&body, "unknown")
        .await
        .unwrap();

    assert_eq!(outcome, InboundSmsOutcome::NoMatch);
    assert_eq!(transaction_status(&state.db, &tx.reference_code).await, "pending");
}

#[tokio::test]
async fn reminder_goes_out_only_while_pending() {
    let (state, _container) = setup_state().await;

    let user = insert_user(&state.db).await;
    let course_id = insert_course(&state.db, "Geometry", "70.00", false).await;
    let course = queries::get_course(&state.db, course_id).await.unwrap().unwrap();

    let tx = state
        .processor
        .initiate(user, &course, "airtel", "0977121212")
        .await
        .unwrap();

    assert!(state.processor.send_reminder(&tx).await.unwrap());

    let (message,): (String,) = sqlx::query_as(
        "SELECT message FROM sms_notifications WHERE transaction_id = $1 AND kind = 'payment_reminder'",
    )
    .bind(tx.id)
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert!(message.contains(&tx.reference_code));
    assert!(message.contains("Geometry"));

    assert!(state.processor.cancel(&tx).await.unwrap());
    let cancelled = queries::get_transaction_by_reference(&state.db, &tx.reference_code)
        .await
        .unwrap()
        .unwrap();
    assert!(!state.processor.send_reminder(&cancelled).await.unwrap());
}
