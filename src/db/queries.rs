use sqlx::{PgPool, Postgres, Result, Transaction as SqlxTransaction};
use crate::db::models::{
    Course, Enrollment, MobileProvider, PaymentVerification, SmsNotification, Transaction,
    TransactionDetail,
};
use sqlx::types::BigDecimal;
use uuid::Uuid;

/// Postgres unique-constraint violation, used by the reference code
/// generator to re-draw on collision.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

// --- Transaction Queries ---

pub async fn insert_transaction(pool: &PgPool, tx: &Transaction) -> Result<Transaction> {
    sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions (
            id, user_id, course_id, provider_id, phone_number, amount, currency,
            reference_code, status, expires_at, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.course_id)
    .bind(tx.provider_id)
    .bind(&tx.phone_number)
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(&tx.reference_code)
    .bind(&tx.status)
    .bind(tx.expires_at)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .fetch_one(pool)
    .await
}

pub async fn get_transaction_by_reference(
    pool: &PgPool,
    reference_code: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE reference_code = $1")
        .bind(reference_code)
        .fetch_optional(pool)
        .await
}

pub async fn get_pending_by_reference(
    pool: &PgPool,
    reference_code: &str,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE reference_code = $1 AND status = 'pending'",
    )
    .bind(reference_code)
    .fetch_optional(pool)
    .await
}

pub async fn get_transaction_for_user(
    pool: &PgPool,
    reference_code: &str,
    user_id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE reference_code = $1 AND user_id = $2",
    )
    .bind(reference_code)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

const DETAIL_SELECT: &str = r#"
    SELECT t.id, t.user_id, t.course_id, t.phone_number, t.amount, t.currency,
           t.reference_code, t.status, t.failure_reason, t.expires_at,
           t.confirmed_at, t.created_at,
           p.display_name AS provider_name, c.title AS course_title
    FROM transactions t
    JOIN mobile_providers p ON p.id = t.provider_id
    JOIN courses c ON c.id = t.course_id
"#;

pub async fn get_transaction_detail(
    pool: &PgPool,
    reference_code: &str,
) -> Result<Option<TransactionDetail>> {
    sqlx::query_as::<_, TransactionDetail>(&format!(
        "{DETAIL_SELECT} WHERE t.reference_code = $1"
    ))
    .bind(reference_code)
    .fetch_optional(pool)
    .await
}

pub async fn list_user_transaction_details(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<TransactionDetail>> {
    sqlx::query_as::<_, TransactionDetail>(&format!(
        "{DETAIL_SELECT} WHERE t.user_id = $1 ORDER BY t.created_at DESC LIMIT $2 OFFSET $3"
    ))
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Latest attempt for (user, course) that has not reached a terminal status.
/// Callers still need to check wall-clock expiry on the returned row.
pub async fn find_active_transaction(
    pool: &PgPool,
    user_id: Uuid,
    course_id: Uuid,
) -> Result<Option<Transaction>> {
    sqlx::query_as::<_, Transaction>(
        r#"
        SELECT * FROM transactions
        WHERE user_id = $1 AND course_id = $2 AND status IN ('initiated', 'pending')
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await
}

// Status transitions are single conditional updates. Zero rows affected
// means another caller got there first and the transition is rejected.

pub async fn mark_pending(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = 'pending', updated_at = NOW()
        WHERE id = $1 AND status = 'initiated'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn confirm_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = 'confirmed', confirmed_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn fail_transaction(
    executor: &mut SqlxTransaction<'_, Postgres>,
    id: Uuid,
    reason: &str,
) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = 'failed', failure_reason = $2, updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(id)
    .bind(reason)
    .execute(&mut **executor)
    .await?;

    Ok(result.rows_affected())
}

pub async fn cancel_transaction(pool: &PgPool, id: Uuid) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = 'cancelled', updated_at = NOW()
        WHERE id = $1 AND status IN ('initiated', 'pending')
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Bulk expiry sweep. The WHERE clause re-checks `status = 'pending'` at
/// update time so a confirmation landing mid-sweep is never clobbered.
pub async fn expire_pending(pool: &PgPool) -> Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE transactions SET status = 'expired', updated_at = NOW()
        WHERE status = 'pending' AND expires_at < NOW()
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

// --- Verification Queries ---

pub async fn insert_verification(
    executor: &mut SqlxTransaction<'_, Postgres>,
    transaction_id: Uuid,
    method: &str,
    verified_by: Option<Uuid>,
    is_successful: bool,
    notes: &str,
) -> Result<PaymentVerification> {
    sqlx::query_as::<_, PaymentVerification>(
        r#"
        INSERT INTO payment_verifications (id, transaction_id, method, verified_by, is_successful, notes)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(transaction_id)
    .bind(method)
    .bind(verified_by)
    .bind(is_successful)
    .bind(notes)
    .fetch_one(&mut **executor)
    .await
}

// --- Notification Queries ---

pub async fn insert_sms_notification(
    pool: &PgPool,
    transaction_id: Uuid,
    phone_number: &str,
    message: &str,
    kind: &str,
) -> Result<SmsNotification> {
    sqlx::query_as::<_, SmsNotification>(
        r#"
        INSERT INTO sms_notifications (id, transaction_id, phone_number, message, kind)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(transaction_id)
    .bind(phone_number)
    .bind(message)
    .bind(kind)
    .fetch_one(pool)
    .await
}

pub async fn mark_notification_delivery(
    pool: &PgPool,
    id: Uuid,
    delivered: bool,
    delivery_status: &str,
) -> Result<()> {
    sqlx::query("UPDATE sms_notifications SET delivered = $2, delivery_status = $3 WHERE id = $1")
        .bind(id)
        .bind(delivered)
        .bind(delivery_status)
        .execute(pool)
        .await?;

    Ok(())
}

// --- Provider Queries ---

pub async fn get_provider_by_name(pool: &PgPool, name: &str) -> Result<Option<MobileProvider>> {
    sqlx::query_as::<_, MobileProvider>("SELECT * FROM mobile_providers WHERE name = $1")
        .bind(name)
        .fetch_optional(pool)
        .await
}

pub async fn get_provider_by_id(pool: &PgPool, id: Uuid) -> Result<Option<MobileProvider>> {
    sqlx::query_as::<_, MobileProvider>("SELECT * FROM mobile_providers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_active_providers(pool: &PgPool) -> Result<Vec<MobileProvider>> {
    sqlx::query_as::<_, MobileProvider>(
        "SELECT * FROM mobile_providers WHERE is_active = TRUE ORDER BY name",
    )
    .fetch_all(pool)
    .await
}

// --- Enrollment Queries ---

pub async fn enrollment_exists(pool: &PgPool, user_id: Uuid, course_id: Uuid) -> Result<bool> {
    let exists: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM enrollments WHERE user_id = $1 AND course_id = $2")
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(pool)
            .await?;

    Ok(exists.is_some())
}

/// Create-or-fetch, racing-safe: the unique (user_id, course_id) constraint
/// absorbs concurrent inserts and the follow-up select returns whichever
/// row won.
pub async fn get_or_create_enrollment(
    executor: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    course_id: Uuid,
    amount_paid: &BigDecimal,
    payment_method: &str,
) -> Result<Enrollment> {
    sqlx::query(
        r#"
        INSERT INTO enrollments (id, user_id, course_id, amount_paid, payment_status, payment_method)
        VALUES ($1, $2, $3, $4, 'completed', $5)
        ON CONFLICT (user_id, course_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(course_id)
    .bind(amount_paid)
    .bind(payment_method)
    .execute(&mut **executor)
    .await?;

    sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&mut **executor)
    .await
}

// --- Catalog Queries ---

pub async fn get_course(pool: &PgPool, id: Uuid) -> Result<Option<Course>> {
    sqlx::query_as::<_, Course>(
        "SELECT id, title, price, currency, is_free FROM courses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// The user directory is owned upstream; ids arrive via the gateway header
/// and are mirrored lazily so foreign keys resolve.
pub async fn ensure_user(pool: &PgPool, id: Uuid) -> Result<()> {
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}
