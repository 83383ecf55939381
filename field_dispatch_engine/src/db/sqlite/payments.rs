use fdg_common::MoneyCents;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPaymentResult},
    db_types::{BookingId, NewPayment, Payment, PaymentMethod, PaymentStatus},
};

const PAYMENT_COLUMNS: &str = r#"id, booking_id, amount, method, status, processor_ref,
    refund_amount, refunded_at, refunded_by, refund_reason, created_at, updated_at"#;

pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<InsertPaymentResult, SqliteDatabaseError> {
    let method = payment.method.to_string();
    let res = sqlx::query(
        "INSERT INTO payments (booking_id, amount, method, processor_ref) VALUES (?, ?, ?, ?)",
    )
    .bind(&payment.booking_id)
    .bind(payment.amount)
    .bind(&method)
    .bind(&payment.processor_ref)
    .execute(&mut *conn)
    .await;
    match res {
        Ok(r) => Ok(InsertPaymentResult::Inserted(r.last_insert_rowid())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = fetch_by_booking_and_method(&payment.booking_id, payment.method, conn)
                .await?
                .ok_or_else(|| {
                    SqliteDatabaseError::QueryError(format!(
                        "Unique violation for payment on {} but no existing row found",
                        payment.booking_id
                    ))
                })?;
            Ok(InsertPaymentResult::AlreadyExists(existing.id))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(&format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?"))
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(payment)
}

/// The most recent payment row for the booking, regardless of status.
pub async fn fetch_for_booking(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ? ORDER BY id DESC LIMIT 1"
    ))
    .bind(booking_id)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_confirmed_for_booking(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let status = PaymentStatus::Confirmed.to_string();
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ? AND status = ? ORDER BY id DESC LIMIT 1"
    ))
    .bind(booking_id)
    .bind(status)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_by_processor_ref(
    processor_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE processor_ref = ?"
    ))
    .bind(processor_ref)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_by_booking_and_method(
    booking_id: &BookingId,
    method: PaymentMethod,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let method = method.to_string();
    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE booking_id = ? AND method = ?"
    ))
    .bind(booking_id)
    .bind(method)
    .fetch_optional(conn)
    .await?;
    Ok(payment)
}

pub async fn confirm(
    id: i64,
    processor_ref: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let status = PaymentStatus::Confirmed.to_string();
    let _ = sqlx::query(
        r#"UPDATE payments SET status = ?, processor_ref = COALESCE(?, processor_ref),
           updated_at = CURRENT_TIMESTAMP WHERE id = ?"#,
    )
    .bind(status)
    .bind(processor_ref)
    .bind(id)
    .execute(conn)
    .await?;
    trace!("🗃️ Payment #{id} confirmed");
    Ok(())
}

pub async fn update_status(
    id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let status = status.to_string();
    let _ = sqlx::query("UPDATE payments SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
        .bind(status)
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Marks the payment refunded. Guarded: a row that already carries a refund amount is left
/// untouched and the update reports zero affected rows.
pub async fn mark_refunded(
    id: i64,
    amount: MoneyCents,
    refunded_by: &str,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let status = PaymentStatus::Refunded.to_string();
    let res = sqlx::query(
        r#"UPDATE payments
           SET status = ?, refund_amount = ?, refunded_at = CURRENT_TIMESTAMP, refunded_by = ?,
               refund_reason = ?, updated_at = CURRENT_TIMESTAMP
           WHERE id = ? AND refund_amount IS NULL"#,
    )
    .bind(status)
    .bind(amount)
    .bind(refunded_by)
    .bind(reason)
    .bind(id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() > 0)
}
