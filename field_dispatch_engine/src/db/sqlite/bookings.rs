use fdg_common::MoneyCents;
use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Booking, BookingId, BookingStatus, Service},
};

pub async fn fetch_booking(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Option<Booking>, SqliteDatabaseError> {
    let booking = sqlx::query_as::<_, Booking>(
        r#"SELECT booking_id, status, service_id, provider_id, latitude, longitude, address, tenant_id,
              price_override, estimated_price, final_price, dispute_reason, external_dispute_id,
              created_at, updated_at
           FROM bookings WHERE booking_id = ?"#,
    )
    .bind(booking_id)
    .fetch_optional(conn)
    .await?;
    Ok(booking)
}

pub async fn fetch_service(
    service_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Service>, SqliteDatabaseError> {
    let service =
        sqlx::query_as::<_, Service>("SELECT id, name, category, commission_rate FROM services WHERE id = ?")
            .bind(service_id)
            .fetch_optional(conn)
            .await?;
    Ok(service)
}

/// Sets the booking's provider and moves it to Dispatched status.
pub async fn assign_provider(
    booking_id: &BookingId,
    provider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let status = BookingStatus::Dispatched.to_string();
    let res = sqlx::query(
        "UPDATE bookings SET provider_id = ?, status = ?, updated_at = CURRENT_TIMESTAMP WHERE booking_id = ?",
    )
    .bind(provider_id)
    .bind(status)
    .bind(booking_id)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::BookingNotFound(booking_id.as_str().to_string()));
    }
    trace!("🗃️ Booking {booking_id} assigned to provider #{provider_id}");
    Ok(())
}

/// Clears the assignment and reverts the booking to Confirmed, ahead of a re-dispatch.
pub async fn revert_assignment(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let status = BookingStatus::Confirmed.to_string();
    let res = sqlx::query(
        "UPDATE bookings SET provider_id = NULL, status = ?, updated_at = CURRENT_TIMESTAMP WHERE booking_id = ?",
    )
    .bind(status)
    .bind(booking_id)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::BookingNotFound(booking_id.as_str().to_string()));
    }
    trace!("🗃️ Booking {booking_id} assignment cleared");
    Ok(())
}

pub async fn set_final_price(
    booking_id: &BookingId,
    price: MoneyCents,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query("UPDATE bookings SET final_price = ?, updated_at = CURRENT_TIMESTAMP WHERE booking_id = ?")
        .bind(price)
        .bind(booking_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn annotate_dispute(
    booking_id: &BookingId,
    reason: &str,
    external_dispute_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let _ = sqlx::query(
        r#"UPDATE bookings SET dispute_reason = ?, external_dispute_id = COALESCE(?, external_dispute_id),
           updated_at = CURRENT_TIMESTAMP WHERE booking_id = ?"#,
    )
    .bind(reason)
    .bind(external_dispute_id)
    .bind(booking_id)
    .execute(conn)
    .await?;
    Ok(())
}
