use log::trace;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{BookingId, DispatchCandidate, DispatchLogEntry, NewDispatchLogEntry},
};

/// The candidate list is stored as a JSON array column, so rows are mapped by hand.
fn entry_from_row(row: &SqliteRow) -> Result<DispatchLogEntry, SqliteDatabaseError> {
    let candidates_json = row.try_get::<String, _>("candidates").map_err(SqliteDatabaseError::from)?;
    let candidates: Vec<DispatchCandidate> = serde_json::from_str(&candidates_json)?;
    Ok(DispatchLogEntry {
        id: row.try_get("id")?,
        booking_id: row.try_get("booking_id")?,
        assigned_provider_id: row.try_get("assigned_provider_id")?,
        algorithm: row.try_get("algorithm")?,
        candidates,
        expanded_search: row.try_get("expanded_search")?,
        reason: row.try_get("reason")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn append(entry: NewDispatchLogEntry, conn: &mut SqliteConnection) -> Result<i64, SqliteDatabaseError> {
    let candidates = serde_json::to_string(&entry.candidates)?;
    let res = sqlx::query(
        r#"INSERT INTO dispatch_log (booking_id, assigned_provider_id, algorithm, candidates, expanded_search, reason)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&entry.booking_id)
    .bind(entry.assigned_provider_id)
    .bind(&entry.algorithm)
    .bind(candidates)
    .bind(entry.expanded_search)
    .bind(&entry.reason)
    .execute(conn)
    .await?;
    trace!("🗃️ Dispatch log entry recorded for booking {}", entry.booking_id);
    Ok(res.last_insert_rowid())
}

/// All dispatch attempts for the booking, oldest first.
pub async fn history_for_booking(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Vec<DispatchLogEntry>, SqliteDatabaseError> {
    let rows = sqlx::query(
        r#"SELECT id, booking_id, assigned_provider_id, algorithm, candidates, expanded_search, reason, created_at
           FROM dispatch_log WHERE booking_id = ? ORDER BY id ASC"#,
    )
    .bind(booking_id)
    .fetch_all(conn)
    .await?;
    rows.iter().map(entry_from_row).collect()
}
