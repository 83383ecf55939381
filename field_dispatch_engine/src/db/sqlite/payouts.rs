use fdg_common::MoneyCents;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db::{sqlite::SqliteDatabaseError, traits::InsertPayoutResult},
    db_types::{BookingId, NewPayout, PayoutStatus, PayoutType, ProviderPayout},
};

const PAYOUT_COLUMNS: &str = r#"id, provider_id, booking_id, amount, status, payout_type,
    original_payout_id, note, created_at, updated_at"#;

/// Inserts a payout row. The partial unique index on (booking_id) for standard payouts turns a
/// duplicate standard insert into `AlreadyExists` with the existing row's id.
pub async fn idempotent_insert(
    payout: NewPayout,
    conn: &mut SqliteConnection,
) -> Result<InsertPayoutResult, SqliteDatabaseError> {
    let payout_type = payout.payout_type.to_string();
    let res = sqlx::query(
        r#"INSERT INTO provider_payouts (provider_id, booking_id, amount, payout_type, original_payout_id, note)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(payout.provider_id)
    .bind(&payout.booking_id)
    .bind(payout.amount)
    .bind(&payout_type)
    .bind(payout.original_payout_id)
    .bind(&payout.note)
    .execute(&mut *conn)
    .await;
    match res {
        Ok(r) => Ok(InsertPayoutResult::Inserted(r.last_insert_rowid())),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let existing = standard_for_booking(&payout.booking_id, conn).await?.ok_or_else(|| {
                SqliteDatabaseError::QueryError(format!(
                    "Unique violation for standard payout on {} but no existing row found",
                    payout.booking_id
                ))
            })?;
            Ok(InsertPayoutResult::AlreadyExists(existing.id))
        },
        Err(e) => Err(SqliteDatabaseError::from(e)),
    }
}

pub async fn fetch_payout(id: i64, conn: &mut SqliteConnection) -> Result<Option<ProviderPayout>, SqliteDatabaseError> {
    let payout =
        sqlx::query_as::<_, ProviderPayout>(&format!("SELECT {PAYOUT_COLUMNS} FROM provider_payouts WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(payout)
}

pub async fn standard_for_booking(
    booking_id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Option<ProviderPayout>, SqliteDatabaseError> {
    let payout_type = PayoutType::Standard.to_string();
    let payout = sqlx::query_as::<_, ProviderPayout>(&format!(
        "SELECT {PAYOUT_COLUMNS} FROM provider_payouts WHERE booking_id = ? AND payout_type = ?"
    ))
    .bind(booking_id)
    .bind(payout_type)
    .fetch_optional(conn)
    .await?;
    Ok(payout)
}

pub async fn pending_clawbacks_for_provider(
    provider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProviderPayout>, SqliteDatabaseError> {
    let payouts = sqlx::query_as::<_, ProviderPayout>(&format!(
        r#"SELECT {PAYOUT_COLUMNS} FROM provider_payouts
           WHERE provider_id = ? AND payout_type = 'Clawback' AND status = 'Pending' ORDER BY id ASC"#
    ))
    .bind(provider_id)
    .fetch_all(conn)
    .await?;
    Ok(payouts)
}

/// Reduces a pending payout's amount in place, appending the explanatory note.
pub async fn adjust_pending_amount(
    id: i64,
    new_amount: MoneyCents,
    note: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    let res = sqlx::query(
        r#"UPDATE provider_payouts
           SET amount = ?, note = COALESCE(note || char(10), '') || ?, updated_at = CURRENT_TIMESTAMP
           WHERE id = ? AND status = 'Pending'"#,
    )
    .bind(new_amount)
    .bind(note)
    .bind(id)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SqliteDatabaseError::PayoutNotFound(id));
    }
    trace!("🗃️ Payout #{id} adjusted to {new_amount}");
    Ok(())
}

/// Fetches the subset of the given ids that are pending standard payouts, i.e. the rows eligible
/// for batch settlement.
pub async fn pending_standard_by_ids(
    ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProviderPayout>, SqliteDatabaseError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new(format!(
        "SELECT {PAYOUT_COLUMNS} FROM provider_payouts WHERE payout_type = 'Standard' AND status = 'Pending' AND id IN ("
    ));
    let mut id_list = builder.separated(", ");
    for id in ids {
        id_list.push_bind(*id);
    }
    builder.push(") ORDER BY id ASC");
    let payouts = builder.build_query_as::<ProviderPayout>().fetch_all(conn).await?;
    Ok(payouts)
}

/// Every pending clawback belonging to any of the given providers.
pub async fn pending_clawbacks_for_providers(
    provider_ids: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<ProviderPayout>, SqliteDatabaseError> {
    if provider_ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::new(format!(
        "SELECT {PAYOUT_COLUMNS} FROM provider_payouts WHERE payout_type = 'Clawback' AND status = 'Pending' AND provider_id IN ("
    ));
    let mut id_list = builder.separated(", ");
    for id in provider_ids {
        id_list.push_bind(*id);
    }
    builder.push(") ORDER BY id ASC");
    let payouts = builder.build_query_as::<ProviderPayout>().fetch_all(conn).await?;
    Ok(payouts)
}

pub async fn mark_paid(ids: &[i64], conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    if ids.is_empty() {
        return Ok(());
    }
    let mut builder =
        QueryBuilder::new("UPDATE provider_payouts SET status = 'Paid', updated_at = CURRENT_TIMESTAMP WHERE id IN (");
    let mut id_list = builder.separated(", ");
    for id in ids {
        id_list.push_bind(*id);
    }
    builder.push(")");
    let _ = builder.build().execute(conn).await?;
    trace!("🗃️ {} payouts marked as paid", ids.len());
    Ok(())
}
