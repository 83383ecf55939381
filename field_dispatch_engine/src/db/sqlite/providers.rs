use fdg_common::MoneyCents;
use log::trace;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, SqliteConnection};

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{CommissionType, Provider, ProviderStatus},
};

const PROVIDER_COLUMNS: &str =
    "id, name, status, is_available, latitude, longitude, specialties, commission_type, commission_rate, flat_fee";

/// Providers carry their specialty tags as a JSON array column, so rows are mapped by hand rather
/// than with `FromRow`.
fn provider_from_row(row: &SqliteRow) -> Result<Provider, SqliteDatabaseError> {
    let specialties_json = row.try_get::<String, _>("specialties").map_err(SqliteDatabaseError::from)?;
    let specialties: Vec<String> = serde_json::from_str(&specialties_json)?;
    Ok(Provider {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        status: row.try_get("status")?,
        is_available: row.try_get("is_available")?,
        latitude: row.try_get("latitude")?,
        longitude: row.try_get("longitude")?,
        specialties,
        commission_type: row.try_get("commission_type")?,
        commission_rate: row.try_get("commission_rate")?,
        flat_fee: row.try_get::<MoneyCents, _>("flat_fee")?,
    })
}

pub async fn fetch_provider(
    provider_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Provider>, SqliteDatabaseError> {
    let row = sqlx::query(&format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?"))
        .bind(provider_id)
        .fetch_optional(conn)
        .await?;
    row.as_ref().map(provider_from_row).transpose()
}

/// All active, available providers, excluding the given ids. Ordered by id so that the matching
/// engine's stable sort has a deterministic input order.
pub async fn available_providers(
    exclude: &[i64],
    conn: &mut SqliteConnection,
) -> Result<Vec<Provider>, SqliteDatabaseError> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {PROVIDER_COLUMNS} FROM providers WHERE status = "
    ));
    builder.push_bind(ProviderStatus::Active.to_string());
    builder.push(" AND is_available = 1");
    if !exclude.is_empty() {
        builder.push(" AND id NOT IN (");
        let mut ids = builder.separated(", ");
        for id in exclude {
            ids.push_bind(*id);
        }
        builder.push(")");
    }
    builder.push(" ORDER BY id ASC");
    trace!("🗃️ Executing query: {}", builder.sql());
    let rows = builder.build().fetch_all(conn).await?;
    rows.iter().map(provider_from_row).collect()
}

/// Inserts a provider row. Providers are owned by an external collaborator; this is used by the
/// sync path and by test seeding.
pub async fn insert_provider(
    name: &str,
    status: ProviderStatus,
    is_available: bool,
    coordinates: Option<(f64, f64)>,
    specialties: &[String],
    commission_type: CommissionType,
    commission_rate: i64,
    flat_fee: MoneyCents,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let specialties = serde_json::to_string(specialties)?;
    let (latitude, longitude) = match coordinates {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    let res = sqlx::query(
        r#"INSERT INTO providers
              (name, status, is_available, latitude, longitude, specialties, commission_type, commission_rate, flat_fee)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(name)
    .bind(status.to_string())
    .bind(is_available)
    .bind(latitude)
    .bind(longitude)
    .bind(specialties)
    .bind(commission_type.to_string())
    .bind(commission_rate)
    .bind(flat_fee)
    .execute(conn)
    .await?;
    Ok(res.last_insert_rowid())
}
