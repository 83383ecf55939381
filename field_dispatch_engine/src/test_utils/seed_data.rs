//! Row factories for tests. These write directly through the pool, since the records they create
//! (services, providers, bookings, pending payments) are owned by external collaborators in
//! production.

use fdg_common::MoneyCents;

use crate::{
    db_types::{BookingId, BookingStatus, CommissionType, PaymentMethod, PaymentStatus, ProviderStatus},
    SqliteDatabase,
};

pub async fn seed_service(db: &SqliteDatabase, name: &str, category: &str, commission_rate: i64) -> i64 {
    let res = sqlx::query("INSERT INTO services (name, category, commission_rate) VALUES (?, ?, ?)")
        .bind(name)
        .bind(category)
        .bind(commission_rate)
        .execute(db.pool())
        .await
        .expect("Error seeding service");
    res.last_insert_rowid()
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_provider(
    db: &SqliteDatabase,
    name: &str,
    coordinates: (f64, f64),
    specialties: &[&str],
    commission_type: CommissionType,
    commission_rate: i64,
    flat_fee: i64,
) -> i64 {
    let specialties = serde_json::to_string(specialties).expect("Error encoding specialties");
    let res = sqlx::query(
        r#"INSERT INTO providers
              (name, status, is_available, latitude, longitude, specialties, commission_type, commission_rate, flat_fee)
           VALUES (?, ?, 1, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(name)
    .bind(ProviderStatus::Active.to_string())
    .bind(coordinates.0)
    .bind(coordinates.1)
    .bind(specialties)
    .bind(commission_type.to_string())
    .bind(commission_rate)
    .bind(flat_fee)
    .execute(db.pool())
    .await
    .expect("Error seeding provider");
    res.last_insert_rowid()
}

pub struct SeedBooking {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub service_id: i64,
    pub provider_id: Option<i64>,
    pub coordinates: Option<(f64, f64)>,
    pub tenant_id: Option<String>,
    pub price_override: Option<i64>,
    pub estimated_price: i64,
}

impl SeedBooking {
    pub fn new(booking_id: &str, service_id: i64) -> Self {
        Self {
            booking_id: BookingId::from(booking_id),
            status: BookingStatus::Confirmed,
            service_id,
            provider_id: None,
            coordinates: None,
            tenant_id: None,
            price_override: None,
            estimated_price: 10_000,
        }
    }

    pub fn at(mut self, coordinates: (f64, f64)) -> Self {
        self.coordinates = Some(coordinates);
        self
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_provider(mut self, provider_id: i64) -> Self {
        self.provider_id = Some(provider_id);
        self
    }

    pub fn for_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_string());
        self
    }

    pub fn with_price_override(mut self, price_override: i64) -> Self {
        self.price_override = Some(price_override);
        self
    }

    pub fn with_estimated_price(mut self, estimated_price: i64) -> Self {
        self.estimated_price = estimated_price;
        self
    }
}

pub async fn seed_booking(db: &SqliteDatabase, booking: SeedBooking) -> BookingId {
    let (latitude, longitude) = match booking.coordinates {
        Some((lat, lng)) => (Some(lat), Some(lng)),
        None => (None, None),
    };
    sqlx::query(
        r#"INSERT INTO bookings
              (booking_id, status, service_id, provider_id, latitude, longitude, address, tenant_id, price_override,
               estimated_price)
           VALUES (?, ?, ?, ?, ?, ?, '123 Main St', ?, ?, ?)"#,
    )
    .bind(&booking.booking_id)
    .bind(booking.status.to_string())
    .bind(booking.service_id)
    .bind(booking.provider_id)
    .bind(latitude)
    .bind(longitude)
    .bind(&booking.tenant_id)
    .bind(booking.price_override)
    .bind(booking.estimated_price)
    .execute(db.pool())
    .await
    .expect("Error seeding booking");
    booking.booking_id
}

pub async fn seed_payment(
    db: &SqliteDatabase,
    booking_id: &BookingId,
    amount: i64,
    method: PaymentMethod,
    status: PaymentStatus,
    processor_ref: Option<&str>,
) -> i64 {
    let res = sqlx::query(
        "INSERT INTO payments (booking_id, amount, method, status, processor_ref) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(booking_id)
    .bind(MoneyCents::from(amount))
    .bind(method.to_string())
    .bind(status.to_string())
    .bind(processor_ref)
    .execute(db.pool())
    .await
    .expect("Error seeding payment");
    res.last_insert_rowid()
}
