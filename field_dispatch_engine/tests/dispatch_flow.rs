//! End-to-end dispatch scenarios against a throwaway SQLite database.

use field_dispatch_engine::{
    db_types::{BookingId, BookingStatus, CommissionType},
    test_utils::{prepare_test_env, random_db_path, seed_booking, seed_provider, seed_service, SeedBooking},
    DispatchApi,
    DispatchConfig,
    DispatchManagement,
    SqliteDatabase,
};
use field_dispatch_engine::events::EventProducers;

const ORIGIN: (f64, f64) = (40.0, -74.0);
// One degree of latitude is ~69.09 miles on the sphere the engine uses.
const MILES_PER_DEGREE: f64 = 69.09;

fn miles_north(miles: f64) -> (f64, f64) {
    (ORIGIN.0 + miles / MILES_PER_DEGREE, ORIGIN.1)
}

async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

fn dispatch_api(db: &SqliteDatabase) -> DispatchApi<SqliteDatabase> {
    DispatchApi::new(db.clone(), DispatchConfig::default(), EventProducers::default())
}

#[tokio::test]
async fn nearest_provider_wins_within_the_default_radius() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let p3 = seed_provider(&db, "Three Miles", miles_north(3.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    let _p8 = seed_provider(&db, "Eight Miles", miles_north(8.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    let _p15 =
        seed_provider(&db, "Fifteen Miles", miles_north(15.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    let booking_id = seed_booking(&db, SeedBooking::new("bk-disp-1", service).at(ORIGIN)).await;

    let outcome = dispatch_api(&db).dispatch(&booking_id, &[]).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.provider_id, Some(p3));
    assert!(!outcome.expanded_search);
    assert_eq!(outcome.distance_miles, Some(3.0));

    let booking = db.fetch_booking(&booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Dispatched);
    assert_eq!(booking.provider_id, Some(p3));
}

#[tokio::test]
async fn radius_expands_when_no_one_is_close_enough() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let p12 = seed_provider(&db, "Twelve Miles", miles_north(12.0), &[], CommissionType::Standard, 7000, 0).await;
    let _p15 = seed_provider(&db, "Fifteen Miles", miles_north(15.0), &[], CommissionType::Standard, 7000, 0).await;
    let _p20 = seed_provider(&db, "Twenty Miles", miles_north(20.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking_id = seed_booking(&db, SeedBooking::new("bk-disp-2", service).at(ORIGIN)).await;

    let outcome = dispatch_api(&db).dispatch(&booking_id, &[]).await.unwrap();
    assert!(outcome.success);
    assert!(outcome.expanded_search);
    assert_eq!(outcome.provider_id, Some(p12));
    assert!(outcome.reason.contains("expanded radius"));
}

#[tokio::test]
async fn no_provider_in_range_is_a_logged_failure_not_an_error() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let _far = seed_provider(&db, "Far Away", miles_north(40.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking_id = seed_booking(&db, SeedBooking::new("bk-disp-3", service).at(ORIGIN)).await;

    let api = dispatch_api(&db);
    let outcome = api.dispatch(&booking_id, &[]).await.unwrap();
    assert!(!outcome.success);
    assert!(outcome.expanded_search);
    assert_eq!(outcome.provider_id, None);

    // The failed attempt is still recorded, with an empty candidate list
    let history = api.dispatch_history(&booking_id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(history[0].candidates.is_empty());
    assert_eq!(history[0].assigned_provider_id, None);

    // The booking stays unassigned for manual handling
    let booking = db.fetch_booking(&booking_id).await.unwrap().unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.provider_id, None);
}

#[tokio::test]
async fn missing_coordinates_fail_without_a_log_entry() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let _p = seed_provider(&db, "Nearby", miles_north(2.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking_id = seed_booking(&db, SeedBooking::new("bk-disp-4", service)).await;

    let api = dispatch_api(&db);
    let outcome = api.dispatch(&booking_id, &[]).await.unwrap();
    assert!(!outcome.success);
    assert_eq!(outcome.reason, "no coordinates");
    let history = api.dispatch_history(&booking_id).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn business_bookings_prefer_specialty_over_distance() {
    let db = new_db().await;
    let service = seed_service(&db, "HVAC", "hvac", 0).await;
    let closer = seed_provider(&db, "Closer Generalist", miles_north(2.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    let farther =
        seed_provider(&db, "Farther Specialist", miles_north(7.0), &["hvac"], CommissionType::Standard, 7000, 0).await;

    let b2b = seed_booking(&db, SeedBooking::new("bk-b2b", service).at(ORIGIN).for_tenant("acme")).await;
    let outcome = dispatch_api(&db).dispatch(&b2b, &[]).await.unwrap();
    assert_eq!(outcome.provider_id, Some(farther));
    assert!(outcome.reason.contains("B2B priority"));

    let consumer = seed_booking(&db, SeedBooking::new("bk-b2c", service).at(ORIGIN)).await;
    let outcome = dispatch_api(&db).dispatch(&consumer, &[]).await.unwrap();
    assert_eq!(outcome.provider_id, Some(closer));
}

#[tokio::test]
async fn a_rejecting_provider_is_never_offered_the_same_booking_again() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let nearest = seed_provider(&db, "Nearest", miles_north(1.0), &[], CommissionType::Standard, 7000, 0).await;
    let second = seed_provider(&db, "Second", miles_north(4.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking_id = seed_booking(&db, SeedBooking::new("bk-cascade", service).at(ORIGIN)).await;

    let api = dispatch_api(&db);
    let outcome = api.dispatch(&booking_id, &[]).await.unwrap();
    assert_eq!(outcome.provider_id, Some(nearest));

    // Nearest rejects the job. Re-dispatch must skip them even though they are still closest.
    let outcome = api.redispatch(&booking_id).await.unwrap();
    assert_eq!(outcome.provider_id, Some(second));
    assert!(outcome.reason.contains("cascade: 1 excluded"));

    let history = api.dispatch_history(&booking_id).await.unwrap();
    assert_eq!(history.len(), 2);

    // Both candidates rejected: the booking cannot be dispatched any more
    let outcome = api.redispatch(&booking_id).await.unwrap();
    assert!(!outcome.success);
}

#[tokio::test]
async fn missing_booking_is_not_found() {
    let db = new_db().await;
    let api = dispatch_api(&db);
    let err = api.dispatch(&BookingId::from("bk-nope"), &[]).await.unwrap_err();
    assert!(matches!(err, field_dispatch_engine::DispatchGatewayError::NotFound(_)));
}
