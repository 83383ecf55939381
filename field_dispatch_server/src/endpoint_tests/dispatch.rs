use actix_web::{http::StatusCode, web, web::ServiceConfig};
use field_dispatch_engine::{
    db_types::CommissionType,
    events::EventProducers,
    test_utils::{seed_booking, seed_provider, seed_service, SeedBooking},
    DispatchApi,
    DispatchConfig,
    DispatchOutcome,
    PayoutApi,
    SqliteDatabase,
};

use super::helpers::{get_request, new_db, post_request};
use crate::routes::{health, CreatePayoutRoute, DispatchBookingRoute, DispatchLogRoute};

#[actix_web::test]
async fn health_check() {
    let (status, body) = get_request("/health", |cfg| {
        cfg.service(health);
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn dispatch_assigns_nearby_provider() {
    let db = new_db().await;
    let service_id = seed_service(&db, "Drain cleaning", "plumbing", 0).await;
    let provider_id =
        seed_provider(&db, "Rapid Rooter", (40.0, -74.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    seed_booking(&db, SeedBooking::new("bk-100", service_id).at((40.0, -74.0))).await;

    let (status, body) = post_request("/dispatch/bk-100", None, configure_dispatch(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let outcome: DispatchOutcome = serde_json::from_str(&body).expect("Invalid dispatch outcome");
    assert!(outcome.success);
    assert_eq!(outcome.provider_id, Some(provider_id));
}

#[actix_web::test]
async fn dispatch_excludes_listed_providers() {
    let db = new_db().await;
    let service_id = seed_service(&db, "Lock repair", "locksmith", 0).await;
    let rejected =
        seed_provider(&db, "Near But Declined", (40.0, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    let fallback =
        seed_provider(&db, "Second Choice", (40.05, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    seed_booking(&db, SeedBooking::new("bk-101", service_id).at((40.0, -74.0))).await;

    let body = serde_json::json!({ "exclude": [rejected] });
    let (status, body) =
        post_request("/dispatch/bk-101", Some(body), configure_dispatch(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let outcome: DispatchOutcome = serde_json::from_str(&body).expect("Invalid dispatch outcome");
    assert_eq!(outcome.provider_id, Some(fallback));
}

#[actix_web::test]
async fn dispatch_unknown_booking_is_not_found() {
    let db = new_db().await;
    let (status, body) =
        post_request("/dispatch/no-such-booking", None, configure_dispatch(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("error"));
}

#[actix_web::test]
async fn dispatch_log_starts_empty() {
    let db = new_db().await;
    let service_id = seed_service(&db, "Gutter cleaning", "exterior", 0).await;
    seed_booking(&db, SeedBooking::new("bk-102", service_id).at((40.0, -74.0))).await;

    let (status, body) = get_request("/dispatch/bk-102/log", configure_dispatch(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

#[actix_web::test]
async fn payout_for_unpaid_booking_is_a_conflict() {
    let db = new_db().await;
    let service_id = seed_service(&db, "Window repair", "glazing", 0).await;
    let provider_id =
        seed_provider(&db, "Pane Relief", (40.0, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    seed_booking(
        &db,
        SeedBooking::new("bk-103", service_id)
            .at((40.0, -74.0))
            .with_provider(provider_id)
            .with_status(field_dispatch_engine::db_types::BookingStatus::Completed),
    )
    .await;

    let db2 = db.clone();
    let (status, body) = post_request("/payouts/bk-103", None, move |cfg| {
        let payout_api = PayoutApi::new(db2, EventProducers::default());
        cfg.service(CreatePayoutRoute::<SqliteDatabase>::new()).app_data(web::Data::new(payout_api));
    })
    .await
    .expect("Request failed");
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("error"));
}

fn configure_dispatch(db: &SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    let db = db.clone();
    move |cfg: &mut ServiceConfig| {
        let dispatch_api = DispatchApi::new(db, DispatchConfig::default(), EventProducers::default());
        cfg.service(DispatchBookingRoute::<SqliteDatabase>::new())
            .service(DispatchLogRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(dispatch_api));
    }
}
