use actix_web::{
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use fdg_common::Secret;
use field_dispatch_engine::{
    events::EventProducers,
    helpers::RecentEventCache,
    test_utils::{seed_booking, SeedBooking, seed_service},
    PaymentEventApi,
    SqliteDatabase,
};

use super::helpers::{new_db, send_request};
use crate::{
    helpers::calculate_hmac,
    middleware::HmacMiddlewareFactory,
    server::WEBHOOK_SIGNATURE_HEADER,
    webhook_routes::PaymentEventWebhookRoute,
};

const TEST_SECRET: &str = "whsec_test_0000";

fn signed_post(body: &str, secret: &str) -> TestRequest {
    let signature = calculate_hmac(secret, body.as_bytes());
    TestRequest::post()
        .uri("/webhook/payment_event")
        .insert_header(ContentType::json())
        .insert_header((WEBHOOK_SIGNATURE_HEADER, signature))
        .set_payload(body.to_string())
}

fn configure_webhook(db: &SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    let db = db.clone();
    move |cfg: &mut ServiceConfig| {
        let api = PaymentEventApi::new(db, RecentEventCache::default(), EventProducers::default());
        let scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, Secret::new(TEST_SECRET.to_string()), true))
            .service(PaymentEventWebhookRoute::<SqliteDatabase>::new());
        cfg.service(scope).app_data(web::Data::new(api));
    }
}

#[actix_web::test]
async fn unsigned_delivery_is_rejected() {
    let db = new_db().await;
    let req = TestRequest::post()
        .uri("/webhook/payment_event")
        .insert_header(ContentType::json())
        .set_payload(r#"{"id":"evt_1","type":"checkout.completed"}"#);
    let err = send_request(req, configure_webhook(&db)).await.expect_err("Expected rejection");
    assert_eq!(err, "No HMAC signature found.");
}

#[actix_web::test]
async fn tampered_delivery_is_rejected() {
    let db = new_db().await;
    let mut req = signed_post(r#"{"id":"evt_2","type":"checkout.completed","data":{}}"#, TEST_SECRET);
    // The signature was computed over a different body.
    req = req.set_payload(r#"{"id":"evt_2","type":"charge.refunded","data":{}}"#);
    let err = send_request(req, configure_webhook(&db)).await.expect_err("Expected rejection");
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn delivery_signed_with_wrong_key_is_rejected() {
    let db = new_db().await;
    let req = signed_post(r#"{"id":"evt_3","type":"checkout.completed","data":{}}"#, "whsec_somebody_else");
    let err = send_request(req, configure_webhook(&db)).await.expect_err("Expected rejection");
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn missing_signing_secret_is_a_server_error() {
    let db = new_db().await;
    let req = signed_post(r#"{"id":"evt_7","type":"checkout.completed","data":{}}"#, "");
    let db2 = db.clone();
    let err = send_request(req, move |cfg: &mut ServiceConfig| {
        let api = PaymentEventApi::new(db2, RecentEventCache::default(), EventProducers::default());
        let scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(WEBHOOK_SIGNATURE_HEADER, Secret::new(String::new()), true))
            .service(PaymentEventWebhookRoute::<SqliteDatabase>::new());
        cfg.service(scope).app_data(web::Data::new(api));
    })
    .await
    .expect_err("Expected rejection");
    assert_eq!(err, "Webhook signing secret is not configured.");
}

#[actix_web::test]
async fn unhandled_event_is_acknowledged() {
    let db = new_db().await;
    let body = r#"{"id":"evt_4","type":"loyalty.points_awarded","data":{}}"#;
    let (status, body) =
        send_request(signed_post(body, TEST_SECRET), configure_webhook(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"outcome\":\"ignored\""));
}

#[actix_web::test]
async fn signed_checkout_event_records_the_payment() {
    let db = new_db().await;
    let service_id = seed_service(&db, "Fence repair", "carpentry", 0).await;
    seed_booking(&db, SeedBooking::new("bk-200", service_id)).await;

    let body = r#"{"id":"evt_5","type":"checkout.completed","data":{"booking_id":"bk-200","amount":12000,"method":"cash"}}"#;
    let (status, body) =
        send_request(signed_post(body, TEST_SECRET), configure_webhook(&db)).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("\"outcome\":\"applied\""));
}

#[actix_web::test]
async fn duplicate_delivery_is_short_circuited() {
    let db = new_db().await;
    let body = r#"{"id":"evt_6","type":"ops.heartbeat","data":{}}"#;
    let app = App::new().configure(configure_webhook(&db));
    let service = test::init_service(app).await;

    let res = test::call_service(&service, signed_post(body, TEST_SECRET).to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let res = test::call_service(&service, signed_post(body, TEST_SECRET).to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
    let payload: serde_json::Value = test::read_body_json(res).await;
    assert_eq!(payload["outcome"], "duplicate");
}
