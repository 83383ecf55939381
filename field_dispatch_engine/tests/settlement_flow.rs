//! Refund, clawback and batch-settlement scenarios.

use std::sync::{Arc, Mutex};

use fdg_common::MoneyCents;
use field_dispatch_engine::{
    db_types::{BookingId, BookingStatus, CommissionType, PaymentMethod, PaymentStatus, PayoutStatus, PayoutType},
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, seed_booking, seed_payment, seed_provider, seed_service, SeedBooking},
    traits::{RefundProcessor, RefundProcessorError},
    DispatchGatewayError,
    PaymentManagement,
    PayoutAdjustment,
    PayoutApi,
    RefundKind,
    RefundRequest,
    SettlementApi,
    SettlementManagement,
    SqliteDatabase,
};

#[derive(Clone, Default)]
struct TestProcessor {
    fail: bool,
    calls: Arc<Mutex<Vec<(String, i64)>>>,
}

impl TestProcessor {
    fn failing() -> Self {
        Self { fail: true, calls: Arc::default() }
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl RefundProcessor for TestProcessor {
    async fn refund(&self, processor_ref: &str, amount: MoneyCents) -> Result<String, RefundProcessorError> {
        if self.fail {
            return Err(RefundProcessorError::RefundRejected("card network declined".to_string()));
        }
        self.calls.lock().unwrap().push((processor_ref.to_string(), amount.value()));
        Ok(format!("re_{processor_ref}"))
    }
}

async fn new_db() -> SqliteDatabase {
    let _ = env_logger::try_init();
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database")
}

fn payout_api(db: &SqliteDatabase) -> PayoutApi<SqliteDatabase> {
    PayoutApi::new(db.clone(), EventProducers::default())
}

fn settlement_api(db: &SqliteDatabase, processor: TestProcessor) -> SettlementApi<SqliteDatabase, TestProcessor> {
    SettlementApi::new(db.clone(), processor, EventProducers::default())
}

/// A completed booking with a confirmed card payment and an assigned provider (70% share).
async fn completed_paid_booking(db: &SqliteDatabase, booking_id: &str, amount: i64) -> (BookingId, i64) {
    let service = seed_service(db, "Plumbing", "plumbing", 0).await;
    let provider = seed_provider(db, "Alice", (40.0, -74.0), &["plumbing"], CommissionType::Standard, 7000, 0).await;
    let booking = seed_booking(
        db,
        SeedBooking::new(booking_id, service).with_status(BookingStatus::Completed).with_provider(provider),
    )
    .await;
    seed_payment(db, &booking, amount, PaymentMethod::Card, PaymentStatus::Confirmed, Some(&format!("ch_{booking_id}")))
        .await;
    (booking, provider)
}

#[tokio::test]
async fn payout_creation_is_idempotent() {
    let db = new_db().await;
    let (booking, provider) = completed_paid_booking(&db, "bk-pay-1", 10_000).await;
    let api = payout_api(&db);

    let first = api.create_payout_for_booking(&booking).await.unwrap();
    assert_eq!(first.amount, MoneyCents::from(7_000));
    assert_eq!(first.provider_id, provider);
    assert_eq!(first.payout_type, PayoutType::Standard);

    let second = api.create_payout_for_booking(&booking).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.amount, first.amount);
}

#[tokio::test]
async fn service_commission_takes_priority_over_provider_rate() {
    let db = new_db().await;
    let service = seed_service(&db, "HVAC", "hvac", 1_500).await;
    let provider = seed_provider(&db, "Bob", (40.0, -74.0), &["hvac"], CommissionType::Standard, 7000, 0).await;
    let booking = seed_booking(
        &db,
        SeedBooking::new("bk-pay-2", service).with_status(BookingStatus::Completed).with_provider(provider),
    )
    .await;
    seed_payment(&db, &booking, 10_000, PaymentMethod::Card, PaymentStatus::Confirmed, Some("ch_pay2")).await;

    let payout = payout_api(&db).create_payout_for_booking(&booking).await.unwrap();
    // The platform takes 15%, the provider keeps the rest
    assert_eq!(payout.amount, MoneyCents::from(8_500));
}

#[tokio::test]
async fn payout_requires_a_completed_booking() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let provider = seed_provider(&db, "Carol", (40.0, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking = seed_booking(
        &db,
        SeedBooking::new("bk-pay-3", service).with_status(BookingStatus::InProgress).with_provider(provider),
    )
    .await;
    seed_payment(&db, &booking, 10_000, PaymentMethod::Card, PaymentStatus::Confirmed, None).await;

    let err = payout_api(&db).create_payout_for_booking(&booking).await.unwrap_err();
    assert!(matches!(err, DispatchGatewayError::InvalidState(_)));
}

#[tokio::test]
async fn a_second_refund_is_rejected_without_mutation() {
    let db = new_db().await;
    let (booking, _) = completed_paid_booking(&db, "bk-ref-1", 10_000).await;
    payout_api(&db).create_payout_for_booking(&booking).await.unwrap();

    let processor = TestProcessor::default();
    let api = settlement_api(&db, processor.clone());
    let request = RefundRequest {
        booking_id: booking.clone(),
        kind: RefundKind::Full,
        amount: None,
        reason: "Customer complaint".to_string(),
        requested_by: "admin@example.com".to_string(),
    };
    let outcome = api.refund(request.clone()).await.unwrap();
    assert_eq!(outcome.payment.refund_amount, Some(MoneyCents::from(10_000)));
    assert_eq!(outcome.payment.status, PaymentStatus::Refunded);
    assert_eq!(processor.call_count(), 1);

    let err = api.refund(request).await.unwrap_err();
    assert!(matches!(err, DispatchGatewayError::InvalidState(_)));
    // No second processor call, no change to the stored refund
    assert_eq!(processor.call_count(), 1);
    let payment = db.payment_for_booking(&booking).await.unwrap().unwrap();
    assert_eq!(payment.refund_amount, Some(MoneyCents::from(10_000)));
}

#[tokio::test]
async fn partial_refund_reduces_a_pending_payout_proportionally() {
    let db = new_db().await;
    let (booking, _) = completed_paid_booking(&db, "bk-ref-2", 10_000).await;
    let payout = payout_api(&db).create_payout_for_booking(&booking).await.unwrap();
    assert_eq!(payout.amount, MoneyCents::from(7_000));

    let api = settlement_api(&db, TestProcessor::default());
    let outcome = api
        .refund(RefundRequest {
            booking_id: booking.clone(),
            kind: RefundKind::Partial,
            amount: Some(MoneyCents::from(4_000)),
            reason: "Job partially done".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap();

    // 40% refunded, so the payout drops by round(7000 * 0.4) = 2800
    match outcome.adjustment {
        PayoutAdjustment::AdjustedPending { payout_id, previous_amount, new_amount } => {
            assert_eq!(payout_id, payout.id);
            assert_eq!(previous_amount, MoneyCents::from(7_000));
            assert_eq!(new_amount, MoneyCents::from(4_200));
        },
        other => panic!("Expected an adjusted pending payout, got {other:?}"),
    }
    let stored = db.standard_payout_for_booking(&booking).await.unwrap().unwrap();
    assert_eq!(stored.amount, MoneyCents::from(4_200));
    assert_eq!(stored.status, PayoutStatus::Pending);
}

#[tokio::test]
async fn refund_amount_exceeding_the_payment_is_rejected() {
    let db = new_db().await;
    let (booking, _) = completed_paid_booking(&db, "bk-ref-3", 10_000).await;
    let api = settlement_api(&db, TestProcessor::default());
    let err = api
        .refund(RefundRequest {
            booking_id: booking.clone(),
            kind: RefundKind::Partial,
            amount: Some(MoneyCents::from(10_001)),
            reason: "Too much".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchGatewayError::ValidationError(_)));
    let payment = db.payment_for_booking(&booking).await.unwrap().unwrap();
    assert!(payment.refund_amount.is_none());
}

#[tokio::test]
async fn processor_failure_aborts_before_any_mutation() {
    let db = new_db().await;
    let (booking, _) = completed_paid_booking(&db, "bk-ref-4", 10_000).await;
    let payout = payout_api(&db).create_payout_for_booking(&booking).await.unwrap();

    let api = settlement_api(&db, TestProcessor::failing());
    let err = api
        .refund(RefundRequest {
            booking_id: booking.clone(),
            kind: RefundKind::Full,
            amount: None,
            reason: "Declined".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchGatewayError::ExternalServiceError(_)));

    // Nothing was touched
    let payment = db.payment_for_booking(&booking).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Confirmed);
    assert!(payment.refund_amount.is_none());
    let stored = db.standard_payout_for_booking(&booking).await.unwrap().unwrap();
    assert_eq!(stored.amount, payout.amount);
}

#[tokio::test]
async fn card_payment_without_a_reference_gets_a_database_only_refund() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let provider = seed_provider(&db, "Dave", (40.0, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking = seed_booking(
        &db,
        SeedBooking::new("bk-ref-5", service).with_status(BookingStatus::Completed).with_provider(provider),
    )
    .await;
    seed_payment(&db, &booking, 5_000, PaymentMethod::Card, PaymentStatus::Confirmed, None).await;

    let processor = TestProcessor::default();
    let api = settlement_api(&db, processor.clone());
    let outcome = api
        .refund(RefundRequest {
            booking_id: booking,
            kind: RefundKind::Full,
            amount: None,
            reason: "No reference on file".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(outcome.payment.refund_amount, Some(MoneyCents::from(5_000)));
    assert_eq!(processor.call_count(), 0);
}

#[tokio::test]
async fn full_refund_of_a_paid_payout_creates_a_matching_clawback() {
    let db = new_db().await;
    let (booking, provider) = completed_paid_booking(&db, "bk-claw-1", 10_000).await;
    let payout = payout_api(&db).create_payout_for_booking(&booking).await.unwrap();

    let api = settlement_api(&db, TestProcessor::default());
    // Pay the provider out first
    let batch = api.settle_payouts(&[payout.id], "finance@example.com").await.unwrap();
    assert_eq!(batch.payouts_settled, vec![payout.id]);

    // Now the customer is refunded in full
    let outcome = api
        .refund(RefundRequest {
            booking_id: booking.clone(),
            kind: RefundKind::Full,
            amount: None,
            reason: "Chargeback avoided".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap();
    let clawback = match outcome.adjustment {
        PayoutAdjustment::ClawbackCreated(c) => c,
        other => panic!("Expected a clawback, got {other:?}"),
    };
    // Conservation: the clawback reverses the full paid amount
    assert_eq!(clawback.amount, -payout.amount);
    assert_eq!(clawback.payout_type, PayoutType::Clawback);
    assert_eq!(clawback.status, PayoutStatus::Pending);
    assert_eq!(clawback.original_payout_id, Some(payout.id));
    assert_eq!(db.pending_clawbacks_for_provider(provider).await.unwrap().len(), 1);
}

#[tokio::test]
async fn batch_settlement_sweeps_the_providers_clawbacks() {
    let db = new_db().await;
    let (booking_a, provider_a) = completed_paid_booking(&db, "bk-claw-2", 10_000).await;
    let payout_a = payout_api(&db).create_payout_for_booking(&booking_a).await.unwrap();

    let api = settlement_api(&db, TestProcessor::default());
    api.settle_payouts(&[payout_a.id], "finance@example.com").await.unwrap();
    api.refund(RefundRequest {
        booking_id: booking_a.clone(),
        kind: RefundKind::Full,
        amount: None,
        reason: "Refund after payout".to_string(),
        requested_by: "admin@example.com".to_string(),
    })
    .await
    .unwrap();

    // Provider A completes another job; provider B has a pending payout of their own
    let service = seed_service(&db, "Electrical", "electrical", 0).await;
    let booking_a2 = seed_booking(
        &db,
        SeedBooking::new("bk-claw-2b", service).with_status(BookingStatus::Completed).with_provider(provider_a),
    )
    .await;
    seed_payment(&db, &booking_a2, 6_000, PaymentMethod::Card, PaymentStatus::Confirmed, Some("ch_claw2b")).await;
    let payout_a2 = payout_api(&db).create_payout_for_booking(&booking_a2).await.unwrap();

    let provider_b = seed_provider(&db, "Eve", (40.0, -74.0), &[], CommissionType::Standard, 7000, 0).await;
    let booking_b = seed_booking(
        &db,
        SeedBooking::new("bk-claw-2c", service).with_status(BookingStatus::Completed).with_provider(provider_b),
    )
    .await;
    seed_payment(&db, &booking_b, 8_000, PaymentMethod::Card, PaymentStatus::Confirmed, Some("ch_claw2c")).await;
    let payout_b = payout_api(&db).create_payout_for_booking(&booking_b).await.unwrap();

    // Settling A's new payout also settles A's outstanding clawback, but leaves B untouched
    let batch = api.settle_payouts(&[payout_a2.id], "finance@example.com").await.unwrap();
    assert_eq!(batch.payouts_settled, vec![payout_a2.id]);
    assert_eq!(batch.clawbacks_settled.len(), 1);
    assert!(db.pending_clawbacks_for_provider(provider_a).await.unwrap().is_empty());

    let b_payout = db.standard_payout_for_booking(&booking_b).await.unwrap().unwrap();
    assert_eq!(b_payout.id, payout_b.id);
    assert_eq!(b_payout.status, PayoutStatus::Pending);
}

#[tokio::test]
async fn refund_with_no_payout_has_no_payout_side_effect() {
    let db = new_db().await;
    let service = seed_service(&db, "Plumbing", "plumbing", 0).await;
    let booking = seed_booking(&db, SeedBooking::new("bk-ref-6", service).with_status(BookingStatus::Completed)).await;
    seed_payment(&db, &booking, 4_000, PaymentMethod::Cash, PaymentStatus::Confirmed, None).await;

    let api = settlement_api(&db, TestProcessor::default());
    let outcome = api
        .refund(RefundRequest {
            booking_id: booking,
            kind: RefundKind::Full,
            amount: None,
            reason: "Cash returned on site".to_string(),
            requested_by: "admin@example.com".to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(outcome.adjustment, PayoutAdjustment::NoPayout));
}
