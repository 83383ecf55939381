use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use field_dispatch_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    helpers::RecentEventCache,
    DispatchApi,
    PaymentEventApi,
    PayoutApi,
    SettlementApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::ProcessorRefunder,
    middleware::HmacMiddlewareFactory,
    routes::{
        health,
        CreatePayoutRoute,
        DispatchBookingRoute,
        DispatchLogRoute,
        PayoutForBookingRoute,
        RedispatchBookingRoute,
        RefundPaymentRoute,
        SettlePayoutsRoute,
    },
    webhook_routes::PaymentEventWebhookRoute,
};

/// The header the payment processor uses to deliver the webhook signature.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "x-fdg-signature";
const EVENT_BUFFER_SIZE: usize = 100;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let refunder = ProcessorRefunder::try_from_config(config.processor.clone())
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    // One dedup cache for the whole server. Worker threads share it, so a duplicate delivery is
    // short-circuited no matter which worker receives it.
    let event_cache = RecentEventCache::default();
    let srv = HttpServer::new(move || {
        let dispatch_api = DispatchApi::new(db.clone(), config.dispatch, producers.clone());
        let payout_api = PayoutApi::new(db.clone(), producers.clone());
        let settlement_api = SettlementApi::new(db.clone(), refunder.clone(), producers.clone());
        let event_api = PaymentEventApi::new(db.clone(), event_cache.clone(), producers.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("fds::access_log"))
            .app_data(web::Data::new(dispatch_api))
            .app_data(web::Data::new(payout_api))
            .app_data(web::Data::new(settlement_api))
            .app_data(web::Data::new(event_api));
        let webhook_scope = web::scope("/webhook")
            .wrap(HmacMiddlewareFactory::new(
                WEBHOOK_SIGNATURE_HEADER,
                config.webhook_secret.clone(),
                config.webhook_signature_checks,
            ))
            .service(PaymentEventWebhookRoute::<SqliteDatabase>::new());
        app.service(health)
            .service(DispatchBookingRoute::<SqliteDatabase>::new())
            .service(RedispatchBookingRoute::<SqliteDatabase>::new())
            .service(DispatchLogRoute::<SqliteDatabase>::new())
            .service(CreatePayoutRoute::<SqliteDatabase>::new())
            .service(PayoutForBookingRoute::<SqliteDatabase>::new())
            .service(RefundPaymentRoute::<SqliteDatabase, ProcessorRefunder>::new())
            .service(SettlePayoutsRoute::<SqliteDatabase, ProcessorRefunder>::new())
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The default event hooks: every engine event is logged. Deployments that forward notifications
/// or invoices to external systems replace these with their own hooks.
fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks.on_provider_assigned(|ev| {
        Box::pin(async move {
            let payout = ev.estimated_payout.map(|p| p.to_string()).unwrap_or_else(|| "unknown".to_string());
            info!(
                "🚚 Provider #{} assigned to booking {} at {:.1} mi. Estimated payout: {payout}",
                ev.provider_id, ev.booking.booking_id, ev.distance_miles
            );
        })
    });
    hooks.on_booking_status_changed(|ev| {
        Box::pin(async move {
            info!("📬️ Booking {} moved from {} to {}", ev.booking.booking_id, ev.old_status, ev.new_status);
        })
    });
    hooks.on_invoice_requested(|ev| {
        Box::pin(async move {
            info!("💰 Invoice of {} requested for booking {}", ev.amount, ev.booking.booking_id);
        })
    });
    hooks.on_audit(|ev| {
        Box::pin(async move {
            info!("🔍️ {} on {} {} by {}. {}", ev.action, ev.resource_type, ev.resource_id, ev.user_id, ev.details);
        })
    });
    hooks
}
