//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. For this reason, any long, non-cpu-bound operation (e.g. I/O,
//! database operations, etc.) should be expressed as futures or asynchronous functions. Async handlers get executed
//! concurrently by worker threads and thus don’t block execution.

use actix_web::{get, web, HttpResponse, Responder};
use field_dispatch_engine::{
    db_types::BookingId,
    traits::{DispatchManagement, PaymentManagement, RefundProcessor, SettlementManagement},
    DispatchApi,
    DispatchGatewayError,
    PayoutApi,
    RefundRequest,
    SettlementApi,
};
use log::*;

use crate::{
    data_objects::{DispatchParams, SettleParams},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<B>(core::marker::PhantomData<fn() -> B>);}
        paste::paste! { impl<B> [<$name:camel Route>]<B> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> B>)
            }
        }}
        paste::paste! { impl<B> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B>
        where
            B: $($bounds +)+ 'static,
            $(field_dispatch_engine::DispatchGatewayError: From<<B as $bounds>::Error>,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where processor) => {
        paste::paste! { pub struct [<$name:camel Route>]<B, P>(core::marker::PhantomData<fn() -> (B, P)>);}
        paste::paste! { impl<B, P> [<$name:camel Route>]<B, P> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> (B, P)>)
            }
        }}
        paste::paste! { impl<B, P> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<B, P>
        where
            B: $($bounds +)+ 'static,
            P: field_dispatch_engine::traits::RefundProcessor + 'static,
            $(field_dispatch_engine::DispatchGatewayError: From<<B as $bounds>::Error>,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<B, P>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Dispatch  ----------------------------------------------------
route!(dispatch_booking => Post "/dispatch/{booking_id}" impl DispatchManagement);
/// Route handler for dispatch requests.
///
/// Runs the matching algorithm for the booking and assigns the best available provider, if any.
/// The body is optional; when present, it carries the ids of providers to exclude from the search
/// (typically providers who have already rejected the job). "No eligible provider" is a normal
/// outcome and still returns 200, with `success: false` in the body.
pub async fn dispatch_booking<B>(
    path: web::Path<String>,
    params: Option<web::Json<DispatchParams>>,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement,
    DispatchGatewayError: From<B::Error>,
{
    let booking_id = BookingId::from(path.into_inner());
    let params = params.map(|p| p.into_inner()).unwrap_or_default();
    debug!("🚚 Dispatch requested for booking {booking_id} (excluding {} providers)", params.exclude.len());
    let outcome = api.dispatch(&booking_id, &params.exclude).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(redispatch_booking => Post "/dispatch/{booking_id}/reassign" impl DispatchManagement);
/// Re-runs dispatch for a booking whose assigned provider has cancelled. Every provider that has
/// ever been assigned to the booking is excluded from the new search.
pub async fn redispatch_booking<B>(
    path: web::Path<String>,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement,
    DispatchGatewayError: From<B::Error>,
{
    let booking_id = BookingId::from(path.into_inner());
    debug!("🚚 Re-dispatch requested for booking {booking_id}");
    let outcome = api.redispatch(&booking_id).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(dispatch_log => Get "/dispatch/{booking_id}/log" impl DispatchManagement);
/// The append-only dispatch history for a booking, oldest first.
pub async fn dispatch_log<B>(
    path: web::Path<String>,
    api: web::Data<DispatchApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement,
    DispatchGatewayError: From<B::Error>,
{
    let booking_id = BookingId::from(path.into_inner());
    let history = api.dispatch_history(&booking_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

//----------------------------------------------   Payouts  ----------------------------------------------------
route!(create_payout => Post "/payouts/{booking_id}" impl DispatchManagement, PaymentManagement, SettlementManagement);
/// Creates the standard payout for a completed, paid booking.
///
/// Idempotent: repeating the call returns the existing payout unchanged.
pub async fn create_payout<B>(path: web::Path<String>, api: web::Data<PayoutApi<B>>) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement + PaymentManagement + SettlementManagement,
    DispatchGatewayError: From<<B as DispatchManagement>::Error>
        + From<<B as PaymentManagement>::Error>
        + From<<B as SettlementManagement>::Error>,
{
    let booking_id = BookingId::from(path.into_inner());
    debug!("💰 Payout requested for booking {booking_id}");
    let payout = api.create_payout_for_booking(&booking_id).await?;
    Ok(HttpResponse::Ok().json(payout))
}

route!(payout_for_booking => Get "/payouts/{booking_id}" impl DispatchManagement, PaymentManagement, SettlementManagement);
pub async fn payout_for_booking<B>(
    path: web::Path<String>,
    api: web::Data<PayoutApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement + PaymentManagement + SettlementManagement,
    DispatchGatewayError: From<<B as DispatchManagement>::Error>
        + From<<B as PaymentManagement>::Error>
        + From<<B as SettlementManagement>::Error>,
{
    let booking_id = BookingId::from(path.into_inner());
    let payout = api
        .payout_for_booking(&booking_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payout exists for booking {booking_id}")))?;
    Ok(HttpResponse::Ok().json(payout))
}

//----------------------------------------------   Settlement  ----------------------------------------------------
route!(refund_payment => Post "/settlement/refund" impl PaymentManagement, SettlementManagement where processor);
/// Refunds the confirmed payment for a booking and reconciles the provider's payout.
///
/// For card payments with a stored processor reference, the refund is forwarded to the external
/// processor first; a processor failure aborts the whole operation with the local records
/// untouched. Refunding the same payment twice returns a 409.
pub async fn refund_payment<B, P>(
    body: web::Json<RefundRequest>,
    api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement + SettlementManagement,
    P: RefundProcessor,
    DispatchGatewayError: From<<B as PaymentManagement>::Error> + From<<B as SettlementManagement>::Error>,
{
    let request = body.into_inner();
    info!("🏦 Refund requested for booking {} by {}", request.booking_id, request.requested_by);
    let outcome = api.refund(request).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

route!(settle_payouts => Post "/settlement/settle" impl PaymentManagement, SettlementManagement where processor);
/// Marks a batch of pending payouts as paid, sweeping in every pending clawback belonging to the
/// same providers so that nobody is paid while owing money back.
pub async fn settle_payouts<B, P>(
    body: web::Json<SettleParams>,
    api: web::Data<SettlementApi<B, P>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement + SettlementManagement,
    P: RefundProcessor,
    DispatchGatewayError: From<<B as PaymentManagement>::Error> + From<<B as SettlementManagement>::Error>,
{
    let params = body.into_inner();
    info!("🏦 Settlement of {} payouts requested by {}", params.payout_ids.len(), params.requested_by);
    let batch = api.settle_payouts(&params.payout_ids, &params.requested_by).await?;
    Ok(HttpResponse::Ok().json(batch))
}
