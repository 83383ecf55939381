//! Webhook endpoint for payment-processor event deliveries.
//!
//! The processor POSTs events here with an at-least-once guarantee, so deliveries can arrive
//! duplicated and out of order. The handler therefore acknowledges with a 200 for every outcome
//! the engine classifies as handled (applied, duplicate, or ignored) and reserves error statuses
//! for deliveries that should be retried or discarded as malformed. HMAC verification happens in
//! the middleware wrapping this route, before the body is ever parsed.

use actix_web::{web, HttpResponse};
use field_dispatch_engine::{
    traits::{DispatchManagement, PaymentManagement, SettlementManagement},
    DispatchGatewayError,
    PaymentEvent,
    PaymentEventApi,
};
use log::*;

use crate::{errors::ServerError, route};

route!(payment_event_webhook => Post "/payment_event" impl DispatchManagement, PaymentManagement, SettlementManagement);
pub async fn payment_event_webhook<B>(
    body: web::Json<PaymentEvent>,
    api: web::Data<PaymentEventApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DispatchManagement + PaymentManagement + SettlementManagement,
    DispatchGatewayError: From<<B as DispatchManagement>::Error>
        + From<<B as PaymentManagement>::Error>
        + From<<B as SettlementManagement>::Error>,
{
    let event = body.into_inner();
    debug!("📨 Webhook delivery {} ({})", event.id, event.event_type);
    let outcome = api.handle_event(event).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true, "outcome": outcome })))
}
