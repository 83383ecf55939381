use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    AuditEvent,
    BookingStatusChangedEvent,
    EventHandler,
    EventProducer,
    Handler,
    InvoiceRequestedEvent,
    ProviderAssignedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub provider_assigned_producer: Vec<EventProducer<ProviderAssignedEvent>>,
    pub booking_status_changed_producer: Vec<EventProducer<BookingStatusChangedEvent>>,
    pub invoice_requested_producer: Vec<EventProducer<InvoiceRequestedEvent>>,
    pub audit_producer: Vec<EventProducer<AuditEvent>>,
}

pub struct EventHandlers {
    pub on_provider_assigned: Option<EventHandler<ProviderAssignedEvent>>,
    pub on_booking_status_changed: Option<EventHandler<BookingStatusChangedEvent>>,
    pub on_invoice_requested: Option<EventHandler<InvoiceRequestedEvent>>,
    pub on_audit: Option<EventHandler<AuditEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_provider_assigned = hooks.on_provider_assigned.map(|f| EventHandler::new(buffer_size, f));
        let on_booking_status_changed = hooks.on_booking_status_changed.map(|f| EventHandler::new(buffer_size, f));
        let on_invoice_requested = hooks.on_invoice_requested.map(|f| EventHandler::new(buffer_size, f));
        let on_audit = hooks.on_audit.map(|f| EventHandler::new(buffer_size, f));
        Self { on_provider_assigned, on_booking_status_changed, on_invoice_requested, on_audit }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_provider_assigned {
            result.provider_assigned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_booking_status_changed {
            result.booking_status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_invoice_requested {
            result.invoice_requested_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_audit {
            result.audit_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_provider_assigned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_booking_status_changed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_invoice_requested {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_audit {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_provider_assigned: Option<Handler<ProviderAssignedEvent>>,
    pub on_booking_status_changed: Option<Handler<BookingStatusChangedEvent>>,
    pub on_invoice_requested: Option<Handler<InvoiceRequestedEvent>>,
    pub on_audit: Option<Handler<AuditEvent>>,
}

impl EventHooks {
    pub fn on_provider_assigned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ProviderAssignedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_provider_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_booking_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(BookingStatusChangedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_booking_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_invoice_requested<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(InvoiceRequestedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_invoice_requested = Some(Arc::new(f));
        self
    }

    pub fn on_audit<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AuditEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_audit = Some(Arc::new(f));
        self
    }
}
