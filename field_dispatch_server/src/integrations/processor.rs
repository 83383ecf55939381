use fdg_common::MoneyCents;
use field_dispatch_engine::traits::{RefundProcessor, RefundProcessorError};
use log::debug;
use processor_tools::{ProcessorApi, ProcessorApiError, ProcessorConfig};

/// Adapts the card processor client to the engine's [`RefundProcessor`] port.
#[derive(Clone)]
pub struct ProcessorRefunder {
    api: ProcessorApi,
}

impl ProcessorRefunder {
    pub fn try_from_config(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        let api = ProcessorApi::new(config)?;
        Ok(Self { api })
    }
}

impl RefundProcessor for ProcessorRefunder {
    async fn refund(&self, processor_ref: &str, amount: MoneyCents) -> Result<String, RefundProcessorError> {
        debug!("🏦️ Forwarding refund of {amount} against charge {processor_ref} to the processor");
        let receipt = self.api.refund(processor_ref, amount).await.map_err(|e| match e {
            ProcessorApiError::RefundRejected { status, message } => {
                RefundProcessorError::RefundRejected(format!("HTTP {status}: {message}"))
            },
            other => RefundProcessorError::Unreachable(other.to_string()),
        })?;
        Ok(receipt.id)
    }
}
