use std::sync::Arc;

use fdg_common::MoneyCents;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::ProcessorConfig,
    data_objects::{RefundCall, RefundReceipt},
    ProcessorApiError,
};

#[derive(Clone)]
pub struct ProcessorApi {
    config: ProcessorConfig,
    client: Arc<Client>,
}

impl ProcessorApi {
    pub fn new(config: ProcessorConfig) -> Result<Self, ProcessorApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.api_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProcessorApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, ProcessorApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| ProcessorApiError::ResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| ProcessorApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| ProcessorApiError::ResponseError(e.to_string()))?;
            Err(ProcessorApiError::RefundRejected { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Issues a refund against a stored charge reference. Returns the processor's reference for
    /// the refund transaction.
    pub async fn refund(&self, charge_ref: &str, amount: MoneyCents) -> Result<RefundReceipt, ProcessorApiError> {
        let body = RefundCall { charge: charge_ref.to_string(), amount: amount.value() };
        debug!("Requesting refund of {amount} against charge {charge_ref}");
        let receipt = self.rest_query::<RefundReceipt, RefundCall>(Method::POST, "/refunds", Some(body)).await?;
        info!("Processor accepted refund {} against charge {charge_ref}", receipt.id);
        Ok(receipt)
    }
}
