//! HTTP calculator client.
//!
//! POSTs `{"composition_id": N}` as JSON. Only the response status is
//! inspected; the body is ignored.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{CalculationRequest, CalculatorClient, CalculatorError};

#[derive(Debug, Clone)]
pub struct HttpCalculatorClient {
    client: Client,
    url: String,
}

impl HttpCalculatorClient {
    /// Build a client for `url` whose requests give up after `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, CalculatorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalculatorError::Request(format!("client build: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl CalculatorClient for HttpCalculatorClient {
    async fn notify(&self, request: &CalculationRequest) -> Result<(), CalculatorError> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| CalculatorError::Request(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(CalculatorError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}
