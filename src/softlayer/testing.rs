use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use super::transport::{ApiRequest, Transport};
use crate::error::SoftLayerError;

/// In-memory transport that records every request it sees.
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<ApiRequest>>,
    response: Value,
    failure: Mutex<Option<SoftLayerError>>,
}

impl RecordingTransport {
    pub fn returning(response: Value) -> Self {
        Self {
            response,
            ..Self::default()
        }
    }

    /// Fails the first call with `error`.
    pub fn failing(error: SoftLayerError) -> Self {
        Self {
            failure: Mutex::new(Some(error)),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request);
        if let Some(error) = self.failure.lock().unwrap().take() {
            return Err(error.into());
        }
        Ok(self.response.clone())
    }
}
