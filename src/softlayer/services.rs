use anyhow::Result;
use serde_json::{json, Value};
use tracing::debug;

use super::client::{Client, WeakClient};
use super::transport::ApiRequest;
use crate::error::SoftLayerError;

/// Per-service settings a caller may supply when a handle is first created.
///
/// The owning client is injected by the registry and cannot be overridden
/// here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Overrides the client's network timeout, in seconds.
    pub timeout: Option<u64>,
    /// Object mask applied to calls that do not set their own.
    pub object_mask: Option<String>,
}

impl ServiceOptions {
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_object_mask(mut self, mask: impl Into<String>) -> Self {
        self.object_mask = Some(mask.into());
        self
    }
}

/// Handle for one API resource, bound to the client that created it.
#[derive(Debug)]
pub struct Service {
    name: String,
    options: ServiceOptions,
    client: WeakClient,
}

impl Service {
    pub(crate) fn new(name: String, client: WeakClient, options: ServiceOptions) -> Self {
        debug!(service = %name, "Creating service handle");
        Self {
            name,
            options,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    /// The owning client, if it is still alive.
    pub fn client(&self) -> Option<Client> {
        self.client.upgrade()
    }

    /// Starts a call with no per-call parameters set.
    pub fn prepare(&self) -> ServiceCall<'_> {
        ServiceCall::new(self)
    }

    pub fn object_with_id(&self, id: u64) -> ServiceCall<'_> {
        ServiceCall::new(self).object_with_id(id)
    }

    pub fn object_mask(&self, mask: impl Into<String>) -> ServiceCall<'_> {
        ServiceCall::new(self).object_mask(mask)
    }

    pub fn result_limit(&self, offset: u64, limit: u64) -> ServiceCall<'_> {
        ServiceCall::new(self).result_limit(offset, limit)
    }

    pub async fn call(&self, method: &str, parameters: Vec<Value>) -> Result<Value> {
        ServiceCall::new(self).call(method, parameters).await
    }
}

/// Per-call parameters layered on top of a service handle.
#[derive(Debug, Clone)]
pub struct ServiceCall<'a> {
    service: &'a Service,
    object_id: Option<u64>,
    object_mask: Option<String>,
    result_limit: Option<(u64, u64)>,
}

impl<'a> ServiceCall<'a> {
    fn new(service: &'a Service) -> Self {
        Self {
            service,
            object_id: None,
            object_mask: None,
            result_limit: None,
        }
    }

    pub fn object_with_id(mut self, id: u64) -> Self {
        self.object_id = Some(id);
        self
    }

    pub fn object_mask(mut self, mask: impl Into<String>) -> Self {
        self.object_mask = Some(mask.into());
        self
    }

    pub fn result_limit(mut self, offset: u64, limit: u64) -> Self {
        self.result_limit = Some((offset, limit));
        self
    }

    /// Assembles the request for `method` without sending it.
    pub fn request(&self, method: &str, parameters: Vec<Value>) -> Result<ApiRequest> {
        let service = self.service;
        let client = service
            .client()
            .ok_or_else(|| SoftLayerError::ClientDropped(service.name.clone()))?;

        let mut headers = client.authentication_headers();

        if let Some(id) = self.object_id {
            headers.insert(format!("{}InitParameters", service.name), json!({ "id": id }));
        }

        if let Some(mask) = self.object_mask.as_ref().or(service.options.object_mask.as_ref()) {
            headers.insert("SoftLayer_ObjectMask".to_string(), json!({ "mask": mask }));
        }

        if let Some((offset, limit)) = self.result_limit {
            headers.insert(
                "resultLimit".to_string(),
                json!({ "offset": offset, "limit": limit }),
            );
        }

        Ok(ApiRequest {
            endpoint_url: client.endpoint_url().to_string(),
            service: service.name.clone(),
            method: method.to_string(),
            headers,
            parameters,
            user_agent: client.user_agent().to_string(),
            timeout: service.options.timeout.or(client.network_timeout()),
        })
    }

    pub async fn call(self, method: &str, parameters: Vec<Value>) -> Result<Value> {
        let request = self.request(method, parameters)?;
        let client = self
            .service
            .client()
            .ok_or_else(|| SoftLayerError::ClientDropped(self.service.name.clone()))?;
        client.transport().call(request).await
    }
}
