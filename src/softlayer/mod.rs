pub mod auth;
pub mod client;
pub mod default_client;
pub mod registry;
pub mod services;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::Authentication;
pub use client::{Client, API_PRIVATE_ENDPOINT, API_PUBLIC_ENDPOINT};
pub use default_client::{default_client, set_default_client, DefaultClientHolder};
pub use registry::{ServiceRegistry, SERVICE_PREFIX};
pub use services::{Service, ServiceCall, ServiceOptions};
pub use transport::{ApiRequest, HttpTransport, Transport};
