//! Client core for the SoftLayer API.
//!
//! A [`Client`] resolves credentials from caller options, the `SL_*`
//! environment and configuration files, derives how requests authenticate,
//! and hands out cached per-resource [`Service`] handles.

pub mod config;
pub mod error;
pub mod softlayer;

pub use crate::config::{ClientOptions, ConfigResolver, LayeredConfigResolver, OptionsOnly};
pub use crate::error::SoftLayerError;
pub use crate::softlayer::{
    default_client, set_default_client, ApiRequest, Authentication, Client, DefaultClientHolder,
    HttpTransport, Service, ServiceCall, ServiceOptions, Transport,
};
