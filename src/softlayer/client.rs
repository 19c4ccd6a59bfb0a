use anyhow::Result;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Weak};
use tracing::info;

use super::auth::{self, Authentication};
use super::registry::ServiceRegistry;
use super::services::{Service, ServiceOptions};
use super::transport::{HttpTransport, Transport};
use crate::config::{ClientOptions, ConfigResolver, LayeredConfigResolver, OptionsOnly};
use crate::error::SoftLayerError;

/// Public API endpoint, used when no endpoint is configured.
pub const API_PUBLIC_ENDPOINT: &str = "https://api.softlayer.com/rest/v3/";

/// API endpoint reachable from the private network.
pub const API_PRIVATE_ENDPOINT: &str = "https://api.service.softlayer.com/rest/v3/";

/// Service and method the password bootstrap logs in through.
const LOGIN_SERVICE: &str = "User_Customer";
const LOGIN_METHOD: &str = "getPortalLoginToken";

pub fn default_user_agent() -> String {
    format!(
        "softlayer-api-rust/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

/// Resolved identity, endpoint and service cache for talking to the API.
///
/// Cloning is cheap and every clone shares the same service cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    username: Option<String>,
    api_key: Option<String>,
    user_id: Option<u64>,
    auth_token: Option<String>,
    endpoint_url: String,
    user_agent: String,
    network_timeout: Option<u64>,
    services: ServiceRegistry,
    transport: Arc<dyn Transport>,
}

/// Back-reference a service keeps to the client that owns it.
#[derive(Clone)]
pub(crate) struct WeakClient(Weak<ClientInner>);

impl WeakClient {
    pub(crate) fn upgrade(&self) -> Option<Client> {
        self.0.upgrade().map(|inner| Client { inner })
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        WeakClient(Weak::new())
    }
}

impl std::fmt::Debug for WeakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WeakClient")
    }
}

impl Client {
    /// Builds a client from `options`, the `SL_*` environment and the usual
    /// configuration files, talking JSON over HTTPS.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Self::with_components(
            options,
            &LayeredConfigResolver::from_environment(),
            Arc::new(HttpTransport::new()),
        )
    }

    pub fn with_components(
        options: &ClientOptions,
        resolver: &dyn ConfigResolver,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let settings = resolver.resolve(options)?;

        let endpoint_url = settings
            .endpoint_url
            .unwrap_or_else(|| API_PUBLIC_ENDPOINT.to_string());

        if endpoint_url.is_empty() {
            return Err(SoftLayerError::ConfigError(
                "A client requires a non-empty endpoint URL".to_string(),
            )
            .into());
        }

        let user_agent = settings.user_agent.unwrap_or_else(default_user_agent);

        let client = Self {
            inner: Arc::new(ClientInner {
                username: settings.username,
                api_key: settings.api_key,
                user_id: settings.user_id,
                auth_token: settings.auth_token,
                endpoint_url,
                user_agent,
                network_timeout: settings.timeout,
                services: ServiceRegistry::new(),
                transport,
            }),
        };

        info!(
            endpoint_url = %client.endpoint_url(),
            authentication = ?client.authentication(),
            "SoftLayer client initialized"
        );

        Ok(client)
    }

    /// Exchanges a username and password for a portal login token, then
    /// builds a token-based client.
    pub async fn with_password(options: &ClientOptions) -> Result<Self> {
        Self::with_password_using(
            options,
            &LayeredConfigResolver::from_environment(),
            Arc::new(HttpTransport::new()),
        )
        .await
    }

    pub async fn with_password_using(
        options: &ClientOptions,
        resolver: &dyn ConfigResolver,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let username = match options.username.as_deref() {
            Some(username) if !username.is_empty() => username,
            _ => {
                return Err(SoftLayerError::ValidationError(
                    "A username is required to log in with a password".to_string(),
                )
                .into())
            }
        };

        let password = match options.password.as_deref() {
            Some(password) if !password.is_empty() => password,
            _ => {
                return Err(SoftLayerError::ValidationError(
                    "A password is required to log in with a password".to_string(),
                )
                .into())
            }
        };

        // The login call is anonymous; only the endpoint settings carry over.
        let resolved = resolver.resolve(options)?;
        let login_options = ClientOptions {
            endpoint_url: resolved.endpoint_url,
            user_agent: resolved.user_agent,
            timeout: resolved.timeout,
            ..ClientOptions::default()
        };
        let login_client = Self::with_components(&login_options, &OptionsOnly, transport.clone())?;
        info!(username = %username, "Requesting portal login token");

        let token = login_client
            .service(LOGIN_SERVICE)?
            .call(
                LOGIN_METHOD,
                vec![json!(username), json!(password), Value::Null, Value::Null],
            )
            .await?;

        let user_id = token
            .get("userId")
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                SoftLayerError::ResponseError("login token has no userId".to_string())
            })?;
        let auth_token = token
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| SoftLayerError::ResponseError("login token has no hash".to_string()))?;

        let mut token_options = options.clone();
        token_options.user_id = Some(user_id);
        token_options.auth_token = Some(auth_token.to_string());
        token_options.password = None;

        Self::with_components(&token_options, resolver, transport)
    }

    pub fn username(&self) -> Option<&str> {
        self.inner.username.as_deref()
    }

    pub fn api_key(&self) -> Option<&str> {
        self.inner.api_key.as_deref()
    }

    pub fn user_id(&self) -> Option<u64> {
        self.inner.user_id
    }

    pub fn auth_token(&self) -> Option<&str> {
        self.inner.auth_token.as_deref()
    }

    pub fn endpoint_url(&self) -> &str {
        &self.inner.endpoint_url
    }

    pub fn user_agent(&self) -> &str {
        &self.inner.user_agent
    }

    /// Seconds, or `None` to leave the transport's default alone.
    pub fn network_timeout(&self) -> Option<u64> {
        self.inner.network_timeout
    }

    pub fn is_token_based(&self) -> bool {
        auth::is_token_based(self.inner.user_id, self.auth_token())
    }

    pub fn is_key_based(&self) -> bool {
        auth::is_key_based(self.username(), self.api_key())
    }

    pub fn authentication(&self) -> Authentication {
        Authentication::from_credentials(
            self.username(),
            self.api_key(),
            self.user_id(),
            self.auth_token(),
        )
    }

    pub fn authentication_headers(&self) -> Map<String, Value> {
        self.authentication().headers()
    }

    /// Returns the handle for `name`, creating it on first use.
    ///
    /// `options` only take effect when the handle is created. Later calls
    /// for the same canonical name get the cached handle and their options
    /// are ignored.
    pub fn service_named(&self, name: &str, options: ServiceOptions) -> Result<Arc<Service>> {
        let owner = WeakClient(Arc::downgrade(&self.inner));
        self.inner
            .services
            .get_or_create(name, move |canonical| Service::new(canonical, owner, options))
    }

    /// Shorthand for `service_named(name, ServiceOptions::default())`.
    pub fn service(&self, name: &str) -> Result<Arc<Service>> {
        self.service_named(name, ServiceOptions::default())
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.inner.services
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.inner.transport
    }

    /// True when both values are handles to the same client.
    pub fn ptr_eq(&self, other: &Client) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint_url", &self.inner.endpoint_url)
            .field("user_agent", &self.inner.user_agent)
            .field("network_timeout", &self.inner.network_timeout)
            .field("authentication", &self.authentication())
            .finish_non_exhaustive()
    }
}
