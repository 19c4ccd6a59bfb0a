use anyhow::Result;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SoftLayerError;

/// Section every configuration file keeps its settings under.
pub const CONFIG_SECTION: &str = "softlayer";

pub const ENV_USERNAME: &str = "SL_USERNAME";
pub const ENV_API_KEY: &str = "SL_API_KEY";
pub const ENV_ENDPOINT_URL: &str = "SL_API_BASE_URL";
pub const ENV_USER_AGENT: &str = "SL_API_USER_AGENT";
pub const ENV_TIMEOUT: &str = "SL_API_TIMEOUT";

/// Options a caller hands to client construction.
///
/// Every field is optional. Values set here take precedence over anything the
/// environment or configuration files provide.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientOptions {
    pub username: Option<String>,
    pub api_key: Option<String>,
    pub user_id: Option<u64>,
    pub auth_token: Option<String>,
    pub endpoint_url: Option<String>,
    pub user_agent: Option<String>,
    /// Network timeout in seconds.
    pub timeout: Option<u64>,
    /// Only read by the password bootstrap; never stored on a client.
    #[serde(skip)]
    pub password: Option<String>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_auth_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = Some(auth_token.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

// Secrets stay out of logs and panic messages.
impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("username", &self.username)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.user_id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("endpoint_url", &self.endpoint_url)
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Turns caller options into fully resolved settings.
pub trait ConfigResolver: Send + Sync {
    fn resolve(&self, options: &ClientOptions) -> Result<ClientOptions>;
}

/// Uses the caller's options as-is, with no ambient sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionsOnly;

impl ConfigResolver for OptionsOnly {
    fn resolve(&self, options: &ClientOptions) -> Result<ClientOptions> {
        Ok(options.clone())
    }
}

/// Resolves settings from caller options, then `SL_*` environment variables,
/// then configuration files.
///
/// Files are read in the order they were added, the first one that defines a
/// key wins. `from_environment` adds `~/.softlayer` and `/etc/softlayer.conf`.
/// Files ending in `.toml` are read as TOML, everything else as INI. Both keep
/// their keys under a `[softlayer]` section.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfigResolver {
    env: HashMap<String, String>,
    files: Vec<PathBuf>,
}

#[derive(Deserialize, Default)]
struct ResolvedRoot {
    #[serde(default)]
    softlayer: ClientOptions,
}

impl LayeredConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the process environment plus the well-known config files.
    pub fn from_environment() -> Self {
        let env: HashMap<String, String> = std::env::vars().collect();
        let mut resolver = Self::new();
        if let Some(home) = env.get("HOME") {
            resolver.files.push(Path::new(home).join(".softlayer"));
        }
        resolver.files.push(PathBuf::from("/etc/softlayer.conf"));
        resolver.env = env;
        resolver
    }

    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Adds a file ahead of every file already registered.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.insert(0, path.into());
        self
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    fn env_value(&self, name: &str) -> Option<String> {
        self.env.get(name).cloned()
    }
}

fn file_format(path: &Path) -> FileFormat {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => FileFormat::Toml,
        _ => FileFormat::Ini,
    }
}

fn key(name: &str) -> String {
    format!("{}.{}", CONFIG_SECTION, name)
}

impl ConfigResolver for LayeredConfigResolver {
    fn resolve(&self, options: &ClientOptions) -> Result<ClientOptions> {
        let mut builder = Config::builder();

        // Later sources override earlier ones, so the lowest priority file goes first.
        for path in self.files.iter().rev() {
            let name = path.to_string_lossy();
            builder = builder.add_source(File::new(&name, file_format(path)).required(false));
        }

        let layers = [
            (
                "username",
                self.env_value(ENV_USERNAME),
                options.username.clone(),
            ),
            ("api_key", self.env_value(ENV_API_KEY), options.api_key.clone()),
            (
                "endpoint_url",
                self.env_value(ENV_ENDPOINT_URL),
                options.endpoint_url.clone(),
            ),
            (
                "user_agent",
                self.env_value(ENV_USER_AGENT),
                options.user_agent.clone(),
            ),
            (
                "timeout",
                self.env_value(ENV_TIMEOUT),
                options.timeout.map(|t| t.to_string()),
            ),
            ("user_id", None, options.user_id.map(|id| id.to_string())),
            ("auth_token", None, options.auth_token.clone()),
        ];

        for (name, from_env, from_caller) in layers {
            builder = builder
                .set_override_option(key(name), from_env)
                .and_then(|b| b.set_override_option(key(name), from_caller))
                .map_err(|e| SoftLayerError::ConfigError(e.to_string()))?;
        }

        let resolved: ResolvedRoot = builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| SoftLayerError::ConfigError(e.to_string()))?;

        let mut settings = resolved.softlayer;
        settings.password = options.password.clone();

        debug!(
            username = ?settings.username,
            endpoint_url = ?settings.endpoint_url,
            timeout = ?settings.timeout,
            "Resolved client settings"
        );

        Ok(settings)
    }
}
