use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use softlayer_api::{Client, ClientOptions, HttpTransport, LayeredConfigResolver};

#[derive(Parser)]
#[command(name = "softlayer")]
#[command(about = "Call SoftLayer API services from the command line")]
struct Cli {
    /// Extra configuration file, read before ~/.softlayer and /etc/softlayer.conf
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct CredentialArgs {
    #[arg(long, global = true)]
    username: Option<String>,

    #[arg(long, global = true)]
    api_key: Option<String>,

    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// Network timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Call one method on a service and print the JSON result
    Call {
        service: String,
        method: String,
        /// Parameters, each parsed as JSON or taken as a plain string
        params: Vec<String>,
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        mask: Option<String>,
        #[arg(long, requires = "offset")]
        limit: Option<u64>,
        #[arg(long, requires = "limit")]
        offset: Option<u64>,
    },
    /// Exchange a password for a portal login token
    Login {
        #[arg(long)]
        password: String,
        #[arg(long)]
        show_token: bool,
    },
}

impl CredentialArgs {
    fn options(&self) -> ClientOptions {
        ClientOptions {
            username: self.username.clone(),
            api_key: self.api_key.clone(),
            endpoint_url: self.endpoint_url.clone(),
            timeout: self.timeout,
            ..ClientOptions::default()
        }
    }
}

/// Seconds allowed for establishing a connection; the request timeout is set
/// per call from the resolved settings.
const CONNECT_TIMEOUT_SECS: u64 = 30;

fn http_transport() -> Result<HttpTransport> {
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()?;
    Ok(HttpTransport::with_http_client(http_client))
}

fn parse_param(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut resolver = LayeredConfigResolver::from_environment();
    if let Some(path) = &cli.config {
        resolver = resolver.with_file(path);
    }
    let transport = Arc::new(http_transport()?);
    let options = cli.credentials.options();

    match cli.command {
        Command::Call {
            service,
            method,
            params,
            id,
            mask,
            limit,
            offset,
        } => {
            let client = Client::with_components(&options, &resolver, transport)?;
            let service = client.service(&service)?;

            let mut call = service.prepare();
            if let (Some(offset), Some(limit)) = (offset, limit) {
                call = call.result_limit(offset, limit);
            }
            if let Some(id) = id {
                call = call.object_with_id(id);
            }
            if let Some(mask) = mask {
                call = call.object_mask(mask);
            }

            let params = params.iter().map(|p| parse_param(p)).collect();
            let result = call.call(&method, params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Login {
            password,
            show_token,
        } => {
            let options = options.with_password(password);
            let client = Client::with_password_using(&options, &resolver, transport).await?;
            info!("Logged in");

            println!("userId: {}", client.user_id().unwrap_or_default());
            if show_token {
                println!("authToken: {}", client.auth_token().unwrap_or_default());
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_fall_back_to_strings() {
        assert_eq!(parse_param("42"), Value::from(42));
        assert_eq!(parse_param("{\"a\":1}"), serde_json::json!({"a": 1}));
        assert_eq!(parse_param("hostname"), Value::from("hostname"));
    }

    #[test]
    fn transport_builds_with_connect_timeout() {
        assert!(http_transport().is_ok());
    }

    #[test]
    fn cli_parses_call_with_limits() {
        let cli = Cli::try_parse_from([
            "softlayer", "call", "Account", "getVirtualGuests", "--limit", "5", "--offset", "10",
        ])
        .unwrap();
        match cli.command {
            Command::Call { limit, offset, .. } => {
                assert_eq!(limit, Some(5));
                assert_eq!(offset, Some(10));
            }
            Command::Login { .. } => panic!("expected call"),
        }
    }
}
