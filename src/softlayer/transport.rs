use anyhow::Result;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT},
    Client as HttpClient,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::error::SoftLayerError;

/// One API call, fully assembled by a service handle.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub endpoint_url: String,
    pub service: String,
    pub method: String,
    pub headers: Map<String, Value>,
    pub parameters: Vec<Value>,
    pub user_agent: String,
    pub timeout: Option<u64>,
}

impl ApiRequest {
    pub fn url(&self) -> String {
        format!(
            "{}/{}/{}.json",
            self.endpoint_url.trim_end_matches('/'),
            self.service,
            self.method
        )
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    headers: &'a Map<String, Value>,
    parameters: &'a [Value],
}

/// Carries requests to the API. Retries, pooling and classification of
/// network failures are up to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(&self, request: ApiRequest) -> Result<Value>;
}

/// JSON over HTTPS, one POST per call.
#[derive(Clone, Default)]
pub struct HttpTransport {
    http_client: HttpClient,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            http_client: HttpClient::new(),
        }
    }

    pub fn with_http_client(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value> {
        let url = request.url();
        debug!(service = %request.service, method = %request.method, "Calling {}", url);

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_str(&request.user_agent)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let body = RequestBody {
            headers: &request.headers,
            parameters: &request.parameters,
        };

        let mut builder = self.http_client.post(&url).headers(headers).json(&body);
        if let Some(seconds) = request.timeout {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            return Err(SoftLayerError::ApiError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            }
            .into());
        }

        let result = response.json::<Value>().await?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request_complete(received: &[u8]) -> bool {
        let text = String::from_utf8_lossy(received);
        let Some(split) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..split]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        received.len() >= split + 4 + content_length
    }

    /// Answers a single HTTP request with `status_line` and `body`, returning
    /// the endpoint URL to point a request at.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buf = [0u8; 4096];
            while !request_complete(&received) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }

            let response = format!(
                "{}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\
                 Connection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}/rest/v3/", addr)
    }

    fn request(endpoint_url: &str) -> ApiRequest {
        ApiRequest {
            endpoint_url: endpoint_url.to_string(),
            service: "SoftLayer_Account".to_string(),
            method: "getObject".to_string(),
            headers: Map::new(),
            parameters: Vec::new(),
            user_agent: "test-agent".to_string(),
            timeout: None,
        }
    }

    #[test]
    fn url_joins_with_single_slash() {
        assert_eq!(
            request("https://api.example.com/rest/v3/").url(),
            "https://api.example.com/rest/v3/SoftLayer_Account/getObject.json"
        );
        assert_eq!(
            request("https://api.example.com/rest/v3").url(),
            "https://api.example.com/rest/v3/SoftLayer_Account/getObject.json"
        );
    }

    #[test]
    fn body_carries_headers_and_parameters() {
        let mut headers = Map::new();
        headers.insert("authenticate".to_string(), serde_json::json!({"username": "u"}));
        let parameters = vec![Value::from(1), Value::from("two")];
        let body = serde_json::to_value(RequestBody {
            headers: &headers,
            parameters: &parameters,
        })
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "headers": {"authenticate": {"username": "u"}},
                "parameters": [1, "two"]
            })
        );
    }

    #[tokio::test]
    async fn non_success_status_becomes_api_error() {
        let endpoint_url = serve_once("HTTP/1.1 500 Internal Server Error", "bad").await;

        let err = HttpTransport::new()
            .call(request(&endpoint_url))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SoftLayerError>(),
            Some(SoftLayerError::ApiError { status: 500, message }) if message == "bad"
        ));
    }

    #[tokio::test]
    async fn success_body_is_parsed_as_json() {
        let endpoint_url = serve_once("HTTP/1.1 200 OK", "{\"id\":1}").await;

        let result = HttpTransport::new().call(request(&endpoint_url)).await.unwrap();
        assert_eq!(result, serde_json::json!({"id": 1}));
    }
}
