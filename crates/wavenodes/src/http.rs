use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Map, Value};
use std::time::Duration;
use wavecore::{CapabilityError, HttpBody, HttpClient, HttpRequest, HttpResponse};

/// [`HttpClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Result<Self, CapabilityError> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CapabilityError::Http(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn call(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError> {
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| CapabilityError::Http(format!("Unsupported method: {}", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        builder = match request.body {
            HttpBody::None => builder,
            HttpBody::Json(json) => builder.json(&json),
            HttpBody::Form(fields) => builder.form(&fields),
            HttpBody::Raw(text) => builder.body(text),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| CapabilityError::Http(format!("HTTP request failed: {}", e)))?;

        let status_code = response.status().as_u16();
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_str().unwrap_or("").to_string())))
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| CapabilityError::Http(format!("Failed to read response: {}", e)))?;

        Ok(HttpResponse {
            status_code,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_methods_before_sending() {
        let client = ReqwestHttpClient::new().unwrap();
        let err = client
            .call(HttpRequest {
                method: "GE T".to_string(),
                url: "http://127.0.0.1:9".to_string(),
                headers: Vec::new(),
                params: Vec::new(),
                body: HttpBody::None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, CapabilityError::Http("Unsupported method: GE T".to_string()));
    }

    #[tokio::test]
    async fn connection_failures_are_http_errors() {
        let client = ReqwestHttpClient::with_timeout(Duration::from_millis(500)).unwrap();
        let err = client
            .call(HttpRequest {
                method: "GET".to_string(),
                url: "http://127.0.0.1:9/unreachable".to_string(),
                headers: Vec::new(),
                params: Vec::new(),
                body: HttpBody::None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::Http(ref m) if m.starts_with("HTTP request failed")));
    }
}
