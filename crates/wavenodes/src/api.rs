use crate::{null_as_default, parse_config, KeyValue};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use waveruntime::{NodeFactory, NodeMetadata};
use wavecore::{
    display_value, ExecutionContext, HttpBody, HttpClient, HttpRequest, NodeError, NodeExecutor,
    NodeOutput, NodeSpec, NodeType,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
enum BodyType {
    #[default]
    #[serde(rename = "none")]
    None,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "x-www-form-urlencoded", alias = "form-urlencoded")]
    FormUrlEncoded,
    #[serde(rename = "form-data")]
    FormData,
    #[serde(rename = "raw")]
    Raw,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
struct FormField {
    key: String,
    #[serde(default)]
    value: Value,
    #[serde(default, rename = "type")]
    field_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiConfig {
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    headers: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    params: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    body_type: BodyType,
    #[serde(default)]
    body: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    form_url_encoded: Vec<KeyValue>,
    #[serde(default, deserialize_with = "null_as_default")]
    form_data: Vec<FormField>,
}

/// HTTP call through the injected client; emits `{body, status_code, headers}`.
pub struct ApiNode {
    id: String,
    config: ApiConfig,
    http: Arc<dyn HttpClient>,
}

/// Template-resolves a configured value into the text sent on the wire.
fn render(ctx: &ExecutionContext, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => ctx.resolve_template(s),
        other => display_value(&ctx.resolve_deep(other)),
    }
}

fn render_pairs(ctx: &ExecutionContext, pairs: &[KeyValue]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|pair| (pair.key.clone(), render(ctx, &pair.value)))
        .collect()
}

impl ApiNode {
    fn body(&self, ctx: &ExecutionContext) -> HttpBody {
        match self.config.body_type {
            BodyType::None => HttpBody::None,
            BodyType::Unknown => {
                tracing::warn!("API node {} has an unknown body_type; sending no body", self.id);
                HttpBody::None
            }
            BodyType::Json => match &self.config.body {
                None | Some(Value::Null) => HttpBody::Json(Value::Object(Map::new())),
                Some(Value::String(text)) => {
                    let resolved = ctx.resolve_template(text);
                    match serde_json::from_str(&resolved) {
                        Ok(json) => HttpBody::Json(json),
                        Err(e) => {
                            tracing::error!("API node {} failed to parse JSON body: {}", self.id, e);
                            HttpBody::Json(Value::Object(Map::new()))
                        }
                    }
                }
                Some(structured) => HttpBody::Json(ctx.resolve_deep(structured)),
            },
            BodyType::FormUrlEncoded => HttpBody::Form(render_pairs(ctx, &self.config.form_url_encoded)),
            BodyType::FormData => HttpBody::Form(
                self.config
                    .form_data
                    .iter()
                    .filter(|field| match field.field_type.as_deref() {
                        Some("file") => {
                            tracing::warn!(
                                "API node {} skips file field '{}' in form-data body",
                                self.id,
                                field.key
                            );
                            false
                        }
                        _ => true,
                    })
                    .map(|field| (field.key.clone(), render(ctx, &field.value)))
                    .collect(),
            ),
            BodyType::Raw => HttpBody::Raw(
                self.config
                    .body
                    .as_ref()
                    .map(|body| render(ctx, body))
                    .unwrap_or_default(),
            ),
        }
    }
}

#[async_trait]
impl NodeExecutor for ApiNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn node_type(&self) -> NodeType {
        NodeType::Api
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<NodeOutput, NodeError> {
        let request = HttpRequest {
            method: self
                .config
                .method
                .as_deref()
                .unwrap_or("GET")
                .to_uppercase(),
            url: ctx.resolve_template(self.config.url.as_deref().unwrap_or_default()),
            headers: render_pairs(ctx, &self.config.headers),
            params: render_pairs(ctx, &self.config.params),
            body: self.body(ctx),
        };
        tracing::info!("{} {}", request.method, request.url);

        let response = self.http.call(request).await?;
        tracing::info!("Response status: {}", response.status_code);

        let body = serde_json::from_str(&response.body).unwrap_or(Value::String(response.body));
        Ok(NodeOutput::new()
            .with_output("body", body)
            .with_output("status_code", response.status_code)
            .with_output("headers", Value::Object(response.headers)))
    }
}

pub struct ApiNodeFactory {
    http: Arc<dyn HttpClient>,
}

impl ApiNodeFactory {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self { http }
    }
}

impl NodeFactory for ApiNodeFactory {
    fn create(&self, spec: &NodeSpec) -> Result<Box<dyn NodeExecutor>, NodeError> {
        Ok(Box::new(ApiNode {
            id: spec.id.clone(),
            config: parse_config(spec)?,
            http: self.http.clone(),
        }))
    }

    fn node_type(&self) -> NodeType {
        NodeType::Api
    }

    fn metadata(&self) -> NodeMetadata {
        NodeMetadata {
            description: "Make HTTP requests".to_string(),
            category: "integration".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use wavecore::{CapabilityError, HttpResponse};

    struct FakeHttp {
        reply: String,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl FakeHttp {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> HttpRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl HttpClient for FakeHttp {
        async fn call(&self, request: HttpRequest) -> Result<HttpResponse, CapabilityError> {
            self.requests.lock().unwrap().push(request);
            let mut headers = Map::new();
            headers.insert("content-type".to_string(), json!("application/json"));
            Ok(HttpResponse {
                status_code: 201,
                headers,
                body: self.reply.clone(),
            })
        }
    }

    fn context() -> ExecutionContext {
        let mut ctx = ExecutionContext::new();
        ctx.set("start", "user", json!("ada"));
        ctx.set("start", "token", json!("s3cret"));
        ctx
    }

    async fn run(http: Arc<FakeHttp>, data: Value) -> NodeOutput {
        let mut spec = NodeSpec::new("api", NodeType::Api);
        spec.data = data.as_object().cloned().unwrap_or_default();
        let node = ApiNodeFactory::new(http).create(&spec).unwrap();
        node.execute(&context()).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_request_parts() {
        let http = FakeHttp::replying(r#"{"id": 7}"#);
        let output = run(
            http.clone(),
            json!({
                "method": "post",
                "url": "https://api.test/users/{{start.user}}",
                "headers": [{"key": "Authorization", "value": "Bearer {{start.token}}"}],
                "params": [{"key": "page", "value": 2}],
                "body_type": "json",
                "body": "{\"name\": \"{{start.user}}\"}"
            }),
        )
        .await;

        let request = http.last();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "https://api.test/users/ada");
        assert_eq!(
            request.headers,
            vec![("Authorization".to_string(), "Bearer s3cret".to_string())]
        );
        assert_eq!(request.params, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(request.body, HttpBody::Json(json!({"name": "ada"})));

        assert_eq!(output.get("body"), Some(&json!({"id": 7})));
        assert_eq!(output.get("status_code"), Some(&json!(201)));
        assert_eq!(output.get("headers"), Some(&json!({"content-type": "application/json"})));
    }

    #[tokio::test]
    async fn malformed_json_body_degrades_to_empty_object() {
        let http = FakeHttp::replying("plain text");
        let output = run(
            http.clone(),
            json!({"url": "https://api.test", "body_type": "json", "body": "{not json"}),
        )
        .await;

        assert_eq!(http.last().method, "GET");
        assert_eq!(http.last().body, HttpBody::Json(json!({})));
        assert_eq!(output.get("body"), Some(&json!("plain text")));
    }

    #[tokio::test]
    async fn form_bodies() {
        let http = FakeHttp::replying("");
        run(
            http.clone(),
            json!({
                "url": "https://api.test",
                "body_type": "x-www-form-urlencoded",
                "form_url_encoded": [{"key": "user", "value": "{{start.user}}"}]
            }),
        )
        .await;
        assert_eq!(
            http.last().body,
            HttpBody::Form(vec![("user".to_string(), "ada".to_string())])
        );

        run(
            http.clone(),
            json!({
                "url": "https://api.test",
                "body_type": "form-data",
                "form_data": [
                    {"key": "user", "value": "{{start.user}}", "type": "text"},
                    {"key": "avatar", "value": "/tmp/a.png", "type": "file"}
                ]
            }),
        )
        .await;
        assert_eq!(
            http.last().body,
            HttpBody::Form(vec![("user".to_string(), "ada".to_string())])
        );
    }

    #[tokio::test]
    async fn raw_body_is_template_resolved() {
        let http = FakeHttp::replying("ok");
        run(
            http.clone(),
            json!({"url": "https://api.test", "method": "PUT", "body_type": "raw", "body": "user={{start.user}}"}),
        )
        .await;
        assert_eq!(http.last().body, HttpBody::Raw("user=ada".to_string()));
    }

    #[tokio::test]
    async fn unknown_body_type_sends_no_body() {
        let http = FakeHttp::replying("ok");
        let output = run(
            http.clone(),
            json!({"url": "https://api.test", "method": "POST", "body_type": "xml", "body": "<a/>"}),
        )
        .await;
        assert_eq!(http.last().body, HttpBody::None);
        assert_eq!(output.get("status_code"), Some(&json!(201)));
    }
}
