use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{LocalBoxStream, StreamExt};
use reqwest::{Client, StatusCode, Url};

use crate::error::ChatError;
use crate::models::{ChatRequest, ChatResponse, Message, ModelListResponse, ModelSettings, Role, WireMessage};

pub type ByteStream = LocalBoxStream<'static, Result<Bytes, ChatError>>;

const CONNECTION_TEST_PROMPT: &str = "Hello";
const CONNECTION_TEST_MAX_TOKENS: u32 = 16;

/// One POST to a completions endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionCall {
    pub url: String,
    pub api_key: String,
    pub body: ChatRequest,
}

/// Status and body of a completion response, before any decoding.
pub struct HttpReply {
    pub status: u16,
    /// `None` when the response carries no readable body.
    pub body: Option<ByteStream>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Collects the body as text for error reporting.
    pub async fn text(self) -> String {
        let Some(mut body) = self.body else {
            return String::new();
        };
        let mut raw = Vec::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => raw.extend_from_slice(&chunk),
                Err(err) => {
                    tracing::debug!(error = %err, read = raw.len(), "error body cut short");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }
}

#[async_trait(?Send)]
pub trait CompletionTransport {
    /// Sends the request and returns once response headers are in.
    async fn open(&self, call: CompletionCall) -> Result<HttpReply, ChatError>;
}

/// `fetch`-backed transport (reqwest on wasm32).
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait(?Send)]
impl CompletionTransport for HttpTransport {
    async fn open(&self, call: CompletionCall) -> Result<HttpReply, ChatError> {
        let resp = self
            .client
            .post(&call.url)
            .bearer_auth(&call.api_key)
            .json(&call.body)
            .send()
            .await
            .map_err(ChatError::network)?;

        let status = resp.status();
        let has_body = status != StatusCode::NO_CONTENT && resp.content_length() != Some(0);
        let body = has_body.then(|| {
            resp.bytes_stream()
                .map(|chunk| chunk.map_err(ChatError::network))
                .boxed_local()
        });
        Ok(HttpReply { status: status.as_u16(), body })
    }
}

fn clean_base(base: &str) -> &str {
    base.trim().trim_end_matches('/')
}

/// Checks that the base URL parses and uses http or https.
pub fn validate_base_url(base_url: &str) -> Result<Url, ChatError> {
    let base = clean_base(base_url);
    match Url::parse(base) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => Ok(url),
        _ => Err(ChatError::InvalidEndpoint(base_url.to_string())),
    }
}

pub fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", clean_base(base_url))
}

/// Builds the streaming request for `history`. Timestamps are not sent.
pub fn streaming_call(settings: &ModelSettings, history: &[Message]) -> CompletionCall {
    CompletionCall {
        url: completions_url(&settings.base_url),
        api_key: settings.api_key.trim().to_string(),
        body: ChatRequest {
            model: settings.name.trim().to_string(),
            messages: history.iter().map(WireMessage::from).collect(),
            stream: true,
            max_tokens: None,
        },
    }
}

fn connection_test_call(settings: &ModelSettings) -> CompletionCall {
    CompletionCall {
        url: completions_url(&settings.base_url),
        api_key: settings.api_key.trim().to_string(),
        body: ChatRequest {
            model: settings.name.trim().to_string(),
            messages: vec![WireMessage { role: Role::User, content: CONNECTION_TEST_PROMPT.to_string() }],
            stream: false,
            max_tokens: Some(CONNECTION_TEST_MAX_TOKENS),
        },
    }
}

fn model_list_target(settings: &ModelSettings, fallback_key: Option<&str>) -> (String, String) {
    let settings = settings.with_fallback_key(fallback_key);
    (format!("{}/models", clean_base(&settings.base_url)), settings.api_key.trim().to_string())
}

pub struct LlmService;

impl LlmService {
    /// Non-streaming round trip with a canned prompt. Returns the model's reply.
    pub async fn test_connection(
        transport: &dyn CompletionTransport,
        settings: &ModelSettings,
    ) -> Result<String, ChatError> {
        if !settings.is_complete() {
            return Err(ChatError::ConfigurationMissing);
        }
        validate_base_url(&settings.base_url)?;

        let reply = transport.open(connection_test_call(settings)).await?;
        let status = reply.status;
        if !reply.is_success() {
            let body = reply.text().await;
            tracing::warn!(status, "connection test rejected");
            return Err(ChatError::UpstreamError { status, body });
        }
        if reply.body.is_none() {
            return Err(ChatError::StreamUnavailable);
        }
        let body = reply.text().await;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|e| ChatError::MalformedFrame(e.to_string()))?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.trim().to_string())
            .unwrap_or_default())
    }

    /// Lists model ids from `{base}/models`. `fallback_key` fills an empty API key.
    pub async fn fetch_models(settings: &ModelSettings, fallback_key: Option<&str>) -> Result<Vec<String>> {
        let (url, api_key) = model_list_target(settings, fallback_key);
        let resp = Client::new()
            .get(&url)
            .bearer_auth(api_key)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        let data: ModelListResponse = resp.json().await.context("unexpected model list format")?;
        Ok(data.data.into_iter().map(|m| m.id).collect())
    }
}
