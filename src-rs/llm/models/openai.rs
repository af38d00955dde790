use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::ApiKey;
use crate::cons::provider_cons::LLMProvider;
use crate::error::{HarnessError, HarnessResult};
use crate::llm::models::provider_base::{ExecutionSettings, Message, ProviderClient};
use crate::llm::utils::string_util::truncate_utf8_with_ellipsis;

/// How the provider expects the credential to be sent
#[derive(Debug, Clone)]
pub enum ProviderAuth {
    /// `Authorization: Bearer <key>` (OpenAI)
    Bearer(ApiKey),
    /// `api-key: <key>` (Azure OpenAI)
    ApiKeyHeader(ApiKey),
    /// Local endpoints such as Ollama
    None,
}

/// Chat-completions client speaking the OpenAI wire format.
///
/// All supported providers share this client; they only differ in the URL
/// candidates and the authentication header.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    pub provider: LLMProvider,
    pub model: String,
    url_candidates: Vec<String>,
    http_client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        provider: LLMProvider,
        model: String,
        url_candidates: Vec<String>,
        auth: ProviderAuth,
        timeout: Duration,
    ) -> HarnessResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        match &auth {
            ProviderAuth::Bearer(key) => {
                headers.insert(AUTHORIZATION, sensitive_header(&format!("Bearer {}", key.expose()))?);
            }
            ProviderAuth::ApiKeyHeader(key) => {
                headers.insert(HeaderName::from_static("api-key"), sensitive_header(key.expose())?);
            }
            ProviderAuth::None => {}
        }

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("browserpilot/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                HarnessError::ClientInitialization(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            provider,
            model,
            url_candidates,
            http_client,
        })
    }

    pub fn url_candidates(&self) -> &[String] {
        &self.url_candidates
    }

    pub async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        settings: &ExecutionSettings,
    ) -> HarnessResult<Value> {
        let request_body = build_chat_completions_request_body(&self.model, messages, tools, settings);

        let response = send_first_successful_chat_completions_request(
            &self.http_client,
            &self.url_candidates,
            &request_body,
        )
        .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HarnessError::ClientInitialization(format!(
                "{} rejected the credentials ({}): {}",
                self.provider,
                status,
                truncate_utf8_with_ellipsis(&error_text, 500)
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(HarnessError::Invocation(format!(
                "LLM API error ({}): {}",
                status,
                truncate_utf8_with_ellipsis(&error_text, 500)
            )));
        }

        let json: Value = response.json().await.map_err(|e| {
            HarnessError::Invocation(format!("Failed to parse response JSON: {}", e))
        })?;

        if let Some(usage) = json.get("usage") {
            log::debug!("LLM usage: {}", usage);
        }

        Ok(json)
    }
}

impl ProviderClient for OpenAiClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: Option<&[Value]>,
        settings: &ExecutionSettings,
    ) -> HarnessResult<Value> {
        OpenAiClient::chat(self, messages, tools, settings).await
    }
}

fn sensitive_header(value: &str) -> HarnessResult<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        HarnessError::ClientInitialization("API key contains characters that are not valid in an HTTP header".to_string())
    })?;
    header.set_sensitive(true);
    Ok(header)
}

pub fn create_openai(endpoint: &str, api_key: ApiKey, model_id: String, timeout: Duration) -> HarnessResult<OpenAiClient> {
    OpenAiClient::new(
        LLMProvider::OpenAI,
        model_id,
        chat_completions_url_candidates(endpoint),
        ProviderAuth::Bearer(api_key),
        timeout,
    )
}

pub fn create_azure_openai(
    endpoint: &str,
    api_key: ApiKey,
    deployment_name: String,
    api_version: &str,
    timeout: Duration,
) -> HarnessResult<OpenAiClient> {
    let url = azure_chat_completions_url(endpoint, &deployment_name, api_version);
    OpenAiClient::new(
        LLMProvider::AzureOpenAI,
        deployment_name,
        vec![url],
        ProviderAuth::ApiKeyHeader(api_key),
        timeout,
    )
}

pub fn create_ollama(endpoint: &str, model_name: String, timeout: Duration) -> HarnessResult<OpenAiClient> {
    OpenAiClient::new(
        LLMProvider::Ollama,
        model_name,
        chat_completions_url_candidates(endpoint),
        ProviderAuth::None,
        timeout,
    )
}

pub(crate) fn build_chat_completions_request_body(
    model: &str,
    messages: &[Message],
    tools: Option<&[Value]>,
    settings: &ExecutionSettings,
) -> Value {
    let mut request_body = json!({
        "model": model,
        "messages": messages,
        "temperature": settings.temperature,
        "stream": false,
    });
    if let Some(tools) = tools {
        if !tools.is_empty() {
            request_body["tools"] = Value::Array(tools.to_vec());
            request_body["tool_choice"] = json!("auto");
        }
    }
    request_body
}

pub(crate) fn chat_completions_url_candidates(api_base: &str) -> Vec<String> {
    let base = api_base.trim_end_matches('/');
    let mut out = vec![format!("{}/chat/completions", base)];
    if !base.ends_with("/v1") {
        out.push(format!("{}/v1/chat/completions", base));
    }
    out
}

pub(crate) fn azure_chat_completions_url(endpoint: &str, deployment_name: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment_name,
        api_version
    )
}

async fn send_first_successful_chat_completions_request(
    http_client: &reqwest::Client,
    url_candidates: &[String],
    request_body: &Value,
) -> HarnessResult<reqwest::Response> {
    let mut last_err: Option<HarnessError> = None;

    for url in url_candidates {
        log::debug!("POST {}", url);
        let response = http_client.post(url).json(request_body).send().await;

        match response {
            Ok(resp) => {
                if resp.status() == reqwest::StatusCode::NOT_FOUND {
                    last_err = Some(HarnessError::ClientInitialization(format!(
                        "LLM API endpoint not found: {}",
                        url
                    )));
                    continue;
                }
                return Ok(resp);
            }
            Err(e) if e.is_connect() => {
                last_err = Some(HarnessError::ClientInitialization(format!(
                    "Failed to reach LLM API ({}): {}",
                    url, e
                )));
            }
            Err(e) => {
                last_err = Some(HarnessError::Invocation(format!(
                    "Failed to send request to LLM API ({}): {}",
                    url, e
                )));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        HarnessError::ClientInitialization("No LLM API endpoint configured".to_string())
    }))
}
