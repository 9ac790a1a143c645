//! Core `ChatBackend` trait and the OpenAI / Ollama implementations.
//!
//! Both backends are thin adapters: all connection details come from the
//! validated [`ModelConfig`], nothing is hardcoded beyond each provider's
//! base URL and wire format.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::settings::{ModelConfig, ModelSource};
use crate::llm::history::ChatMessage;

/// OpenAI chat-completions endpoint base.
const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Default Ollama server address.
const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Per-request timeout applied to both backends.
const REQUEST_TIMEOUT_SECS: u64 = 120;

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Errors that can occur while generating a response.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The request did not complete within the timeout.
    #[error("backend request timed out")]
    Timeout,

    /// The HTTP response could not be parsed as expected JSON.
    #[error("failed to parse backend response: {0}")]
    Parse(String),

    /// The backend returned a response with no usable text content.
    #[error("backend returned an empty response")]
    EmptyResponse,

    /// `use_remote_model` and `model_source` disagree.
    #[error("unsupported model configuration: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// ChatBackend trait
// ---------------------------------------------------------------------------

/// Async trait for text-generation backends.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn ChatBackend>`.
///
/// # Arguments
/// * `prompt`  – The fully-rendered prompt for the current turn.
/// * `history` – Prior conversation turns; empty when chat history is
///               disabled in the model configuration.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, BackendError>;
}

// ---------------------------------------------------------------------------
// OpenAiBackend
// ---------------------------------------------------------------------------

/// Calls OpenAI's `/v1/chat/completions` endpoint.
///
/// The model name and sampling parameters come exclusively from the
/// [`ModelConfig`]; the API key is resolved by the caller (from
/// `OPENAI_API_KEY`) and attached as a bearer token.
pub struct OpenAiBackend {
    client: reqwest::Client,
    config: ModelConfig,
    api_key: String,
    base_url: String,
}

impl OpenAiBackend {
    /// Build an OpenAI backend from application config.
    pub fn new(config: &ModelConfig, api_key: String) -> Self {
        Self {
            client: http_client(),
            config: config.clone(),
            api_key,
            base_url: OPENAI_BASE_URL.into(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": self.config.model_name,
            "messages": wire_messages(prompt, history),
            "stream": false,
        });
        merge_parameters(&mut body, &self.config);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        extract_content(&json["choices"][0]["message"]["content"])
    }
}

// ---------------------------------------------------------------------------
// OllamaBackend
// ---------------------------------------------------------------------------

/// Calls a local Ollama server's `/api/chat` endpoint.
///
/// GPU use follows the configuration: `use_gpu` on forwards
/// `num_gpu` (default 1) in the request options, off or unset forwards 0.
pub struct OllamaBackend {
    client: reqwest::Client,
    config: ModelConfig,
    base_url: String,
}

impl OllamaBackend {
    /// Build an Ollama backend from application config.
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: http_client(),
            config: config.clone(),
            base_url: OLLAMA_BASE_URL.into(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn num_gpu(&self) -> u32 {
        if self.config.use_gpu.unwrap_or(false) {
            self.config.num_gpu.unwrap_or(1)
        } else {
            0
        }
    }
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    async fn generate(
        &self,
        prompt: &str,
        history: &[ChatMessage],
    ) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.base_url);

        let mut options = serde_json::Map::new();
        for (key, value) in &self.config.model_parameters {
            options.insert(key.clone(), serde_json::json!(value));
        }
        options.insert("num_gpu".into(), serde_json::json!(self.num_gpu()));

        let body = serde_json::json!({
            "model": self.config.model_name,
            "messages": wire_messages(prompt, history),
            "stream": false,
            "options": options,
        });

        let response = self.client.post(&url).json(&body).send().await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;

        extract_content(&json["message"]["content"])
    }
}

// ---------------------------------------------------------------------------
// Shared helpers / factory
// ---------------------------------------------------------------------------

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// History turns followed by the current prompt as the final user message.
fn wire_messages(prompt: &str, history: &[ChatMessage]) -> serde_json::Value {
    let mut messages: Vec<serde_json::Value> = history
        .iter()
        .map(|m| serde_json::json!({ "role": m.role.as_str(), "content": m.content }))
        .collect();
    messages.push(serde_json::json!({ "role": "user", "content": prompt }));
    serde_json::Value::Array(messages)
}

/// Merge `model_parameters` into the top level of an OpenAI request body.
fn merge_parameters(body: &mut serde_json::Value, config: &ModelConfig) {
    if let Some(object) = body.as_object_mut() {
        for (key, value) in &config.model_parameters {
            object.insert(key.clone(), serde_json::json!(value));
        }
    }
}

fn extract_content(value: &serde_json::Value) -> Result<String, BackendError> {
    let content = value
        .as_str()
        .ok_or(BackendError::EmptyResponse)?
        .trim()
        .to_string();
    if content.is_empty() {
        return Err(BackendError::EmptyResponse);
    }
    Ok(content)
}

/// Build the backend selected by the model configuration.
///
/// The remote flag and the source must agree, mirroring the two supported
/// combinations (remote OpenAI, local Ollama); anything else is rejected.
pub fn backend_from_config(
    config: &ModelConfig,
    api_key: Option<String>,
) -> Result<Box<dyn ChatBackend>, BackendError> {
    match (config.use_remote_model, config.model_source) {
        (true, ModelSource::OpenAi) => {
            let key = api_key.unwrap_or_default();
            Ok(Box::new(OpenAiBackend::new(config, key)))
        }
        (false, ModelSource::Ollama) => Ok(Box::new(OllamaBackend::new(config))),
        (remote, source) => Err(BackendError::Unsupported(format!(
            "use_remote_model={remote} with model_source={}",
            source.as_str()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn openai_config() -> ModelConfig {
        ModelConfig {
            use_remote_model: true,
            model_source: ModelSource::OpenAi,
            model_name: "gpt-4o".into(),
            model_parameters: BTreeMap::from([("temperature".to_string(), 1.0)]),
            send_chat_history: true,
            use_gpu: None,
            num_gpu: None,
        }
    }

    fn ollama_config() -> ModelConfig {
        ModelConfig {
            use_remote_model: false,
            model_source: ModelSource::Ollama,
            model_name: "llama3.1".into(),
            model_parameters: BTreeMap::from([("temperature".to_string(), 0.8)]),
            send_chat_history: true,
            use_gpu: Some(true),
            num_gpu: Some(2),
        }
    }

    #[test]
    fn factory_builds_matching_backends() {
        assert!(backend_from_config(&openai_config(), Some("sk-test".into())).is_ok());
        assert!(backend_from_config(&ollama_config(), None).is_ok());
    }

    #[test]
    fn factory_rejects_mismatched_combinations() {
        let mut config = openai_config();
        config.use_remote_model = false;
        let err = backend_from_config(&config, None).err().expect("mismatch");
        assert!(matches!(err, BackendError::Unsupported(_)));

        let mut config = ollama_config();
        config.use_remote_model = true;
        assert!(matches!(
            backend_from_config(&config, None),
            Err(BackendError::Unsupported(_))
        ));
    }

    #[test]
    fn ollama_gpu_option_follows_config() {
        let backend = OllamaBackend::new(&ollama_config());
        assert_eq!(backend.num_gpu(), 2);

        let mut config = ollama_config();
        config.num_gpu = None;
        assert_eq!(OllamaBackend::new(&config).num_gpu(), 1);

        config.use_gpu = Some(false);
        assert_eq!(OllamaBackend::new(&config).num_gpu(), 0);

        config.use_gpu = None;
        assert_eq!(OllamaBackend::new(&config).num_gpu(), 0);
    }

    #[test]
    fn wire_messages_append_prompt_last() {
        let history = vec![
            ChatMessage::user("first question"),
            ChatMessage::assistant("first answer"),
        ];
        let messages = wire_messages("second question", &history);
        let items = messages.as_array().expect("array");

        assert_eq!(items.len(), 3);
        assert_eq!(items[0]["role"], "user");
        assert_eq!(items[1]["role"], "assistant");
        assert_eq!(items[2]["content"], "second question");
    }

    #[test]
    fn parameters_merge_into_openai_body() {
        let mut body = serde_json::json!({ "model": "gpt-4o", "stream": false });
        merge_parameters(&mut body, &openai_config());
        assert_eq!(body["temperature"], serde_json::json!(1.0));
    }

    #[test]
    fn extract_content_trims_and_rejects_empty() {
        assert_eq!(
            extract_content(&serde_json::json!("  answer \n")).unwrap(),
            "answer"
        );
        assert!(matches!(
            extract_content(&serde_json::json!("   ")),
            Err(BackendError::EmptyResponse)
        ));
        assert!(matches!(
            extract_content(&serde_json::Value::Null),
            Err(BackendError::EmptyResponse)
        ));
    }

    /// Both concrete backends must be usable as `dyn ChatBackend`.
    #[test]
    fn backends_are_object_safe() {
        let _: Box<dyn ChatBackend> =
            Box::new(OpenAiBackend::new(&openai_config(), "sk-test".into()).with_base_url("http://localhost:1"));
        let _: Box<dyn ChatBackend> =
            Box::new(OllamaBackend::new(&ollama_config()).with_base_url("http://localhost:1"));
    }
}
