//! AI text provider over any OpenAI-compatible `/v1/chat/completions`
//! endpoint: Ollama (OpenAI mode), OpenAI, Groq, LM Studio, vLLM.
//!
//! One [`ChatProvider`] answers the pinyin, definition, decomposition,
//! examples and explanation facets.  All connection details come from
//! [`AiConfig`]; nothing is hardcoded.
//!
//! Failure mapping:
//! * HTTP 429 / 5xx / timeouts are retried by the [`RetryPolicy`];
//! * content-policy refusals (HTTP 400, `finish_reason = "content_filter"`,
//!   or a `{"refused": …}` answer) become [`Reply::Declined`];
//! * everything else is a fatal [`ProviderError`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::config::AiConfig;

use super::capability::{
    DecompositionProvider, DefinitionProvider, ExamplesProvider, ExplanationProvider,
    PinyinProvider, Provider,
};
use super::error::{ProviderError, ProviderResult, Reply};
use super::http::{classify_failure, retry_after};
use super::prompt::PromptBuilder;
use super::retry::RetryPolicy;
use super::types::{
    Definition, Example, Explanation, Facet, Pinyin, ProviderKind, StructuralDecomposition, Word,
};

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Pull the JSON object out of a chat reply, tolerating code fences and
/// stray prose around it.
pub fn extract_json(content: &str) -> Result<Value, ProviderError> {
    let start = content.find('{');
    let end = content.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => Ok(serde_json::from_str(&content[s..=e])?),
        _ => Err(ProviderError::Parse(format!(
            "no JSON object in reply: {}",
            content.chars().take(120).collect::<String>()
        ))),
    }
}

/// Interpret a JSON answer: a `refused` field declines, anything else is
/// deserialised into `T`.
pub fn parse_answer<T: DeserializeOwned>(value: Value) -> ProviderResult<T> {
    if let Some(reason) = value.get("refused").and_then(Value::as_str) {
        return Ok(Reply::declined(reason.to_string()));
    }
    Ok(Reply::Found(serde_json::from_value(value)?))
}

#[derive(Deserialize)]
struct PinyinAnswer {
    pinyin: String,
}

// ---------------------------------------------------------------------------
// ChatProvider
// ---------------------------------------------------------------------------

pub struct ChatProvider {
    name: String,
    client: reqwest::Client,
    config: AiConfig,
    retry: RetryPolicy,
    prompts: PromptBuilder,
}

impl ChatProvider {
    pub const NAME: &'static str = "openai";

    /// Build a provider from config.
    ///
    /// The HTTP client is pre-configured with the per-request timeout from
    /// `config.timeout_secs`; a default client is used if the builder fails.
    pub fn from_config(config: &AiConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: Self::NAME.to_string(),
            client,
            config: config.clone(),
            retry,
            prompts: PromptBuilder::new(),
        }
    }

    /// Register the same backend under another name (e.g. `"ollama"`).
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// One chat round trip, no retry.  Returns the raw message content.
    async fn send_once(&self, body: &Value) -> ProviderResult<String> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.client.post(&url).json(body);

        // Authorization only when api_key is a non-empty string.
        let key = self.config.api_key.as_deref().unwrap_or("");
        if !key.is_empty() {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let hint = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return classify_failure(status, hint, &text);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let choice = &json["choices"][0];
        if choice["finish_reason"].as_str() == Some("content_filter") {
            return Ok(Reply::declined("response withheld by content filter"));
        }

        let content = choice["message"]["content"]
            .as_str()
            .ok_or(ProviderError::EmptyResponse)?
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(Reply::Found(content))
    }

    /// Ask for `facet` and deserialise the answer into `T`.
    async fn ask<T: DeserializeOwned>(
        &self,
        facet: Facet,
        word: &Word,
        definition: Option<&Definition>,
    ) -> ProviderResult<T> {
        let (system_msg, user_msg) = self.prompts.build_chat(facet, word, definition);
        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "stream":      false,
            "temperature": self.config.temperature,
            "response_format": { "type": "json_object" }
        });

        let label = format!("{}/{facet}", self.name);
        let reply = self.retry.run(&label, || self.send_once(&body)).await?;
        match reply {
            Reply::Found(content) => parse_answer(extract_json(&content)?),
            Reply::Declined { reason } => Ok(Reply::Declined { reason }),
        }
    }
}

impl Provider for ChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "OpenAI-compatible chat model (pinyin, definition, decomposition, examples, explanation)"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Ai
    }
}

#[async_trait]
impl PinyinProvider for ChatProvider {
    async fn get_pinyin(&self, word: &Word) -> ProviderResult<Pinyin> {
        let answer: Reply<PinyinAnswer> = self.ask(Facet::Pinyin, word, None).await?;
        Ok(answer.map(|a| Pinyin::new(a.pinyin)))
    }
}

#[async_trait]
impl DefinitionProvider for ChatProvider {
    async fn get_definition(&self, word: &Word) -> ProviderResult<Definition> {
        self.ask(Facet::Definition, word, None).await
    }
}

#[async_trait]
impl DecompositionProvider for ChatProvider {
    async fn get_decomposition(&self, word: &Word) -> ProviderResult<StructuralDecomposition> {
        self.ask(Facet::Decomposition, word, None).await
    }
}

#[async_trait]
impl ExamplesProvider for ChatProvider {
    async fn get_examples(
        &self,
        word: &Word,
        definition: Option<&Definition>,
    ) -> ProviderResult<Example> {
        let mut reply: Reply<Example> = self.ask(Facet::Examples, word, definition).await?;
        // Models add breakdowns for multi-character words anyway; drop them.
        if let Reply::Found(example) = &mut reply {
            if !word.is_single_char() {
                for usage in &mut example.usages {
                    usage.breakdown = None;
                }
            }
        }
        Ok(reply)
    }
}

#[async_trait]
impl ExplanationProvider for ChatProvider {
    async fn get_explanation(&self, word: &Word) -> ProviderResult<Explanation> {
        self.ask(Facet::Explanation, word, None).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
