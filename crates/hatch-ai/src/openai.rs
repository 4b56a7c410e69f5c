use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::prompt::{build_count_prompt, build_generation_prompt, estimate_count, parse_count, parse_drafts};
use crate::types::{GeneratorError, IssueDraft, IssueGenerator};

#[derive(Debug, Clone)]
/// Settings for any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiGeneratorConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_ms: u64,
    pub max_count: u32,
}

impl Default for OpenAiGeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 2_000,
            request_timeout_ms: 60_000,
            max_count: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    http: reqwest::Client,
    config: OpenAiGeneratorConfig,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiGeneratorConfig) -> Result<Self, GeneratorError> {
        if config.api_key.trim().is_empty() {
            return Err(GeneratorError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let auth_header = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header)
                .map_err(|_| GeneratorError::MissingApiKey)?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    async fn complete(&self, prompt: &str) -> Result<String, GeneratorError> {
        let payload = json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });
        let url = format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        );
        let response = self.http.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                GeneratorError::InvalidResponse("chat completion carried no content".to_string())
            })
    }

    async fn determine_count(&self, template: &str) -> u32 {
        match self.complete(&build_count_prompt(template)).await {
            Ok(content) => {
                let count = parse_count(&content).unwrap_or_else(|| estimate_count(template));
                tracing::info!(count, "provider determined issue count");
                count
            }
            Err(error) => {
                tracing::warn!(error = %error, "count determination failed, using size heuristic");
                estimate_count(template)
            }
        }
    }
}

#[async_trait]
impl IssueGenerator for OpenAiGenerator {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn generate(
        &self,
        template: &str,
        components: &[String],
        count: Option<u32>,
    ) -> Result<Vec<IssueDraft>, GeneratorError> {
        let count = match count {
            Some(value) => value,
            None => self.determine_count(template).await,
        }
        .clamp(1, self.config.max_count.max(1));

        let prompt = build_generation_prompt(template, components, count);
        tracing::debug!(
            model = %self.config.model,
            count,
            prompt_chars = prompt.len(),
            "requesting issue drafts"
        );
        let content = self.complete(&prompt).await?;
        parse_drafts(&content)
    }
}
