use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::prompt::{build_generation_prompt, estimate_count, parse_count, parse_drafts};
use crate::types::{GeneratorError, IssueDraft, IssueGenerator};

#[derive(Debug, Clone)]
pub struct GeminiGeneratorConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_ms: u64,
    pub max_count: u32,
}

impl Default for GeminiGeneratorConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.3,
            max_output_tokens: 32_000,
            request_timeout_ms: 60_000,
            max_count: 100,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    http: reqwest::Client,
    config: GeminiGeneratorConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiGenerator {
    pub fn new(config: GeminiGeneratorConfig) -> Result<Self, GeneratorError> {
        if config.api_key.trim().is_empty() {
            return Err(GeneratorError::MissingApiKey);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;
        Ok(Self { http, config })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate_content(&self, prompt: &str) -> Result<String, GeneratorError> {
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.config.temperature,
                "maxOutputTokens": self.config.max_output_tokens,
            },
        });
        let response = self
            .http
            .post(self.generate_content_url())
            .query(&[("key", self.config.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeneratorError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(GeneratorError::InvalidResponse(
                "generateContent reply carried no text".to_string(),
            ));
        }
        Ok(text)
    }

    async fn determine_count(&self, template: &str) -> u32 {
        let prompt = format!(
            "Based on the following requirements, determine the optimal number of GitHub issues to create. Return only a number.\n\nRequirements: {template}\n\nOptimal number of issues:"
        );
        match self.generate_content(&prompt).await {
            Ok(content) => parse_count(&content).unwrap_or_else(|| estimate_count(template)),
            Err(error) => {
                tracing::warn!(error = %error, "count determination failed, using size heuristic");
                estimate_count(template)
            }
        }
    }
}

#[async_trait]
impl IssueGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        "gemini"
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
        tracing::debug!(model = %self.config.model, count, "requesting issue drafts");
        let content = self.generate_content(&prompt).await?;
        parse_drafts(&content)
    }
}
