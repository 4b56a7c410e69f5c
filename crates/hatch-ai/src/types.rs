use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One generated issue draft, before dedup and provenance decoration.
pub struct IssueDraft {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[async_trait]
/// Capability interface over a text-generation provider.
///
/// `count` of `None` lets the provider decide how many drafts the template
/// warrants; implementations clamp the result to their configured maximum.
pub trait IssueGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    async fn generate(
        &self,
        template: &str,
        components: &[String],
        count: Option<u32>,
    ) -> Result<Vec<IssueDraft>, GeneratorError>;
}
