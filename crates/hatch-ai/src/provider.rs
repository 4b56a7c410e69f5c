use std::sync::Arc;

use crate::cache::CachedGenerator;
use crate::fanout::TemplateFanoutGenerator;
use crate::gemini::{GeminiGenerator, GeminiGeneratorConfig};
use crate::openai::{OpenAiGenerator, OpenAiGeneratorConfig};
use crate::types::IssueGenerator;

/// Candidate provider configurations, tried in priority order at startup:
/// Gemini first, then any OpenAI-compatible endpoint, then the offline
/// template fan-out.
#[derive(Debug, Clone, Default)]
pub struct GeneratorProviders {
    pub gemini: Option<GeminiGeneratorConfig>,
    pub openai: Option<OpenAiGeneratorConfig>,
    pub cache_ttl_ms: u64,
    pub max_count: u32,
}

pub fn select_generator(providers: GeneratorProviders) -> Arc<dyn IssueGenerator> {
    let max_count = providers.max_count.max(1);
    let remote: Option<Arc<dyn IssueGenerator>> = select_remote(&providers);

    match remote {
        Some(generator) => {
            tracing::info!(provider = generator.name(), "text-generation provider selected");
            if providers.cache_ttl_ms > 0 {
                Arc::new(CachedGenerator::new(generator, providers.cache_ttl_ms))
            } else {
                generator
            }
        }
        None => {
            tracing::warn!("no text-generation provider configured, using template fan-out");
            Arc::new(TemplateFanoutGenerator::new(max_count))
        }
    }
}

fn select_remote(providers: &GeneratorProviders) -> Option<Arc<dyn IssueGenerator>> {
    if let Some(config) = providers.gemini.clone() {
        match GeminiGenerator::new(config) {
            Ok(generator) => return Some(Arc::new(generator)),
            Err(error) => {
                tracing::warn!(error = %error, "gemini provider unavailable, trying next");
            }
        }
    }
    if let Some(config) = providers.openai.clone() {
        match OpenAiGenerator::new(config) {
            Ok(generator) => return Some(Arc::new(generator)),
            Err(error) => {
                tracing::warn!(error = %error, "openai-compatible provider unavailable, trying next");
            }
        }
    }
    None
}
