use async_trait::async_trait;

use crate::prompt::estimate_count;
use crate::types::{GeneratorError, IssueDraft, IssueGenerator};

/// Deterministic offline generator: numbered titles over the raw template,
/// cycling through components when provided. Used when no remote provider is
/// configured and as the last-priority provider.
#[derive(Debug, Clone)]
pub struct TemplateFanoutGenerator {
    max_count: u32,
}

impl TemplateFanoutGenerator {
    pub fn new(max_count: u32) -> Self {
        Self {
            max_count: max_count.max(1),
        }
    }

    fn resolve_count(&self, template: &str, components: &[String], count: Option<u32>) -> u32 {
        let resolved = match count {
            Some(value) => value,
            None if !components.is_empty() => components.len() as u32,
            None => estimate_count(template),
        };
        resolved.clamp(1, self.max_count)
    }
}

pub(crate) fn fanout_drafts(template: &str, components: &[String], count: u32) -> Vec<IssueDraft> {
    (1..=count)
        .map(|index| {
            let mut body = template.to_string();
            if !components.is_empty() {
                let component = &components[(index as usize - 1) % components.len()];
                body.push_str(&format!("\n\n**Component**: {component}"));
            }
            IssueDraft {
                title: format!("Auto-generated task #{index}"),
                body,
            }
        })
        .collect()
}

#[async_trait]
impl IssueGenerator for TemplateFanoutGenerator {
    fn name(&self) -> &'static str {
        "template-fanout"
    }

    async fn generate(
        &self,
        template: &str,
        components: &[String],
        count: Option<u32>,
    ) -> Result<Vec<IssueDraft>, GeneratorError> {
        let count = self.resolve_count(template, components, count);
        tracing::debug!(count, "fanning template out without a remote provider");
        Ok(fanout_drafts(template, components, count))
    }
}
