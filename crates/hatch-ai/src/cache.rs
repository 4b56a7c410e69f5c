use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hatch_core::{is_expired_unix_ms, now_unix_ms};
use sha2::{Digest, Sha256};

use crate::types::{GeneratorError, IssueDraft, IssueGenerator};

/// Content-addressed TTL cache around a generator: identical
/// (template, components, count) requests within the TTL reuse the prior
/// batch instead of calling the provider again.
pub struct CachedGenerator {
    inner: Arc<dyn IssueGenerator>,
    ttl_ms: u64,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    drafts: Vec<IssueDraft>,
    expires_unix_ms: u64,
}

fn cache_key(template: &str, components: &[String], count: Option<u32>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(template.as_bytes());
    for component in components {
        hasher.update([0x1f]);
        hasher.update(component.as_bytes());
    }
    hasher.update([0x1f]);
    hasher.update(count.map(|value| value.to_string()).unwrap_or_default());
    format!("{:x}", hasher.finalize())
}

impl CachedGenerator {
    pub fn new(inner: Arc<dyn IssueGenerator>, ttl_ms: u64) -> Self {
        Self {
            inner,
            ttl_ms,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl IssueGenerator for CachedGenerator {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn generate(
        &self,
        template: &str,
        components: &[String],
        count: Option<u32>,
    ) -> Result<Vec<IssueDraft>, GeneratorError> {
        let key = cache_key(template, components, count);
        let now = now_unix_ms();
        {
            let entries = self
                .entries
                .lock()
                .map_err(|_| GeneratorError::Internal("generator cache lock poisoned".to_string()))?;
            if let Some(entry) = entries.get(&key) {
                if !is_expired_unix_ms(Some(entry.expires_unix_ms), now) {
                    tracing::debug!(provider = self.inner.name(), "generator cache hit");
                    return Ok(entry.drafts.clone());
                }
            }
        }

        let drafts = self.inner.generate(template, components, count).await?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| GeneratorError::Internal("generator cache lock poisoned".to_string()))?;
        entries.insert(
            key,
            CacheEntry {
                drafts: drafts.clone(),
                expires_unix_ms: now.saturating_add(self.ttl_ms),
            },
        );
        Ok(drafts)
    }
}
