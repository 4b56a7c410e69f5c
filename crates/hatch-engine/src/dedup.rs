//! Hash-based uniqueness check against prior created issues.

use std::collections::HashSet;
use std::sync::Arc;

use hatch_ai::IssueDraft;
use sha2::{Digest, Sha256};

use crate::error::EngineError;
use crate::run_store::RunStore;
use crate::spawn_config::UniqueBy;

/// Dedup digest over the configured field(s). Exact-match only; no fuzzy
/// similarity.
pub fn issue_hash(title: &str, body: &str, unique_by: UniqueBy) -> String {
    let digest = match unique_by {
        UniqueBy::Title => Sha256::digest(title.as_bytes()),
        UniqueBy::Body => Sha256::digest(body.as_bytes()),
        UniqueBy::Hash => Sha256::digest(format!("{title}|{body}").as_bytes()),
    };
    format!("{digest:x}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A draft that survived deduplication, carrying its dedup hash.
pub struct DedupedDraft {
    pub title: String,
    pub body: String,
    pub hash: String,
}

/// Drops candidates whose hash already exists in persistent storage or
/// earlier in the same batch, preserving input order for survivors.
pub struct DeduplicationFilter {
    store: Arc<dyn RunStore>,
}

impl DeduplicationFilter {
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    pub fn filter(
        &self,
        drafts: Vec<IssueDraft>,
        unique_by: UniqueBy,
    ) -> Result<Vec<DedupedDraft>, EngineError> {
        let total = drafts.len();
        let mut seen: HashSet<String> = HashSet::new();
        let mut kept = Vec::new();
        for draft in drafts {
            let hash = issue_hash(&draft.title, &draft.body, unique_by);
            if seen.contains(&hash) || self.store.hash_exists(&hash)? {
                tracing::debug!(title = %draft.title, unique_by = unique_by.as_str(), "dropping duplicate draft");
                continue;
            }
            seen.insert(hash.clone());
            kept.push(DedupedDraft {
                title: draft.title,
                body: draft.body,
                hash,
            });
        }

        let dropped = total - kept.len();
        if dropped > 0 {
            tracing::info!(dropped, kept = kept.len(), "filtered duplicate drafts");
        }
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hatch_ai::IssueDraft;

    use super::{issue_hash, DeduplicationFilter};
    use crate::run::{SpawnedIssue, SpawnedIssueStatus};
    use crate::run_store::{JsonRunStore, RunStore};
    use crate::spawn_config::UniqueBy;

    fn draft(title: &str, body: &str) -> IssueDraft {
        IssueDraft {
            title: title.to_string(),
            body: body.to_string(),
        }
    }

    fn store_in(tempdir: &tempfile::TempDir) -> Arc<JsonRunStore> {
        Arc::new(JsonRunStore::load(tempdir.path().join("state.json")).expect("store"))
    }

    #[test]
    fn unit_hash_is_invariant_over_the_unselected_field() {
        let by_title = issue_hash("t", "b1", UniqueBy::Title);
        assert_eq!(by_title, issue_hash("t", "b2", UniqueBy::Title));
        assert_ne!(by_title, issue_hash("u", "b1", UniqueBy::Title));

        let by_body = issue_hash("t1", "b", UniqueBy::Body);
        assert_eq!(by_body, issue_hash("t2", "b", UniqueBy::Body));
        assert_ne!(by_body, issue_hash("t1", "c", UniqueBy::Body));

        let combined = issue_hash("t", "b", UniqueBy::Hash);
        assert_ne!(combined, issue_hash("t", "c", UniqueBy::Hash));
        assert_ne!(combined, issue_hash("u", "b", UniqueBy::Hash));
    }

    #[test]
    fn functional_filter_drops_batch_and_store_duplicates_in_order() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let store = store_in(&tempdir);
        store
            .insert_spawned_issue(&SpawnedIssue {
                run_id: "run_1".to_string(),
                repository: "acme/widgets".to_string(),
                issue_number: 1,
                issue_url: "https://example.com/1".to_string(),
                title: "known".to_string(),
                body: "body".to_string(),
                hash: issue_hash("known", "body", UniqueBy::Hash),
                labels: Vec::new(),
                status: SpawnedIssueStatus::Created,
                created_at: chrono::Utc::now(),
            })
            .expect("seed issue");

        let filter = DeduplicationFilter::new(store);
        let kept = filter
            .filter(
                vec![
                    draft("fresh-1", "body"),
                    draft("known", "body"),
                    draft("fresh-2", "body"),
                    draft("fresh-1", "body"),
                ],
                UniqueBy::Hash,
            )
            .expect("filtered");
        let titles: Vec<&str> = kept.iter().map(|draft| draft.title.as_str()).collect();
        assert_eq!(titles, vec!["fresh-1", "fresh-2"]);
    }

    #[test]
    fn functional_filter_is_idempotent() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let filter = DeduplicationFilter::new(store_in(&tempdir));
        let first = filter
            .filter(
                vec![draft("a", "1"), draft("b", "2"), draft("a", "1")],
                UniqueBy::Hash,
            )
            .expect("first pass");
        let second = filter
            .filter(
                first
                    .iter()
                    .map(|kept| draft(&kept.title, &kept.body))
                    .collect(),
                UniqueBy::Hash,
            )
            .expect("second pass");
        assert_eq!(first, second);
    }
}
