//! Persistence seam for run history: a storage-agnostic trait plus the
//! JSON-state-file implementation used by the CLI runtime.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use hatch_core::write_json_atomic;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::run::{RunStatus, SpawnRun, SpawnedIssue};

const RUN_STORE_SCHEMA_VERSION: u32 = 1;

/// Create/read/update of run and spawned-issue records. The engine is the
/// only writer; implementations serialize access internally.
pub trait RunStore: Send + Sync {
    fn insert_run(&self, run: &SpawnRun) -> Result<(), EngineError>;
    fn update_run(&self, run: &SpawnRun) -> Result<(), EngineError>;
    fn find_run(&self, run_id: &str) -> Result<Option<SpawnRun>, EngineError>;
    /// Most recent pending dry-run for the trigger; the confirm target.
    fn latest_pending_dry_run(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Option<SpawnRun>, EngineError>;
    /// Most recent run in {completed, failed, running}; the rollback target.
    fn latest_rollback_candidate(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Option<SpawnRun>, EngineError>;
    fn pending_runs(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Vec<SpawnRun>, EngineError>;
    /// Most recent runs first.
    fn recent_runs(
        &self,
        repository: &str,
        trigger_issue_number: u64,
        limit: usize,
    ) -> Result<Vec<SpawnRun>, EngineError>;
    fn insert_spawned_issue(&self, issue: &SpawnedIssue) -> Result<(), EngineError>;
    fn update_spawned_issue(&self, issue: &SpawnedIssue) -> Result<(), EngineError>;
    fn spawned_issues_for_run(&self, run_id: &str) -> Result<Vec<SpawnedIssue>, EngineError>;
    fn hash_exists(&self, hash: &str) -> Result<bool, EngineError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct RunStoreState {
    schema_version: u32,
    #[serde(default)]
    runs: Vec<SpawnRun>,
    #[serde(default)]
    issues: Vec<SpawnedIssue>,
}

impl Default for RunStoreState {
    fn default() -> Self {
        Self {
            schema_version: RUN_STORE_SCHEMA_VERSION,
            runs: Vec::new(),
            issues: Vec::new(),
        }
    }
}

struct RunStoreInner {
    state: RunStoreState,
    hash_index: HashSet<String>,
}

/// Versioned JSON state document persisted atomically on every mutation,
/// with the dedup hash index rebuilt from the issue records on load.
pub struct JsonRunStore {
    path: PathBuf,
    inner: Mutex<RunStoreInner>,
}

impl JsonRunStore {
    pub fn load(path: PathBuf) -> Result<Self, EngineError> {
        let mut state = if path.exists() {
            let raw = std::fs::read_to_string(&path).map_err(|error| {
                EngineError::Store(format!("failed to read state file {}: {error}", path.display()))
            })?;
            match serde_json::from_str::<RunStoreState>(&raw) {
                Ok(state) => state,
                Err(error) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %error,
                        "failed to parse run store state, starting fresh"
                    );
                    RunStoreState::default()
                }
            }
        } else {
            RunStoreState::default()
        };

        if state.schema_version != RUN_STORE_SCHEMA_VERSION {
            tracing::warn!(
                expected = RUN_STORE_SCHEMA_VERSION,
                found = state.schema_version,
                "unsupported run store schema, starting fresh"
            );
            state = RunStoreState::default();
        }

        let hash_index = state
            .issues
            .iter()
            .map(|issue| issue.hash.clone())
            .collect::<HashSet<_>>();
        Ok(Self {
            path,
            inner: Mutex::new(RunStoreInner { state, hash_index }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, RunStoreInner>, EngineError> {
        self.inner
            .lock()
            .map_err(|_| EngineError::Store("run store lock poisoned".to_string()))
    }

    fn save(&self, inner: &RunStoreInner) -> Result<(), EngineError> {
        write_json_atomic(&self.path, &inner.state).map_err(|error| {
            EngineError::Store(format!(
                "failed to write state file {}: {error}",
                self.path.display()
            ))
        })
    }
}

impl RunStore for JsonRunStore {
    fn insert_run(&self, run: &SpawnRun) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        if inner.state.runs.iter().any(|row| row.run_id == run.run_id) {
            return Err(EngineError::Store(format!(
                "run {} already exists",
                run.run_id
            )));
        }
        inner.state.runs.push(run.clone());
        self.save(&inner)
    }

    fn update_run(&self, run: &SpawnRun) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        let Some(row) = inner
            .state
            .runs
            .iter_mut()
            .find(|row| row.run_id == run.run_id)
        else {
            return Err(EngineError::NotFound(format!("run not found: {}", run.run_id)));
        };
        *row = run.clone();
        self.save(&inner)
    }

    fn find_run(&self, run_id: &str) -> Result<Option<SpawnRun>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .runs
            .iter()
            .find(|row| row.run_id == run_id)
            .cloned())
    }

    fn latest_pending_dry_run(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Option<SpawnRun>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .runs
            .iter()
            .rev()
            .find(|row| {
                row.repository == repository
                    && row.trigger_issue_number == trigger_issue_number
                    && row.status == RunStatus::Pending
                    && row.dry_run
            })
            .cloned())
    }

    fn latest_rollback_candidate(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Option<SpawnRun>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .runs
            .iter()
            .rev()
            .find(|row| {
                row.repository == repository
                    && row.trigger_issue_number == trigger_issue_number
                    && matches!(
                        row.status,
                        RunStatus::Completed | RunStatus::Failed | RunStatus::Running
                    )
            })
            .cloned())
    }

    fn pending_runs(
        &self,
        repository: &str,
        trigger_issue_number: u64,
    ) -> Result<Vec<SpawnRun>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .runs
            .iter()
            .filter(|row| {
                row.repository == repository
                    && row.trigger_issue_number == trigger_issue_number
                    && row.status == RunStatus::Pending
            })
            .cloned()
            .collect())
    }

    fn recent_runs(
        &self,
        repository: &str,
        trigger_issue_number: u64,
        limit: usize,
    ) -> Result<Vec<SpawnRun>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .runs
            .iter()
            .rev()
            .filter(|row| {
                row.repository == repository && row.trigger_issue_number == trigger_issue_number
            })
            .take(limit)
            .cloned()
            .collect())
    }

    fn insert_spawned_issue(&self, issue: &SpawnedIssue) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        if inner.hash_index.contains(&issue.hash) {
            return Err(EngineError::Store(format!(
                "spawned issue hash already recorded: {}",
                issue.hash
            )));
        }
        inner.hash_index.insert(issue.hash.clone());
        inner.state.issues.push(issue.clone());
        self.save(&inner)
    }

    fn update_spawned_issue(&self, issue: &SpawnedIssue) -> Result<(), EngineError> {
        let mut inner = self.lock()?;
        let Some(row) = inner
            .state
            .issues
            .iter_mut()
            .find(|row| row.hash == issue.hash)
        else {
            return Err(EngineError::NotFound(format!(
                "spawned issue not found for hash {}",
                issue.hash
            )));
        };
        *row = issue.clone();
        self.save(&inner)
    }

    fn spawned_issues_for_run(&self, run_id: &str) -> Result<Vec<SpawnedIssue>, EngineError> {
        let inner = self.lock()?;
        Ok(inner
            .state
            .issues
            .iter()
            .filter(|row| row.run_id == run_id)
            .cloned()
            .collect())
    }

    fn hash_exists(&self, hash: &str) -> Result<bool, EngineError> {
        let inner = self.lock()?;
        Ok(inner.hash_index.contains(hash))
    }
}
