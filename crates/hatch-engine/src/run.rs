//! Run and spawned-issue records plus the run lifecycle state machine.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use hatch_core::now_unix_ms;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::spawn_config::SpawnConfig;

static RUN_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnedIssueStatus {
    Created,
    Deleted,
    Failed,
}

/// `run_{datetime}_{suffix}`; the suffix mixes the clock and a process-local
/// counter so concurrent triggers in the same second stay distinct.
pub fn new_run_id() -> String {
    let stamp = Utc::now().format("%Y%m%d_%H%M%S");
    let count = RUN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let mixed = now_unix_ms()
        .wrapping_mul(0x9E37_79B9_7F4A_7C15)
        .rotate_left(17)
        ^ count.wrapping_mul(0x2545_F491_4F6C_DD1D);
    format!("run_{stamp}_{:08x}", mixed as u32)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One tracked attempt to process a trigger. Immutable history once
/// terminal; never deleted, only referenced for rollback.
pub struct SpawnRun {
    pub run_id: String,
    pub repository: String,
    pub trigger_issue_number: u64,
    pub status: RunStatus,
    pub config: SpawnConfig,
    pub dry_run: bool,
    pub confirmed: bool,
    pub issues_planned: u32,
    pub issues_created: u32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SpawnRun {
    pub fn new(
        repository: String,
        trigger_issue_number: u64,
        config: SpawnConfig,
        confirmed: bool,
    ) -> Self {
        let dry_run = config.dry_run;
        let issues_planned = config.count.unwrap_or(0);
        Self {
            run_id: new_run_id(),
            repository,
            trigger_issue_number,
            status: RunStatus::Pending,
            config,
            dry_run,
            confirmed,
            issues_planned,
            issues_created: 0,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn transition(&mut self, from: RunStatus, to: RunStatus) -> Result<(), EngineError> {
        if self.status != from {
            return Err(EngineError::State(format!(
                "run {} cannot move from {} to {}",
                self.run_id,
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_started(&mut self) -> Result<(), EngineError> {
        self.transition(RunStatus::Pending, RunStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_completed(&mut self) -> Result<(), EngineError> {
        self.transition(RunStatus::Running, RunStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_failed(&mut self, error_message: &str) -> Result<(), EngineError> {
        self.transition(RunStatus::Running, RunStatus::Failed)?;
        self.error_message = Some(error_message.to_string());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_cancelled(&mut self) -> Result<(), EngineError> {
        self.transition(RunStatus::Pending, RunStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Rollback targets only terminal runs that still own open created
    /// issues; it never changes the run's own status.
    pub fn can_rollback(&self, issues: &[SpawnedIssue]) -> bool {
        matches!(self.status, RunStatus::Completed | RunStatus::Failed)
            && issues
                .iter()
                .any(|issue| issue.status == SpawnedIssueStatus::Created)
    }

    pub fn summary(&self) -> RunSummary {
        let duration_seconds = match (self.started_at, self.completed_at) {
            (Some(started), Some(completed)) => {
                Some(completed.signed_duration_since(started).num_seconds())
            }
            _ => None,
        };
        RunSummary {
            run_id: self.run_id.clone(),
            repository: self.repository.clone(),
            status: self.status,
            dry_run: self.dry_run,
            issues_planned: self.issues_planned,
            issues_created: self.issues_created,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One tracker issue produced by a run.
pub struct SpawnedIssue {
    pub run_id: String,
    pub repository: String,
    pub issue_number: u64,
    pub issue_url: String,
    pub title: String,
    pub body: String,
    pub hash: String,
    pub labels: Vec<String>,
    pub status: SpawnedIssueStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub repository: String,
    pub status: RunStatus,
    pub dry_run: bool,
    pub issues_planned: u32,
    pub issues_created: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}
