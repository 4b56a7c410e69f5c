use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::repo::RepoRef;

#[derive(Debug, Error)]
/// Failure taxonomy for tracker calls. `Status` carries non-retryable HTTP
/// responses; `RetriesExhausted` wraps the last transient failure once the
/// attempt budget is spent.
pub enum TrackerError {
    #[error("invalid tracker configuration: {0}")]
    InvalidConfig(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("tracker returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("{operation} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        operation: String,
        attempts: usize,
        message: String,
    },
    #[error("invalid tracker response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Deserialize)]
/// An issue as returned by the tracker API.
pub struct TrackerIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub pull_request: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[async_trait]
/// Capability interface over the issue tracker. All methods are routed
/// through the implementation's retry wrapper.
pub trait IssueTracker: Send + Sync {
    async fn get_issue(&self, repo: &RepoRef, number: u64) -> Result<TrackerIssue, TrackerError>;

    async fn create_issue(
        &self,
        repo: &RepoRef,
        issue: &NewIssue,
    ) -> Result<TrackerIssue, TrackerError>;

    async fn create_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> Result<IssueComment, TrackerError>;

    async fn close_issue(
        &self,
        repo: &RepoRef,
        issue_number: u64,
    ) -> Result<TrackerIssue, TrackerError>;

    async fn list_open_issues(&self, repo: &RepoRef) -> Result<Vec<TrackerIssue>, TrackerError>;

    async fn validate_repository_access(&self, repo: &RepoRef) -> Result<bool, TrackerError>;
}
